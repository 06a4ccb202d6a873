//! Host reconciler.
//!
//! Every host attribute is fixed at creation; an update can only confirm
//! that nothing changed.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;
use xsoar_client::Route;
use xsoar_core::ObjectKind;

use super::{get, guarded_delete, list, present, refuse_replacement};
use crate::error::{Error, Result};
use crate::normalize::{Canonical, group_id_for_name, group_name_for_id};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{Host, HostSpec};

const KIND: ObjectKind = ObjectKind::Host;

/// Reconciles engine hosts.
#[derive(Debug, Clone)]
pub struct HostReconciler {
    provider: Provider,
}

impl HostReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

/// Read a host by name and resolve its HA group name.
async fn fetch(ctx: &ProviderContext, name: &str) -> Result<Host> {
    let body = get(ctx, &Route::new(KIND), name, "read host").await?;
    let mut host = Host::from_raw(&body)?;
    if let Some(group_id) = &host.ha_group_id {
        let groups = list(ctx, &Route::new(ObjectKind::HaGroup), "list HA groups").await?;
        host.ha_group_name = group_name_for_id(&groups, group_id)?;
    }
    Ok(host)
}

fn create_request(desired: &HostSpec, ha_group_id: Option<&str>) -> Value {
    let mut request = Map::new();
    request.insert("name".to_string(), Value::String(desired.name.clone()));
    let optional = [
        ("haGroupId", ha_group_id),
        ("serverUrl", desired.server_url.as_deref()),
        ("elasticsearchAddress", desired.elasticsearch_url.as_deref()),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            request.insert(field.to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(request)
}

#[async_trait]
impl Reconcile for HostReconciler {
    type Spec = HostSpec;
    type State = Host;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &HostSpec) -> Result<Host> {
        let ctx = self.provider.context()?;
        let ha_group_id = match &desired.ha_group_name {
            Some(group_name) => {
                let groups = list(ctx, &Route::new(ObjectKind::HaGroup), "list HA groups").await?;
                Some(
                    group_id_for_name(&groups, group_name)?.ok_or_else(|| {
                        Error::unresolved_reference(ObjectKind::HaGroup, group_name)
                    })?,
                )
            }
            None => None,
        };

        let request = create_request(desired, ha_group_id.as_deref());
        ctx.remote
            .create(&Route::new(KIND), &request)
            .await
            .map_err(|err| Error::remote("create host", err))?;
        info!(name = %desired.name, "Host created");
        fetch(ctx, &desired.name).await
    }

    async fn read(&self, last: &Host) -> Result<Host> {
        let ctx = self.provider.context()?;
        fetch(ctx, &last.name).await
    }

    async fn update(&self, desired: &HostSpec, last: &Host) -> Result<Host> {
        let ctx = self.provider.context()?;
        let plan = Host::plan(desired, last);
        refuse_replacement(KIND, &last.name, plan.replace)?;
        if let Some(step) = plan.steps.into_iter().next() {
            match step {}
        }
        fetch(ctx, &last.name).await
    }

    async fn delete(&self, last: &Host) -> Result<()> {
        let ctx = self.provider.context()?;
        guarded_delete(ctx, &Route::new(KIND), &last.name, &last.id, &present, "delete host").await
    }

    async fn import(&self, id: &str) -> Result<Host> {
        let ctx = self.provider.context()?;
        fetch(ctx, id).await
    }
}
