//! HA group reconciler.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;
use xsoar_client::Route;
use xsoar_core::ObjectKind;

use super::{get, guarded_delete, list, present, refuse_replacement};
use crate::error::{Error, Result};
use crate::normalize::{Canonical, find};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{HaGroup, HaGroupSpec};

const KIND: ObjectKind = ObjectKind::HaGroup;

/// Reconciles high-availability groups.
#[derive(Debug, Clone)]
pub struct HaGroupReconciler {
    provider: Provider,
}

impl HaGroupReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

async fn fetch(ctx: &ProviderContext, id: &str) -> Result<HaGroup> {
    let body = get(ctx, &Route::new(KIND), id, "read HA group").await?;
    Ok(HaGroup::from_raw(&body)?)
}

/// Find a group by name in the listing.
async fn find_by_name(ctx: &ProviderContext, name: &str) -> Result<Option<HaGroup>> {
    let groups = list(ctx, &Route::new(KIND), "list HA groups").await?;
    let found = find(KIND, &groups, "groups", |raw| {
        Ok(raw.required_str("name")? == name)
    })?;
    Ok(found.map(HaGroup::from_raw).transpose()?)
}

/// Whether a save response carries the saved group.
fn saved_group(body: &Value) -> Result<Option<HaGroup>> {
    if body.get("id").is_some_and(Value::is_string) {
        return Ok(Some(HaGroup::from_raw(body)?));
    }
    Ok(None)
}

#[async_trait]
impl Reconcile for HaGroupReconciler {
    type Spec = HaGroupSpec;
    type State = HaGroup;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &HaGroupSpec) -> Result<HaGroup> {
        let ctx = self.provider.context()?;
        let request = json!({
            "name": desired.name,
            "elasticsearchAddress": desired.elasticsearch_url,
            "elasticIndexPrefix": desired.elastic_index_prefix,
        });
        let response = ctx
            .remote
            .create(&Route::new(KIND), &request)
            .await
            .map_err(|err| Error::remote("create HA group", err))?;

        let group = match saved_group(&response.body)? {
            Some(group) => group,
            None => find_by_name(ctx, &desired.name)
                .await?
                .ok_or_else(|| Error::not_found(KIND, &desired.name))?,
        };
        info!(name = %group.name, id = %group.id, "HA group created");
        Ok(group)
    }

    async fn read(&self, last: &HaGroup) -> Result<HaGroup> {
        let ctx = self.provider.context()?;
        fetch(ctx, &last.id).await
    }

    async fn update(&self, desired: &HaGroupSpec, last: &HaGroup) -> Result<HaGroup> {
        let ctx = self.provider.context()?;
        let plan = HaGroup::plan(desired, last);
        refuse_replacement(KIND, &last.id, plan.replace)?;

        for step in plan.steps {
            ctx.remote
                .update(&Route::new(KIND), &step.target.id, &step.target.to_raw())
                .await
                .map_err(|err| Error::remote("update HA group", err))?;
        }
        fetch(ctx, &last.id).await
    }

    async fn delete(&self, last: &HaGroup) -> Result<()> {
        let ctx = self.provider.context()?;
        guarded_delete(ctx, &Route::new(KIND), &last.id, &last.id, &present, "delete HA group")
            .await
    }

    async fn import(&self, id: &str) -> Result<HaGroup> {
        let ctx = self.provider.context()?;
        let group = find_by_name(ctx, id)
            .await?
            .ok_or_else(|| Error::not_found(KIND, id))?;
        fetch(ctx, &group.id).await
    }
}
