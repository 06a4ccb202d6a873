//! Integration instance reconciler.
//!
//! Instances live either on the main host or inside a tenant account; the
//! account scope is part of the route, never of the wire object.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use xsoar_client::Route;
use xsoar_core::ObjectKind;

use super::{get, guarded_delete, refuse_replacement};
use crate::error::{Error, Result, ShapeError};
use crate::normalize::{Canonical, Empty, RawObject, config_pairs, find};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{IntegrationInstance, IntegrationInstanceSpec, explicit};

const KIND: ObjectKind = ObjectKind::IntegrationInstance;

/// Reconciles integration instances.
#[derive(Debug, Clone)]
pub struct IntegrationInstanceReconciler {
    provider: Provider,
}

impl IntegrationInstanceReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

/// The named instance within a search response.
fn instance_in<'a>(body: &'a Value, name: &str) -> std::result::Result<Option<&'a Value>, ShapeError> {
    let by_name = |raw: &RawObject<'_>| -> std::result::Result<bool, ShapeError> {
        Ok(raw.optional_str("name", Empty::Keep)? == Some(name))
    };
    if body.is_array() || body.get("instances").is_some() {
        return find(KIND, body, "instances", by_name);
    }
    if body.is_null() {
        return Ok(None);
    }
    let raw = RawObject::new(KIND, body)?;
    Ok(by_name(&raw)?.then_some(body))
}

async fn fetch(ctx: &ProviderContext, account: Option<&str>, name: &str) -> Result<IntegrationInstance> {
    let route = Route::new(KIND).scoped(account);
    let body = get(ctx, &route, name, "read integration instance").await?;
    let raw = instance_in(&body, name)?.ok_or_else(|| Error::not_found(KIND, name))?;
    let mut instance = IntegrationInstance::from_raw(raw)?;
    instance.account = account.map(str::to_string);
    Ok(instance)
}

/// Fields every save carries besides the instance itself.
fn with_save_defaults(mut request: Map<String, Value>) -> Value {
    request.insert("enabled".to_string(), json!("true"));
    request.insert("version".to_string(), json!(-1));
    Value::Object(request)
}

fn create_request(desired: &IntegrationInstanceSpec) -> Value {
    let config: Map<String, Value> = desired
        .config
        .iter()
        .flatten()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();

    let mut request = Map::new();
    request.insert("name".to_string(), json!(desired.name));
    request.insert("brand".to_string(), json!(desired.integration_name));
    request.insert(
        "propagationLabels".to_string(),
        json!(explicit(desired.propagation_labels.as_ref()).cloned().unwrap_or_default()),
    );
    request.insert("data".to_string(), config_pairs(&config));
    let optional = [
        ("incomingMapperId", &desired.incoming_mapper_id),
        ("outgoingMapperId", &desired.outgoing_mapper_id),
        ("mappingId", &desired.mapping_id),
        ("engine", &desired.engine_id),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            request.insert(field.to_string(), json!(value));
        }
    }
    with_save_defaults(request)
}

fn update_request(target: &IntegrationInstance) -> Value {
    match target.to_raw() {
        Value::Object(map) => with_save_defaults(map),
        other => other,
    }
}

/// Split an import id of the form `account/name` or `name`.
fn parse_import_id(id: &str) -> (Option<&str>, &str) {
    match id.split_once('/') {
        Some((account, name)) if !account.is_empty() => (Some(account), name),
        Some((_, name)) => (None, name),
        None => (None, id),
    }
}

#[async_trait]
impl Reconcile for IntegrationInstanceReconciler {
    type Spec = IntegrationInstanceSpec;
    type State = IntegrationInstance;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &IntegrationInstanceSpec) -> Result<IntegrationInstance> {
        let ctx = self.provider.context()?;
        let route = Route::new(KIND).scoped(desired.account());
        let request = create_request(desired);
        ctx.remote
            .create(&route, &request)
            .await
            .map_err(|err| Error::remote("create integration instance", err))?;
        info!(name = %desired.name, account = ?desired.account(), "Integration instance created");
        fetch(ctx, desired.account(), &desired.name).await
    }

    async fn read(&self, last: &IntegrationInstance) -> Result<IntegrationInstance> {
        let ctx = self.provider.context()?;
        fetch(ctx, last.account.as_deref(), &last.name).await
    }

    async fn update(
        &self,
        desired: &IntegrationInstanceSpec,
        last: &IntegrationInstance,
    ) -> Result<IntegrationInstance> {
        let ctx = self.provider.context()?;
        let account = last.account.as_deref();
        let plan = IntegrationInstance::plan(desired, last);
        refuse_replacement(KIND, &last.name, plan.replace)?;

        let route = Route::new(KIND).scoped(account);
        for step in plan.steps {
            debug!(name = %last.name, "Saving integration instance");
            ctx.remote
                .update(&route, &step.target.id, &update_request(&step.target))
                .await
                .map_err(|err| Error::remote("update integration instance", err))?;
        }
        fetch(ctx, account, &last.name).await
    }

    async fn delete(&self, last: &IntegrationInstance) -> Result<()> {
        let ctx = self.provider.context()?;
        let route = Route::new(KIND).scoped(last.account.as_deref());
        let name = last.name.as_str();
        let exists = |body: &Value| instance_in(body, name).map(|found| found.is_some());
        guarded_delete(ctx, &route, name, &last.id, &exists, "delete integration instance").await
    }

    async fn import(&self, id: &str) -> Result<IntegrationInstance> {
        let ctx = self.provider.context()?;
        let (account, name) = parse_import_id(id);
        fetch(ctx, account, name).await
    }
}
