//! Mapper reconciler.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;
use xsoar_client::Route;
use xsoar_core::ObjectKind;

use super::{classifier_save, get, guarded_delete, present, refuse_replacement, search_classifiers};
use crate::error::{Error, Result};
use crate::normalize::Canonical;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{Mapper, MapperDirection, MapperSpec, explicit};

const KIND: ObjectKind = ObjectKind::Mapper;

/// Reconciles incoming and outgoing mappers.
#[derive(Debug, Clone)]
pub struct MapperReconciler {
    provider: Provider,
}

impl MapperReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

async fn fetch(ctx: &ProviderContext, id: &str) -> Result<Mapper> {
    let body = get(ctx, &Route::new(KIND), id, "read mapper").await?;
    Ok(Mapper::from_raw(&body)?)
}

/// Search both directions for a mapper by name.
async fn find_by_name(ctx: &ProviderContext, name: &str) -> Result<Mapper> {
    for direction in [MapperDirection::Incoming, MapperDirection::Outgoing] {
        if let Some(raw) = search_classifiers(ctx, KIND, name, direction.remote_type()).await? {
            return Ok(Mapper::from_raw(&raw)?);
        }
    }
    Err(Error::not_found(KIND, name))
}

fn create_request(desired: &MapperSpec) -> Value {
    let mut request = Map::new();
    request.insert("name".to_string(), json!(desired.name));
    request.insert("type".to_string(), json!(desired.direction.remote_type()));
    if let Some(incident_type) = &desired.default_incident_type {
        request.insert("defaultIncidentType".to_string(), json!(incident_type));
    }
    request.insert(
        "mapping".to_string(),
        desired
            .mapping
            .clone()
            .filter(|m| !m.is_null())
            .unwrap_or_else(|| json!({})),
    );
    request.insert(
        "propagationLabels".to_string(),
        json!(explicit(desired.propagation_labels.as_ref()).cloned().unwrap_or_default()),
    );
    classifier_save(Value::Object(request))
}

#[async_trait]
impl Reconcile for MapperReconciler {
    type Spec = MapperSpec;
    type State = Mapper;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &MapperSpec) -> Result<Mapper> {
        let ctx = self.provider.context()?;
        let response = ctx
            .remote
            .create(&Route::new(KIND), &create_request(desired))
            .await
            .map_err(|err| Error::remote("create mapper", err))?;

        let mapper = if response.body.get("id").is_some_and(Value::is_string) {
            Mapper::from_raw(&response.body)?
        } else {
            let raw = search_classifiers(ctx, KIND, &desired.name, desired.direction.remote_type())
                .await?
                .ok_or_else(|| Error::not_found(KIND, &desired.name))?;
            Mapper::from_raw(&raw)?
        };
        info!(name = %mapper.name, id = %mapper.id, direction = %mapper.direction, "Mapper created");
        Ok(mapper)
    }

    async fn read(&self, last: &Mapper) -> Result<Mapper> {
        let ctx = self.provider.context()?;
        fetch(ctx, &last.id).await
    }

    async fn update(&self, desired: &MapperSpec, last: &Mapper) -> Result<Mapper> {
        let ctx = self.provider.context()?;
        let plan = Mapper::plan(desired, last);
        refuse_replacement(KIND, &last.id, plan.replace)?;
        for step in plan.steps {
            ctx.remote
                .update(&Route::new(KIND), &step.target.id, &classifier_save(step.target.to_raw()))
                .await
                .map_err(|err| Error::remote("update mapper", err))?;
        }
        fetch(ctx, &last.id).await
    }

    async fn delete(&self, last: &Mapper) -> Result<()> {
        let ctx = self.provider.context()?;
        guarded_delete(ctx, &Route::new(KIND), &last.id, &last.id, &present, "delete mapper").await
    }

    async fn import(&self, id: &str) -> Result<Mapper> {
        let ctx = self.provider.context()?;
        find_by_name(ctx, id).await
    }
}
