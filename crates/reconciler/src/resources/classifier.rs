//! Classifier reconciler.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;
use xsoar_client::Route;
use xsoar_core::ObjectKind;

use super::{classifier_save, get, guarded_delete, present, refuse_replacement, search_classifiers};
use crate::error::{Error, Result};
use crate::normalize::{CLASSIFIER_TYPE, Canonical};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{Classifier, ClassifierSpec, explicit};

const KIND: ObjectKind = ObjectKind::Classifier;

/// Reconciles incident classifiers.
#[derive(Debug, Clone)]
pub struct ClassifierReconciler {
    provider: Provider,
}

impl ClassifierReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

async fn fetch(ctx: &ProviderContext, id: &str) -> Result<Classifier> {
    let body = get(ctx, &Route::new(KIND), id, "read classifier").await?;
    Ok(Classifier::from_raw(&body)?)
}

async fn find_by_name(ctx: &ProviderContext, name: &str) -> Result<Classifier> {
    let raw = search_classifiers(ctx, KIND, name, CLASSIFIER_TYPE)
        .await?
        .ok_or_else(|| Error::not_found(KIND, name))?;
    Ok(Classifier::from_raw(&raw)?)
}

fn create_request(desired: &ClassifierSpec) -> Value {
    let mut request = Map::new();
    request.insert("name".to_string(), json!(desired.name));
    request.insert("type".to_string(), json!(CLASSIFIER_TYPE));
    if let Some(incident_type) = &desired.default_incident_type {
        request.insert("defaultIncidentType".to_string(), json!(incident_type));
    }
    request.insert(
        "keyTypeMap".to_string(),
        json!(desired.key_type_map.clone().unwrap_or_default()),
    );
    if let Some(transformer) = desired.transformer.as_ref().filter(|t| !t.is_null()) {
        request.insert("transformer".to_string(), transformer.clone());
    }
    request.insert(
        "propagationLabels".to_string(),
        json!(explicit(desired.propagation_labels.as_ref()).cloned().unwrap_or_default()),
    );
    classifier_save(Value::Object(request))
}

#[async_trait]
impl Reconcile for ClassifierReconciler {
    type Spec = ClassifierSpec;
    type State = Classifier;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &ClassifierSpec) -> Result<Classifier> {
        let ctx = self.provider.context()?;
        let response = ctx
            .remote
            .create(&Route::new(KIND), &create_request(desired))
            .await
            .map_err(|err| Error::remote("create classifier", err))?;

        let classifier = if response.body.get("id").is_some_and(Value::is_string) {
            Classifier::from_raw(&response.body)?
        } else {
            find_by_name(ctx, &desired.name).await?
        };
        info!(name = %classifier.name, id = %classifier.id, "Classifier created");
        Ok(classifier)
    }

    async fn read(&self, last: &Classifier) -> Result<Classifier> {
        let ctx = self.provider.context()?;
        fetch(ctx, &last.id).await
    }

    async fn update(&self, desired: &ClassifierSpec, last: &Classifier) -> Result<Classifier> {
        let ctx = self.provider.context()?;
        let plan = Classifier::plan(desired, last);
        refuse_replacement(KIND, &last.id, plan.replace)?;
        for step in plan.steps {
            ctx.remote
                .update(&Route::new(KIND), &step.target.id, &classifier_save(step.target.to_raw()))
                .await
                .map_err(|err| Error::remote("update classifier", err))?;
        }
        fetch(ctx, &last.id).await
    }

    async fn delete(&self, last: &Classifier) -> Result<()> {
        let ctx = self.provider.context()?;
        guarded_delete(ctx, &Route::new(KIND), &last.id, &last.id, &present, "delete classifier")
            .await
    }

    async fn import(&self, id: &str) -> Result<Classifier> {
        let ctx = self.provider.context()?;
        find_by_name(ctx, id).await
    }
}
