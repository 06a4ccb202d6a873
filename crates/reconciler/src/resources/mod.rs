//! Reconcilers for the six object kinds.

mod account;
mod classifier;
mod ha_group;
mod host;
mod integration_instance;
mod mapper;

pub use account::AccountReconciler;
pub use classifier::ClassifierReconciler;
pub use ha_group::HaGroupReconciler;
pub use host::HostReconciler;
pub use integration_instance::IntegrationInstanceReconciler;
pub use mapper::MapperReconciler;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info};
use xsoar_client::{RawResponse, Route};
use xsoar_core::ObjectKind;

use crate::error::{Error, Result, ShapeError};
use crate::normalize::{Empty, find};
use crate::provider::ProviderContext;

/// Fetch a whole collection.
pub(crate) async fn list(ctx: &ProviderContext, route: &Route, operation: &str) -> Result<Value> {
    ctx.remote
        .list(route)
        .await
        .map(RawResponse::into_body)
        .map_err(|err| Error::remote(operation, err))
}

/// Fetch one object by key; a 404 or an empty body is `NotFound`.
pub(crate) async fn get(
    ctx: &ProviderContext,
    route: &Route,
    key: &str,
    operation: &str,
) -> Result<Value> {
    let body = ctx
        .remote
        .get(route, key)
        .await
        .map(RawResponse::into_body)
        .map_err(|err| Error::lookup(route.kind(), key, operation, err))?;
    if body.is_null() {
        return Err(Error::not_found(route.kind(), key));
    }
    Ok(body)
}

/// Refuse an update that would change an immutable field.
pub(crate) fn refuse_replacement(
    kind: ObjectKind,
    key: &str,
    replace: Vec<&'static str>,
) -> Result<()> {
    if replace.is_empty() {
        return Ok(());
    }
    info!(%kind, key, fields = %replace.iter().join(", "), "Update requires replacement");
    Err(Error::replacement_required(kind, replace))
}

/// Whether a lookup response holds an object.
pub(crate) fn present(body: &Value) -> std::result::Result<bool, ShapeError> {
    Ok(!body.is_null())
}

/// Delete under the retry controller, skipping objects that are already
/// gone.
///
/// Every attempt first looks the object up by `lookup_key`; a 404 or a
/// body `exists` rejects ends the operation successfully. A lookup body
/// `exists` cannot decode ends it with the shape error, without retrying.
pub(crate) async fn guarded_delete<E>(
    ctx: &ProviderContext,
    route: &Route,
    lookup_key: &str,
    delete_key: &str,
    exists: &E,
    operation: &str,
) -> Result<()>
where
    E: Fn(&Value) -> std::result::Result<bool, ShapeError> + Sync,
{
    let remote = ctx.remote.as_ref();
    let deleted = ctx
        .retry
        .run(operation, move || async move {
            let current = match remote.get(route, lookup_key).await {
                Ok(response) => response.body,
                Err(err) if err.is_not_found() => Value::Null,
                Err(err) => return Err(err),
            };
            match exists(&current) {
                Ok(true) => {}
                other => return Ok(other),
            }
            match remote.delete(route, delete_key).await {
                Ok(_) => Ok(Ok(true)),
                Err(err) if err.is_not_found() => Ok(Ok(false)),
                Err(err) => Err(err),
            }
        })
        .await??;

    if deleted {
        info!(kind = %route.kind(), key = delete_key, "Deleted");
    } else {
        debug!(kind = %route.kind(), key = lookup_key, "Already absent, nothing to delete");
    }
    Ok(())
}

/// Entry of the classifier store with the given name and remote `type`.
///
/// Classifiers and mappers share one store and one search endpoint.
pub(crate) async fn search_classifiers(
    ctx: &ProviderContext,
    kind: ObjectKind,
    name: &str,
    remote_type: &str,
) -> Result<Option<Value>> {
    let route = Route::new(kind);
    let body = list(ctx, &route, "search classifiers").await?;
    let found = find(kind, &body, "classifiers", |raw| {
        let same_type = raw
            .optional_str("type", Empty::Unset)?
            .is_some_and(|t| t == remote_type);
        Ok(same_type && raw.optional_str("name", Empty::Keep)? == Some(name))
    })?;
    Ok(found.cloned())
}

/// Save body for the classifier store.
pub(crate) fn classifier_save(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) => {
            map.insert("version".to_string(), Value::from(-1));
            Value::Object(map)
        }
        other => other,
    }
}
