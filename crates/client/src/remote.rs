//! The remote client facade.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiResult;
use crate::route::Route;

/// A raw, weakly-typed remote response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status.
    pub status: u16,
    /// Response headers (lowercased names).
    pub headers: BTreeMap<String, String>,
    /// Decoded JSON body; `Value::Null` for an empty body.
    pub body: Value,
}

impl RawResponse {
    /// A 200 response with the given body and no headers.
    pub const fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Take the body.
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// Capability-typed access to the management API.
///
/// Keys are kind-specific: accounts are addressed by `acc_<name>`, hosts
/// and integration instances by name, every other kind by remote id.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// List every object of the route's kind.
    async fn list(&self, route: &Route) -> ApiResult<RawResponse>;

    /// Fetch one object by key.
    async fn get(&self, route: &Route, key: &str) -> ApiResult<RawResponse>;

    /// Create an object.
    async fn create(&self, route: &Route, request: &Value) -> ApiResult<RawResponse>;

    /// Update an object in place.
    async fn update(&self, route: &Route, key: &str, request: &Value) -> ApiResult<RawResponse>;

    /// Delete an object.
    async fn delete(&self, route: &Route, key: &str) -> ApiResult<RawResponse>;

    /// List every account together with its role objects.
    async fn list_account_details(&self) -> ApiResult<RawResponse>;

    /// Move an account to another HA group.
    async fn migrate_account_host(
        &self,
        account_key: &str,
        host_group_id: &str,
    ) -> ApiResult<RawResponse>;
}
