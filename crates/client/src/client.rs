//! HTTP implementation of the remote client facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;
use xsoar_core::ObjectKind;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, Error, Result};
use crate::remote::{RawResponse, RemoteApi};
use crate::route::Route;

/// Client for the management API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    /// Configuration for the client.
    config: Arc<ClientConfig>,
    /// Shared HTTP client with default headers applied.
    http_client: reqwest::Client,
}

/// The five collection operations, before they are mapped onto routes.
#[derive(Debug, Clone, Copy)]
enum Op<'a> {
    List,
    Get(&'a str),
    Create,
    Update(&'a str),
    Delete(&'a str),
}

impl HttpRemote {
    /// Create a client from a configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&config.api_key)
                .map_err(|e| Error::config_error(format!("invalid API key: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json,*/*"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config_error(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config_error(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Map a collection operation onto method, path and optional body.
    fn endpoint(route: &Route, op: Op<'_>) -> (Method, Vec<String>, Option<Value>) {
        let path = |parts: &[&str]| -> Vec<String> {
            route
                .account_key()
                .into_iter()
                .chain(parts.iter().map(|p| (*p).to_string()))
                .collect()
        };

        match (route.kind(), op) {
            (ObjectKind::Account, Op::List) => (Method::GET, path(&["accounts"]), None),
            (ObjectKind::Account, Op::Get(key)) => (Method::GET, path(&["account", key]), None),
            (ObjectKind::Account, Op::Create) => (Method::POST, path(&["accounts"]), None),
            (ObjectKind::Account, Op::Update(key)) => {
                (Method::POST, path(&["account", "update", key]), None)
            }
            (ObjectKind::Account, Op::Delete(key)) => {
                (Method::DELETE, path(&["account", "purge", key]), None)
            }

            (ObjectKind::HaGroup, Op::List) => (Method::GET, path(&["ha-groups"]), None),
            (ObjectKind::HaGroup, Op::Get(id) | Op::Delete(id)) => {
                let method = if matches!(op, Op::Get(_)) {
                    Method::GET
                } else {
                    Method::DELETE
                };
                (method, path(&["ha-groups", id]), None)
            }
            (ObjectKind::HaGroup, Op::Create | Op::Update(_)) => {
                (Method::POST, path(&["ha-groups", "create"]), None)
            }

            (ObjectKind::Host, Op::List) => (Method::GET, path(&["hosts"]), None),
            (ObjectKind::Host, Op::Get(name)) => (Method::GET, path(&["host", name]), None),
            (ObjectKind::Host, Op::Create | Op::Update(_)) => (Method::POST, path(&["host"]), None),
            (ObjectKind::Host, Op::Delete(id)) => (Method::DELETE, path(&["host", id]), None),

            (ObjectKind::IntegrationInstance, Op::List) => (
                Method::POST,
                path(&["settings", "integration", "search"]),
                Some(json!({})),
            ),
            (ObjectKind::IntegrationInstance, Op::Get(name)) => (
                Method::POST,
                path(&["settings", "integration", "search"]),
                Some(json!({ "query": format!("name:\"{name}\"") })),
            ),
            (ObjectKind::IntegrationInstance, Op::Create | Op::Update(_)) => {
                (Method::PUT, path(&["settings", "integration"]), None)
            }
            (ObjectKind::IntegrationInstance, Op::Delete(id)) => {
                (Method::DELETE, path(&["settings", "integration", id]), None)
            }

            (ObjectKind::Classifier | ObjectKind::Mapper, Op::List) => {
                (Method::POST, path(&["classifier", "search"]), Some(json!({})))
            }
            (ObjectKind::Classifier | ObjectKind::Mapper, Op::Get(id)) => {
                (Method::GET, path(&["classifier", id]), None)
            }
            (ObjectKind::Classifier | ObjectKind::Mapper, Op::Create | Op::Update(_)) => {
                (Method::POST, path(&["classifier"]), None)
            }
            (ObjectKind::Classifier | ObjectKind::Mapper, Op::Delete(id)) => {
                (Method::DELETE, path(&["classifier", id]), None)
            }
        }
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[String]) -> ApiResult<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::invalid_request("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call(&self, route: &Route, op: Op<'_>, request: Option<&Value>) -> ApiResult<RawResponse> {
        let (method, segments, implied_body) = Self::endpoint(route, op);
        let body = request.or(implied_body.as_ref());
        self.send(method, &segments, body).await
    }

    /// Execute a single request and decode the body.
    async fn send(
        &self,
        method: Method,
        segments: &[String],
        body: Option<&Value>,
    ) -> ApiResult<RawResponse> {
        let url = self.url(segments)?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.http_client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %text, "Request failed");
            return Err(ApiError::status(status.as_u16(), text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ApiError::invalid_response(status.as_u16(), e.to_string()))?
        };

        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn list(&self, route: &Route) -> ApiResult<RawResponse> {
        self.call(route, Op::List, None).await
    }

    async fn get(&self, route: &Route, key: &str) -> ApiResult<RawResponse> {
        self.call(route, Op::Get(key), None).await
    }

    async fn create(&self, route: &Route, request: &Value) -> ApiResult<RawResponse> {
        self.call(route, Op::Create, Some(request)).await
    }

    async fn update(&self, route: &Route, key: &str, request: &Value) -> ApiResult<RawResponse> {
        self.call(route, Op::Update(key), Some(request)).await
    }

    async fn delete(&self, route: &Route, key: &str) -> ApiResult<RawResponse> {
        self.call(route, Op::Delete(key), None).await
    }

    async fn list_account_details(&self) -> ApiResult<RawResponse> {
        let segments = vec!["accounts".to_string(), "details".to_string()];
        self.send(Method::GET, &segments, None).await
    }

    async fn migrate_account_host(
        &self,
        account_key: &str,
        host_group_id: &str,
    ) -> ApiResult<RawResponse> {
        let segments = vec![
            "account".to_string(),
            "host".to_string(),
            account_key.to_string(),
            host_group_id.to_string(),
        ];
        self.send(Method::POST, &segments, None).await
    }
}
