//! Provider configuration.
//!
//! The host supplies provider settings once; [`Provider::configure`]
//! resolves them (falling back to environment variables), builds the HTTP
//! facade and freezes everything into an immutable [`ProviderContext`]
//! shared by every reconciler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use xsoar_client::{ClientConfig, HttpRemote, RemoteApi};
use xsoar_core::Diagnostics;

use crate::error::{Error, Result};
use crate::retry::{RetryController, RetryPolicy};

/// Environment fallback for the endpoint.
pub const ENV_BASE_URL: &str = "DEMISTO_BASE_URL";
/// Environment fallback for the credential.
pub const ENV_API_KEY: &str = "DEMISTO_API_KEY";
/// Environment fallback for disabling TLS verification.
pub const ENV_INSECURE: &str = "DEMISTO_INSECURE";

/// A host-supplied setting that may not be resolved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting<T> {
    Known(T),
    #[default]
    Null,
    /// Depends on values the host has not computed yet.
    Unknown,
}

impl<T> Setting<T> {
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl<T> From<T> for Setting<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

/// Provider settings as supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub endpoint: Setting<String>,
    #[serde(default)]
    pub credential: Setting<String>,
    #[serde(default)]
    pub insecure_transport: Setting<bool>,
    /// Header name to the environment variable holding its value.
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Everything a reconciler needs to talk to the remote system.
#[derive(Clone)]
pub struct ProviderContext {
    pub remote: Arc<dyn RemoteApi>,
    pub retry: RetryController,
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// A configured (or deliberately unconfigured) provider.
#[derive(Debug, Clone, Default)]
pub struct Provider {
    context: Option<Arc<ProviderContext>>,
}

impl Provider {
    /// A provider that rejects every operation with a configuration error.
    #[must_use]
    pub const fn unconfigured() -> Self {
        Self { context: None }
    }

    /// A provider over an existing facade.
    #[must_use]
    pub fn with_remote(remote: Arc<dyn RemoteApi>, retry: RetryController) -> Self {
        Self {
            context: Some(Arc::new(ProviderContext { remote, retry })),
        }
    }

    /// Configure from host settings and the process environment.
    pub fn configure(config: &ProviderConfig) -> (Self, Diagnostics) {
        Self::configure_with(config, |name| std::env::var(name).ok())
    }

    /// Configure from host settings, reading environment variables through
    /// `env`.
    ///
    /// Never fails outright: problems are reported as diagnostics and the
    /// provider stays unconfigured when any of them is an error.
    pub fn configure_with<F>(config: &ProviderConfig, env: F) -> (Self, Diagnostics)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diagnostics = Diagnostics::new();
        match Self::resolve(config, &env, &mut diagnostics) {
            Ok(Some(client_config)) => match HttpRemote::with_config(client_config) {
                Ok(remote) => {
                    info!(endpoint = %remote.config().base_url, "Provider configured");
                    let retry = RetryController::new(config.retry);
                    return (Self::with_remote(Arc::new(remote), retry), diagnostics);
                }
                Err(err) => diagnostics.add_error("Unable to create client", err.to_string()),
            },
            Ok(None) => {}
            Err(err) => diagnostics.push(err.to_diagnostic()),
        }
        (Self::unconfigured(), diagnostics)
    }

    fn resolve<F>(
        config: &ProviderConfig,
        env: &F,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<ClientConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = match &config.credential {
            Setting::Unknown => {
                warn!("API key is not known yet, provider left unconfigured");
                diagnostics.add_warning(
                    "Unable to create client",
                    "Cannot use unknown value as API key",
                );
                return Ok(None);
            }
            Setting::Known(key) => key.clone(),
            Setting::Null => env(ENV_API_KEY).unwrap_or_default(),
        };
        if credential.is_empty() {
            return Err(Error::configuration(format!(
                "API key must be set in the provider configuration or {ENV_API_KEY}"
            )));
        }

        let endpoint = match &config.endpoint {
            Setting::Unknown => {
                return Err(Error::configuration("Cannot use unknown value as endpoint"));
            }
            Setting::Known(url) => url.clone(),
            Setting::Null => env(ENV_BASE_URL).unwrap_or_default(),
        };
        if endpoint.is_empty() {
            return Err(Error::configuration(format!(
                "Endpoint must be set in the provider configuration or {ENV_BASE_URL}"
            )));
        }
        let base_url = Url::parse(&endpoint)
            .map_err(|e| Error::configuration(format!("invalid endpoint '{endpoint}': {e}")))?;

        let insecure = match &config.insecure_transport {
            Setting::Known(insecure) => *insecure,
            Setting::Null | Setting::Unknown => {
                env(ENV_INSECURE).is_some_and(|value| !value.is_empty())
            }
        };

        let mut client_config = ClientConfig::new(base_url, credential).insecure(insecure);
        for (header, variable) in &config.additional_headers {
            match env(variable) {
                Some(value) => client_config = client_config.header(header, value),
                None => {
                    warn!(header, variable, "Header variable is not set, skipping header");
                    diagnostics.add_warning(
                        "Missing header value",
                        format!("environment variable {variable} for header {header} is not set"),
                    );
                }
            }
        }
        Ok(Some(client_config))
    }

    /// The shared context, or a configuration error.
    pub fn context(&self) -> Result<&ProviderContext> {
        self.context.as_deref().ok_or_else(|| {
            Error::configuration("provider is not configured: endpoint and API key are required")
        })
    }

    pub const fn is_configured(&self) -> bool {
        self.context.is_some()
    }
}
