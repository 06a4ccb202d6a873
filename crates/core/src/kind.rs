//! Remote object kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The object kinds reconciled against the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Account,
    HaGroup,
    Host,
    IntegrationInstance,
    Classifier,
    Mapper,
}

impl ObjectKind {
    /// Host-facing type name (`xsoar_account`, `xsoar_ha_group`, ...).
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Account => "xsoar_account",
            Self::HaGroup => "xsoar_ha_group",
            Self::Host => "xsoar_host",
            Self::IntegrationInstance => "xsoar_integration_instance",
            Self::Classifier => "xsoar_classifier",
            Self::Mapper => "xsoar_mapper",
        }
    }

    /// Human-readable label used in log lines and diagnostics.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::HaGroup => "HA group",
            Self::Host => "host",
            Self::IntegrationInstance => "integration instance",
            Self::Classifier => "classifier",
            Self::Mapper => "mapper",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
