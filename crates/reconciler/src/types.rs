//! Canonical objects and desired configuration.
//!
//! Canonical objects are value snapshots produced by one reconciler
//! invocation; nothing here is shared or mutated across invocations.
//! `Option` fields are the canonical "unset" marker. Collection fields are
//! never optional on the canonical side: an absent collection is empty.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order-irrelevant set of names (roles, labels).
pub type StringSet = BTreeSet<String>;

/// Role assigned to a new account when none is requested.
pub const DEFAULT_ACCOUNT_ROLE: &str = "Administrator";

/// Desired set value, treating an empty set as "no explicit value".
pub fn explicit(set: Option<&StringSet>) -> Option<&StringSet> {
    set.filter(|s| !s.is_empty())
}

// ============================================================================
// Account
// ============================================================================

/// A tenant account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Display name; changing it requires replacement.
    pub name: String,
    /// Authoritative HA group reference.
    pub host_group_id: String,
    /// Resolved alias of `host_group_id`; unset when the group is gone.
    pub host_group_name: Option<String>,
    pub account_roles: StringSet,
    pub propagation_labels: StringSet,
}

/// Desired configuration of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub name: String,
    pub host_group_name: String,
    #[serde(default)]
    pub account_roles: Option<StringSet>,
    #[serde(default)]
    pub propagation_labels: Option<StringSet>,
}

impl AccountSpec {
    pub fn new(name: impl Into<String>, host_group_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host_group_name: host_group_name.into(),
            account_roles: None,
            propagation_labels: None,
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.account_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.propagation_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }
}

/// The account object as the remote returns it, before role and HA group
/// enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: String,
    /// Remote key, `acc_<display name>`.
    pub name: String,
    pub display_name: String,
    pub host_group_id: String,
    pub propagation_labels: StringSet,
}

// ============================================================================
// HA group
// ============================================================================

/// A high-availability group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaGroup {
    pub id: String,
    pub name: String,
    /// Creation-only.
    pub elasticsearch_url: String,
    /// Creation-only.
    pub elastic_index_prefix: String,
}

/// Desired configuration of an HA group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaGroupSpec {
    pub name: String,
    pub elasticsearch_url: String,
    pub elastic_index_prefix: String,
}

// ============================================================================
// Host
// ============================================================================

/// A host server attached to an HA group. Every attribute is identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    pub ha_group_id: Option<String>,
    /// Resolved from `ha_group_id`; not carried on the wire.
    pub ha_group_name: Option<String>,
    pub server_url: Option<String>,
    pub elasticsearch_url: Option<String>,
}

/// Desired configuration of a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub name: String,
    #[serde(default)]
    pub ha_group_name: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub elasticsearch_url: Option<String>,
}

// ============================================================================
// Integration instance
// ============================================================================

/// A configured instance of an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationInstance {
    pub id: String,
    pub name: String,
    /// Remote `brand`; changing it requires replacement.
    pub integration_name: String,
    /// Tenant account the instance lives in; not carried on the wire.
    pub account: Option<String>,
    pub propagation_labels: StringSet,
    /// Canonical compact JSON of the `name -> value` configuration.
    pub config: String,
    pub incoming_mapper_id: Option<String>,
    pub outgoing_mapper_id: Option<String>,
    pub mapping_id: Option<String>,
    pub engine_id: Option<String>,
}

impl IntegrationInstance {
    /// Configuration as a mapping. A malformed stored value reads as empty.
    pub fn config_map(&self) -> serde_json::Map<String, Value> {
        serde_json::from_str(&self.config).unwrap_or_default()
    }
}

/// Desired configuration of an integration instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationInstanceSpec {
    pub name: String,
    pub integration_name: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub propagation_labels: Option<StringSet>,
    #[serde(default)]
    pub config: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub incoming_mapper_id: Option<String>,
    #[serde(default)]
    pub outgoing_mapper_id: Option<String>,
    #[serde(default)]
    pub mapping_id: Option<String>,
    #[serde(default)]
    pub engine_id: Option<String>,
}

impl IntegrationInstanceSpec {
    pub fn new(name: impl Into<String>, integration_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            integration_name: integration_name.into(),
            ..Self::default()
        }
    }

    /// Account scope, with an empty name meaning the main host.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref().filter(|a| !a.is_empty())
    }
}

// ============================================================================
// Classifier and mapper
// ============================================================================

/// An incident classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    pub id: String,
    pub name: String,
    pub default_incident_type: Option<String>,
    /// Canonical compact JSON object; `{}` when absent.
    pub key_type_map: String,
    /// Canonical compact JSON; unset when absent.
    pub transformer: Option<String>,
    pub propagation_labels: StringSet,
}

/// Desired configuration of a classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub name: String,
    #[serde(default)]
    pub default_incident_type: Option<String>,
    #[serde(default)]
    pub key_type_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub transformer: Option<Value>,
    #[serde(default)]
    pub propagation_labels: Option<StringSet>,
}

/// Which side of an integration a mapper applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapperDirection {
    Incoming,
    Outgoing,
}

impl MapperDirection {
    /// Remote `type` value.
    pub const fn remote_type(self) -> &'static str {
        match self {
            Self::Incoming => "mapping-incoming",
            Self::Outgoing => "mapping-outgoing",
        }
    }

    /// Parse a remote `type` value.
    pub fn from_remote_type(value: &str) -> Option<Self> {
        match value {
            "mapping-incoming" => Some(Self::Incoming),
            "mapping-outgoing" => Some(Self::Outgoing),
            _ => None,
        }
    }
}

impl fmt::Display for MapperDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
        }
    }
}

impl FromStr for MapperDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            other => Err(format!("unknown mapper direction '{other}'")),
        }
    }
}

/// An incoming or outgoing field mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper {
    pub id: String,
    pub name: String,
    /// Changing it requires replacement.
    pub direction: MapperDirection,
    pub default_incident_type: Option<String>,
    /// Canonical compact JSON object; `{}` when absent.
    pub mapping: String,
    pub propagation_labels: StringSet,
}

/// Desired configuration of a mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperSpec {
    pub name: String,
    pub direction: MapperDirection,
    #[serde(default)]
    pub default_incident_type: Option<String>,
    #[serde(default)]
    pub mapping: Option<Value>,
    #[serde(default)]
    pub propagation_labels: Option<StringSet>,
}

impl MapperSpec {
    pub fn new(name: impl Into<String>, direction: MapperDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            default_incident_type: None,
            mapping: None,
            propagation_labels: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_treats_empty_as_unset() {
        let empty = StringSet::new();
        assert_eq!(explicit(Some(&empty)), None);
        assert_eq!(explicit(None), None);

        let roles: StringSet = ["Analyst".to_string()].into_iter().collect();
        assert_eq!(explicit(Some(&roles)), Some(&roles));
    }

    #[test]
    fn test_account_spec_builder() {
        let spec = AccountSpec::new("acme", "grp1")
            .with_roles(["Analyst", "Analyst"])
            .with_labels(["emea"]);
        assert_eq!(spec.account_roles.map(|r| r.len()), Some(1));
        assert_eq!(spec.propagation_labels.map(|l| l.len()), Some(1));
    }

    #[test]
    fn test_mapper_direction_round_trip() {
        for direction in [MapperDirection::Incoming, MapperDirection::Outgoing] {
            assert_eq!(
                MapperDirection::from_remote_type(direction.remote_type()),
                Some(direction)
            );
            assert_eq!(direction.to_string().parse::<MapperDirection>(), Ok(direction));
        }
        assert_eq!(MapperDirection::from_remote_type("classification"), None);
    }

    #[test]
    fn test_instance_account_scope() {
        let mut spec = IntegrationInstanceSpec::new("slack", "Slack");
        assert_eq!(spec.account(), None);
        spec.account = Some(String::new());
        assert_eq!(spec.account(), None);
        spec.account = Some("acme".to_string());
        assert_eq!(spec.account(), Some("acme"));
    }

    #[test]
    fn test_spec_deserializes_with_missing_optionals() -> Result<(), serde_json::Error> {
        let spec: AccountSpec =
            serde_json::from_str(r#"{"name":"acme","host_group_name":"grp1"}"#)?;
        assert_eq!(spec, AccountSpec::new("acme", "grp1"));
        Ok(())
    }
}
