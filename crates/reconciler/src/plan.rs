//! Diff & update planner.
//!
//! Compares desired configuration with last-known canonical state and
//! produces the ordered write set for an in-place update, plus the list of
//! changed fields that cannot be written in place. Collections compare as
//! sets; a desired value that is unset (or an empty set) is never planned.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde_json::Value;

use crate::normalize::canonical_json;
use crate::types::{
    Account, AccountSpec, Classifier, ClassifierSpec, HaGroup, HaGroupSpec, Host, HostSpec,
    IntegrationInstance, IntegrationInstanceSpec, Mapper, MapperSpec, StringSet, explicit,
};

/// Planned update for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan<S> {
    /// Independent writes, in execution order.
    pub steps: Vec<S>,
    /// Immutable fields whose desired value differs from last-known.
    pub replace: Vec<&'static str>,
}

impl<S> Default for UpdatePlan<S> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            replace: Vec::new(),
        }
    }
}

impl<S> UpdatePlan<S> {
    /// Whether the update must be refused in favor of destroy-then-create.
    pub fn requires_replacement(&self) -> bool {
        !self.replace.is_empty()
    }

    /// Nothing to write and nothing to replace.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.replace.is_empty()
    }

    fn replace_if(&mut self, changed: bool, field: &'static str) {
        if changed {
            self.replace.push(field);
        }
    }
}

/// Desired-vs-last-known planning for one canonical object kind.
pub trait Plan: Sized {
    type Spec;
    type Step;

    fn plan(desired: &Self::Spec, last: &Self) -> UpdatePlan<Self::Step>;
}

/// A whole-object save carrying the merged target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSave<T> {
    pub target: T,
}

/// Desired set if explicit, else the last-known set.
fn merged_set(desired: Option<&StringSet>, last: &StringSet) -> StringSet {
    explicit(desired).unwrap_or(last).clone()
}

/// Desired scalar if set, else the last-known one.
fn merged_opt(desired: Option<&String>, last: Option<&String>) -> Option<String> {
    desired.or(last).cloned()
}

/// Canonical text of a desired structured value; `null` is unset.
fn desired_json(desired: Option<&Value>) -> Option<String> {
    desired.filter(|value| !value.is_null()).map(canonical_json)
}

/// Whether a set-when-desired optional scalar differs.
fn differs(desired: Option<&String>, last: Option<&String>) -> bool {
    desired.is_some_and(|desired| Some(desired) != last)
}

// ============================================================================
// Account
// ============================================================================

/// One write against the account endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStep {
    /// Combined roles-and-labels update. The endpoint replaces both fields
    /// atomically, so both are always sent: the changed one with its
    /// desired value, the other with its last-known value.
    RolesAndLabels { roles: StringSet, labels: StringSet },
    /// Move the account to another HA group. Planned whenever the last-known
    /// group name differs or is unknown; the executor compares resolved ids.
    MigrateHost { host_group_name: String },
}

impl Plan for Account {
    type Spec = AccountSpec;
    type Step = AccountStep;

    fn plan(desired: &AccountSpec, last: &Self) -> UpdatePlan<AccountStep> {
        let mut plan = UpdatePlan::default();
        plan.replace_if(desired.name != last.name, "name");

        let roles = explicit(desired.account_roles.as_ref());
        let labels = explicit(desired.propagation_labels.as_ref());
        let roles_changed = roles.is_some_and(|roles| *roles != last.account_roles);
        let labels_changed = labels.is_some_and(|labels| *labels != last.propagation_labels);
        if roles_changed || labels_changed {
            plan.steps.push(AccountStep::RolesAndLabels {
                roles: merged_set(roles, &last.account_roles),
                labels: merged_set(labels, &last.propagation_labels),
            });
        }

        if last.host_group_name.as_deref() != Some(desired.host_group_name.as_str()) {
            plan.steps.push(AccountStep::MigrateHost {
                host_group_name: desired.host_group_name.clone(),
            });
        }
        plan
    }
}

// ============================================================================
// HA group
// ============================================================================

impl Plan for HaGroup {
    type Spec = HaGroupSpec;
    type Step = FullSave<Self>;

    fn plan(desired: &HaGroupSpec, last: &Self) -> UpdatePlan<FullSave<Self>> {
        let mut plan = UpdatePlan::default();
        plan.replace_if(
            desired.elasticsearch_url != last.elasticsearch_url,
            "elasticsearch_url",
        );
        plan.replace_if(
            desired.elastic_index_prefix != last.elastic_index_prefix,
            "elastic_index_prefix",
        );
        if desired.name != last.name {
            plan.steps.push(FullSave {
                target: Self {
                    name: desired.name.clone(),
                    ..last.clone()
                },
            });
        }
        plan
    }
}

// ============================================================================
// Host
// ============================================================================

impl Plan for Host {
    type Spec = HostSpec;
    type Step = Infallible;

    fn plan(desired: &HostSpec, last: &Self) -> UpdatePlan<Infallible> {
        let mut plan = UpdatePlan::default();
        plan.replace_if(desired.name != last.name, "name");
        plan.replace_if(
            differs(desired.ha_group_name.as_ref(), last.ha_group_name.as_ref()),
            "ha_group_name",
        );
        plan.replace_if(
            differs(desired.server_url.as_ref(), last.server_url.as_ref()),
            "server_url",
        );
        plan.replace_if(
            differs(
                desired.elasticsearch_url.as_ref(),
                last.elasticsearch_url.as_ref(),
            ),
            "elasticsearch_url",
        );
        plan
    }
}

// ============================================================================
// Integration instance
// ============================================================================

/// Canonical configuration text of a desired `name -> value` mapping.
pub fn desired_config(config: &BTreeMap<String, String>) -> String {
    let map = config
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    canonical_json(&Value::Object(map))
}

/// Last-known configuration with every value in its string form, as a
/// desired mapping would hold it.
fn config_as_strings(config: &str) -> Option<BTreeMap<String, String>> {
    let map: serde_json::Map<String, Value> = serde_json::from_str(config).ok()?;
    Some(
        map.into_iter()
            .map(|(name, value)| match value {
                Value::String(text) => (name, text),
                other => (name, other.to_string()),
            })
            .collect(),
    )
}

/// Desired configuration text, or the last-known text when the two agree
/// once remote values are read as strings.
fn merged_config(desired: Option<&BTreeMap<String, String>>, last: &str) -> String {
    match desired {
        Some(desired) if config_as_strings(last).as_ref() != Some(desired) => {
            desired_config(desired)
        }
        _ => last.to_string(),
    }
}

impl Plan for IntegrationInstance {
    type Spec = IntegrationInstanceSpec;
    type Step = FullSave<Self>;

    fn plan(desired: &IntegrationInstanceSpec, last: &Self) -> UpdatePlan<FullSave<Self>> {
        let mut plan = UpdatePlan::default();
        plan.replace_if(desired.name != last.name, "name");
        plan.replace_if(
            desired.integration_name != last.integration_name,
            "integration_name",
        );
        plan.replace_if(desired.account() != last.account.as_deref(), "account");

        let target = Self {
            propagation_labels: merged_set(
                desired.propagation_labels.as_ref(),
                &last.propagation_labels,
            ),
            config: merged_config(desired.config.as_ref(), &last.config),
            incoming_mapper_id: merged_opt(
                desired.incoming_mapper_id.as_ref(),
                last.incoming_mapper_id.as_ref(),
            ),
            outgoing_mapper_id: merged_opt(
                desired.outgoing_mapper_id.as_ref(),
                last.outgoing_mapper_id.as_ref(),
            ),
            mapping_id: merged_opt(desired.mapping_id.as_ref(), last.mapping_id.as_ref()),
            engine_id: merged_opt(desired.engine_id.as_ref(), last.engine_id.as_ref()),
            ..last.clone()
        };
        if target != *last {
            plan.steps.push(FullSave { target });
        }
        plan
    }
}

// ============================================================================
// Classifier and mapper
// ============================================================================

impl Plan for Classifier {
    type Spec = ClassifierSpec;
    type Step = FullSave<Self>;

    fn plan(desired: &ClassifierSpec, last: &Self) -> UpdatePlan<FullSave<Self>> {
        let mut plan = UpdatePlan::default();
        let key_type_map = desired.key_type_map.as_ref().map(|map| {
            let map = map
                .iter()
                .map(|(key, kind)| (key.clone(), Value::String(kind.clone())))
                .collect();
            canonical_json(&Value::Object(map))
        });
        let target = Self {
            name: desired.name.clone(),
            default_incident_type: merged_opt(
                desired.default_incident_type.as_ref(),
                last.default_incident_type.as_ref(),
            ),
            key_type_map: key_type_map.unwrap_or_else(|| last.key_type_map.clone()),
            transformer: desired_json(desired.transformer.as_ref())
                .or_else(|| last.transformer.clone()),
            propagation_labels: merged_set(
                desired.propagation_labels.as_ref(),
                &last.propagation_labels,
            ),
            ..last.clone()
        };
        if target != *last {
            plan.steps.push(FullSave { target });
        }
        plan
    }
}

impl Plan for Mapper {
    type Spec = MapperSpec;
    type Step = FullSave<Self>;

    fn plan(desired: &MapperSpec, last: &Self) -> UpdatePlan<FullSave<Self>> {
        let mut plan = UpdatePlan::default();
        plan.replace_if(desired.direction != last.direction, "direction");
        let target = Self {
            name: desired.name.clone(),
            default_incident_type: merged_opt(
                desired.default_incident_type.as_ref(),
                last.default_incident_type.as_ref(),
            ),
            mapping: desired_json(desired.mapping.as_ref())
                .unwrap_or_else(|| last.mapping.clone()),
            propagation_labels: merged_set(
                desired.propagation_labels.as_ref(),
                &last.propagation_labels,
            ),
            ..last.clone()
        };
        if target != *last {
            plan.steps.push(FullSave { target });
        }
        plan
    }
}
