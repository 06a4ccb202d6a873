//! State normalizer.
//!
//! Remote responses are decoded once, through [`RawObject`], into canonical
//! objects. Every field is read under an explicit policy: required fields
//! that are missing or mistyped raise a [`ShapeError`] at decode time,
//! optional scalars become `None` when absent (and, per field, when empty),
//! and list-shaped fields become an empty set when absent.

use serde_json::{Map, Value, json};
use tracing::debug;
use xsoar_core::ObjectKind;

use crate::error::ShapeError;
use crate::types::{
    AccountRecord, Classifier, HaGroup, Host, IntegrationInstance, Mapper, MapperDirection,
    StringSet,
};

/// What a present-but-empty string means for an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Empty {
    /// `""` is the same as absent.
    Unset,
    /// `""` is a real value.
    Keep,
}

/// JSON type name for shape errors.
pub const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tagged-field view over one raw JSON object.
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    kind: ObjectKind,
    map: &'a Map<String, Value>,
}

impl<'a> RawObject<'a> {
    /// Wrap a raw value, which must be a JSON object.
    pub fn new(kind: ObjectKind, value: &'a Value) -> Result<Self, ShapeError> {
        value
            .as_object()
            .map(|map| Self { kind, map })
            .ok_or_else(|| ShapeError::not_an_object(kind, "<root>"))
    }

    /// Field value, with explicit `null` folded into absence.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|value| !value.is_null())
    }

    /// A string field that must be present.
    pub fn required_str(&self, field: &str) -> Result<&'a str, ShapeError> {
        let value = self
            .get(field)
            .ok_or_else(|| ShapeError::missing(self.kind, field))?;
        value
            .as_str()
            .ok_or_else(|| ShapeError::wrong_type(self.kind, field, "string", json_type(value)))
    }

    /// A string field that may be absent.
    pub fn optional_str(&self, field: &str, empty: Empty) -> Result<Option<&'a str>, ShapeError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() && empty == Empty::Unset => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ShapeError::wrong_type(
                self.kind,
                field,
                "string",
                json_type(other),
            )),
        }
    }

    /// A list of strings; absent means empty.
    pub fn string_set(&self, field: &str) -> Result<StringSet, ShapeError> {
        let Some(value) = self.get(field) else {
            return Ok(StringSet::new());
        };
        let items = value.as_array().ok_or_else(|| {
            ShapeError::wrong_type(self.kind, field, "array of strings", json_type(value))
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ShapeError::wrong_type(self.kind, field, "array of strings", json_type(item))
                })
            })
            .collect()
    }

    /// A structured field rendered as canonical compact JSON.
    ///
    /// Objects and arrays are accepted directly; strings must themselves
    /// contain JSON (the remote stores some structures pre-encoded).
    pub fn json_text(&self, field: &str) -> Result<Option<String>, ShapeError> {
        match self.get(field) {
            None => Ok(None),
            Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(Some(canonical_json(value))),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => serde_json::from_str::<Value>(text)
                .map(|parsed| Some(canonical_json(&parsed)))
                .map_err(|_| ShapeError::wrong_type(self.kind, field, "JSON", "string")),
            Some(other) => Err(ShapeError::wrong_type(
                self.kind,
                field,
                "JSON object or array",
                json_type(other),
            )),
        }
    }
}

/// Canonical textual form of a JSON value: compact, keys sorted.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Parse canonical JSON text back into a value; malformed text reads as null.
fn parse_json_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

/// Elements of a list response.
///
/// The remote returns collections either as a bare array or wrapped in an
/// object under `container`; `null` and a missing container are empty.
pub fn items<'a>(kind: ObjectKind, body: &'a Value, container: &str) -> Result<&'a [Value], ShapeError> {
    match body {
        Value::Null => Ok(&[]),
        Value::Array(items) => Ok(items.as_slice()),
        Value::Object(map) => match map.get(container) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(other) => Err(ShapeError::wrong_type(kind, container, "array", json_type(other))),
        },
        other => Err(ShapeError::wrong_type(kind, container, "array", json_type(other))),
    }
}

/// First element of a list response accepted by `matches`.
pub fn find<'a, F>(
    kind: ObjectKind,
    body: &'a Value,
    container: &str,
    mut matches: F,
) -> Result<Option<&'a Value>, ShapeError>
where
    F: FnMut(&RawObject<'a>) -> Result<bool, ShapeError>,
{
    for item in items(kind, body, container)? {
        let raw = RawObject::new(kind, item)?;
        if matches(&raw)? {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

/// Rebuild an integration configuration mapping from its `{name, value}`
/// pair list.
///
/// Absent data is an empty mapping. Processing stops at the first pair
/// without a string `name`; that pair and every pair after it are dropped.
pub fn reconstruct_config(
    kind: ObjectKind,
    data: Option<&Value>,
) -> Result<Map<String, Value>, ShapeError> {
    let Some(data) = data.filter(|value| !value.is_null()) else {
        return Ok(Map::new());
    };
    let pairs = data
        .as_array()
        .ok_or_else(|| ShapeError::wrong_type(kind, "data", "array of pairs", json_type(data)))?;

    let mut config = Map::new();
    for (index, pair) in pairs.iter().enumerate() {
        let Some(name) = pair.get("name").and_then(Value::as_str) else {
            debug!(
                index,
                dropped = pairs.len().saturating_sub(index),
                "Configuration pair without a name, ignoring the rest"
            );
            break;
        };
        let value = pair.get("value").cloned().unwrap_or(Value::Null);
        config.insert(name.to_string(), value);
    }
    Ok(config)
}

/// Canonical text of a configuration mapping.
pub fn config_json(config: Map<String, Value>) -> String {
    canonical_json(&Value::Object(config))
}

/// Inverse of [`reconstruct_config`].
pub fn config_pairs(config: &Map<String, Value>) -> Value {
    Value::Array(
        config
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect(),
    )
}

/// Role names of `account_name` from the account-details listing.
pub fn account_roles(details: &Value, account_name: &str) -> Result<StringSet, ShapeError> {
    let kind = ObjectKind::Account;
    let mut roles = StringSet::new();
    for detail in items(kind, details, "accounts")? {
        let raw = RawObject::new(kind, detail)?;
        if raw.optional_str("name", Empty::Keep)? != Some(account_name) {
            continue;
        }
        let Some(role_list) = raw.get("roles") else {
            continue;
        };
        let role_list = role_list
            .as_array()
            .ok_or_else(|| ShapeError::wrong_type(kind, "roles", "array", json_type(role_list)))?;
        for role in role_list {
            let role = RawObject::new(kind, role)?;
            roles.insert(role.required_str("name")?.to_string());
        }
    }
    Ok(roles)
}

/// Name of the HA group with the given id.
pub fn group_name_for_id(groups: &Value, id: &str) -> Result<Option<String>, ShapeError> {
    let found = find(ObjectKind::HaGroup, groups, "groups", |raw| {
        Ok(raw.required_str("id")? == id)
    })?;
    found
        .map(|group| RawObject::new(ObjectKind::HaGroup, group)?.required_str("name").map(str::to_string))
        .transpose()
}

/// Id of the HA group with the given name.
pub fn group_id_for_name(groups: &Value, name: &str) -> Result<Option<String>, ShapeError> {
    let found = find(ObjectKind::HaGroup, groups, "groups", |raw| {
        Ok(raw.required_str("name")? == name)
    })?;
    found
        .map(|group| RawObject::new(ObjectKind::HaGroup, group)?.required_str("id").map(str::to_string))
        .transpose()
}

/// Conversion between raw remote objects and canonical objects.
///
/// `from_raw(&x.to_raw()) == x` for every value whose wire-less fields
/// (resolved names, account scope) are unset.
pub trait Canonical: Sized {
    const KIND: ObjectKind;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError>;

    fn to_raw(&self) -> Value;
}

/// Insert `value` under `field` when set.
fn put_opt(map: &mut Map<String, Value>, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(field.to_string(), Value::String(value.to_string()));
    }
}

impl Canonical for AccountRecord {
    const KIND: ObjectKind = ObjectKind::Account;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            display_name: raw.required_str("displayName")?.to_string(),
            host_group_id: raw.required_str("hostGroupId")?.to_string(),
            propagation_labels: raw.string_set("propagationLabels")?,
        })
    }

    fn to_raw(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "displayName": self.display_name,
            "hostGroupId": self.host_group_id,
            "propagationLabels": self.propagation_labels,
        })
    }
}

impl Canonical for HaGroup {
    const KIND: ObjectKind = ObjectKind::HaGroup;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            elasticsearch_url: raw
                .optional_str("elasticsearchAddress", Empty::Keep)?
                .unwrap_or_default()
                .to_string(),
            elastic_index_prefix: raw
                .optional_str("elasticIndexPrefix", Empty::Keep)?
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn to_raw(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "elasticsearchAddress": self.elasticsearch_url,
            "elasticIndexPrefix": self.elastic_index_prefix,
        })
    }
}

impl Canonical for Host {
    const KIND: ObjectKind = ObjectKind::Host;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            ha_group_id: raw.optional_str("haGroupId", Empty::Unset)?.map(str::to_string),
            ha_group_name: None,
            server_url: raw.optional_str("serverUrl", Empty::Unset)?.map(str::to_string),
            elasticsearch_url: raw
                .optional_str("elasticsearchAddress", Empty::Unset)?
                .map(str::to_string),
        })
    }

    fn to_raw(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        put_opt(&mut map, "haGroupId", self.ha_group_id.as_deref());
        put_opt(&mut map, "serverUrl", self.server_url.as_deref());
        put_opt(&mut map, "elasticsearchAddress", self.elasticsearch_url.as_deref());
        Value::Object(map)
    }
}

impl Canonical for IntegrationInstance {
    const KIND: ObjectKind = ObjectKind::IntegrationInstance;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        let config = reconstruct_config(Self::KIND, raw.get("data"))?;
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            integration_name: raw.required_str("brand")?.to_string(),
            account: None,
            propagation_labels: raw.string_set("propagationLabels")?,
            config: config_json(config),
            incoming_mapper_id: raw
                .optional_str("incomingMapperId", Empty::Unset)?
                .map(str::to_string),
            outgoing_mapper_id: raw
                .optional_str("outgoingMapperId", Empty::Unset)?
                .map(str::to_string),
            mapping_id: raw.optional_str("mappingId", Empty::Unset)?.map(str::to_string),
            engine_id: raw.optional_str("engine", Empty::Unset)?.map(str::to_string),
        })
    }

    fn to_raw(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("brand".to_string(), Value::String(self.integration_name.clone()));
        map.insert("propagationLabels".to_string(), json!(self.propagation_labels));
        map.insert("data".to_string(), config_pairs(&self.config_map()));
        put_opt(&mut map, "incomingMapperId", self.incoming_mapper_id.as_deref());
        put_opt(&mut map, "outgoingMapperId", self.outgoing_mapper_id.as_deref());
        put_opt(&mut map, "mappingId", self.mapping_id.as_deref());
        put_opt(&mut map, "engine", self.engine_id.as_deref());
        Value::Object(map)
    }
}

/// Remote `type` of a classifier.
pub const CLASSIFIER_TYPE: &str = "classification";

impl Canonical for Classifier {
    const KIND: ObjectKind = ObjectKind::Classifier;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        if let Some(kind) = raw.optional_str("type", Empty::Unset)? {
            if kind != CLASSIFIER_TYPE {
                return Err(ShapeError::unexpected_value(
                    Self::KIND,
                    "type",
                    CLASSIFIER_TYPE,
                    kind,
                ));
            }
        }
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            default_incident_type: raw
                .optional_str("defaultIncidentType", Empty::Unset)?
                .map(str::to_string),
            key_type_map: raw.json_text("keyTypeMap")?.unwrap_or_else(|| "{}".to_string()),
            transformer: raw.json_text("transformer")?,
            propagation_labels: raw.string_set("propagationLabels")?,
        })
    }

    fn to_raw(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("type".to_string(), Value::String(CLASSIFIER_TYPE.to_string()));
        put_opt(&mut map, "defaultIncidentType", self.default_incident_type.as_deref());
        map.insert("keyTypeMap".to_string(), parse_json_text(&self.key_type_map));
        if let Some(transformer) = &self.transformer {
            map.insert("transformer".to_string(), parse_json_text(transformer));
        }
        map.insert("propagationLabels".to_string(), json!(self.propagation_labels));
        Value::Object(map)
    }
}

impl Canonical for Mapper {
    const KIND: ObjectKind = ObjectKind::Mapper;

    fn from_raw(raw: &Value) -> Result<Self, ShapeError> {
        let raw = RawObject::new(Self::KIND, raw)?;
        let remote_type = raw.required_str("type")?;
        let direction = MapperDirection::from_remote_type(remote_type).ok_or_else(|| {
            ShapeError::unexpected_value(
                Self::KIND,
                "type",
                "mapping-incoming or mapping-outgoing",
                remote_type,
            )
        })?;
        Ok(Self {
            id: raw.required_str("id")?.to_string(),
            name: raw.required_str("name")?.to_string(),
            direction,
            default_incident_type: raw
                .optional_str("defaultIncidentType", Empty::Unset)?
                .map(str::to_string),
            mapping: raw.json_text("mapping")?.unwrap_or_else(|| "{}".to_string()),
            propagation_labels: raw.string_set("propagationLabels")?,
        })
    }

    fn to_raw(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "type".to_string(),
            Value::String(self.direction.remote_type().to_string()),
        );
        put_opt(&mut map, "defaultIncidentType", self.default_incident_type.as_deref());
        map.insert("mapping".to_string(), parse_json_text(&self.mapping));
        map.insert("propagationLabels".to_string(), json!(self.propagation_labels));
        Value::Object(map)
    }
}
