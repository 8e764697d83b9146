//! Encoded object records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::ObjectId;

/// Flat map of every captured object, keyed by id.
///
/// Built incrementally during capture and read-only afterwards. Any
/// reference inside a record may point at an id that is absent from the map
/// (pruned by the depth or time budget); reconstruction treats that as
/// unknown, not as corruption.
pub type ObjectMap = BTreeMap<ObjectId, EncodedRecord>;

/// Serialized form of one captured object
///
/// The `type` tag selects the decoder. The payload is one of:
///
/// - **scalar**: `value` holds the data directly (`{"type": "int", "value": 3}`)
/// - **container**: `value` holds child ids, as an array for sequences or an
///   object `key-id -> value-id` for mappings
/// - **generic**: `attrs` maps attribute names to child ids
///
/// A record with neither field is a type tag alone (`NoneType`, functions,
/// callables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRecord
{
    /// Wire type name used to pick the decoder.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Scalar or container payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    /// Attribute name to child id, for generically encoded objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, ObjectId>>,
}

/// Shape of a record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind
{
    /// Only the type tag is present.
    Tag,
    /// Value embedded directly.
    Scalar,
    /// Ordered or keyed child references.
    Container,
    /// Attribute bag of child references.
    Generic,
}

impl EncodedRecord
{
    /// Record carrying only a type tag.
    pub fn tag(type_tag: impl Into<String>) -> Self
    {
        Self {
            type_tag: type_tag.into(),
            value: None,
            attrs: None,
        }
    }

    /// Record with an embedded scalar payload.
    pub fn scalar(type_tag: impl Into<String>, value: impl Into<Json>) -> Self
    {
        Self {
            type_tag: type_tag.into(),
            value: Some(value.into()),
            attrs: None,
        }
    }

    /// Record referencing an ordered sequence of children.
    pub fn sequence<'a>(type_tag: impl Into<String>, ids: impl IntoIterator<Item = &'a ObjectId>) -> Self
    {
        let ids = ids.into_iter().map(|id| Json::String(id.as_str().to_string())).collect();
        Self {
            type_tag: type_tag.into(),
            value: Some(Json::Array(ids)),
            attrs: None,
        }
    }

    /// Record referencing `key -> value` child pairs.
    pub fn mapping<'a>(
        type_tag: impl Into<String>,
        pairs: impl IntoIterator<Item = (&'a ObjectId, &'a ObjectId)>,
    ) -> Self
    {
        let map = pairs
            .into_iter()
            .map(|(key, value)| (key.as_str().to_string(), Json::String(value.as_str().to_string())))
            .collect();
        Self {
            type_tag: type_tag.into(),
            value: Some(Json::Object(map)),
            attrs: None,
        }
    }

    /// Record for a generically encoded object.
    pub fn generic(type_tag: impl Into<String>, attrs: BTreeMap<String, ObjectId>) -> Self
    {
        Self {
            type_tag: type_tag.into(),
            value: None,
            attrs: Some(attrs),
        }
    }

    /// Classify the payload.
    #[must_use]
    pub fn kind(&self) -> RecordKind
    {
        match (&self.value, &self.attrs) {
            (_, Some(_)) => RecordKind::Generic,
            (Some(Json::Array(_) | Json::Object(_)), None) => RecordKind::Container,
            (Some(_), None) => RecordKind::Scalar,
            (None, None) => RecordKind::Tag,
        }
    }

    /// Child ids of a sequence payload, in order.
    ///
    /// Returns `None` if the payload is not an array of strings.
    #[must_use]
    pub fn sequence_ids(&self) -> Option<Vec<ObjectId>>
    {
        let Some(Json::Array(items)) = &self.value else {
            return None;
        };
        items.iter().map(|item| item.as_str().map(ObjectId::from)).collect()
    }

    /// `(key, value)` child id pairs of a mapping payload, in order.
    #[must_use]
    pub fn mapping_ids(&self) -> Option<Vec<(ObjectId, ObjectId)>>
    {
        let Some(Json::Object(map)) = &self.value else {
            return None;
        };
        map.iter()
            .map(|(key, value)| value.as_str().map(|value| (ObjectId::from(key.as_str()), ObjectId::from(value))))
            .collect()
    }

    /// String payload, if the value is a JSON string.
    #[must_use]
    pub fn str_value(&self) -> Option<&str>
    {
        self.value.as_ref().and_then(Json::as_str)
    }

    /// Every child id this record references, in payload order.
    #[must_use]
    pub fn child_ids(&self) -> Vec<ObjectId>
    {
        if let Some(attrs) = &self.attrs {
            return attrs.values().cloned().collect();
        }
        if let Some(ids) = self.sequence_ids() {
            return ids;
        }
        if let Some(pairs) = self.mapping_ids() {
            return pairs.into_iter().flat_map(|(key, value)| [key, value]).collect();
        }
        Vec::new()
    }
}
