//! Dynamic document representation and identifier normalization
//!
//! Callers always see the public `id` field while the store always receives and
//! returns its native `_id` key. [`Document::normalize`] moves the identifier
//! between the two shapes; a document in transit never carries both.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Public identifier field
pub const ID_FIELD: &str = "id";
/// Store-native key field
pub const KEY_FIELD: &str = "_id";
/// Tenant scoping field injected into conditions and payloads
pub const TENANT_FIELD: &str = "tenantId";
/// Edge source endpoint
pub const FROM_FIELD: &str = "_from";
/// Edge target endpoint
pub const TO_FIELD: &str = "_to";

/// Direction of an identifier normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdDirection {
    /// `id` -> `_id`, before handing a document to the store
    ToInternal,
    /// `_id` -> `id`, before handing a document back to callers
    ToExternal,
}

/// A JSON object stored in a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a document from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Serialize any value that renders as a JSON object
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::to_value(value)?)
    }

    /// Deserialize the document into a concrete type
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_value())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Public identifier, if the document is in external shape
    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Store key, if the document is in internal shape
    pub fn key(&self) -> Option<&str> {
        self.get(KEY_FIELD).and_then(Value::as_str)
    }

    /// Identifier in whichever shape the document currently has
    pub fn identifier(&self) -> Option<&str> {
        self.key().or_else(|| self.id())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.get(TENANT_FIELD).and_then(Value::as_str)
    }

    /// Move the identifier into the target shape.
    ///
    /// Normalizing a document that is already in the target shape is a no-op.
    pub fn normalize(mut self, direction: IdDirection) -> Self {
        let (source, target) = match direction {
            IdDirection::ToInternal => (ID_FIELD, KEY_FIELD),
            IdDirection::ToExternal => (KEY_FIELD, ID_FIELD),
        };
        if let Some(value) = self.0.remove(source) {
            self.0.insert(target.to_string(), value);
        }
        self
    }

    /// Drop every field whose value is empty (`null` or `""`)
    pub fn strip_empty(mut self) -> Self {
        self.0.retain(|_, value| !is_empty_value(value));
        self
    }
}

/// Normalize every document of a batch, preserving order
pub fn normalize_batch(documents: Vec<Document>, direction: IdDirection) -> Vec<Document> {
    documents
        .into_iter()
        .map(|document| document.normalize(direction))
        .collect()
}

/// `null` and empty strings are treated as absent values
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.into_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
