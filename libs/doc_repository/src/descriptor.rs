//! Collection and index descriptors that drive provisioning

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::{RepositoryError, RepositoryResult};

/// Kind of backing collection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CollectionKind {
    /// Plain documents (vertices)
    #[default]
    Document,
    /// Relationships carrying `_from` / `_to` endpoints
    Edge,
}

/// Supported index families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndexType {
    Hash,
    Fulltext,
    Geo,
    Persistent,
    Skiplist,
    /// Declared for completeness; provisioning always rejects it
    Ttl,
}

/// A declared index on a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    index_type: IndexType,
    fields: Vec<String>,
    #[serde(default)]
    options: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<u32>,
}

impl IndexDefinition {
    pub fn new<I, S>(index_type: IndexType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_type,
            fields: fields.into_iter().map(Into::into).collect(),
            options: Map::new(),
            min_length: None,
        }
    }

    pub fn hash<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::new(IndexType::Hash, fields)
    }

    pub fn persistent<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::new(IndexType::Persistent, fields)
    }

    pub fn skiplist<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::new(IndexType::Skiplist, fields)
    }

    pub fn geo<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::new(IndexType::Geo, fields)
    }

    pub fn fulltext(field: impl Into<String>, min_length: Option<u32>) -> Self {
        let mut index = Self::new(IndexType::Fulltext, [field.into()]);
        index.min_length = min_length;
        index
    }

    pub fn ttl<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self::new(IndexType::Ttl, fields)
    }

    /// Logical name used to drop and recreate the index on conflict
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with_option("name", name.into())
    }

    pub fn unique(self, unique: bool) -> Self {
        self.with_option("unique", unique)
    }

    pub fn sparse(self, sparse: bool) -> Self {
        self.with_option("sparse", sparse)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn min_length(&self) -> Option<u32> {
        self.min_length
    }

    pub fn name(&self) -> Option<&str> {
        self.options.get("name").and_then(Value::as_str)
    }

    pub fn is_unique(&self) -> bool {
        self.flag("unique")
    }

    pub fn is_sparse(&self) -> bool {
        self.flag("sparse")
    }

    fn flag(&self, key: &str) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Explicit name, or `idx_{collection}_{type}_{fields...}`
    pub fn resolved_name(&self, collection: &str) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!(
                "idx_{}_{}_{}",
                collection,
                self.index_type,
                self.fields.join("_")
            ),
        }
    }
}

/// Static description of a repository's collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    name: String,
    #[serde(default)]
    kind: CollectionKind,
    #[serde(default)]
    indexes: Vec<IndexDefinition>,
    #[serde(default)]
    overwrite_on_conflict: bool,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Document,
            indexes: Vec::new(),
            overwrite_on_conflict: false,
        }
    }

    pub fn edge(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(CollectionKind::Edge)
    }

    pub fn with_kind(mut self, kind: CollectionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn overwrite_on_conflict(mut self, overwrite: bool) -> Self {
        self.overwrite_on_conflict = overwrite;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    pub fn overwrites_on_conflict(&self) -> bool {
        self.overwrite_on_conflict
    }

    /// Fail fast on descriptors that can never be provisioned
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.name.trim().is_empty() {
            return Err(RepositoryError::Configuration(
                "collection name is required".to_string(),
            ));
        }
        if let Some(index) = self.indexes.iter().find(|index| index.fields.is_empty()) {
            return Err(RepositoryError::Configuration(format!(
                "index '{}' declares no fields",
                index.resolved_name(&self.name)
            )));
        }
        Ok(())
    }
}
