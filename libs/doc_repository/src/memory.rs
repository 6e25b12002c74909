//! Embedded in-memory store
//!
//! Implements the full store contract: collection kinds, named indexes with
//! conflict detection, unique constraints, example-matching filters and the
//! projection/sort/skip/limit modifiers. Counters expose how often indexes
//! were built and queries ran, which makes cache and provisioning behaviour
//! observable in tests.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::conditions::Filter;
use crate::descriptor::{CollectionKind, IndexDefinition};
use crate::document::{Document, FROM_FIELD, KEY_FIELD, TO_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::query::{Query, SortField, SortOrder};
use crate::store::{DocumentCursor, DocumentStore, IndexOutcome, RemoveScope, StoreCollection};

/// Operation counters shared by every collection of a [`MemoryStore`]
#[derive(Debug, Default)]
pub struct StoreStats {
    collections_created: AtomicUsize,
    indexes_created: AtomicUsize,
    indexes_dropped: AtomicUsize,
    queries: AtomicUsize,
}

impl StoreStats {
    pub fn collections_created(&self) -> usize {
        self.collections_created.load(AtomicOrdering::SeqCst)
    }

    pub fn indexes_created(&self) -> usize {
        self.indexes_created.load(AtomicOrdering::SeqCst)
    }

    pub fn indexes_dropped(&self) -> usize {
        self.indexes_dropped.load(AtomicOrdering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Arc<MemoryCollection>>>>,
    stats: Arc<StoreStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Direct handle to a collection, bypassing repositories
    pub async fn raw_collection(&self, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections.read().await.get(name).cloned()
    }

    /// Create or replace an index without conflict checks
    pub async fn seed_index(
        &self,
        collection: &str,
        name: &str,
        index: IndexDefinition,
    ) -> StoreResult<()> {
        let collection = self
            .raw_collection(collection)
            .await
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        collection.indexes.write().await.insert(name.to_string(), index);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            Arc::new(MemoryCollection::new(name, kind, self.stats.clone())),
        );
        StoreStats::bump(&self.stats.collections_created);
        Ok(())
    }

    async fn collection(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> StoreResult<Arc<dyn StoreCollection>> {
        let collection = self
            .raw_collection(name)
            .await
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;
        if collection.kind != kind {
            return Err(StoreError::InvalidDocument(format!(
                "collection '{}' is a {} collection, not {}",
                name, collection.kind, kind
            )));
        }
        Ok(collection)
    }
}

pub struct MemoryCollection {
    name: String,
    kind: CollectionKind,
    documents: RwLock<Vec<Document>>,
    indexes: RwLock<BTreeMap<String, IndexDefinition>>,
    stats: Arc<StoreStats>,
}

impl MemoryCollection {
    fn new(name: &str, kind: CollectionKind, stats: Arc<StoreStats>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(BTreeMap::new()),
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Every stored document, in insertion order
    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.indexes.read().await.keys().cloned().collect()
    }

    fn prepare(&self, mut document: Document) -> StoreResult<Document> {
        if self.kind == CollectionKind::Edge
            && !(document.contains_key(FROM_FIELD) && document.contains_key(TO_FIELD))
        {
            return Err(StoreError::InvalidDocument(format!(
                "edge documents in '{}' require {} and {}",
                self.name, FROM_FIELD, TO_FIELD
            )));
        }
        if document.key().is_none() {
            document.insert(KEY_FIELD, Uuid::now_v7().to_string());
        }
        Ok(document)
    }

    fn check_unique(
        indexes: &BTreeMap<String, IndexDefinition>,
        existing: &[Document],
        candidate: &Document,
        skip_key: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(key) = candidate.key()
            && skip_key != Some(key)
            && existing.iter().any(|d| d.key() == Some(key))
        {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        for (name, index) in indexes.iter().filter(|(_, index)| index.is_unique()) {
            let values: Vec<Option<&Value>> =
                index.fields().iter().map(|f| candidate.get(f)).collect();
            if index.is_sparse() && values.iter().any(Option::is_none) {
                continue;
            }
            let clash = existing.iter().any(|other| {
                other.key() != skip_key.or(candidate.key())
                    && index
                        .fields()
                        .iter()
                        .zip(values.iter())
                        .all(|(field, value)| other.get(field) == *value)
            });
            if clash {
                return Err(StoreError::DuplicateKey(format!(
                    "unique index '{name}' violated"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StoreCollection for MemoryCollection {
    async fn create_index(&self, index: &IndexDefinition, name: &str) -> StoreResult<IndexOutcome> {
        let mut indexes = self.indexes.write().await;
        let renamed = indexes.iter().find(|(existing_name, existing)| {
            existing_name.as_str() != name
                && existing.index_type() == index.index_type()
                && existing.fields() == index.fields()
        });
        if let Some((existing_name, _)) = renamed {
            return Err(StoreError::IndexConflict {
                name: existing_name.clone(),
                details: format!(
                    "{} index on {:?} already exists as '{}'",
                    index.index_type(),
                    index.fields(),
                    existing_name
                ),
            });
        }
        match indexes.get(name) {
            Some(existing) if existing == index => Ok(IndexOutcome::Unchanged),
            Some(existing) => Err(StoreError::IndexConflict {
                name: name.to_string(),
                details: format!(
                    "existing {} index on {:?} differs from requested {} index on {:?}",
                    existing.index_type(),
                    existing.fields(),
                    index.index_type(),
                    index.fields()
                ),
            }),
            None => {
                indexes.insert(name.to_string(), index.clone());
                StoreStats::bump(&self.stats.indexes_created);
                Ok(IndexOutcome::Created)
            }
        }
    }

    async fn drop_index(&self, name: &str) -> StoreResult<()> {
        match self.indexes.write().await.remove(name) {
            Some(_) => {
                StoreStats::bump(&self.stats.indexes_dropped);
                Ok(())
            }
            None => Err(StoreError::IndexNotFound(name.to_string())),
        }
    }

    async fn insert(&self, document: Document) -> StoreResult<Document> {
        let document = self.prepare(document)?;
        let indexes = self.indexes.read().await;
        let mut documents = self.documents.write().await;
        Self::check_unique(&indexes, &documents, &document, None)?;
        documents.push(document.clone());
        Ok(document)
    }

    async fn insert_many(&self, batch: Vec<Document>) -> StoreResult<Vec<Document>> {
        let batch = batch
            .into_iter()
            .map(|document| self.prepare(document))
            .collect::<StoreResult<Vec<_>>>()?;

        let indexes = self.indexes.read().await;
        let mut documents = self.documents.write().await;
        let mut staged = documents.clone();
        for document in &batch {
            Self::check_unique(&indexes, &staged, document, None)?;
            staged.push(document.clone());
        }
        *documents = staged;
        Ok(batch)
    }

    async fn query(&self, query: &Query) -> StoreResult<DocumentCursor> {
        StoreStats::bump(&self.stats.queries);
        let documents = self.documents.read().await;

        let mut results = documents
            .iter()
            .filter(|document| query.filter.matches(document))
            .filter(|document| match &query.keys {
                Some(keys) => document
                    .key()
                    .is_some_and(|key| keys.iter().any(|k| k == key)),
                None => true,
            })
            .collect::<Vec<&Document>>();

        if !query.sort.is_empty() {
            results.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        // Projection comes last so sorting sees every field
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let results = results
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| project(document, query.projection.as_deref()))
            .collect();

        Ok(DocumentCursor::from_documents(results))
    }

    async fn update(&self, filter: &Filter, patch: Document) -> StoreResult<Option<Document>> {
        let indexes = self.indexes.read().await;
        let mut documents = self.documents.write().await;
        let Some(position) = documents.iter().position(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let mut updated = documents[position].clone();
        for (field, value) in patch.into_map() {
            if field != KEY_FIELD {
                updated.insert(field, value);
            }
        }
        let key = updated.key().map(str::to_string);
        Self::check_unique(&indexes, &documents, &updated, key.as_deref())?;
        documents[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn replace(&self, filter: &Filter, document: Document) -> StoreResult<Option<Document>> {
        let indexes = self.indexes.read().await;
        let mut documents = self.documents.write().await;
        let Some(position) = documents.iter().position(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let mut replacement = document;
        replacement.remove(KEY_FIELD);
        if let Some(key) = documents[position].key() {
            replacement.insert(KEY_FIELD, key.to_string());
        }
        let replacement = self.prepare(replacement)?;
        let key = replacement.key().map(str::to_string);
        Self::check_unique(&indexes, &documents, &replacement, key.as_deref())?;
        documents[position] = replacement.clone();
        Ok(Some(replacement))
    }

    async fn remove(&self, filter: &Filter, scope: RemoveScope) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        match scope {
            RemoveScope::One => match documents.iter().position(|d| filter.matches(d)) {
                Some(position) => {
                    documents.remove(position);
                    Ok(1)
                }
                None => Ok(0),
            },
            RemoveScope::Many => {
                let before = documents.len();
                documents.retain(|d| !filter.matches(d));
                Ok((before - documents.len()) as u64)
            }
        }
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|d| filter.matches(d)).count() as u64)
    }
}

fn project(document: &Document, projection: Option<&[String]>) -> Document {
    match projection {
        None => document.clone(),
        Some(fields) => document
            .iter()
            .filter(|(field, _)| *field == KEY_FIELD || fields.iter().any(|f| f == *field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect(),
    }
}

fn compare_documents(a: &Document, b: &Document, sort: &[SortField]) -> Ordering {
    for SortField { field, order } in sort {
        let ordering = compare_values(a.get(field), b.get(field));
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
