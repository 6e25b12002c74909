//! MongoDB store
//!
//! Maps the store contract onto a MongoDB database:
//!
//! | Concept | MongoDB |
//! |---|---|
//! | document collection | collection |
//! | edge collection | collection with a `$jsonSchema` validator requiring `_from` and `_to` |
//! | `hash` index | `hashed` key; ascending keys when compound or unique |
//! | `fulltext` index | `text` key |
//! | `geo` index | `2dsphere` key |
//! | `persistent` / `skiplist` index | ascending key |
//!
//! Store keys are generated client-side (UUID v7 strings) so documents
//! round-trip through JSON without extended-JSON wrappers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{self, Bson, Document as BsonDocument, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Collection, Database, IndexModel};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::conditions::Filter;
use crate::descriptor::{CollectionKind, IndexDefinition, IndexType};
use crate::document::{Document, FROM_FIELD, KEY_FIELD, TO_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::query::{Query, SortOrder};
use crate::store::{DocumentCursor, DocumentStore, IndexOutcome, RemoveScope, StoreCollection};

const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_NOT_FOUND: i32 = 27;
const NAMESPACE_EXISTS: i32 = 48;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
const DUPLICATE_KEY: i32 = 11000;

fn error_code(error: &mongodb::error::Error) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|error| error.code),
        _ => None,
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> Self {
        let message = error.to_string();
        match error_code(&error) {
            Some(NAMESPACE_EXISTS) => StoreError::CollectionExists(message),
            Some(NAMESPACE_NOT_FOUND) => StoreError::CollectionNotFound(message),
            Some(INDEX_NOT_FOUND) => StoreError::IndexNotFound(message),
            Some(INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT) => StoreError::IndexConflict {
                name: String::new(),
                details: message,
            },
            Some(DUPLICATE_KEY) => StoreError::DuplicateKey(message),
            _ => StoreError::Backend(message),
        }
    }
}

fn to_bson_document(document: &Document) -> StoreResult<BsonDocument> {
    bson::to_document(document.as_map()).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn from_bson_document(document: BsonDocument) -> StoreResult<Document> {
    Document::from_value(Bson::Document(document).into_relaxed_extjson())
        .map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn filter_document(filter: &Filter) -> StoreResult<BsonDocument> {
    bson::to_document(filter).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Key specification for one index definition.
///
/// MongoDB allows a single hashed field per index and no unique hashed
/// index, so those hash indexes fall back to ascending keys.
fn index_keys(index: &IndexDefinition) -> BsonDocument {
    let kind = match index.index_type() {
        IndexType::Hash if index.fields().len() == 1 && !index.is_unique() => {
            Bson::String("hashed".to_string())
        }
        IndexType::Hash => Bson::Int32(1),
        IndexType::Fulltext => Bson::String("text".to_string()),
        IndexType::Geo => Bson::String("2dsphere".to_string()),
        IndexType::Persistent | IndexType::Skiplist | IndexType::Ttl => Bson::Int32(1),
    };
    index
        .fields()
        .iter()
        .map(|field| (field.clone(), kind.clone()))
        .collect()
}

fn edge_validator() -> BsonDocument {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": [FROM_FIELD, TO_FIELD],
        }
    }
}

#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    #[instrument(skip(self))]
    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        let names = self
            .database
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;
        Ok(names.iter().any(|existing| existing == name))
    }

    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<()> {
        match kind {
            CollectionKind::Document => self.database.create_collection(name).await?,
            CollectionKind::Edge => {
                self.database
                    .create_collection(name)
                    .validator(edge_validator())
                    .await?
            }
        }
        Ok(())
    }

    async fn collection(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> StoreResult<Arc<dyn StoreCollection>> {
        Ok(Arc::new(MongoCollection {
            collection: self.database.collection::<BsonDocument>(name),
            kind,
        }))
    }
}

pub struct MongoCollection {
    collection: Collection<BsonDocument>,
    kind: CollectionKind,
}

impl MongoCollection {
    pub fn inner(&self) -> &Collection<BsonDocument> {
        &self.collection
    }

    /// Name of the index blocking `keys`: one with the same key pattern under
    /// another name, otherwise `requested`
    async fn conflicting_index(
        &self,
        keys: &BsonDocument,
        requested: &str,
    ) -> StoreResult<String> {
        let existing: Vec<IndexModel> = self
            .collection
            .list_indexes()
            .await?
            .try_collect()
            .await?;
        let renamed = existing.into_iter().find_map(|model| {
            let name = model.options.and_then(|options| options.name)?;
            (model.keys == *keys && name != requested).then_some(name)
        });
        Ok(renamed.unwrap_or_else(|| requested.to_string()))
    }

    fn prepare(&self, mut document: Document) -> StoreResult<BsonDocument> {
        if self.kind == CollectionKind::Edge
            && !(document.contains_key(FROM_FIELD) && document.contains_key(TO_FIELD))
        {
            return Err(StoreError::InvalidDocument(format!(
                "edge documents in '{}' require {} and {}",
                self.collection.name(),
                FROM_FIELD,
                TO_FIELD
            )));
        }
        if document.key().is_none() {
            document.insert(KEY_FIELD, Uuid::now_v7().to_string());
        }
        to_bson_document(&document)
    }

    fn find_options(query: &Query) -> FindOptions {
        let mut options = FindOptions::default();
        if let Some(fields) = &query.projection {
            options.projection = Some(fields.iter().map(|f| (f.clone(), Bson::Int32(1))).collect());
        }
        if !query.sort.is_empty() {
            options.sort = Some(
                query
                    .sort
                    .iter()
                    .map(|sort| {
                        let direction = match sort.order {
                            SortOrder::Asc => 1,
                            SortOrder::Desc => -1,
                        };
                        (sort.field.clone(), Bson::Int32(direction))
                    })
                    .collect(),
            );
        }
        options.skip = query.skip;
        options.limit = query
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
        options
    }
}

#[async_trait]
impl StoreCollection for MongoCollection {
    #[instrument(skip(self, index), fields(collection = %self.collection.name()))]
    async fn create_index(&self, index: &IndexDefinition, name: &str) -> StoreResult<IndexOutcome> {
        let existed = self
            .collection
            .list_index_names()
            .await?
            .iter()
            .any(|existing| existing == name);

        let mut options = IndexOptions::default();
        options.name = Some(name.to_string());
        options.unique = index.is_unique().then_some(true);
        options.sparse = index.is_sparse().then_some(true);
        let keys = index_keys(index);
        let model = IndexModel::builder()
            .keys(keys.clone())
            .options(options)
            .build();

        match self.collection.create_index(model).await {
            Ok(_) if existed => Ok(IndexOutcome::Unchanged),
            Ok(_) => Ok(IndexOutcome::Created),
            Err(e) => match StoreError::from(e) {
                StoreError::IndexConflict { details, .. } => Err(StoreError::IndexConflict {
                    name: self.conflicting_index(&keys, name).await?,
                    details,
                }),
                other => Err(other),
            },
        }
    }

    async fn drop_index(&self, name: &str) -> StoreResult<()> {
        self.collection.drop_index(name).await?;
        Ok(())
    }

    #[instrument(skip(self, document), fields(collection = %self.collection.name()))]
    async fn insert(&self, document: Document) -> StoreResult<Document> {
        let document = self.prepare(document)?;
        self.collection.insert_one(&document).await?;
        from_bson_document(document)
    }

    #[instrument(
        skip(self, documents),
        fields(collection = %self.collection.name(), count = documents.len())
    )]
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>> {
        let documents = documents
            .into_iter()
            .map(|document| self.prepare(document))
            .collect::<StoreResult<Vec<_>>>()?;
        self.collection.insert_many(&documents).await?;
        documents.into_iter().map(from_bson_document).collect()
    }

    #[instrument(skip(self, query), fields(collection = %self.collection.name()))]
    async fn query(&self, query: &Query) -> StoreResult<DocumentCursor> {
        let mut filter = filter_document(&query.filter)?;
        if let Some(keys) = &query.keys {
            filter.insert(KEY_FIELD, doc! { "$in": keys.clone() });
        }
        debug!(?filter, "Running query");

        let cursor = self
            .collection
            .find(filter)
            .with_options(Self::find_options(query))
            .await?;
        Ok(DocumentCursor::from_stream(cursor.map(|item| {
            item.map_err(StoreError::from).and_then(from_bson_document)
        })))
    }

    #[instrument(skip(self, filter, patch), fields(collection = %self.collection.name()))]
    async fn update(&self, filter: &Filter, patch: Document) -> StoreResult<Option<Document>> {
        let filter = filter_document(filter)?;
        if patch.is_empty() {
            return self
                .collection
                .find_one(filter)
                .await?
                .map(from_bson_document)
                .transpose();
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(filter, doc! { "$set": to_bson_document(&patch)? })
            .with_options(options)
            .await?
            .map(from_bson_document)
            .transpose()
    }

    #[instrument(skip(self, filter, document), fields(collection = %self.collection.name()))]
    async fn replace(&self, filter: &Filter, document: Document) -> StoreResult<Option<Document>> {
        let filter = filter_document(filter)?;
        let mut replacement = document;
        replacement.remove(KEY_FIELD);
        let replacement = to_bson_document(&replacement)?;

        let options = FindOneAndReplaceOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_replace(filter, replacement)
            .with_options(options)
            .await?
            .map(from_bson_document)
            .transpose()
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    async fn remove(&self, filter: &Filter, scope: RemoveScope) -> StoreResult<u64> {
        let filter = filter_document(filter)?;
        let result = match scope {
            RemoveScope::One => self.collection.delete_one(filter).await?,
            RemoveScope::Many => self.collection.delete_many(filter).await?,
        };
        Ok(result.deleted_count)
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        Ok(self.collection.count_documents(filter_document(filter)?).await?)
    }
}

/// Drain a raw MongoDB cursor into documents, used by tests and tooling
pub async fn collect_raw(collection: &Collection<BsonDocument>) -> StoreResult<Vec<Document>> {
    let raw: Vec<BsonDocument> = collection.find(doc! {}).await?.try_collect().await?;
    raw.into_iter().map(from_bson_document).collect()
}
