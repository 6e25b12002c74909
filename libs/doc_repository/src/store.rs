//! Store collaborator contract
//!
//! A [`DocumentStore`] owns named collections; a [`StoreCollection`] exposes
//! the per-collection operations the repository needs. Backends: the embedded
//! [`MemoryStore`](crate::memory::MemoryStore) and, with the `mongodb` feature,
//! [`MongoStore`](crate::mongo::MongoStore).

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Peekable};
use futures::{Stream, StreamExt, TryStreamExt};

use crate::conditions::Filter;
use crate::descriptor::{CollectionKind, IndexDefinition};
use crate::document::Document;
use crate::error::StoreResult;
use crate::query::Query;

/// Result of an index creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The index did not exist and was built
    Created,
    /// An identical index was already present
    Unchanged,
}

/// How many documents a removal may affect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveScope {
    One,
    Many,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> StoreResult<bool>;

    /// Create a collection; fails with `CollectionExists` if another creator won
    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<()>;

    /// Handle to an existing collection
    async fn collection(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> StoreResult<Arc<dyn StoreCollection>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreCollection: Send + Sync {
    /// Build an index under `name`; fails with `IndexConflict` naming the
    /// blocking index when `name` exists with a different definition or the
    /// same key pattern exists under another name
    async fn create_index(&self, index: &IndexDefinition, name: &str) -> StoreResult<IndexOutcome>;

    async fn drop_index(&self, name: &str) -> StoreResult<()>;

    /// Insert a document in internal shape, returning it with its key
    async fn insert(&self, document: Document) -> StoreResult<Document>;

    /// Insert a batch, returning stored documents in input order
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Document>>;

    async fn query(&self, query: &Query) -> StoreResult<DocumentCursor>;

    /// Merge `patch` into the first match and return the updated document
    async fn update(&self, filter: &Filter, patch: Document) -> StoreResult<Option<Document>>;

    /// Replace the first match, keeping its key, and return the new document
    async fn replace(&self, filter: &Filter, document: Document) -> StoreResult<Option<Document>>;

    async fn remove(&self, filter: &Filter, scope: RemoveScope) -> StoreResult<u64>;

    async fn count(&self, filter: &Filter) -> StoreResult<u64>;
}

/// Lazy sequence of query results
pub struct DocumentCursor {
    stream: Pin<Box<Peekable<BoxStream<'static, StoreResult<Document>>>>>,
}

impl DocumentCursor {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = StoreResult<Document>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream.boxed().peekable()),
        }
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self::from_stream(stream::iter(documents.into_iter().map(Ok)))
    }

    pub fn empty() -> Self {
        Self::from_documents(Vec::new())
    }

    pub async fn next(&mut self) -> StoreResult<Option<Document>> {
        self.stream.next().await.transpose()
    }

    pub async fn has_next(&mut self) -> bool {
        self.stream.as_mut().peek().await.is_some()
    }

    /// Pull up to `size` documents
    pub async fn next_batch(&mut self, size: usize) -> StoreResult<Vec<Document>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next().await? {
                Some(document) => batch.push(document),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Drain the cursor
    pub async fn all(self) -> StoreResult<Vec<Document>> {
        self.stream.try_collect().await
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn numbered(count: usize) -> Vec<Document> {
        (0..count).map(|n| Document::new().with("n", n)).collect()
    }

    #[tokio::test]
    async fn test_cursor_next_and_has_next() {
        let mut cursor = DocumentCursor::from_documents(numbered(2));

        assert!(cursor.has_next().await);
        assert_eq!(cursor.next().await.unwrap(), Some(Document::new().with("n", 0)));
        assert!(cursor.has_next().await);
        cursor.next().await.unwrap();
        assert!(!cursor.has_next().await);
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cursor_batches() {
        let mut cursor = DocumentCursor::from_documents(numbered(5));

        assert_eq!(cursor.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(cursor.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(cursor.next_batch(2).await.unwrap().len(), 1);
        assert!(cursor.next_batch(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_surfaces_stream_errors() {
        let items = vec![
            Ok(Document::new()),
            Err(StoreError::Backend("cursor killed".to_string())),
        ];
        let cursor = DocumentCursor::from_stream(stream::iter(items));

        let result = cursor.all().await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
