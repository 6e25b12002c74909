use thiserror::Error;

use crate::descriptor::IndexType;

/// Errors raised by a store backend (MongoDB, in-memory, ...)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Index '{name}' conflicts with an existing definition: {details}")]
    IndexConflict { name: String, details: String },

    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported by this store: {0}")]
    Unsupported(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a cache collaborator
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache payload error: {0}")]
    Payload(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by lifecycle hooks
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rejected by hook: {0}")]
    Rejected(String),

    #[error("Hook failed: {0}")]
    Failed(String),
}

pub type HookResult<T> = Result<T, HookError>;

/// Error surfaced by every repository operation
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provisioning of collection '{collection}' failed: {source}")]
    Provisioning {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Index type '{0}' is not implemented")]
    UnsupportedIndexType(IndexType),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document has no identifier")]
    MissingIdentifier,

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub(crate) fn provisioning(collection: &str, source: StoreError) -> Self {
        RepositoryError::Provisioning {
            collection: collection.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioning_error_names_collection() {
        let err = RepositoryError::provisioning(
            "people",
            StoreError::Backend("connection reset".to_string()),
        );
        let message = err.to_string();
        assert!(message.contains("people"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_hook_error_is_transparent() {
        let err: RepositoryError = HookError::Validation("name is required".to_string()).into();
        assert_eq!(err.to_string(), "Validation failed: name is required");
    }

    #[test]
    fn test_unsupported_index_type_message() {
        let err = RepositoryError::UnsupportedIndexType(IndexType::Ttl);
        assert_eq!(err.to_string(), "Index type 'ttl' is not implemented");
    }
}
