//! Ready-made hooks for timestamps, validation and auditing

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use tracing::info;

use super::Hook;
use crate::document::Document;
use crate::error::{HookError, HookResult};

pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sets `createdAt` (unless present) and `updatedAt` to the current time
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatedTimestamp;

#[async_trait]
impl Hook for CreatedTimestamp {
    async fn apply(&self, mut document: Document) -> HookResult<Document> {
        let stamp = now();
        if !document.contains_key(CREATED_AT_FIELD) {
            document.insert(CREATED_AT_FIELD, stamp.clone());
        }
        document.insert(UPDATED_AT_FIELD, stamp);
        Ok(document)
    }
}

/// Sets `updatedAt` to the current time
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatedTimestamp;

#[async_trait]
impl Hook for UpdatedTimestamp {
    async fn apply(&self, mut document: Document) -> HookResult<Document> {
        document.insert(UPDATED_AT_FIELD, now());
        Ok(document)
    }
}

/// Rejects documents that do not deserialize into `T` or fail `T`'s
/// `validator` rules. The document itself passes through unchanged.
pub struct Validate<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Validate<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Validate<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Hook for Validate<T>
where
    T: DeserializeOwned + validator::Validate + 'static,
{
    async fn apply(&self, document: Document) -> HookResult<Document> {
        let candidate: T = document
            .clone()
            .deserialize()
            .map_err(|e| HookError::Validation(e.to_string()))?;
        candidate
            .validate()
            .map_err(|e| HookError::Validation(e.to_string()))?;
        Ok(document)
    }
}

/// Emits an audit event for every document passing through
#[derive(Debug, Clone)]
pub struct Audit {
    label: String,
}

impl Audit {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl Hook for Audit {
    async fn apply(&self, document: Document) -> HookResult<Document> {
        info!(
            target: "doc_repository::audit",
            label = %self.label,
            document_id = document.identifier().unwrap_or("-"),
            tenant_id = document.tenant_id().unwrap_or("-"),
            "Audit"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, validator::Validate)]
    struct Person {
        #[validate(length(min = 1, max = 50))]
        name: String,
    }

    #[tokio::test]
    async fn test_created_timestamp_keeps_existing_created_at() {
        let document = Document::new().with(CREATED_AT_FIELD, "2024-01-01T00:00:00.000Z");
        let stamped = CreatedTimestamp.apply(document).await.unwrap();

        assert_eq!(
            stamped.get(CREATED_AT_FIELD),
            Some(&json!("2024-01-01T00:00:00.000Z"))
        );
        assert!(stamped.contains_key(UPDATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_created_timestamp_sets_both_fields() {
        let stamped = CreatedTimestamp.apply(Document::new()).await.unwrap();
        assert_eq!(stamped.get(CREATED_AT_FIELD), stamped.get(UPDATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_validate_accepts_valid_documents() {
        let hook = Validate::<Person>::new();
        let document = Document::new().with("name", "Alice");
        assert_eq!(hook.apply(document.clone()).await.unwrap(), document);
    }

    #[tokio::test]
    async fn test_validate_rejects_rule_violations() {
        let hook = Validate::<Person>::new();
        let result = hook.apply(Document::new().with("name", "")).await;
        assert!(matches!(result, Err(HookError::Validation(_))));
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_shape() {
        let hook = Validate::<Person>::new();
        let result = hook.apply(Document::new().with("name", 42)).await;
        assert!(matches!(result, Err(HookError::Validation(_))));
    }

    #[tokio::test]
    async fn test_audit_passes_document_through() {
        let document = Document::new().with("_id", "k1");
        let result = Audit::new("delete").apply(document.clone()).await.unwrap();
        assert_eq!(result, document);
    }
}
