//! Lifecycle hooks
//!
//! A [`HookRegistry`] maps `(phase, category)` to an ordered list of
//! transforms. It is assembled once with [`HookRegistry::builder`] and is
//! read-only afterwards.
//!
//! Hooks are threaded: within one invocation every hook receives the output
//! of the hook before it, across all requested categories, for single
//! documents and batches alike.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use strum::{Display, EnumString};

use crate::document::Document;
use crate::error::HookResult;

pub use builtin::{Audit, CreatedTimestamp, UpdatedTimestamp, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HookPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HookCategory {
    Save,
    Create,
    Update,
    UpdateOne,
    Delete,
    DeleteOne,
    DeleteMany,
    Find,
    FindOne,
    FindMany,
}

/// A document transform run before or after a store operation
#[async_trait]
pub trait Hook: Send + Sync {
    async fn apply(&self, document: Document) -> HookResult<Document>;
}

/// Hook backed by an async closure, see [`hook_fn`]
pub struct FnHook<F>(F);

/// Hook backed by a synchronous closure, see [`sync_hook`]
pub struct SyncHook<F>(F);

/// Wrap an async closure as a hook
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(Document) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult<Document>> + Send,
{
    FnHook(f)
}

/// Wrap a synchronous closure as a hook
pub fn sync_hook<F>(f: F) -> SyncHook<F>
where
    F: Fn(Document) -> HookResult<Document> + Send + Sync,
{
    SyncHook(f)
}

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(Document) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult<Document>> + Send,
{
    async fn apply(&self, document: Document) -> HookResult<Document> {
        (self.0)(document).await
    }
}

#[async_trait]
impl<F> Hook for SyncHook<F>
where
    F: Fn(Document) -> HookResult<Document> + Send + Sync,
{
    async fn apply(&self, document: Document) -> HookResult<Document> {
        (self.0)(document)
    }
}

type HookKey = (HookPhase, HookCategory);

/// Resolved hook table for one repository
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookKey, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::default()
    }

    /// Registry with no hooks
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hooks registered for `(phase, category)`, in registration order
    pub fn hooks_for(&self, phase: HookPhase, category: HookCategory) -> &[Arc<dyn Hook>] {
        self.hooks
            .get(&(phase, category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Thread a document through every hook of each category, in order
    pub async fn invoke(
        &self,
        phase: HookPhase,
        categories: &[HookCategory],
        mut document: Document,
    ) -> HookResult<Document> {
        for &category in categories {
            for hook in self.hooks_for(phase, category) {
                document = hook.apply(document).await?;
            }
        }
        Ok(document)
    }

    /// Apply [`invoke`](Self::invoke) to each document, preserving order
    pub async fn invoke_batch(
        &self,
        phase: HookPhase,
        categories: &[HookCategory],
        documents: Vec<Document>,
    ) -> HookResult<Vec<Document>> {
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            results.push(self.invoke(phase, categories, document).await?);
        }
        Ok(results)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .hooks
            .iter()
            .map(|((phase, category), hooks)| (format!("{phase}:{category}"), hooks.len()))
            .collect();
        counts.sort();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

#[derive(Default)]
pub struct HookRegistryBuilder {
    hooks: HashMap<HookKey, Vec<Arc<dyn Hook>>>,
}

impl HookRegistryBuilder {
    pub fn register(
        mut self,
        phase: HookPhase,
        category: HookCategory,
        hook: impl Hook + 'static,
    ) -> Self {
        self.hooks
            .entry((phase, category))
            .or_default()
            .push(Arc::new(hook));
        self
    }

    pub fn pre(self, category: HookCategory, hook: impl Hook + 'static) -> Self {
        self.register(HookPhase::Pre, category, hook)
    }

    pub fn post(self, category: HookCategory, hook: impl Hook + 'static) -> Self {
        self.register(HookPhase::Post, category, hook)
    }

    /// `createdAt` on create, `updatedAt` on every save and update
    pub fn with_timestamps(self) -> Self {
        self.pre(HookCategory::Create, CreatedTimestamp)
            .pre(HookCategory::Save, UpdatedTimestamp)
            .pre(HookCategory::Update, UpdatedTimestamp)
    }

    pub fn build(self) -> HookRegistry {
        HookRegistry { hooks: self.hooks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    fn append(tag: &'static str) -> SyncHook<impl Fn(Document) -> HookResult<Document>> {
        sync_hook(move |mut doc: Document| {
            let mut trail = doc.get("trail").and_then(Value::as_str).unwrap_or("").to_string();
            trail.push_str(tag);
            doc.insert("trail", trail);
            Ok(doc)
        })
    }

    #[tokio::test]
    async fn test_hooks_thread_in_registration_order() {
        let registry = HookRegistry::builder()
            .pre(HookCategory::Save, append("a"))
            .pre(HookCategory::Save, append("b"))
            .pre(HookCategory::Create, append("c"))
            .build();

        let result = registry
            .invoke(
                HookPhase::Pre,
                &[HookCategory::Save, HookCategory::Create],
                Document::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.get("trail"), Some(&json!("abc")));
    }

    #[tokio::test]
    async fn test_category_order_follows_the_call() {
        let registry = HookRegistry::builder()
            .pre(HookCategory::Save, append("s"))
            .pre(HookCategory::Create, append("c"))
            .build();

        let result = registry
            .invoke(
                HookPhase::Pre,
                &[HookCategory::Create, HookCategory::Save],
                Document::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.get("trail"), Some(&json!("cs")));
    }

    #[tokio::test]
    async fn test_phases_are_independent() {
        let registry = HookRegistry::builder()
            .post(HookCategory::Find, append("x"))
            .build();

        let result = registry
            .invoke(HookPhase::Pre, &[HookCategory::Find], Document::new())
            .await
            .unwrap();

        assert!(result.get("trail").is_none());
    }

    #[tokio::test]
    async fn test_async_hooks_are_awaited() {
        let registry = HookRegistry::builder()
            .pre(
                HookCategory::Create,
                hook_fn(|doc: Document| async move {
                    tokio::task::yield_now().await;
                    Ok::<_, HookError>(doc.with("async", true))
                }),
            )
            .pre(HookCategory::Create, append("after"))
            .build();

        let result = registry
            .invoke(HookPhase::Pre, &[HookCategory::Create], Document::new())
            .await
            .unwrap();

        assert_eq!(result.get("async"), Some(&json!(true)));
        assert_eq!(result.get("trail"), Some(&json!("after")));
    }

    #[tokio::test]
    async fn test_hook_failure_stops_the_chain() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let registry = HookRegistry::builder()
            .pre(
                HookCategory::Delete,
                sync_hook(|_doc: Document| Err(HookError::Rejected("nope".to_string()))),
            )
            .pre(
                HookCategory::Delete,
                sync_hook(move |doc: Document| {
                    *counter.lock().unwrap() += 1;
                    Ok(doc)
                }),
            )
            .build();

        let result = registry
            .invoke(HookPhase::Pre, &[HookCategory::Delete], Document::new())
            .await;

        assert!(matches!(result, Err(HookError::Rejected(_))));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let registry = HookRegistry::builder()
            .post(
                HookCategory::FindMany,
                sync_hook(|doc: Document| {
                    let n = doc.get("n").and_then(Value::as_i64).unwrap_or(0);
                    Ok(doc.with("double", n * 2))
                }),
            )
            .build();

        let batch = (1..=3).map(|n| Document::new().with("n", n)).collect();
        let results = registry
            .invoke_batch(HookPhase::Post, &[HookCategory::FindMany], batch)
            .await
            .unwrap();

        let doubled: Vec<_> = results.iter().map(|d| d.get("double").cloned()).collect();
        assert_eq!(doubled, vec![Some(json!(2)), Some(json!(4)), Some(json!(6))]);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(HookCategory::UpdateOne.to_string(), "UPDATE_ONE");
        assert_eq!(HookPhase::Post.to_string(), "POST");
    }
}
