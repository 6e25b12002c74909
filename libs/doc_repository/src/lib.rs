//! Multi-tenant document repository
//!
//! Generic data access over document collections with provisioning,
//! identifier normalization, tenant scoping, lifecycle hooks and read-through
//! caching.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │    Repository    │  ← public operations, one handle per collection/tenant
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐   ┌──────────────┐
//! │ ConditionBuilder │   │ HookRegistry │  ← tenant scope / PRE + POST transforms
//! └────────┬─────────┘   └──────────────┘
//!          │
//! ┌────────▼─────────┐
//! │   CacheAside     │  ← find_one / find / find_many_by_id only
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ StoreCollection  │  ← MemoryStore, MongoStore
//! └──────────────────┘
//! ```
//!
//! Collections and indexes are provisioned once, when a repository is
//! built. Documents cross the API with an `id` field and are stored with
//! `_id`.
//!
//! # Features
//!
//! - `mongodb` (default) - [`MongoStore`]
//! - `redis` (default) - [`RedisCache`]
//! - `config` - [`RepositorySettings`] loaded with `core_config::FromEnv`
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use doc_repository::{
//!     CollectionDescriptor, Conditions, Document, HookRegistry, IndexDefinition, MemoryCache,
//!     MemoryStore, Repository, TenantContext,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let people: Repository = Repository::builder(
//!     CollectionDescriptor::new("people")
//!         .with_index(IndexDefinition::hash(["email"]).unique(true)),
//! )
//! .hooks(HookRegistry::builder().with_timestamps().build())
//! .cache(Arc::new(MemoryCache::new()))
//! .tenant(TenantContext::new("acme"))
//! .build(&store)
//! .await?;
//!
//! let alice = people
//!     .create(Document::new().with("name", "Alice").with("email", "alice@acme.io"))
//!     .await?;
//! let found = people.find_one(Conditions::new().eq("email", "alice@acme.io")).await?;
//! assert_eq!(found.as_ref().and_then(Document::id), alice.id());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod conditions;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod provisioner;
pub mod query;
pub mod repository;
pub mod store;
pub mod tenant;

#[cfg(feature = "mongodb")]
pub mod mongo;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "config")]
pub mod settings;

pub use cache::{Cache, CacheAside, MemoryCache};
pub use conditions::{ConditionBuilder, Conditions, Filter};
pub use descriptor::{CollectionDescriptor, CollectionKind, IndexDefinition, IndexType};
pub use document::{Document, IdDirection};
pub use error::{
    CacheError, HookError, HookResult, RepositoryError, RepositoryResult, StoreError, StoreResult,
};
pub use hooks::{Hook, HookCategory, HookPhase, HookRegistry, hook_fn, sync_hook};
pub use memory::MemoryStore;
pub use provisioner::ensure_collection;
pub use query::{DeleteResult, FindRequest, SortField, SortOrder, UpdateRequest};
pub use repository::{Repository, RepositoryBuilder};
pub use store::{DocumentCursor, DocumentStore, StoreCollection};
pub use tenant::TenantContext;

#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "config")]
pub use settings::RepositorySettings;
