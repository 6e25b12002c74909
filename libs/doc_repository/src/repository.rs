//! Tenant-scoped repository over a provisioned collection

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::cache::{Cache, CacheAside};
use crate::conditions::{ConditionBuilder, Conditions, Filter};
use crate::descriptor::{CollectionDescriptor, CollectionKind};
use crate::document::{
    Document, FROM_FIELD, ID_FIELD, IdDirection, KEY_FIELD, TENANT_FIELD, TO_FIELD,
    normalize_batch,
};
use crate::error::{RepositoryError, RepositoryResult};
use crate::hooks::{HookCategory, HookPhase, HookRegistry};
use crate::provisioner::ensure_collection;
use crate::query::{DeleteResult, FindRequest, Query, UpdateRequest};
use crate::store::{DocumentStore, RemoveScope, StoreCollection};
use crate::tenant::TenantContext;

use HookCategory::*;

const OP_FIND_ONE: &str = "findOne";
const OP_FIND: &str = "find";
const OP_FIND_MANY_BY_ID: &str = "findManyById";

struct Shared {
    descriptor: CollectionDescriptor,
    collection: Arc<dyn StoreCollection>,
    hooks: HookRegistry,
}

/// Repository bound to one provisioned collection.
///
/// `T` is the entity type callers read and write; it defaults to the dynamic
/// [`Document`]. Handles are cheap to clone and share the collection handle,
/// hook table and cache. [`for_tenant`](Self::for_tenant),
/// [`without_tenant`](Self::without_tenant) and
/// [`without_cache`](Self::without_cache) derive handles with a different
/// scope over the same collection.
pub struct Repository<T = Document> {
    shared: Arc<Shared>,
    tenant: Option<Arc<TenantContext>>,
    cache: Option<Arc<dyn Cache>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            tenant: self.tenant.clone(),
            cache: self.cache.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.shared.descriptor.name())
            .field("kind", &self.shared.descriptor.kind())
            .field("tenant", &self.tenant.as_deref().map(TenantContext::tenant_id))
            .field("cached", &self.cache.is_some())
            .field("hooks", &self.shared.hooks)
            .finish()
    }
}

/// Collects the collaborators of a [`Repository`] and provisions its collection
pub struct RepositoryBuilder<T = Document> {
    descriptor: CollectionDescriptor,
    hooks: HookRegistry,
    cache: Option<Arc<dyn Cache>>,
    tenant: Option<TenantContext>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> RepositoryBuilder<T> {
    pub fn new(descriptor: CollectionDescriptor) -> Self {
        Self {
            descriptor,
            hooks: HookRegistry::empty(),
            cache: None,
            tenant: None,
            _entity: PhantomData,
        }
    }

    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn tenant(mut self, tenant: TenantContext) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut CollectionDescriptor {
        &mut self.descriptor
    }

    /// Provision the collection and its indexes, then return a ready repository
    pub async fn build(self, store: &dyn DocumentStore) -> RepositoryResult<Repository<T>> {
        let collection = ensure_collection(store, &self.descriptor).await?;
        Ok(Repository {
            shared: Arc::new(Shared {
                descriptor: self.descriptor,
                collection,
                hooks: self.hooks,
            }),
            tenant: self.tenant.map(Arc::new),
            cache: self.cache,
            _entity: PhantomData,
        })
    }
}

impl<T> Repository<T> {
    pub fn builder(descriptor: CollectionDescriptor) -> RepositoryBuilder<T> {
        RepositoryBuilder::new(descriptor)
    }

    pub fn name(&self) -> &str {
        self.shared.descriptor.name()
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.shared.descriptor
    }

    pub fn tenant(&self) -> Option<&TenantContext> {
        self.tenant.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Same collection, scoped to another tenant
    pub fn for_tenant(&self, tenant: TenantContext) -> Self {
        Self {
            tenant: Some(Arc::new(tenant)),
            ..self.clone()
        }
    }

    /// Same collection without tenant scoping, for system jobs
    pub fn without_tenant(&self) -> Self {
        Self {
            tenant: None,
            ..self.clone()
        }
    }

    /// Same collection, reading straight from the store
    pub fn without_cache(&self) -> Self {
        Self {
            cache: None,
            ..self.clone()
        }
    }

    fn conditions(&self) -> ConditionBuilder<'_> {
        ConditionBuilder::new(self.tenant.as_deref())
    }

    fn cache_aside(&self) -> CacheAside<'_> {
        CacheAside::new(self.name(), self.cache.as_deref())
    }

    fn collection(&self) -> &dyn StoreCollection {
        self.shared.collection.as_ref()
    }

    fn hooks(&self) -> &HookRegistry {
        &self.shared.hooks
    }

    /// Internal shape, empty values stripped, tenant stamped
    fn prepare_write(&self, document: Document) -> Document {
        let mut document = document.normalize(IdDirection::ToInternal).strip_empty();
        if let Some(tenant) = self.tenant.as_deref() {
            tenant.stamp(&mut document);
        }
        document
    }

    /// Drop the fields an update may never change
    fn sanitize_patch(&self, mut patch: Document) -> Document {
        patch.remove(ID_FIELD);
        patch.remove(KEY_FIELD);
        patch.remove(TENANT_FIELD);
        if let Some(tenant) = self.tenant.as_deref() {
            for field in tenant.attributes().keys() {
                patch.remove(field);
            }
        }
        patch
    }

    async fn remove_scoped(
        &self,
        filter: Filter,
        scope: RemoveScope,
        category: HookCategory,
        run_pre_hooks: bool,
    ) -> RepositoryResult<DeleteResult> {
        let filter = if run_pre_hooks {
            let narrowed = self
                .hooks()
                .invoke(HookPhase::Pre, &[Delete, category], filter.to_document())
                .await?;
            self.conditions().build(Conditions::from(narrowed))
        } else {
            filter
        };

        let deleted_count = self.collection().remove(&filter, scope).await?;
        self.hooks()
            .invoke(HookPhase::Post, &[Delete, category], filter.to_document())
            .await?;

        Ok(DeleteResult { deleted_count })
    }

    async fn probe(&self, filter: Filter) -> RepositoryResult<bool> {
        let query = Query::new(filter).with_limit(1);
        let mut cursor = self.collection().query(&query).await?;
        Ok(cursor.next().await?.is_some())
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Shorthand for [`find_one`](Self::find_one) on the store key.
    ///
    /// Served from the cache when one is configured.
    #[instrument(skip(self), fields(collection = %self.name()))]
    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<T>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.find_one(Conditions::new().eq(KEY_FIELD, id)).await
    }

    /// First document matching `conditions` within the tenant.
    ///
    /// Served from the cache when one is configured. Cached entries are not
    /// invalidated by writes; use [`without_cache`](Self::without_cache) for
    /// read-after-write.
    #[instrument(skip(self, conditions), fields(collection = %self.name()))]
    pub async fn find_one(&self, conditions: Conditions) -> RepositoryResult<Option<T>> {
        let filter = self.conditions().build(conditions);
        let aside = self.cache_aside();
        let key = aside.key(&json!({ "op": OP_FIND_ONE, "query": &filter }));

        let payload = aside
            .read_through(&key, || async {
                let query = Query::new(filter.clone()).with_limit(1);
                let mut cursor = self.collection().query(&query).await?;
                let Some(found) = cursor.next().await? else {
                    return Ok(None);
                };
                let found = self
                    .hooks()
                    .invoke(
                        HookPhase::Post,
                        &[Find, FindOne],
                        found.normalize(IdDirection::ToExternal),
                    )
                    .await?;
                Ok(Some(found.into_value()))
            })
            .await?;

        Ok(payload.map(serde_json::from_value).transpose()?)
    }

    /// Documents matching the request within the tenant.
    ///
    /// Served from the cache when one is configured, with the same staleness
    /// caveat as [`find_one`](Self::find_one).
    #[instrument(skip(self, request), fields(collection = %self.name()))]
    pub async fn find(&self, request: FindRequest) -> RepositoryResult<Vec<T>> {
        let mut request = request;
        let filter = self
            .conditions()
            .build(std::mem::take(&mut request.conditions));
        let query = request.into_query(filter);
        let aside = self.cache_aside();
        let key = aside.key(&json!({ "op": OP_FIND, "query": &query }));

        let payload = aside
            .read_through(&key, || async {
                let found = self.collection().query(&query).await?.all().await?;
                let found = self
                    .hooks()
                    .invoke_batch(
                        HookPhase::Post,
                        &[Find, FindMany],
                        normalize_batch(found, IdDirection::ToExternal),
                    )
                    .await?;
                debug!(count = found.len(), "Documents loaded");
                Ok(Some(Value::Array(
                    found.into_iter().map(Document::into_value).collect(),
                )))
            })
            .await?;

        match payload {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Documents with the given store keys, in the order of `ids`.
    ///
    /// Unknown keys and keys owned by other tenants are skipped; repeated keys
    /// yield the document once per occurrence. Served from the cache when one
    /// is configured.
    #[instrument(skip(self, ids), fields(collection = %self.name(), ids = ids.len()))]
    pub async fn find_many_by_id<S: AsRef<str>>(&self, ids: &[S]) -> RepositoryResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        let query = Query::new(self.conditions().build(Conditions::new())).with_keys(keys.clone());
        let aside = self.cache_aside();
        let key = aside.key(&json!({ "op": OP_FIND_MANY_BY_ID, "query": &query }));

        let payload = aside
            .read_through(&key, || async {
                let found = self.collection().query(&query).await?.all().await?;
                let by_key: HashMap<String, Document> = found
                    .into_iter()
                    .filter_map(|document| {
                        let key = document.key()?.to_string();
                        Some((key, document))
                    })
                    .collect();
                let ordered = keys
                    .iter()
                    .filter_map(|key| by_key.get(key).cloned())
                    .collect();
                let found = self
                    .hooks()
                    .invoke_batch(
                        HookPhase::Post,
                        &[Find, FindMany],
                        normalize_batch(ordered, IdDirection::ToExternal),
                    )
                    .await?;
                Ok(Some(Value::Array(
                    found.into_iter().map(Document::into_value).collect(),
                )))
            })
            .await?;

        match payload {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Insert a new document stamped with the active tenant
    #[instrument(skip(self, entity), fields(collection = %self.name()))]
    pub async fn create(&self, entity: T) -> RepositoryResult<T> {
        let document = Document::from_serialize(&entity)?;
        self.insert_document(document).await
    }

    /// Insert a relationship between `from` and `to`.
    ///
    /// Only valid on edge collections.
    #[instrument(skip(self, entity), fields(collection = %self.name()))]
    pub async fn create_edge(&self, entity: T, from: &str, to: &str) -> RepositoryResult<T> {
        if self.descriptor().kind() != CollectionKind::Edge {
            return Err(RepositoryError::Configuration(format!(
                "collection '{}' is not an edge collection",
                self.name()
            )));
        }
        let document = Document::from_serialize(&entity)?
            .with(FROM_FIELD, from)
            .with(TO_FIELD, to);
        self.insert_document(document).await
    }

    async fn insert_document(&self, document: Document) -> RepositoryResult<T> {
        let document = self
            .hooks()
            .invoke(HookPhase::Pre, &[Save, Create], document)
            .await?;
        let stored = self.collection().insert(self.prepare_write(document)).await?;
        debug!(key = stored.key().unwrap_or("-"), "Document created");
        self.finish(stored, &[Save, Create]).await
    }

    /// Insert a batch; results follow the input order
    #[instrument(skip(self, entities), fields(collection = %self.name(), count = entities.len()))]
    pub async fn create_many(&self, entities: Vec<T>) -> RepositoryResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let documents = entities
            .iter()
            .map(Document::from_serialize)
            .collect::<Result<Vec<_>, _>>()?;
        let documents = self
            .hooks()
            .invoke_batch(HookPhase::Pre, &[Save, Create], documents)
            .await?;
        let documents = documents
            .into_iter()
            .map(|document| self.prepare_write(document))
            .collect();

        let stored = self.collection().insert_many(documents).await?;
        info!(count = stored.len(), "Documents created");

        let stored = self
            .hooks()
            .invoke_batch(
                HookPhase::Post,
                &[Save, Create],
                normalize_batch(stored, IdDirection::ToExternal),
            )
            .await?;
        stored
            .into_iter()
            .map(|document| Ok(document.deserialize()?))
            .collect()
    }

    /// Replace an existing document of the active tenant.
    ///
    /// Fails with [`RepositoryError::NotFound`] when no such document exists.
    #[instrument(skip(self, entity), fields(collection = %self.name()))]
    pub async fn save(&self, entity: T) -> RepositoryResult<T> {
        let document = Document::from_serialize(&entity)?;
        let mut document = self
            .hooks()
            .invoke(HookPhase::Pre, &[Save], document)
            .await?
            .normalize(IdDirection::ToInternal);

        let key = match document.remove(KEY_FIELD) {
            Some(Value::String(key)) if !key.is_empty() => key,
            _ => return Err(RepositoryError::MissingIdentifier),
        };

        let filter = self.conditions().by_key(&key);
        let mut replaced = self
            .collection()
            .replace(&filter, self.prepare_write(document))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(key.clone()))?;
        replaced.insert(KEY_FIELD, key);

        self.finish(replaced, &[Save]).await
    }

    /// Merge `update` into the document with the given store key
    #[instrument(skip(self, update), fields(collection = %self.name()))]
    pub async fn find_one_by_id_and_update(
        &self,
        id: &str,
        update: Document,
    ) -> RepositoryResult<Option<T>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.find_one_and_update(UpdateRequest::new(
            Conditions::new().eq(KEY_FIELD, id),
            update,
        ))
        .await
    }

    /// Merge `request.update` into the first match and return the result.
    ///
    /// Identifier and tenant fields of the update are ignored. Returns
    /// `Ok(None)` when nothing matches.
    #[instrument(skip(self, request), fields(collection = %self.name()))]
    pub async fn find_one_and_update(&self, request: UpdateRequest) -> RepositoryResult<Option<T>> {
        let filter = self.conditions().build(request.conditions);
        let patch = self
            .hooks()
            .invoke(HookPhase::Pre, &[Update, UpdateOne], request.update)
            .await?;
        let patch = self.sanitize_patch(patch);

        match self.collection().update(&filter, patch).await? {
            Some(updated) => Ok(Some(self.finish(updated, &[Update, UpdateOne]).await?)),
            None => {
                debug!("No document matched the update");
                Ok(None)
            }
        }
    }

    async fn finish(&self, stored: Document, categories: &[HookCategory]) -> RepositoryResult<T> {
        let document = self
            .hooks()
            .invoke(
                HookPhase::Post,
                categories,
                stored.normalize(IdDirection::ToExternal),
            )
            .await?;
        Ok(document.deserialize()?)
    }

    /// Delete by store key; PRE delete hooks are not run
    #[instrument(skip(self), fields(collection = %self.name()))]
    pub async fn delete_one_by_id(&self, id: &str) -> RepositoryResult<DeleteResult> {
        if id.is_empty() {
            return Ok(DeleteResult { deleted_count: 0 });
        }
        let filter = self.conditions().by_key(id);
        self.remove_scoped(filter, RemoveScope::One, DeleteOne, false)
            .await
    }

    #[instrument(skip(self, conditions), fields(collection = %self.name()))]
    pub async fn delete_one(&self, conditions: Conditions) -> RepositoryResult<DeleteResult> {
        let filter = self.conditions().build(conditions);
        self.remove_scoped(filter, RemoveScope::One, DeleteOne, true)
            .await
    }

    /// Delete every match within the tenant; zero matches is not an error
    #[instrument(skip(self, conditions), fields(collection = %self.name()))]
    pub async fn delete_many(&self, conditions: Conditions) -> RepositoryResult<DeleteResult> {
        let filter = self.conditions().build(conditions);
        let result = self
            .remove_scoped(filter, RemoveScope::Many, DeleteMany, true)
            .await?;
        info!(deleted = result.deleted_count, "Documents deleted");
        Ok(result)
    }

    /// Whether any document of the tenant matches. Never cached.
    #[instrument(skip(self, conditions), fields(collection = %self.name()))]
    pub async fn exist(&self, conditions: Conditions) -> RepositoryResult<bool> {
        self.probe(self.conditions().build(conditions)).await
    }

    /// Whether the tenant owns a document with this store key. Never cached.
    #[instrument(skip(self), fields(collection = %self.name()))]
    pub async fn document_exist(&self, key: &str) -> RepositoryResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        self.probe(self.conditions().by_key(key)).await
    }

    #[instrument(skip(self, conditions), fields(collection = %self.name()))]
    pub async fn count(&self, conditions: Conditions) -> RepositoryResult<u64> {
        let filter = self.conditions().build(conditions);
        Ok(self.collection().count(&filter).await?)
    }
}
