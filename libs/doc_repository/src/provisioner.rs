//! Idempotent collection and index provisioning

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::descriptor::{CollectionDescriptor, IndexDefinition, IndexType};
use crate::error::{RepositoryError, RepositoryResult, StoreError};
use crate::store::{DocumentStore, IndexOutcome, StoreCollection};

/// Ensure the descriptor's collection and indexes exist and return a handle.
///
/// Safe to run repeatedly and from concurrent repository instances: a
/// collection created by someone else in the meantime is accepted, and
/// indexes that already match are left alone.
#[instrument(
    skip(store, descriptor),
    fields(collection = %descriptor.name(), kind = %descriptor.kind())
)]
pub async fn ensure_collection(
    store: &dyn DocumentStore,
    descriptor: &CollectionDescriptor,
) -> RepositoryResult<Arc<dyn StoreCollection>> {
    descriptor.validate()?;
    let name = descriptor.name();

    let exists = store
        .collection_exists(name)
        .await
        .map_err(|e| RepositoryError::provisioning(name, e))?;

    if !exists {
        match store.create_collection(name, descriptor.kind()).await {
            Ok(()) => info!("Collection created"),
            Err(StoreError::CollectionExists(_)) => {
                debug!("Collection created concurrently, continuing")
            }
            Err(e) => return Err(RepositoryError::provisioning(name, e)),
        }
    }

    let collection = store
        .collection(name, descriptor.kind())
        .await
        .map_err(|e| RepositoryError::provisioning(name, e))?;

    for index in descriptor.indexes() {
        ensure_index(collection.as_ref(), descriptor, index).await?;
    }

    info!(indexes = descriptor.indexes().len(), "Collection ready");
    Ok(collection)
}

async fn ensure_index(
    collection: &dyn StoreCollection,
    descriptor: &CollectionDescriptor,
    index: &IndexDefinition,
) -> RepositoryResult<()> {
    let index_name = index.resolved_name(descriptor.name());

    match index.index_type() {
        IndexType::Hash
        | IndexType::Fulltext
        | IndexType::Geo
        | IndexType::Persistent
        | IndexType::Skiplist => {}
        IndexType::Ttl => return Err(RepositoryError::UnsupportedIndexType(IndexType::Ttl)),
    }

    match collection.create_index(index, &index_name).await {
        Ok(IndexOutcome::Created) => {
            info!(index = %index_name, index_type = %index.index_type(), "Index created");
            Ok(())
        }
        Ok(IndexOutcome::Unchanged) => {
            debug!(index = %index_name, "Index already present");
            Ok(())
        }
        Err(StoreError::IndexConflict { name, details }) if descriptor.overwrites_on_conflict() => {
            warn!(
                index = %index_name,
                conflicting = %name,
                %details,
                "Index definition conflict, recreating"
            );
            collection
                .drop_index(&name)
                .await
                .map_err(|e| RepositoryError::provisioning(descriptor.name(), e))?;
            collection
                .create_index(index, &index_name)
                .await
                .map_err(|e| RepositoryError::provisioning(descriptor.name(), e))?;
            info!(index = %index_name, "Index recreated");
            Ok(())
        }
        Err(e) => Err(RepositoryError::provisioning(descriptor.name(), e)),
    }
}
