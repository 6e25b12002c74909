//! Contact book scenario run against any store

use std::sync::Arc;

use doc_repository::hooks::{Audit, Validate};
use doc_repository::{
    Cache, CollectionDescriptor, Conditions, Document, DocumentStore, FindRequest, HookCategory,
    HookRegistry, IndexDefinition, Repository, RepositoryResult, RepositorySettings, SortField,
    TenantContext,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate as _;

pub const COLLECTION: &str = "contacts";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Contact {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            tenant_id: None,
            name: name.into(),
            email: email.into(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

pub fn descriptor() -> CollectionDescriptor {
    CollectionDescriptor::new(COLLECTION)
        .with_index(IndexDefinition::hash(["tenantId", "email"]).unique(true))
        .with_index(IndexDefinition::persistent(["tenantId", "name"]))
}

fn hooks() -> HookRegistry {
    HookRegistry::builder()
        .with_timestamps()
        .pre(HookCategory::Create, Validate::<Contact>::new())
        .pre(HookCategory::Save, Validate::<Contact>::new())
        .post(HookCategory::DeleteOne, Audit::new("contact removed"))
        .post(HookCategory::DeleteMany, Audit::new("contacts purged"))
        .build()
}

/// Provision the collection and bind the default tenant
pub async fn repository(
    store: &dyn DocumentStore,
    cache: Option<Arc<dyn Cache>>,
    settings: &RepositorySettings,
) -> RepositoryResult<Repository<Contact>> {
    let mut builder = Repository::builder(descriptor())
        .hooks(hooks())
        .with_settings(settings);
    if let Some(cache) = cache {
        builder = builder.cache(cache);
    }
    builder.build(store).await
}

/// What the walkthrough observed
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub created: usize,
    pub visible_to_other_tenant: usize,
    pub renamed: Option<String>,
    pub remaining: u64,
}

/// Create, read, update and delete one tenant's contacts, checking that a
/// second tenant sees none of them
#[instrument(skip_all, fields(collection = repo.name()))]
pub async fn run(repo: &Repository<Contact>, other_tenant: &str) -> RepositoryResult<Report> {
    let created = repo
        .create_many(vec![
            Contact::new("Ada", "ada@example.com"),
            Contact::new("Grace", "grace@example.com"),
            Contact::new("Edsger", "edsger@example.com"),
        ])
        .await?;
    info!(count = created.len(), "Contacts created");

    let ids: Vec<&str> = created.iter().filter_map(|c| c.id.as_deref()).collect();
    let fetched = repo.find_many_by_id(&ids).await?;
    info!(count = fetched.len(), "Fetched contacts by id");

    let other = repo.for_tenant(TenantContext::new(other_tenant));
    let visible_to_other_tenant = other.find(FindRequest::default()).await?.len();

    let renamed = match created.first().and_then(|c| c.id.as_deref()) {
        Some(id) => repo
            .find_one_by_id_and_update(id, Document::new().with("name", "Ada Lovelace"))
            .await?
            .map(|contact| contact.name),
        None => None,
    };

    let sorted = repo
        .without_cache()
        .find(FindRequest::default().sort_by(SortField::asc("name")).limit(2))
        .await?;
    info!(
        first = sorted.first().map(|c| c.name.as_str()).unwrap_or("-"),
        "Sorted listing"
    );

    repo.delete_one(Conditions::new().eq("email", "edsger@example.com"))
        .await?;
    let remaining = repo.count(Conditions::new()).await?;

    repo.delete_many(Conditions::new()).await?;

    Ok(Report {
        created: created.len(),
        visible_to_other_tenant,
        renamed,
        remaining,
    })
}
