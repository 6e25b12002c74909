//! Repository settings loaded from the environment

use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_parse};

use crate::repository::RepositoryBuilder;
use crate::tenant::TenantContext;

/// Tunables shared by the repositories of one service
///
/// Environment variables:
/// - `DOC_REPOSITORY_CACHE_ENABLED` (default: `true`)
/// - `DOC_REPOSITORY_CACHE_PREFIX` (optional)
/// - `DOC_REPOSITORY_CACHE_TTL_SECS` (optional, entries never expire when unset)
/// - `DOC_REPOSITORY_OVERWRITE_INDEXES` (default: `false`)
/// - `DOC_REPOSITORY_TENANT_ID` (optional) - default tenant for new repositories
#[derive(Clone, Debug, PartialEq)]
pub struct RepositorySettings {
    pub cache_enabled: bool,
    pub cache_prefix: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub overwrite_indexes: bool,
    pub tenant_id: Option<String>,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_prefix: None,
            cache_ttl: None,
            overwrite_indexes: false,
            tenant_id: None,
        }
    }
}

impl FromEnv for RepositorySettings {
    fn from_env() -> Result<Self, ConfigError> {
        let cache_ttl = match env_optional("DOC_REPOSITORY_CACHE_TTL_SECS") {
            Some(_) => Some(Duration::from_secs(env_parse(
                "DOC_REPOSITORY_CACHE_TTL_SECS",
                0u64,
            )?)),
            None => None,
        };

        Ok(Self {
            cache_enabled: env_flag("DOC_REPOSITORY_CACHE_ENABLED", true)?,
            cache_prefix: env_optional("DOC_REPOSITORY_CACHE_PREFIX"),
            cache_ttl,
            overwrite_indexes: env_flag("DOC_REPOSITORY_OVERWRITE_INDEXES", false)?,
            tenant_id: env_optional("DOC_REPOSITORY_TENANT_ID"),
        })
    }
}

impl<T> RepositoryBuilder<T> {
    /// Apply index overwrite policy and default tenant.
    ///
    /// Cache settings are applied by whoever constructs the cache.
    pub fn with_settings(mut self, settings: &RepositorySettings) -> Self {
        let descriptor = self.descriptor_mut();
        *descriptor = descriptor
            .clone()
            .overwrite_on_conflict(settings.overwrite_indexes);
        match &settings.tenant_id {
            Some(tenant_id) => self.tenant(TenantContext::new(tenant_id.clone())),
            None => self,
        }
    }
}
