use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::RetryConfig;
use database::mongodb::MongoConfig;
use doc_repository::{Cache, DocumentStore, MemoryCache, MemoryStore, MongoStore, RedisCache};
use eyre::WrapErr;
use tracing::{info, warn};

mod config;
mod contacts;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a tenant-scoped contact book against the document repository"
)]
struct Args {
    /// Tenant the other tenant's view is checked against
    #[arg(long, default_value = "globex")]
    other_tenant: String,

    /// Use in-process store and cache instead of MongoDB and Redis
    #[arg(long)]
    in_memory: bool,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let args = Args::parse();
    let config = Config::from_env(args.in_memory)?;
    init_tracing(&config.environment);

    let mut settings = config.repository.clone();
    if settings.tenant_id.is_none() {
        warn!("DOC_REPOSITORY_TENANT_ID not set, using 'acme'");
        settings.tenant_id = Some("acme".to_string());
    }

    let (store, cache) = match &config.mongodb {
        Some(mongodb) => connect(mongodb, &config, &settings, args.max_retries).await?,
        None => {
            let cache: Option<Arc<dyn Cache>> = if settings.cache_enabled {
                Some(Arc::new(MemoryCache::new()))
            } else {
                None
            };
            (Box::new(MemoryStore::new()) as Box<dyn DocumentStore>, cache)
        }
    };

    let repo = contacts::repository(store.as_ref(), cache, &settings)
        .await
        .wrap_err("Failed to provision contacts collection")?;

    let report = contacts::run(&repo, &args.other_tenant).await?;
    info!(?report, "Walkthrough complete");
    Ok(())
}

async fn connect(
    mongodb: &MongoConfig,
    config: &Config,
    settings: &doc_repository::RepositorySettings,
    max_retries: u32,
) -> eyre::Result<(Box<dyn DocumentStore>, Option<Arc<dyn Cache>>)> {
    let retry = RetryConfig::new()
        .with_max_retries(max_retries)
        .with_initial_delay(Duration::from_millis(250));

    info!(database = %mongodb.database, "Connecting to MongoDB");
    let db = database::mongodb::connect_with_retry(mongodb, retry.clone())
        .await
        .wrap_err("MongoDB unavailable")?;
    let mongo_health = database::mongodb::check_health(&db).await;
    info!(
        healthy = mongo_health.healthy,
        latency = ?mongo_health.latency,
        "MongoDB health"
    );

    let cache: Option<Arc<dyn Cache>> = match &config.redis {
        Some(redis_config) => {
            let manager = database::redis::connect_with_retry(redis_config, retry)
                .await
                .wrap_err("Redis unavailable")?;
            let redis_health = database::redis::check_health(&manager).await;
            info!(
                healthy = redis_health.healthy,
                latency = ?redis_health.latency,
                "Redis health"
            );

            let mut cache = RedisCache::new(manager);
            if let Some(prefix) = &settings.cache_prefix {
                cache = cache.with_prefix(prefix.clone());
            }
            if let Some(ttl) = settings.cache_ttl {
                cache = cache.with_ttl(ttl);
            }
            Some(Arc::new(cache))
        }
        None => None,
    };

    Ok((Box::new(MongoStore::new(db)), cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["repository-demo"]);
        assert_eq!(args.other_tenant, "globex");
        assert!(!args.in_memory);
        assert_eq!(args.max_retries, 5);
    }

    #[test]
    fn test_args_in_memory() {
        let args =
            Args::parse_from(["repository-demo", "--in-memory", "--other-tenant", "initech"]);
        assert!(args.in_memory);
        assert_eq!(args.other_tenant, "initech");
    }
}
