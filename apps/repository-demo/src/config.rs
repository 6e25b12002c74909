use core_config::{Environment, FromEnv};
use database::mongodb::MongoConfig;
use database::redis::RedisConfig;
use doc_repository::RepositorySettings;

/// Everything the demo reads from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    /// `None` when running in memory
    pub mongodb: Option<MongoConfig>,
    /// `None` when running in memory or with caching disabled
    pub redis: Option<RedisConfig>,
    pub repository: RepositorySettings,
}

impl Config {
    /// Backend settings are only read when `in_memory` is false
    pub fn from_env(in_memory: bool) -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let repository = RepositorySettings::from_env()?;
        let mongodb = if in_memory {
            None
        } else {
            Some(MongoConfig::from_env()?)
        };
        let redis = if repository.cache_enabled && !in_memory {
            Some(RedisConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            environment,
            mongodb,
            redis,
            repository,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_skipped_when_cache_disabled() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017")),
                ("MONGODB_DATABASE", Some("demo")),
                ("DOC_REPOSITORY_CACHE_ENABLED", Some("false")),
                ("REDIS_URL", None),
                ("REDIS_HOST", None),
            ],
            || {
                let config = Config::from_env(false).unwrap();
                assert!(config.redis.is_none());
                assert_eq!(config.mongodb.map(|m| m.database).as_deref(), Some("demo"));
            },
        );
    }

    #[test]
    fn test_redis_required_when_cache_enabled() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017")),
                ("MONGODB_DATABASE", Some("demo")),
                ("DOC_REPOSITORY_CACHE_ENABLED", None),
                ("REDIS_URL", None),
                ("REDIS_HOST", None),
            ],
            || assert!(Config::from_env(false).is_err()),
        );
    }

    #[test]
    fn test_in_memory_needs_no_backends() {
        temp_env::with_vars_unset(["MONGODB_URL", "MONGO_URL", "REDIS_URL", "REDIS_HOST"], || {
            let config = Config::from_env(true).unwrap();
            assert!(config.mongodb.is_none());
            assert!(config.redis.is_none());
        });
    }
}
