//! Connectors for the backends behind the document repository
//!
//! # Features
//!
//! - `mongodb` (default) - `mongodb::connect` returning a pinged `Database`
//! - `redis` (default) - `redis::connect` returning a `ConnectionManager`
//! - `config` - `MongoConfig` / `RedisConfig` loaded with `core_config::FromEnv`
//!
//! # Example
//!
//! ```ignore
//! use database::common::RetryConfig;
//! use database::mongodb::{MongoConfig, connect_with_retry};
//!
//! let config = MongoConfig::new("mongodb://localhost:27017", "app");
//! let db = connect_with_retry(&config, RetryConfig::new().with_max_retries(5)).await?;
//! let status = database::mongodb::check_health(&db).await;
//! ```

pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult, HealthStatus, RetryConfig};
