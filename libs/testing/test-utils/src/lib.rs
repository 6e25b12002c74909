//! Shared test utilities for repository testing
//!
//! - `TestMongo`: MongoDB container with a fresh database (feature: "mongodb")
//! - `TestRedis`: Redis container with a connection manager (feature: "redis")
//! - `TestDataBuilder`: deterministic tenant ids and names (always available)
//! - `assertions`: assertion helpers (always available)
//!
//! Container helpers need a running Docker daemon; tests using them are
//! marked `#[ignore]` and run with `cargo test -- --ignored`.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["mongodb", "redis"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! #[ignore]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_mongo_test");
//!
//!     let collection = builder.collection("people");
//!     let tenant = builder.tenant_id("acme");
//!     // mongo.database() ...
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "mongodb")]
pub use mongo::TestMongo;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for test data with deterministic randomization
///
/// The same test name always yields the same tenants and names, while
/// different tests never collide in a shared database.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test name
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_person");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic UUID derived from the seed and a label
    pub fn uuid(&self, label: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}:{}", self.seed, label).as_bytes())
    }

    /// Tenant id unique to this test
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_ne!(builder.tenant_id("a"), builder.tenant_id("b"));
    /// ```
    pub fn tenant_id(&self, label: &str) -> String {
        format!("tenant-{}", self.uuid(label).simple())
    }

    /// Collection name unique to this test
    pub fn collection(&self, prefix: &str) -> String {
        format!("{}_{:x}", prefix, self.seed)
    }

    /// `test-{prefix}-{seed}-{suffix}`
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some and return it
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that `actual` lists exactly `expected`, in order
    pub fn assert_same_order<T>(actual: &[T], expected: &[T], context: &str)
    where
        T: PartialEq + std::fmt::Debug,
    {
        assert_eq!(actual, expected, "{}: order differs", context);
    }
}
