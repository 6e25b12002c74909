//! MongoDB test infrastructure
//!
//! Provides a `TestMongo` helper that starts a MongoDB container and hands
//! out a database unique to the instance.

use mongodb::{Client, Database};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mongo::Mongo;
use uuid::Uuid;

/// Test MongoDB wrapper
///
/// The container is stopped and removed when this struct is dropped.
///
/// ```no_run
/// use test_utils::TestMongo;
///
/// # async fn example() {
/// let mongo = TestMongo::new().await;
/// let database = mongo.database();
/// // Build a store over `database`
/// # }
/// ```
pub struct TestMongo {
    _container: ContainerAsync<Mongo>,
    client: Client,
    database_name: String,
    url: String,
}

impl TestMongo {
    /// Start MongoDB 8 and connect to a freshly named database
    pub async fn new() -> Self {
        let container = Mongo::default()
            .with_tag("8")
            .start()
            .await
            .expect("MongoDB container should start");

        let host_port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("MongoDB port should be mapped");

        let url = format!("mongodb://127.0.0.1:{host_port}");
        let client = Client::with_uri_str(&url)
            .await
            .expect("MongoDB URL should parse");

        let database_name = format!("test_{}", Uuid::new_v4().simple());
        tracing::info!(
            port = host_port,
            database = %database_name,
            "Test MongoDB ready (MongoDB 8)"
        );

        Self {
            _container: container,
            client,
            database_name,
            url,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.database_name)
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{Document, doc};

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_mongo_insert_find() {
        let mongo = TestMongo::new().await;
        let collection = mongo.database().collection::<Document>("smoke");

        collection.insert_one(doc! { "_id": "k1", "n": 1 }).await.unwrap();
        let found = collection.find_one(doc! { "_id": "k1" }).await.unwrap();

        assert_eq!(found.unwrap().get_i32("n").unwrap(), 1);
    }
}
