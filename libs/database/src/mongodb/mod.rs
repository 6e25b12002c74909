//! MongoDB connection management

mod config;
mod connector;
mod health;

pub use config::MongoConfig;
pub use connector::{client_options, connect, connect_with_retry};
pub use health::{check_health, ping};

pub use mongodb::{Client, Database};
