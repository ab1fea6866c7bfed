//! MongoDB backend implementation for docrest.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on top of
//! the official async driver. Filters, field updates and change stream pipelines are passed
//! to the server untouched.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrest = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder parses the connection string, applies the connect timeout to server selection
//! and connection setup, and verifies the deployment with a `ping` before returning. Change
//! streams require a replica set or sharded cluster.
//!
//! # Example
//!
//! ```ignore
//! use docrest::{backend::StoreBackendBuilder, config::TimeoutConfig, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .timeouts(TimeoutConfig::default())
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrest_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
