//! Filter-based RESTful semantics over JSON document stores.
//!
//! This crate is the primary entry point for users of docrest. It re-exports the core types
//! and gives access to the storage backends.
//!
//! # Features
//!
//! - **Filter-addressed operations** - get/put/post/delete by predicate instead of by id
//! - **Upserts** - insert-if-absent, overlay-if-present with the previous existence reported
//! - **Patches** - RFC 7396 merge patch and RFC 6902 JSON Patch, on a document or one field
//! - **Change feeds** - Live mutation events shaped by an aggregation pipeline
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docrest::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
//!     let users = store.collection("users");
//!
//!     // Nothing matches yet, so the document is inserted
//!     let existed = users
//!         .put_one(
//!             doc! { "id": "u1" },
//!             doc! { "id": "u1", "name": "Ann", "age": 30, "profile": {} },
//!         )
//!         .await
//!         .unwrap();
//!     assert!(!existed);
//!
//!     // Drop the age, keep everything else
//!     users
//!         .merge_patch(doc! { "id": "u1" }, &MergePatch::new(doc! { "age": null }))
//!         .await
//!         .unwrap();
//!
//!     // Edit a single field with JSON Patch
//!     let patch = JsonPatch::from_slice(br#"[{"op": "add", "path": "/city", "value": "Oslo"}]"#).unwrap();
//!     users.json_patch_field(doc! { "id": "u1" }, &patch, "profile").await.unwrap();
//!
//!     store.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A `DocumentStore` can be converted into a dynamically dispatched store with `into_dyn`,
//! for when the backend is picked at runtime. Its collections offer the same operations.
//!
//! ```ignore
//! use docrest::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new()).into_dyn();
//! let users = store.collection("users");
//! let everyone = users.get_many(Filter::all()).await?;
//!
//! store.shutdown().await?;
//! ```
//!
//! # Change Feeds
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut events = users
//!     .watch(vec![doc! { "$match": { "operationType": { "$in": ["insert", "update"] } } }])
//!     .await?;
//!
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?.full_document);
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docrest_core::{
    backend, change, collection, config, document, error, patch, query, store, upsert, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrest_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrest_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
