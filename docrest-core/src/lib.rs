//! Filter-based RESTful semantics over JSON document stores.
//!
//! This crate is the core of the docrest project and provides:
//!
//! - **Document helpers** ([`document`]) - Identity handling, typed conversions, dotted paths
//! - **Filters** ([`query`]) - Raw predicate documents and a typed expression builder
//! - **Patch algebras** ([`patch`]) - Merge patch and JSON Patch over BSON value trees
//! - **Upsert engine** ([`upsert`]) - Check-then-act insert-or-update and patch write-back
//! - **Collection gateway** ([`collection`]) - Per-collection get/put/post/patch/delete/watch
//! - **Change feeds** ([`change`]) - Change events and closable subscriptions
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Document store** ([`store`]) - Static and dynamic store handles
//! - **Configuration** ([`config`]) - Timeouts for network backends
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{patch::JsonPatch, store::DocumentStore};
//! use bson::doc;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection("users");
//!
//! users.put_one(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Ann" }).await?;
//!
//! let patch = JsonPatch::from_slice(br#"[{"op": "replace", "path": "/name", "value": "Cid"}]"#)?;
//! users.json_patch(doc! { "id": "u1" }, &patch).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrest_core;

pub mod backend;
pub mod change;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod patch;
pub mod query;
pub mod store;
pub mod upsert;
pub mod value;
