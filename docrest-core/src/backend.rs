//! Storage backend abstraction for the document store.
//!
//! A backend executes raw, filter-addressed collection operations. Everything above it (the
//! upsert decision, patch computation, per-pair batching) lives in the gateway and is shared
//! by every backend.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docrest::backend::{FieldUpdate, StoreBackend};
//! use docrest::query::Filter;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_one(doc! { "id": "u1", "name": "Ann" }, "users").await?;
//! backend
//!     .update_one(&Filter::from(doc! { "id": "u1" }), FieldUpdate::set(doc! { "name": "Bea" }), "users")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::Any, fmt::Debug};

use crate::{change::ChangeStream, error::DocumentStoreResult, query::Filter};

/// A field-level write: fields to set and fields to remove.
///
/// Keys in both halves may be dotted paths into sub-documents. Fields not mentioned are left
/// as they are. This is the only shape of write the gateway ever issues to an existing
/// document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    /// Fields to create or overwrite.
    pub set: Document,
    /// Fields to remove. Removing an absent field is a no-op.
    pub unset: Vec<String>,
}

impl FieldUpdate {
    /// An update that only sets fields.
    pub fn set(fields: Document) -> Self {
        Self { set: fields, unset: Vec::new() }
    }

    /// Returns `true` if the update would not change any document.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Renders the update as `$set`/`$unset` operators, omitting empty ones.
    pub fn to_update_document(&self) -> Document {
        let mut update = Document::new();

        if !self.set.is_empty() {
            update.insert("$set", self.set.clone());
        }

        if !self.unset.is_empty() {
            update.insert(
                "$unset",
                self.unset
                    .iter()
                    .map(|field| (field.clone(), Bson::String(String::new())))
                    .collect::<Document>(),
            );
        }

        update
    }
}

impl From<Document> for FieldUpdate {
    fn from(fields: Document) -> Self {
        FieldUpdate::set(fields)
    }
}

/// Abstract interface for document storage backends.
///
/// Implementers provide the raw collection operations of one store. Documents are addressed
/// by [`Filter`]s and never by a separate id argument; the identity field `_id` is assigned by
/// the backend on insert when the caller leaves it out.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Individual operations may be atomic, but nothing is promised about a
/// sequence of them.
///
/// # Error Handling
///
/// Store failures are returned as-is; backends do not retry.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`, or `None` if nothing matches.
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Returns every document matching `filter`. No match is an empty vector.
    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Inserts one document and returns its identity.
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;

    /// Inserts documents in order and returns their identities in the same order.
    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Applies a field-level update to the first document matching `filter`.
    ///
    /// # Returns
    ///
    /// Returns `true` if a document matched.
    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool>;

    /// Deletes the first document matching `filter` and returns the number deleted.
    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter` and returns the number deleted.
    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64>;

    /// Opens a change feed on a collection, shaped by an aggregation pipeline.
    ///
    /// Update events always carry the full post-mutation document. The subscription is
    /// released when the returned stream is closed or dropped.
    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        B::find_one(*self, filter, collection).await
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        B::find_many(*self, filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        B::insert_one(*self, document, collection).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        B::insert_many(*self, documents, collection).await
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        B::update_one(*self, filter, update, collection).await
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        B::delete_one(*self, filter, collection).await
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        B::delete_many(*self, filter, collection).await
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        B::watch(*self, pipeline, collection).await
    }
}

#[async_trait]
impl<B> StoreBackend for &mut B
where
    B: StoreBackend,
{
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        B::find_one(&**self, filter, collection).await
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        B::find_many(&**self, filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        B::insert_one(&**self, document, collection).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        B::insert_many(&**self, documents, collection).await
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        B::update_one(&**self, filter, update, collection).await
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        B::delete_one(&**self, filter, collection).await
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        B::delete_many(&**self, filter, collection).await
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        B::watch(&**self, pipeline, collection).await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;
    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool>;
    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64>;
    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64>;
    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, filter, collection).await
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find_many(self, filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        StoreBackend::insert_one(self, document, collection).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::insert_many(self, documents, collection).await
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        StoreBackend::update_one(self, filter, update, collection).await
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_one(self, filter, collection).await
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_many(self, filter, collection).await
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        StoreBackend::watch(self, pipeline, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// Lets the gateway and the upsert engine stay generic over `B: StoreBackend + ?Sized`
// while still accepting a boxed backend.
#[async_trait]
impl StoreBackend for dyn DynStoreBackend {
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        DynStoreBackend::find_one(self, filter, collection).await
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        DynStoreBackend::find_many(self, filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        DynStoreBackend::insert_one(self, document, collection).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        DynStoreBackend::insert_many(self, documents, collection).await
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        DynStoreBackend::update_one(self, filter, update, collection).await
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        DynStoreBackend::delete_one(self, filter, collection).await
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        DynStoreBackend::delete_many(self, filter, collection).await
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        DynStoreBackend::watch(self, pipeline, collection).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
