//! The per-collection gateway.
//!
//! A [`Collection`] binds a backend to one collection name and exposes filter-addressed
//! RESTful operations on top of the raw backend calls:
//!
//! | Operation | Meaning |
//! |---|---|
//! | `get_one` / `get_many` | read by filter |
//! | `put_one` / `post_one` | insert if absent, otherwise overlay fields |
//! | `put_one_if_absent` | insert if absent, otherwise leave the match alone |
//! | `put_many` | `put_one` pairwise over filters and documents |
//! | `post_many` | plain bulk insert |
//! | `merge_patch` / `json_patch` | patch the whole matching document |
//! | `json_patch_field` / `merge_patch_field` | patch one field of the matching document |
//! | `delete_one` / `delete_many` | delete by filter |
//! | `watch` | subscribe to the collection's change feed |
//!
//! # Example
//!
//! ```ignore
//! use docrest::prelude::*;
//! use bson::doc;
//!
//! let users = store.collection("users");
//!
//! let existed = users.put_one(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Ann" }).await?;
//! assert!(!existed);
//!
//! users.merge_patch(doc! { "id": "u1" }, &MergePatch::new(doc! { "age": null })).await?;
//! ```
//!
//! Upserts and patches are check-then-act: the existence read and the write are separate
//! round-trips, see [`upsert`](crate::upsert).

use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    change::ChangeStream,
    document::from_document,
    error::{DocumentStoreError, DocumentStoreResult},
    patch::{JsonPatch, MergePatch, PatchAlgebra, PatchScope},
    query::Filter,
    upsert::{ExistingPolicy, patch_one, upsert_one},
};

/// A collection bound to a storage backend.
///
/// Holds no state beyond the collection name and the backend reference, so it is cheap to
/// create one per call site.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend + ?Sized> {
    name: String,
    backend: &'a B,
}

/// A collection bound to a dynamically dispatched backend.
pub type DynCollection<'a> = Collection<'a, dyn DynStoreBackend>;

impl<'a, B: StoreBackend + ?Sized> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first document matching `filter`.
    ///
    /// A missing document is `Ok(None)`, not an error.
    pub async fn get_one(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .find_one(&filter.into(), &self.name)
            .await
    }

    /// Returns the first document matching `filter`, deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Decode`] if the document does not fit `T`.
    pub async fn get_one_as<T>(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get_one(filter)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Returns every document matching `filter`; an empty vector when nothing matches.
    pub async fn get_many(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .find_many(&filter.into(), &self.name)
            .await
    }

    /// Returns every document matching `filter`, deserialized into `T`.
    pub async fn get_many_as<T>(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.get_many(filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Inserts one document and returns its identity.
    pub async fn insert_one(&self, document: Document) -> DocumentStoreResult<Bson> {
        self.backend
            .insert_one(document, &self.name)
            .await
    }

    /// Inserts documents in order and returns their identities.
    pub async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .insert_many(documents, &self.name)
            .await
    }

    /// Deletes the first document matching `filter`. Zero matches is not an error.
    pub async fn delete_one(&self, filter: impl Into<Filter>) -> DocumentStoreResult<u64> {
        self.backend
            .delete_one(&filter.into(), &self.name)
            .await
    }

    /// Deletes every document matching `filter`. Zero matches is not an error.
    pub async fn delete_many(&self, filter: impl Into<Filter>) -> DocumentStoreResult<u64> {
        self.backend
            .delete_many(&filter.into(), &self.name)
            .await
    }

    /// Inserts `document` if nothing matches `filter`, otherwise sets each of its fields on
    /// the match. Fields of the match that `document` does not mention are kept.
    ///
    /// # Returns
    ///
    /// Returns `true` if a document already matched, `false` if `document` was inserted.
    pub async fn put_one(
        &self,
        filter: impl Into<Filter>,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        upsert_one(
            self.backend,
            &self.name,
            &filter.into(),
            document,
            ExistingPolicy::Overlay,
        )
        .await
    }

    /// Inserts `document` if nothing matches `filter`; an existing match is never modified.
    ///
    /// # Returns
    ///
    /// Returns `true` if a document already matched, `false` if `document` was inserted.
    pub async fn put_one_if_absent(
        &self,
        filter: impl Into<Filter>,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        upsert_one(
            self.backend,
            &self.name,
            &filter.into(),
            document,
            ExistingPolicy::KeepExisting,
        )
        .await
    }

    /// Same as [`Collection::put_one`].
    pub async fn post_one(
        &self,
        filter: impl Into<Filter>,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        self.put_one(filter, document).await
    }

    /// Runs [`Collection::put_one`] for each `(filter, document)` pair, in order.
    ///
    /// Pairs are independent: an error stops the batch, but pairs already written stay
    /// written.
    ///
    /// # Returns
    ///
    /// One outcome per pair, `true` where a document already matched.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] before touching the store if the two
    /// vectors differ in length.
    pub async fn put_many(
        &self,
        filters: Vec<Filter>,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Vec<bool>> {
        if filters.len() != documents.len() {
            return Err(DocumentStoreError::InvalidArgument(format!(
                "put_many got {} filters for {} documents",
                filters.len(),
                documents.len()
            )));
        }

        let mut outcomes = Vec::with_capacity(filters.len());

        for (filter, document) in filters.into_iter().zip(documents) {
            outcomes.push(
                upsert_one(
                    self.backend,
                    &self.name,
                    &filter,
                    document,
                    ExistingPolicy::Overlay,
                )
                .await?,
            );
        }

        Ok(outcomes)
    }

    /// Like [`Collection::put_many`], but reports only the outcome of the last pair.
    ///
    /// Returns `false` for empty input.
    pub async fn put_many_last_outcome(
        &self,
        filters: Vec<Filter>,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<bool> {
        Ok(self
            .put_many(filters, documents)
            .await?
            .last()
            .copied()
            .unwrap_or(false))
    }

    /// Inserts documents without any existence check.
    pub async fn post_many(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Bson>> {
        self.insert_many(documents).await
    }

    /// Applies `patch` to the document matching `filter` within `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if nothing matches, or
    /// [`DocumentStoreError::Patch`] if the patch cannot be applied. Neither writes anything.
    pub async fn patch_one(
        &self,
        filter: impl Into<Filter>,
        patch: &dyn PatchAlgebra,
        scope: PatchScope,
    ) -> DocumentStoreResult<bool> {
        patch_one(self.backend, &self.name, &filter.into(), patch, &scope).await
    }

    /// Merge-patches the whole document matching `filter`. Keys set to `null` are removed.
    pub async fn merge_patch(
        &self,
        filter: impl Into<Filter>,
        patch: &MergePatch,
    ) -> DocumentStoreResult<bool> {
        self.patch_one(filter, patch, PatchScope::Root).await
    }

    /// Merge-patches the value of one top-level field of the matching document.
    pub async fn merge_patch_field(
        &self,
        filter: impl Into<Filter>,
        patch: &MergePatch,
        field: &str,
    ) -> DocumentStoreResult<bool> {
        self.patch_one(filter, patch, PatchScope::field(field))
            .await
    }

    /// Applies a JSON Patch to the whole document matching `filter`.
    pub async fn json_patch(
        &self,
        filter: impl Into<Filter>,
        patch: &JsonPatch,
    ) -> DocumentStoreResult<bool> {
        self.patch_one(filter, patch, PatchScope::Root).await
    }

    /// Applies a JSON Patch to the value of one top-level field of the matching document.
    ///
    /// Pointers are relative to the field value, so `/city` addresses `profile.city` when
    /// `field` is `"profile"`. A missing field is patched as `null`. Sibling fields are never
    /// written.
    pub async fn json_patch_field(
        &self,
        filter: impl Into<Filter>,
        patch: &JsonPatch,
        field: &str,
    ) -> DocumentStoreResult<bool> {
        self.patch_one(filter, patch, PatchScope::field(field))
            .await
    }

    /// Subscribes to the change feed of this collection.
    ///
    /// `pipeline` is an aggregation pipeline over change events, typically `$match` stages.
    /// Update events carry the full post-mutation document.
    pub async fn watch(&self, pipeline: Vec<Document>) -> DocumentStoreResult<ChangeStream> {
        self.backend
            .watch(pipeline, &self.name)
            .await
    }
}
