//! The check-then-act write engine.
//!
//! Every write the gateway performs on a possibly-existing document goes through one of the
//! two functions here:
//!
//! - [`upsert_one`] inserts when nothing matches, otherwise overlays fields (or leaves the
//!   match alone, depending on [`ExistingPolicy`])
//! - [`patch_one`] reads the match, applies a [`PatchAlgebra`] in memory and writes the
//!   result back as one field-level update
//!
//! Existence is decided by a read followed by a separate write. The pair is not atomic:
//! a concurrent writer can insert, update or delete between the two, and lost updates are
//! possible. Callers needing stronger guarantees must enforce them in the store (for example
//! with a unique index on the filter fields).

use bson::Document;
use tracing::{debug, warn};

use crate::{
    backend::{FieldUpdate, StoreBackend},
    document::strip_identity,
    error::{DocumentStoreError, DocumentStoreResult},
    patch::{PatchAlgebra, PatchScope, plan_update},
    query::Filter,
};

/// What [`upsert_one`] does when a document already matches the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingPolicy {
    /// Set every field of the new document on the match; other fields stay.
    #[default]
    Overlay,
    /// Leave the match untouched.
    KeepExisting,
}

/// Inserts `document` if nothing matches `filter`, otherwise applies `policy` to the match.
///
/// # Returns
///
/// Returns `true` if a document matched before the write, `false` if `document` was inserted.
///
/// # Errors
///
/// Store errors from the existence read or the write are returned unchanged. A failed read
/// never falls through to an insert.
pub async fn upsert_one<B>(
    backend: &B,
    collection: &str,
    filter: &Filter,
    mut document: Document,
    policy: ExistingPolicy,
) -> DocumentStoreResult<bool>
where
    B: StoreBackend + ?Sized,
{
    if backend.find_one(filter, collection).await?.is_none() {
        let id = backend.insert_one(document, collection).await?;
        debug!(target: "docrest::upsert", collection, %filter, %id, "no match, inserted");

        return Ok(false);
    }

    match policy {
        ExistingPolicy::KeepExisting => {
            debug!(target: "docrest::upsert", collection, %filter, "match exists, kept");
        }
        ExistingPolicy::Overlay => {
            strip_identity(&mut document);
            write_update(backend, collection, filter, FieldUpdate::set(document)).await?;
        }
    }

    Ok(true)
}

/// Applies `patch` to the document matching `filter` within `scope`.
///
/// The stored document is read, patched entirely in memory and written back with a single
/// field-level update. A patch that fails leaves the store untouched.
///
/// # Returns
///
/// Returns `true` once the patched document has been written.
///
/// # Errors
///
/// Returns [`DocumentStoreError::NotFound`] if nothing matches `filter`, and
/// [`DocumentStoreError::Patch`] if the patch is malformed or cannot be applied.
pub async fn patch_one<B>(
    backend: &B,
    collection: &str,
    filter: &Filter,
    patch: &dyn PatchAlgebra,
    scope: &PatchScope,
) -> DocumentStoreResult<bool>
where
    B: StoreBackend + ?Sized,
{
    let stored = backend
        .find_one(filter, collection)
        .await?
        .ok_or_else(|| DocumentStoreError::NotFound(filter.to_string(), collection.to_string()))?;

    let update = plan_update(stored, patch, scope)?;
    write_update(backend, collection, filter, update).await?;

    Ok(true)
}

async fn write_update<B>(
    backend: &B,
    collection: &str,
    filter: &Filter,
    update: FieldUpdate,
) -> DocumentStoreResult<()>
where
    B: StoreBackend + ?Sized,
{
    if update.is_empty() {
        debug!(target: "docrest::upsert", collection, %filter, "nothing to write");
        return Ok(());
    }

    let fields = update.set.len() + update.unset.len();

    if backend.update_one(filter, update, collection).await? {
        debug!(target: "docrest::upsert", collection, %filter, fields, "updated");
    } else {
        warn!(
            target: "docrest::upsert",
            collection,
            %filter,
            "document matched on read but not on write, it was removed concurrently"
        );
    }

    Ok(())
}
