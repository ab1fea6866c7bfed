//! Store handles that hand out collection gateways.
//!
//! - [`DocumentStore`] - Store bound to a specific backend implementation
//! - [`DynDocumentStore`] - Dynamic dispatch store for runtime backend selection
//! - [`DynDocumentStoreRef`] - Borrowed dynamic store for temporary use
//!
//! `into_dyn` erases the backend type; `as_static`/`into_static` recover it.
//!
//! # Example
//!
//! ```ignore
//! use docrest::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection("users");
//!
//! let store = store.into_dyn();
//! let users = store.collection("users");
//! ```

use tracing::info;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, DynCollection},
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets the gateway for the collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Borrows this store with its backend type erased.
    pub fn as_dyn(&self) -> DynDocumentStoreRef<'_>
    where
        B: 'static,
    {
        DynDocumentStoreRef::new(&self.backend)
    }

    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore
    where
        B: 'static,
    {
        DynDocumentStore::new(Box::new(self.backend))
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;
        info!(target: "docrest::store", "store shut down");

        Ok(())
    }
}

#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend trait object.
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets the gateway for the collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> DynCollection<'a> {
        Collection::new(name.to_string(), &*self.backend)
    }

    pub fn as_dyn(&self) -> DynDocumentStoreRef<'_> {
        DynDocumentStoreRef::new(&*self.backend)
    }

    /// Borrows the backend as `B` if that is its concrete type.
    pub fn as_static<B: StoreBackend + 'static>(&self) -> Option<DocumentStore<&B>> {
        self.backend
            .as_any()
            .downcast_ref::<B>()
            .map(DocumentStore::new)
    }

    /// Recovers the statically typed store, or returns `self` unchanged if the backend is not
    /// a `B`.
    pub fn into_static<B: StoreBackend + 'static>(self) -> Result<DocumentStore<B>, Self> {
        if !self.backend.as_any().is::<B>() {
            return Err(self);
        }

        match self.backend.into_any().downcast::<B>() {
            Ok(backend) => Ok(DocumentStore::new(*backend)),
            Err(_) => unreachable!("backend type checked above"),
        }
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await?;
        info!(target: "docrest::store", "store shut down");

        Ok(())
    }
}

/// A borrowed [`DynDocumentStore`].
#[derive(Debug, Clone, Copy)]
pub struct DynDocumentStoreRef<'a> {
    backend: &'a (dyn DynStoreBackend + 'static),
}

impl<'a> DynDocumentStoreRef<'a> {
    pub fn new(backend: &'a (dyn DynStoreBackend + 'static)) -> Self {
        Self { backend }
    }

    /// Gets the gateway for the collection with the given name.
    pub fn collection(&self, name: &str) -> DynCollection<'a> {
        Collection::new(name.to_string(), self.backend)
    }
}
