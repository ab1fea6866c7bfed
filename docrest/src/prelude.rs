//! Convenient re-exports of commonly used types from docrest.
//!
//! ```ignore
//! use docrest::prelude::*;
//! ```

pub use docrest_core::{
    backend::{DynStoreBackend, FieldUpdate, StoreBackend, StoreBackendBuilder},
    change::{ChangeEvent, ChangeOperation, ChangeStream},
    collection::{Collection, DynCollection},
    config::TimeoutConfig,
    error::{DocumentStoreError, DocumentStoreResult, PatchError},
    patch::{JsonPatch, MergePatch, PatchAlgebra, PatchOperation, PatchScope},
    query::{Expr, Field, FieldOp, Filter, QueryVisitor},
    store::{DocumentStore, DynDocumentStore, DynDocumentStoreRef},
    upsert::ExistingPolicy,
};
