//! Error types and result types for document store operations.
//!
//! Every fallible operation in docrest returns [`DocumentStoreResult<T>`]. Store-facing failures
//! are surfaced unmodified: nothing is retried or masked. Patch failures carry their own
//! [`PatchError`] so callers can tell "nothing to patch" ([`DocumentStoreError::NotFound`])
//! apart from "the patch was malformed" ([`DocumentStoreError::Patch`]).

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The store could not be reached, or did not answer within the connect timeout.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A round-trip to the store failed on a read or a write.
    #[error("Transport error: {0}")]
    Transport(String),
    /// A document or value did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    /// No document matched the filter of a patch operation.
    /// The first argument is the filter, the second is the collection name.
    #[error("No document matches {0} in collection {1}")]
    NotFound(String, String),
    /// The patch was malformed or could not be applied to the stored document.
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),
    /// A document with the given identity already exists in the collection.
    /// The first argument is the document id, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document is not usable as a stored document (for example, not a mapping).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The caller passed arguments that cannot be processed together.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The change feed pipeline contains a stage the backend cannot evaluate.
    #[error("Unsupported pipeline: {0}")]
    UnsupportedPipeline(String),
}

impl DocumentStoreError {
    /// Returns `true` when the error means no document matched a patch filter.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound(..))
    }

    /// Returns `true` when the error came from a malformed or inapplicable patch.
    pub fn is_patch(&self) -> bool {
        matches!(self, DocumentStoreError::Patch(_))
    }
}

/// Reasons a merge patch or JSON Patch cannot be applied.
///
/// A patch either applies completely or not at all, so any of these means the stored
/// document was left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    /// The patch document itself could not be parsed.
    #[error("malformed patch: {0}")]
    Malformed(String),
    /// A JSON Pointer is not syntactically valid.
    #[error("invalid pointer {0:?}")]
    InvalidPointer(String),
    /// The pointer does not resolve to an existing value.
    #[error("path {0:?} does not exist")]
    PathNotFound(String),
    /// A `test` operation did not match the current value.
    #[error("test failed at {0:?}")]
    TestFailed(String),
    /// An array index is out of bounds or not a number.
    #[error("invalid array index at {0:?}")]
    InvalidIndex(String),
    /// The patch would produce a value that cannot be stored at its target.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// The field named as patch scope cannot be written on its own.
    #[error("invalid field name {0:?}")]
    InvalidField(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Decode(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Decode(err.to_string())
    }
}
