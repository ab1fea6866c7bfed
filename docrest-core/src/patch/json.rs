//! JSON Patch (RFC 6902) over BSON value trees.

use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::PatchError,
    patch::{PatchAlgebra, pointer::Pointer},
    value::values_equal,
};

/// One JSON Patch operation, in its wire form.
///
/// ```json
/// { "op": "replace", "path": "/name", "value": "Cid" }
/// { "op": "move", "from": "/old", "path": "/new" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Bson },
    Remove { path: String },
    Replace { path: String, value: Bson },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Bson },
}

impl PatchOperation {
    fn apply(&self, target: &mut Bson) -> Result<(), PatchError> {
        match self {
            PatchOperation::Add { path, value } => Pointer::parse(path)?.add(target, value.clone()),
            PatchOperation::Remove { path } => Pointer::parse(path)?.remove(target).map(|_| ()),
            PatchOperation::Replace { path, value } => {
                Pointer::parse(path)?.replace(target, value.clone())
            }
            PatchOperation::Move { from, path } => {
                let from = Pointer::parse(from)?;
                let path = Pointer::parse(path)?;

                if path.is_inside(&from) {
                    return Err(PatchError::InvalidTarget(format!(
                        "cannot move {from} into its own child {path}"
                    )));
                }

                let value = from.remove(target)?;
                path.add(target, value)
            }
            PatchOperation::Copy { from, path } => {
                let from = Pointer::parse(from)?;
                let value = from
                    .get(target)
                    .cloned()
                    .ok_or_else(|| PatchError::PathNotFound(from.to_string()))?;

                Pointer::parse(path)?.add(target, value)
            }
            PatchOperation::Test { path, value } => {
                let pointer = Pointer::parse(path)?;

                match pointer.get(target) {
                    Some(current) if values_equal(current, value) => Ok(()),
                    _ => Err(PatchError::TestFailed(pointer.to_string())),
                }
            }
        }
    }
}

/// An ordered sequence of [`PatchOperation`]s.
///
/// Operations run in order against a private copy of the target. The first failing
/// operation aborts the whole patch and the copy is discarded, so a failed patch never
/// produces a partially modified value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPatch(Vec<PatchOperation>);

impl JsonPatch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        JsonPatch(operations)
    }

    /// Parses a JSON Patch document such as `[{"op": "remove", "path": "/age"}]`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Malformed`] if the bytes are not a valid patch document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PatchError> {
        serde_json::from_slice(bytes).map_err(|err| PatchError::Malformed(err.to_string()))
    }

    /// Parses a JSON Patch document from an already decoded JSON value.
    pub fn from_json(value: Value) -> Result<Self, PatchError> {
        serde_json::from_value(value).map_err(|err| PatchError::Malformed(err.to_string()))
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }
}

impl From<Vec<PatchOperation>> for JsonPatch {
    fn from(operations: Vec<PatchOperation>) -> Self {
        JsonPatch(operations)
    }
}

impl PatchAlgebra for JsonPatch {
    fn apply(&self, mut target: Bson) -> Result<Bson, PatchError> {
        for operation in &self.0 {
            operation.apply(&mut target)?;
        }

        Ok(target)
    }
}
