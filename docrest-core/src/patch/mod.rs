//! Patch algebras and patch scoping.
//!
//! Two algebras implement the [`PatchAlgebra`] capability:
//!
//! - [`MergePatch`] - recursive overlay where `null` deletes a key (RFC 7396)
//! - [`JsonPatch`] - ordered add/remove/replace/move/copy/test operations (RFC 6902)
//!
//! A patch is applied either to the whole document or to the value of one named field,
//! selected with [`PatchScope`]. [`plan_update`] turns a stored document and a patch into a
//! single [`FieldUpdate`]. The computation happens entirely in memory, so a failing patch
//! never reaches the store.

mod json;
mod merge;
mod pointer;

use std::fmt::Debug;

use bson::{Bson, Document};

use crate::{
    backend::FieldUpdate,
    document::{ID_FIELD, strip_identity},
    error::PatchError,
};

pub use json::{JsonPatch, PatchOperation};
pub use merge::MergePatch;
pub use pointer::Pointer;

/// A partial-update language that rewrites a value.
///
/// Implementations must be pure: the same patch applied to the same value gives the same
/// result, and a failure leaves nothing behind.
pub trait PatchAlgebra: Send + Sync + Debug {
    /// Applies the patch to `target`, returning the patched value.
    fn apply(&self, target: Bson) -> Result<Bson, PatchError>;
}

impl<P: PatchAlgebra + ?Sized> PatchAlgebra for &P {
    fn apply(&self, target: Bson) -> Result<Bson, PatchError> {
        (**self).apply(target)
    }
}

/// Which part of a stored document a patch applies to.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PatchScope {
    /// The whole document, minus its identity field.
    #[default]
    Root,
    /// The value of one top-level field. A missing field is patched as `null`.
    Field(String),
}

impl PatchScope {
    pub fn field(name: impl Into<String>) -> Self {
        PatchScope::Field(name.into())
    }
}

/// Applies `patch` to a stored document and computes the write that persists the result.
///
/// For [`PatchScope::Root`] every resulting field is set and every field the patch removed is
/// unset. For [`PatchScope::Field`] only that field is set, leaving its siblings untouched.
/// The identity field is stripped before the patch runs and never appears in the write.
///
/// # Errors
///
/// Returns a [`PatchError`] if the patch fails, if a root patch yields something other than a
/// document, or if the scoped field name cannot be written on its own.
pub fn plan_update(
    mut stored: Document,
    patch: &dyn PatchAlgebra,
    scope: &PatchScope,
) -> Result<FieldUpdate, PatchError> {
    strip_identity(&mut stored);

    match scope {
        PatchScope::Root => {
            let mut result = match patch.apply(Bson::Document(stored.clone()))? {
                Bson::Document(result) => result,
                other => {
                    return Err(PatchError::InvalidTarget(format!(
                        "patched document became {:?}",
                        other.element_type()
                    )));
                }
            };
            strip_identity(&mut result);

            let unset: Vec<String> = stored
                .keys()
                .filter(|key| !result.contains_key(key.as_str()))
                .cloned()
                .collect();

            // `$set`/`$unset` read these keys as paths.
            if let Some(key) = result.keys().chain(&unset).find(|key| !is_literal_key(key)) {
                return Err(PatchError::InvalidTarget(format!(
                    "top-level key {key:?} cannot be written as a field"
                )));
            }

            Ok(FieldUpdate { set: result, unset })
        }
        PatchScope::Field(name) => {
            validate_field_name(name)?;

            let current = stored.remove(name).unwrap_or(Bson::Null);
            let mut set = Document::new();
            set.insert(name.clone(), patch.apply(current)?);

            Ok(FieldUpdate { set, unset: Vec::new() })
        }
    }
}

// Dots would address a nested path and `$` an update operator.
fn is_literal_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('.') && !key.starts_with('$')
}

fn validate_field_name(name: &str) -> Result<(), PatchError> {
    if name == ID_FIELD || !is_literal_key(name) {
        return Err(PatchError::InvalidField(name.to_string()));
    }

    Ok(())
}
