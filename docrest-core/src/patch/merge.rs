//! JSON Merge Patch (RFC 7396) over BSON value trees.

use bson::{Bson, Document, ser::serialize_to_bson};
use serde_json::Value;

use crate::{error::PatchError, patch::PatchAlgebra};

/// A merge patch: a document overlaid recursively onto its target.
///
/// - Sub-documents recurse into the matching target member
/// - A `Null` member removes that key from the target (no-op if absent)
/// - Any other value replaces the target member wholesale, arrays included
///
/// # Example
///
/// ```ignore
/// let patch = MergePatch::new(doc! { "age": null, "profile": { "city": "Oslo" } });
/// // {"name": "Bea", "age": 30} -> {"name": "Bea", "profile": {"city": "Oslo"}}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MergePatch(Document);

impl MergePatch {
    pub fn new(patch: Document) -> Self {
        MergePatch(patch)
    }

    /// Builds a merge patch from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Malformed`] unless the value is a JSON object.
    pub fn from_json(value: &Value) -> Result<Self, PatchError> {
        match serialize_to_bson(value) {
            Ok(Bson::Document(patch)) => Ok(MergePatch(patch)),
            Ok(_) => Err(PatchError::Malformed("merge patch must be an object".to_string())),
            Err(err) => Err(PatchError::Malformed(err.to_string())),
        }
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }
}

impl From<Document> for MergePatch {
    fn from(patch: Document) -> Self {
        MergePatch(patch)
    }
}

impl PatchAlgebra for MergePatch {
    fn apply(&self, target: Bson) -> Result<Bson, PatchError> {
        Ok(Bson::Document(merge_document(target, &self.0)))
    }
}

fn merge_document(target: Bson, patch: &Document) -> Document {
    let mut target = match target {
        Bson::Document(doc) => doc,
        _ => Document::new(),
    };

    for (key, value) in patch {
        match value {
            Bson::Null => {
                target.remove(key);
            }
            Bson::Document(inner) => {
                let current = target.get(key).cloned().unwrap_or(Bson::Null);
                target.insert(key.clone(), merge_document(current, inner));
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn merged(target: Document, patch: Document) -> Document {
        match MergePatch::new(patch).apply(Bson::Document(target)).unwrap() {
            Bson::Document(doc) => doc,
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn test_null_deletes_key() {
        assert_eq!(
            merged(doc! { "id": "u1", "name": "Bea", "age": 30 }, doc! { "age": null }),
            doc! { "id": "u1", "name": "Bea" }
        );
        assert_eq!(
            merged(doc! { "name": "Bea" }, doc! { "age": null }),
            doc! { "name": "Bea" }
        );
    }

    #[test]
    fn test_nested_merge() {
        let target = doc! { "profile": { "city": "Oslo", "zip": "0150" }, "tags": ["a"] };
        let patch = doc! { "profile": { "zip": null, "country": "NO" }, "tags": ["b", "c"] };

        assert_eq!(
            merged(target, patch),
            doc! { "profile": { "city": "Oslo", "country": "NO" }, "tags": ["b", "c"] }
        );
    }

    #[test]
    fn test_nested_nulls_dropped_when_target_absent() {
        assert_eq!(
            merged(doc! { "profile": "flat" }, doc! { "profile": { "a": 1, "b": null } }),
            doc! { "profile": { "a": 1 } }
        );
    }

    #[test]
    fn test_idempotent() {
        let target = doc! { "name": "Ann", "age": 30, "profile": { "city": "Oslo" } };
        let patch = doc! { "name": "Bea", "age": null, "profile": { "zip": "0150" } };

        let once = merged(target, patch.clone());
        let twice = merged(once.clone(), patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(MergePatch::from_json(&serde_json::json!({ "a": null })).is_ok());
        assert!(matches!(
            MergePatch::from_json(&serde_json::json!([1, 2])),
            Err(PatchError::Malformed(_))
        ));
    }
}
