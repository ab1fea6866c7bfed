//! Document helpers shared by the gateway and the backends.
//!
//! Documents are schema-less [`bson::Document`] trees. This module owns the handling of the
//! reserved identity field, conversions between typed values and documents, and dotted field
//! paths (`"profile.address.city"`) as understood by `$set`/`$unset` style updates.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identity field assigned by the store on insert.
pub const ID_FIELD: &str = "_id";

/// Removes the identity field from a document, returning it if it was present.
///
/// Patch algebras never see the identity field; it is stripped before a patch is applied
/// and never written back.
pub fn strip_identity(document: &mut Document) -> Option<Bson> {
    document.remove(ID_FIELD)
}

/// Serializes any `Serialize` value into a document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Decode`] if serialization fails, or
/// [`DocumentStoreError::InvalidDocument`] if the value is not a mapping.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize)]
/// struct User { id: String, name: String }
///
/// let doc = to_document(&User { id: "u1".into(), name: "Ann".into() })?;
/// assert_eq!(doc.get_str("name")?, "Ann");
/// ```
pub fn to_document<T: Serialize>(value: &T) -> DocumentStoreResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a mapping, found {:?}",
            other.element_type()
        ))),
    }
}

/// Deserializes a document into any `DeserializeOwned` type.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Decode`] if the document does not have the expected shape.
pub fn from_document<T: DeserializeOwned>(document: Document) -> DocumentStoreResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

/// Looks up a dotted path inside a document.
///
/// Each segment descends into a sub-document; numeric segments also index into arrays.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Sets a dotted path inside a document, creating intermediate sub-documents as needed.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if an intermediate segment exists but is
/// not a sub-document.
pub fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot set {path}: {head} is not a sub-document"
                ))),
            }
        }
    }
}

/// Removes a dotted path from a document. Missing paths are ignored.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_strip_identity() {
        let mut document = doc! { "_id": 7, "name": "Ann" };
        assert_eq!(strip_identity(&mut document), Some(Bson::Int32(7)));
        assert_eq!(document, doc! { "name": "Ann" });
        assert_eq!(strip_identity(&mut document), None);
    }

    #[test]
    fn test_dotted_paths() {
        let mut document = doc! { "profile": { "city": "Oslo" }, "tags": ["a", "b"] };

        assert_eq!(get_path(&document, "profile.city"), Some(&Bson::from("Oslo")));
        assert_eq!(get_path(&document, "tags.1"), Some(&Bson::from("b")));
        assert_eq!(get_path(&document, "profile.zip"), None);

        set_path(&mut document, "profile.zip", Bson::from("0150")).unwrap();
        set_path(&mut document, "settings.theme", Bson::from("dark")).unwrap();
        assert_eq!(get_path(&document, "profile.zip"), Some(&Bson::from("0150")));
        assert_eq!(get_path(&document, "settings.theme"), Some(&Bson::from("dark")));

        assert!(set_path(&mut document, "tags.x", Bson::Null).is_err());

        assert_eq!(remove_path(&mut document, "profile.city"), Some(Bson::from("Oslo")));
        assert_eq!(remove_path(&mut document, "missing.path"), None);
        assert_eq!(document, doc! {
            "profile": { "zip": "0150" },
            "tags": ["a", "b"],
            "settings": { "theme": "dark" },
        });
    }
}
