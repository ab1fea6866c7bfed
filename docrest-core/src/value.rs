//! Type-normalized comparison of BSON values.
//!
//! BSON distinguishes `Int32`, `Int64` and `Double`, while JSON input (filters, patch `test`
//! values) does not. [`Comparable`] folds all numbers to `f64` so that `30` matches `30i64`
//! and `30.0`, and gives the ordering used by range filters.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime, oid::ObjectId};

/// Comparable view over a borrowed BSON value.
#[derive(Debug)]
pub enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON type, compared by exact equality only
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Compares two BSON values for equality with numeric normalization.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_numbers_compare_across_widths() {
        assert!(values_equal(&Bson::Int32(30), &Bson::Int64(30)));
        assert!(values_equal(&Bson::Int64(30), &Bson::Double(30.0)));
        assert!(!values_equal(&Bson::Int32(30), &Bson::String("30".into())));
    }

    #[test]
    fn test_documents_ignore_key_order() {
        let left = Bson::Document(doc! { "a": 1, "b": [1, 2] });
        let right = Bson::Document(doc! { "b": [1i64, 2i64], "a": 1.0 });
        assert!(values_equal(&left, &right));
    }

    #[test]
    fn test_ordering() {
        let small = Bson::Int32(1);
        let large = Bson::Double(2.5);
        assert_eq!(
            Comparable::from(&small).partial_cmp(&Comparable::from(&large)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Comparable::from(&small).partial_cmp(&Comparable::from(&Bson::from("x"))),
            None
        );
    }
}
