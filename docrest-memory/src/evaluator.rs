//! Filter document evaluation for in-memory documents.
//!
//! Supports the predicate subset that filters built by this library (and typical hand-written
//! ones) use:
//!
//! - implicit equality: `{"name": "Ann"}`, matching array members too
//! - field operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$not`
//! - logical operators at any level: `$and`, `$or`, `$nor`
//! - dotted paths: `{"profile.city": "Oslo"}`
//!
//! Anything else is rejected with [`DocumentStoreError::InvalidArgument`] rather than silently
//! matching nothing.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docrest_core::{
    document::get_path,
    error::{DocumentStoreError, DocumentStoreResult},
    value::{Comparable, values_equal},
};

pub(crate) struct FilterEvaluator<'a> {
    document: &'a Document,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies `filter`.
    pub fn evaluate(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(clauses(key, condition)?)?,
                "$or" => self.any(clauses(key, condition)?)?,
                "$nor" => !self.any(clauses(key, condition)?)?,
                op if op.starts_with('$') => return Err(unsupported(op)),
                field => self.field_matches(get_path(self.document, field), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Checks that `filter` only uses supported operators, without evaluating it.
    pub fn validate(filter: &Document) -> DocumentStoreResult<()> {
        for (key, condition) in filter {
            match key.as_str() {
                "$and" | "$or" | "$nor" => {
                    for clause in clauses(key, condition)? {
                        Self::validate(clause)?;
                    }
                }
                op if op.starts_with('$') => return Err(unsupported(op)),
                _ => {
                    if let Some(operators) = operator_document(condition) {
                        validate_operators(operators)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the documents satisfying `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if FilterEvaluator::new(document).evaluate(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn all(&self, filters: Vec<&Document>) -> DocumentStoreResult<bool> {
        for filter in filters {
            if !self.evaluate(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, filters: Vec<&Document>) -> DocumentStoreResult<bool> {
        for filter in filters {
            if self.evaluate(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
        match operator_document(condition) {
            Some(operators) => {
                for (op, operand) in operators {
                    if !apply_operator(value, op, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            None => Ok(equals(value, condition)),
        }
    }
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    Ok(match op {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => compares(value, operand, |ordering| ordering == Ordering::Greater),
        "$gte" => compares(value, operand, |ordering| ordering != Ordering::Less),
        "$lt" => compares(value, operand, |ordering| ordering == Ordering::Less),
        "$lte" => compares(value, operand, |ordering| ordering != Ordering::Greater),
        "$in" => members(op, operand)?
            .iter()
            .any(|member| equals(value, member)),
        "$nin" => !members(op, operand)?
            .iter()
            .any(|member| equals(value, member)),
        "$exists" => value.is_some() == truthy(operand),
        "$not" => match operand {
            Bson::Document(operators) => {
                for (op, operand) in operators {
                    if !apply_operator(value, op, operand)? {
                        return Ok(true);
                    }
                }

                false
            }
            _ => {
                return Err(DocumentStoreError::InvalidArgument(
                    "$not requires an operator document".to_string(),
                ));
            }
        },
        other => return Err(unsupported(other)),
    })
}

fn validate_operators(operators: &Document) -> DocumentStoreResult<()> {
    for (op, operand) in operators {
        match op.as_str() {
            "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" | "$exists" => {}
            "$in" | "$nin" => {
                members(op, operand)?;
            }
            "$not" => match operand {
                Bson::Document(inner) => validate_operators(inner)?,
                _ => {
                    return Err(DocumentStoreError::InvalidArgument(
                        "$not requires an operator document".to_string(),
                    ));
                }
            },
            other => return Err(unsupported(other)),
        }
    }

    Ok(())
}

// A missing field equals `null`; an array field equals any of its members.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    match value {
        None => matches!(operand, Bson::Null),
        Some(value) => {
            values_equal(value, operand)
                || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, operand)))
        }
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let operand = Comparable::from(operand);
    let accepts = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&operand)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(accepts),
        Some(value) => accepts(value),
    }
}

fn truthy(operand: &Bson) -> bool {
    match operand {
        Bson::Boolean(flag) => *flag,
        Bson::Null => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

// `{"$gt": 1}` is an operator document, `{"city": "Oslo"}` is a literal to compare against.
fn operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(inner) if inner.keys().next().is_some_and(|key| key.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

fn clauses<'f>(op: &str, condition: &'f Bson) -> DocumentStoreResult<Vec<&'f Document>> {
    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Ok(clause),
                _ => Err(DocumentStoreError::InvalidArgument(format!(
                    "{op} clauses must be documents"
                ))),
            })
            .collect(),
        _ => Err(DocumentStoreError::InvalidArgument(format!(
            "{op} requires a non-empty array"
        ))),
    }
}

fn members<'o>(op: &str, operand: &'o Bson) -> DocumentStoreResult<&'o Vec<Bson>> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(DocumentStoreError::InvalidArgument(format!("{op} requires an array"))),
    }
}

fn unsupported(op: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidArgument(format!("unsupported filter operator {op}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn user() -> Document {
        doc! {
            "_id": 1,
            "id": "u1",
            "name": "Ann",
            "age": 30,
            "tags": ["admin", "ops"],
            "profile": { "city": "Oslo" },
        }
    }

    fn matches(filter: Document) -> bool {
        FilterEvaluator::new(&user()).evaluate(&filter).unwrap()
    }

    #[test]
    fn test_implicit_equality() {
        assert!(matches(doc! {}));
        assert!(matches(doc! { "id": "u1", "age": 30i64 }));
        assert!(matches(doc! { "tags": "ops" }));
        assert!(matches(doc! { "profile.city": "Oslo" }));
        assert!(matches(doc! { "profile": { "city": "Oslo" } }));
        assert!(matches(doc! { "missing": null }));
        assert!(!matches(doc! { "id": "u2" }));
    }

    #[test]
    fn test_field_operators() {
        assert!(matches(doc! { "age": { "$gte": 18, "$lt": 31.5 } }));
        assert!(!matches(doc! { "age": { "$gt": 30 } }));
        assert!(matches(doc! { "name": { "$in": ["Ann", "Bea"] } }));
        assert!(matches(doc! { "tags": { "$nin": ["guest"] } }));
        assert!(matches(doc! { "profile": { "$exists": true }, "email": { "$exists": false } }));
        assert!(matches(doc! { "name": { "$ne": "Bea" } }));
        assert!(matches(doc! { "age": { "$not": { "$gt": 40 } } }));
        assert!(!matches(doc! { "age": { "$gt": "thirty" } }));
    }

    #[test]
    fn test_logical_operators() {
        assert!(matches(doc! { "$or": [{ "id": "u2" }, { "name": "Ann" }] }));
        assert!(matches(doc! { "$and": [{ "id": "u1" }, { "age": { "$gte": 30 } }] }));
        assert!(!matches(doc! { "$nor": [{ "id": "u1" }] }));
    }

    #[test]
    fn test_unsupported_operators_rejected() {
        let document = user();

        for filter in [
            doc! { "name": { "$regex": "^A" } },
            doc! { "$where": "true" },
            doc! { "name": { "$in": "Ann" } },
            doc! { "$or": [] },
        ] {
            assert!(matches!(
                FilterEvaluator::new(&document).evaluate(&filter),
                Err(DocumentStoreError::InvalidArgument(_))
            ));
            assert!(FilterEvaluator::validate(&filter).is_err());
        }

        assert!(FilterEvaluator::validate(&doc! { "$or": [{ "a": { "$in": [1] } }] }).is_ok());
    }
}
