//! Change feed events and subscriptions.
//!
//! [`ChangeStream`] is a live subscription to mutations of one collection, opened through
//! [`StoreBackend::watch`](crate::backend::StoreBackend::watch). It yields [`ChangeEvent`]s
//! until it is closed or dropped:
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut events = users.watch(vec![doc! { "$match": { "operationType": "update" } }]).await?;
//! while let Some(event) = events.next().await {
//!     let event = event?;
//!     println!("{:?} {:?}", event.operation, event.full_document);
//! }
//! ```

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bson::{Bson, Document, doc};
use futures::{
    Stream, StreamExt,
    stream::BoxStream,
};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// The kind of mutation a [`ChangeEvent`] describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
    Replace,
    Delete,
    /// Any other event kind reported by the store (`drop`, `rename`, `invalidate`, ...).
    #[serde(untagged)]
    Other(String),
}

impl ChangeOperation {
    /// Returns the store's name for this kind of event.
    pub fn as_str(&self) -> &str {
        match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::Replace => "replace",
            ChangeOperation::Delete => "delete",
            ChangeOperation::Other(name) => name,
        }
    }
}

impl From<&str> for ChangeOperation {
    fn from(name: &str) -> Self {
        match name {
            "insert" => ChangeOperation::Insert,
            "update" => ChangeOperation::Update,
            "replace" => ChangeOperation::Replace,
            "delete" => ChangeOperation::Delete,
            other => ChangeOperation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation observed on a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,
    /// Name of the collection the mutation happened in.
    pub collection: String,
    /// The identity of the mutated document, as `{"_id": ...}`.
    pub document_key: Option<Document>,
    /// The document after the mutation. Absent for deletes.
    pub full_document: Option<Document>,
    /// Fields set by an update.
    pub updated_fields: Option<Document>,
    /// Fields removed by an update.
    pub removed_fields: Vec<String>,
}

impl ChangeEvent {
    /// Renders the event in the store's change stream document shape.
    ///
    /// ```json
    /// {
    ///   "operationType": "update",
    ///   "ns": { "coll": "users" },
    ///   "documentKey": { "_id": ... },
    ///   "fullDocument": { ... },
    ///   "updateDescription": { "updatedFields": { ... }, "removedFields": [ ... ] }
    /// }
    /// ```
    ///
    /// Pipeline `$match` stages are written against this shape.
    pub fn to_document(&self) -> Document {
        let mut document = doc! {
            "operationType": self.operation.as_str(),
            "ns": { "coll": self.collection.as_str() },
        };

        if let Some(key) = &self.document_key {
            document.insert("documentKey", key.clone());
        }

        if let Some(full) = &self.full_document {
            document.insert("fullDocument", full.clone());
        }

        if let Some(updated) = &self.updated_fields {
            document.insert(
                "updateDescription",
                doc! {
                    "updatedFields": updated.clone(),
                    "removedFields": self
                        .removed_fields
                        .iter()
                        .map(|field| Bson::String(field.clone()))
                        .collect::<Vec<_>>(),
                },
            );
        }

        document
    }
}

/// A live change feed subscription.
///
/// Dropping the stream or calling [`ChangeStream::close`] releases the subscription; a
/// closed stream yields `None`.
pub struct ChangeStream {
    inner: Option<BoxStream<'static, DocumentStoreResult<ChangeEvent>>>,
}

impl ChangeStream {
    /// Wraps a backend event stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DocumentStoreResult<ChangeEvent>> + Send + 'static,
    {
        Self { inner: Some(stream.boxed()) }
    }

    /// Releases the subscription. Further polls yield `None`.
    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Stream for ChangeStream {
    type Item = DocumentStoreResult<ChangeEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.inner.as_mut() {
            Some(stream) => match stream.poll_next_unpin(cx) {
                Poll::Ready(None) => {
                    this.inner = None;
                    Poll::Ready(None)
                }
                other => other,
            },
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{executor::block_on, stream};

    fn update_event() -> ChangeEvent {
        ChangeEvent {
            operation: ChangeOperation::Update,
            collection: "users".to_string(),
            document_key: Some(doc! { "_id": 1 }),
            full_document: Some(doc! { "_id": 1, "name": "Bea" }),
            updated_fields: Some(doc! { "name": "Bea" }),
            removed_fields: vec!["age".to_string()],
        }
    }

    #[test]
    fn test_event_document_shape() {
        assert_eq!(
            update_event().to_document(),
            doc! {
                "operationType": "update",
                "ns": { "coll": "users" },
                "documentKey": { "_id": 1 },
                "fullDocument": { "_id": 1, "name": "Bea" },
                "updateDescription": { "updatedFields": { "name": "Bea" }, "removedFields": ["age"] },
            }
        );
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(ChangeOperation::from("delete"), ChangeOperation::Delete);
        assert_eq!(ChangeOperation::from("drop"), ChangeOperation::Other("drop".to_string()));
        assert_eq!(ChangeOperation::Other("drop".to_string()).as_str(), "drop");
    }

    #[test]
    fn test_close_ends_stream() {
        let mut events = ChangeStream::new(stream::iter(vec![Ok(update_event()), Ok(update_event())]));

        assert!(block_on(events.next()).is_some());
        events.close();
        assert!(events.is_closed());
        assert!(block_on(events.next()).is_none());
    }
}
