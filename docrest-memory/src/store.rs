//! In-memory storage implementation for document stores.
//!
//! Collections are insertion-ordered vectors of BSON documents behind an async-aware
//! read-write lock. Every mutation is published to the change feed subscribers of its
//! collection.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::channel::mpsc::{UnboundedSender, unbounded};
use mea::rwlock::RwLock;
use tracing::{debug, info};

use docrest_core::{
    backend::{FieldUpdate, StoreBackend, StoreBackendBuilder},
    change::{ChangeEvent, ChangeOperation, ChangeStream},
    document::{ID_FIELD, remove_path, set_path},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filter,
    value::values_equal,
};

use crate::evaluator::FilterEvaluator;

type StoreMap = HashMap<String, Vec<Document>>;

#[derive(Debug)]
struct Watcher {
    collection: String,
    /// The `$match` predicates of the subscription pipeline, all of which must hold.
    predicates: Vec<Document>,
    sender: UnboundedSender<DocumentStoreResult<ChangeEvent>>,
}

impl Watcher {
    fn accepts(&self, event: &ChangeEvent, rendered: &Document) -> bool {
        self.collection == event.collection
            && self.predicates.iter().all(|predicate| {
                FilterEvaluator::new(rendered)
                    .evaluate(predicate)
                    .unwrap_or(false)
            })
    }
}

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data and the same change feed subscribers.
///
/// Each backend operation holds the lock for its whole duration, so single operations are
/// atomic. A read followed by a write is not.
///
/// # Identity
///
/// Documents inserted without an `_id` get a fresh [`ObjectId`]. Inserting a second document
/// with an existing `_id` fails with [`DocumentStoreError::DocumentAlreadyExists`].
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest::backend::StoreBackend;
/// use docrest::query::Filter;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one(doc! { "id": "u1", "name": "Ann" }, "users").await?;
///
/// let found = store.find_one(&Filter::from(doc! { "id": "u1" }), "users").await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
    watchers: Arc<RwLock<Vec<Watcher>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            watchers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of open change feed subscriptions.
    ///
    /// Closed subscriptions are only pruned when the next event is published.
    pub async fn subscriber_count(&self) -> usize {
        self.watchers.read().await.len()
    }

    /// Delivers `events` to matching subscribers.
    ///
    /// Writers call this while still holding the store lock, so every subscriber sees events
    /// in mutation order.
    async fn publish(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }

        let mut watchers = self.watchers.write().await;

        for event in events {
            let rendered = event.to_document();

            watchers.retain(|watcher| {
                if watcher.sender.is_closed() {
                    return false;
                }

                if !watcher.accepts(&event, &rendered) {
                    return true;
                }

                watcher
                    .sender
                    .unbounded_send(Ok(event.clone()))
                    .is_ok()
            });
        }
    }
}

fn ensure_identity(document: &mut Document) -> Bson {
    match document.get(ID_FIELD) {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert(ID_FIELD, id.clone());
            id
        }
    }
}

fn identity_key(document: &Document) -> Option<Document> {
    document
        .get(ID_FIELD)
        .map(|id| doc! { ID_FIELD: id.clone() })
}

fn apply_update(document: &Document, update: &FieldUpdate) -> DocumentStoreResult<Document> {
    let mut updated = document.clone();

    for (path, value) in &update.set {
        if path == ID_FIELD && !document.get(ID_FIELD).is_some_and(|id| values_equal(id, value)) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "the {ID_FIELD} field is immutable"
            )));
        }

        set_path(&mut updated, path, value.clone())?;
    }

    for path in &update.unset {
        if path == ID_FIELD {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "the {ID_FIELD} field is immutable"
            )));
        }

        remove_path(&mut updated, path);
    }

    Ok(updated)
}

fn insert_into(
    documents: &mut Vec<Document>,
    mut document: Document,
    collection: &str,
) -> DocumentStoreResult<ChangeEvent> {
    let id = ensure_identity(&mut document);

    if documents
        .iter()
        .any(|existing| existing.get(ID_FIELD).is_some_and(|other| values_equal(other, &id)))
    {
        return Err(DocumentStoreError::DocumentAlreadyExists(
            id.to_string(),
            collection.to_string(),
        ));
    }

    documents.push(document.clone());

    Ok(ChangeEvent {
        operation: ChangeOperation::Insert,
        collection: collection.to_string(),
        document_key: Some(doc! { ID_FIELD: id }),
        full_document: Some(document),
        updated_fields: None,
        removed_fields: Vec::new(),
    })
}

fn first_match(documents: &[Document], filter: &Filter) -> DocumentStoreResult<Option<usize>> {
    for (index, document) in documents.iter().enumerate() {
        if FilterEvaluator::new(document).evaluate(filter.as_document())? {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

fn delete_event(document: &Document, collection: &str) -> ChangeEvent {
    ChangeEvent {
        operation: ChangeOperation::Delete,
        collection: collection.to_string(),
        document_key: identity_key(document),
        full_document: None,
        updated_fields: None,
        removed_fields: Vec::new(),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        FilterEvaluator::validate(filter.as_document())?;

        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };

        for document in documents {
            if FilterEvaluator::new(document).evaluate(filter.as_document())? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        FilterEvaluator::validate(filter.as_document())?;

        let store = self.store.read().await;

        match store.get(collection) {
            Some(documents) => FilterEvaluator::filter_documents(documents, filter.as_document()),
            None => Ok(Vec::new()),
        }
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let event = insert_into(documents, document, collection)?;

        let id = event
            .document_key
            .as_ref()
            .and_then(|key| key.get(ID_FIELD))
            .cloned()
            .unwrap_or(Bson::Null);

        debug!(target: "docrest::memory", collection, %id, "inserted document");
        self.publish(vec![event]).await;
        drop(store);

        Ok(id)
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let mut events = Vec::with_capacity(documents.len());

        // Ordered insert: a failure keeps the documents before it, like an ordered bulk write.
        let mut store = self.store.write().await;
        let stored = store
            .entry(collection.to_string())
            .or_default();

        let mut result = Ok(());
        for document in documents {
            match insert_into(stored, document, collection) {
                Ok(event) => events.push(event),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        let ids = events
            .iter()
            .filter_map(|event| event.document_key.as_ref()?.get(ID_FIELD).cloned())
            .collect::<Vec<_>>();

        debug!(target: "docrest::memory", collection, count = ids.len(), "inserted documents");
        self.publish(events).await;
        drop(store);

        result.map(|()| ids)
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        FilterEvaluator::validate(filter.as_document())?;

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(false);
        };
        let Some(index) = first_match(documents, filter)? else {
            return Ok(false);
        };

        let updated = apply_update(&documents[index], &update)?;
        documents[index] = updated.clone();

        let event = ChangeEvent {
            operation: ChangeOperation::Update,
            collection: collection.to_string(),
            document_key: identity_key(&updated),
            full_document: Some(updated),
            updated_fields: Some(update.set),
            removed_fields: update.unset,
        };

        debug!(target: "docrest::memory", collection, %filter, "updated document");
        self.publish(vec![event]).await;
        drop(store);

        Ok(true)
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        FilterEvaluator::validate(filter.as_document())?;

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };
        let Some(index) = first_match(documents, filter)? else {
            return Ok(0);
        };

        let event = delete_event(&documents.remove(index), collection);

        debug!(target: "docrest::memory", collection, %filter, "deleted document");
        self.publish(vec![event]).await;
        drop(store);

        Ok(1)
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        FilterEvaluator::validate(filter.as_document())?;

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let matched = documents
            .iter()
            .map(|document| FilterEvaluator::new(document).evaluate(filter.as_document()))
            .collect::<DocumentStoreResult<Vec<bool>>>()?;

        let mut events = Vec::new();
        let mut kept = Vec::with_capacity(documents.len());

        for (document, matched) in documents.drain(..).zip(matched) {
            if matched {
                events.push(delete_event(&document, collection));
            } else {
                kept.push(document);
            }
        }

        *documents = kept;
        let count = events.len() as u64;

        debug!(target: "docrest::memory", collection, %filter, count, "deleted documents");
        self.publish(events).await;
        drop(store);

        Ok(count)
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        let mut predicates = Vec::with_capacity(pipeline.len());

        for stage in pipeline {
            let predicate = match (stage.len(), stage.get("$match")) {
                (1, Some(Bson::Document(predicate))) => predicate.clone(),
                _ => {
                    return Err(DocumentStoreError::UnsupportedPipeline(format!(
                        "only $match stages are supported, got {stage}"
                    )));
                }
            };

            FilterEvaluator::validate(&predicate)
                .map_err(|e| DocumentStoreError::UnsupportedPipeline(e.to_string()))?;
            predicates.push(predicate);
        }

        let (sender, receiver) = unbounded();

        self.watchers.write().await.push(Watcher {
            collection: collection.to_string(),
            predicates,
            sender,
        });

        debug!(target: "docrest::memory", collection, "opened change feed");

        Ok(ChangeStream::new(receiver))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        // Dropping the senders ends every open change stream.
        self.watchers.write().await.clear();
        info!(target: "docrest::memory", "in-memory store shut down");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn filter(document: Document) -> Filter {
        Filter::from(document)
    }

    #[tokio::test]
    async fn test_insert_assigns_identity() {
        let store = InMemoryStore::new();

        let id = store.insert_one(doc! { "id": "u1" }, "users").await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let found = store.find_one(&filter(doc! { "id": "u1" }), "users").await.unwrap().unwrap();
        assert_eq!(found.get(ID_FIELD), Some(&id));

        let explicit = store.insert_one(doc! { "_id": 7, "id": "u2" }, "users").await.unwrap();
        assert_eq!(explicit, Bson::Int32(7));
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1 }, "users").await.unwrap();

        assert!(matches!(
            store.insert_one(doc! { "_id": 1i64 }, "users").await,
            Err(DocumentStoreError::DocumentAlreadyExists(..))
        ));

        let result = store
            .insert_many(vec![doc! { "_id": 2 }, doc! { "_id": 1 }, doc! { "_id": 3 }], "users")
            .await;
        assert!(result.is_err());
        assert_eq!(store.find_many(&Filter::all(), "users").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_sets_and_unsets_paths() {
        let store = InMemoryStore::new();
        store
            .insert_one(doc! { "_id": 1, "name": "Ann", "age": 30, "profile": { "city": "Oslo" } }, "users")
            .await
            .unwrap();

        let update = FieldUpdate {
            set: doc! { "name": "Bea", "profile.zip": "0150" },
            unset: vec!["age".to_string(), "missing".to_string()],
        };
        assert!(store.update_one(&filter(doc! { "_id": 1 }), update, "users").await.unwrap());

        let found = store.find_one(&Filter::all(), "users").await.unwrap().unwrap();
        assert_eq!(found, doc! { "_id": 1, "name": "Bea", "profile": { "city": "Oslo", "zip": "0150" } });

        assert!(!store
            .update_one(&filter(doc! { "_id": 2 }), FieldUpdate::set(doc! { "a": 1 }), "users")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_identity_is_immutable() {
        let store = InMemoryStore::new();
        store.insert_one(doc! { "_id": 1, "name": "Ann" }, "users").await.unwrap();

        let result = store
            .update_one(&Filter::all(), FieldUpdate::set(doc! { "_id": 2, "name": "Bea" }), "users")
            .await;
        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));

        let found = store.find_one(&Filter::all(), "users").await.unwrap().unwrap();
        assert_eq!(found, doc! { "_id": 1, "name": "Ann" });
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let store = InMemoryStore::new();
        store
            .insert_many(vec![doc! { "k": 1 }, doc! { "k": 1 }, doc! { "k": 2 }], "items")
            .await
            .unwrap();

        assert_eq!(store.delete_one(&filter(doc! { "k": 1 }), "items").await.unwrap(), 1);
        assert_eq!(store.delete_many(&filter(doc! { "k": { "$gte": 1 } }), "items").await.unwrap(), 2);
        assert_eq!(store.delete_many(&Filter::all(), "items").await.unwrap(), 0);
        assert_eq!(store.delete_one(&Filter::all(), "nothing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_subscribers_pruned() {
        let store = InMemoryStore::new();

        let mut events = store.watch(Vec::new(), "users").await.unwrap();
        let dropped = store.watch(Vec::new(), "users").await.unwrap();
        assert_eq!(store.subscriber_count().await, 2);

        drop(dropped);
        store.insert_one(doc! { "id": "u1" }, "users").await.unwrap();
        assert_eq!(store.subscriber_count().await, 1);

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.operation, ChangeOperation::Insert);

        events.close();
        store.delete_many(&Filter::all(), "users").await.unwrap();
        assert_eq!(store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams() {
        let store = InMemoryStore::new();
        let mut events = store.watch(Vec::new(), "users").await.unwrap();

        store.clone().shutdown().await.unwrap();
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_filters_validated_without_documents() {
        let store = InMemoryStore::new();
        let regex = filter(doc! { "name": { "$regex": "^A" } });

        assert!(matches!(
            store.find_one(&regex, "users").await,
            Err(DocumentStoreError::InvalidArgument(_))
        ));
        assert!(store.find_many(&regex, "users").await.is_err());
        assert!(store.update_one(&regex, FieldUpdate::set(doc! { "a": 1 }), "users").await.is_err());
        assert!(store.delete_one(&regex, "users").await.is_err());
        assert!(store.delete_many(&regex, "users").await.is_err());

        // A later `$or` clause is checked even when an earlier one decides the match
        store.insert_one(doc! { "name": "Ann" }, "users").await.unwrap();
        let shadowed = filter(doc! { "$or": [{ "name": "Ann" }, { "name": { "$where": "1" } }] });
        assert!(store.find_one(&shadowed, "users").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_events_follow_mutation_order() {
        let store = InMemoryStore::new();
        let mut events = store.watch(Vec::new(), "items").await.unwrap();

        let writers = (0..32)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_one(doc! { "n": n }, "items").await })
            })
            .collect::<Vec<_>>();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let stored = store
            .find_many(&Filter::all(), "items")
            .await
            .unwrap()
            .into_iter()
            .map(|document| document.get("_id").cloned())
            .collect::<Vec<_>>();

        let mut published = Vec::new();
        for _ in 0..stored.len() {
            let event = events.next().await.unwrap().unwrap();
            published.push(event.document_key.and_then(|key| key.get("_id").cloned()));
        }

        assert_eq!(published, stored);
    }
}
