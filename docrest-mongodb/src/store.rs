use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc, ser::serialize_to_bson};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    change_stream::event::{ChangeStreamEvent, OperationType},
    options::{
        ClientOptions, CollectionOptions, FindOneOptions, FindOptions, FullDocumentType,
        WriteConcern,
    },
};
use tracing::{debug, info};

use docrest_core::{
    backend::{FieldUpdate, StoreBackend, StoreBackendBuilder},
    change::{ChangeEvent, ChangeOperation, ChangeStream},
    config::TimeoutConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filter,
};

/// MongoDB storage backend.
///
/// Filters and pipelines are handed to the server as-is. Reads are bounded by the read and
/// bulk read timeouts of its [`TimeoutConfig`]; writes by the write timeout when one is set.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    timeouts: TimeoutConfig,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String, timeouts: TimeoutConfig) -> Self {
        Self { client, database, timeouts }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection_with_options(collection_name, collection_options(&self.timeouts))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!(target: "docrest::mongodb", database = %self.database, "client shut down");

        Ok(())
    }
}

fn transport(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Transport(err.to_string())
}

fn apply_timeouts(options: &mut ClientOptions, timeouts: &TimeoutConfig) {
    options.server_selection_timeout = Some(timeouts.connect);
    options.connect_timeout = Some(timeouts.connect);
}

fn collection_options(timeouts: &TimeoutConfig) -> CollectionOptions {
    let mut options = CollectionOptions::default();

    if let Some(w_timeout) = timeouts.write {
        let mut write_concern = WriteConcern::default();
        write_concern.w_timeout = Some(w_timeout);
        options.write_concern = Some(write_concern);
    }

    options
}

fn change_operation(operation: &OperationType) -> ChangeOperation {
    match operation {
        OperationType::Insert => ChangeOperation::Insert,
        OperationType::Update => ChangeOperation::Update,
        OperationType::Replace => ChangeOperation::Replace,
        OperationType::Delete => ChangeOperation::Delete,
        other => match serialize_to_bson(other) {
            Ok(Bson::String(name)) => ChangeOperation::Other(name),
            _ => ChangeOperation::Other(format!("{other:?}")),
        },
    }
}

fn to_change_event(event: ChangeStreamEvent<Document>, collection: &str) -> ChangeEvent {
    let (updated_fields, removed_fields) = match event.update_description {
        Some(description) => (Some(description.updated_fields), description.removed_fields),
        None => (None, Vec::new()),
    };

    ChangeEvent {
        operation: change_operation(&event.operation_type),
        collection: event
            .ns
            .and_then(|ns| ns.coll)
            .unwrap_or_else(|| collection.to_string()),
        document_key: event.document_key,
        full_document: event.full_document,
        updated_fields,
        removed_fields,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.max_time = Some(self.timeouts.read);

        self.get_collection(collection)
            .find_one(filter.as_document().clone())
            .with_options(options)
            .await
            .map_err(transport)
    }

    async fn find_many(
        &self,
        filter: &Filter,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.max_time = Some(self.timeouts.bulk_read);

        self.get_collection(collection)
            .find(filter.as_document().clone())
            .with_options(options)
            .await
            .map_err(transport)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(transport)
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let result = self
            .get_collection(collection)
            .insert_one(document)
            .await
            .map_err(transport)?;

        debug!(target: "docrest::mongodb", collection, id = %result.inserted_id, "inserted document");

        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut inserted = self
            .get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(transport)?
            .inserted_ids
            .into_iter()
            .collect::<Vec<(usize, Bson)>>();

        inserted.sort_by_key(|(index, _)| *index);
        debug!(target: "docrest::mongodb", collection, count = inserted.len(), "inserted documents");

        Ok(inserted
            .into_iter()
            .map(|(_, id)| id)
            .collect())
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: FieldUpdate,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        // The server rejects an empty update document.
        if update.is_empty() {
            return Ok(StoreBackend::find_one(self, filter, collection)
                .await?
                .is_some());
        }

        let result = self
            .get_collection(collection)
            .update_one(filter.as_document().clone(), update.to_update_document())
            .await
            .map_err(transport)?;

        debug!(
            target: "docrest::mongodb",
            collection,
            %filter,
            matched = result.matched_count,
            modified = result.modified_count,
            "updated document"
        );

        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(filter.as_document().clone())
            .await
            .map_err(transport)?
            .deleted_count)
    }

    async fn delete_many(&self, filter: &Filter, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(filter.as_document().clone())
            .await
            .map_err(transport)?
            .deleted_count)
    }

    async fn watch(
        &self,
        pipeline: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<ChangeStream> {
        let stream = self
            .get_collection(collection)
            .watch()
            .pipeline(pipeline)
            .full_document(FullDocumentType::UpdateLookup)
            .await
            .map_err(transport)?;

        debug!(target: "docrest::mongodb", collection, "opened change stream");

        let collection = collection.to_string();

        Ok(ChangeStream::new(stream.map(move |event| {
            event
                .map(|event| to_change_event(event, &collection))
                .map_err(transport)
        })))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

/// Connects a [`MongoDbStore`].
///
/// ```ignore
/// let store = MongoDbStore::builder("mongodb://localhost:27017", "app")
///     .timeouts(TimeoutConfig::default().with_write(Duration::from_secs(10)))
///     .build()
///     .await?;
/// ```
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    timeouts: TimeoutConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Parses the connection string, connects and verifies the server with a `ping`.
    ///
    /// Every step is bounded by the connect timeout.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;
        apply_timeouts(&mut options, &self.timeouts);

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        info!(target: "docrest::mongodb", database = %self.database, "connected");

        Ok(MongoDbStore::new(client, self.database, self.timeouts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_applied_to_client() {
        let mut options = ClientOptions::default();
        apply_timeouts(&mut options, &TimeoutConfig::default().with_connect(Duration::from_secs(7)));

        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(7)));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_write_timeout_sets_write_concern() {
        assert!(collection_options(&TimeoutConfig::default()).write_concern.is_none());

        let options = collection_options(&TimeoutConfig::default().with_write(Duration::from_secs(2)));
        assert_eq!(
            options.write_concern.and_then(|wc| wc.w_timeout),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_change_operation_names() {
        assert_eq!(change_operation(&OperationType::Update), ChangeOperation::Update);
        assert_eq!(
            change_operation(&OperationType::Invalidate),
            ChangeOperation::Other("invalidate".to_string())
        );
    }
}
