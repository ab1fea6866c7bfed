use bson::{Bson, Document, doc};
use serde::Deserialize;

use docrest::{
    document::strip_identity,
    memory::InMemoryStore,
    prelude::*,
};

fn without_identity(mut document: Document) -> Document {
    strip_identity(&mut document);
    document
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: String,
    name: String,
    age: Option<i32>,
}

#[tokio::test]
async fn test_put_one_inserts_when_absent() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");

    let existed = users
        .put_one(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Ann" })
        .await
        .unwrap();
    assert!(!existed);

    let stored = users.get_one(doc! { "id": "u1" }).await.unwrap().unwrap();
    assert!(matches!(stored.get("_id"), Some(Bson::ObjectId(_))));
    assert_eq!(without_identity(stored), doc! { "id": "u1", "name": "Ann" });
}

#[tokio::test]
async fn test_put_one_overlays_existing_fields() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");
    users.insert_one(doc! { "id": "u1", "name": "Ann", "age": 30 }).await.unwrap();
    let before = users.get_one(doc! { "id": "u1" }).await.unwrap().unwrap();

    let existed = users
        .put_one(doc! { "id": "u1" }, doc! { "name": "Bea" })
        .await
        .unwrap();
    assert!(existed);

    let after = users.get_one(doc! { "id": "u1" }).await.unwrap().unwrap();
    assert_eq!(after.get("_id"), before.get("_id"));
    assert_eq!(without_identity(after), doc! { "id": "u1", "name": "Bea", "age": 30 });

    let typed = users.get_one_as::<User>(doc! { "id": "u1" }).await.unwrap();
    assert_eq!(typed, Some(User { id: "u1".into(), name: "Bea".into(), age: Some(30) }));
}

#[tokio::test]
async fn test_put_one_never_rewrites_identity() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");
    let id = users.insert_one(doc! { "id": "u1", "name": "Ann" }).await.unwrap();

    let existed = users
        .post_one(doc! { "id": "u1" }, doc! { "_id": "other", "name": "Bea" })
        .await
        .unwrap();
    assert!(existed);

    let stored = users.get_one(doc! { "id": "u1" }).await.unwrap().unwrap();
    assert_eq!(stored.get("_id"), Some(&id));
    assert_eq!(stored.get_str("name").unwrap(), "Bea");
}

#[tokio::test]
async fn test_put_one_if_absent_keeps_existing() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");

    assert!(!users
        .put_one_if_absent(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Ann" })
        .await
        .unwrap());
    let before = users.get_one(doc! { "id": "u1" }).await.unwrap();

    assert!(users
        .put_one_if_absent(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Zed", "extra": true })
        .await
        .unwrap());
    assert_eq!(users.get_one(doc! { "id": "u1" }).await.unwrap(), before);
    assert_eq!(users.get_many(Filter::all()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_put_many_reports_each_pair() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");
    users.insert_one(doc! { "id": "u2", "name": "Bob" }).await.unwrap();

    let outcomes = users
        .put_many(
            vec![
                Filter::from(doc! { "id": "u1" }),
                Filter::from(doc! { "id": "u2" }),
                Filter::from(doc! { "id": "u1" }),
            ],
            vec![
                doc! { "id": "u1", "name": "Ann" },
                doc! { "name": "Rob" },
                doc! { "age": 41 },
            ],
        )
        .await
        .unwrap();
    assert_eq!(outcomes, vec![false, true, true]);

    let u1 = users.get_one(doc! { "id": "u1" }).await.unwrap().unwrap();
    assert_eq!(without_identity(u1), doc! { "id": "u1", "name": "Ann", "age": 41 });

    let last = users
        .put_many_last_outcome(
            vec![Filter::from(doc! { "id": "u2" }), Filter::from(doc! { "id": "u3" })],
            vec![doc! { "name": "Bo" }, doc! { "id": "u3" }],
        )
        .await
        .unwrap();
    assert!(!last);
    assert!(!users.put_many_last_outcome(Vec::new(), Vec::new()).await.unwrap());
}

#[tokio::test]
async fn test_put_many_rejects_unequal_lengths() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");

    let err = users
        .put_many(vec![Filter::from(doc! { "id": "u1" })], Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));
    assert!(users.get_many(Filter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_many_and_deletes() {
    let store = DocumentStore::new(InMemoryStore::new());
    let items = store.collection("items");

    let ids = items
        .post_many(vec![
            doc! { "sku": "a", "qty": 1 },
            doc! { "sku": "b", "qty": 5 },
            doc! { "sku": "c", "qty": 9 },
        ])
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let heavy = items
        .get_many(Filter::try_from(Field::gte("qty", 5)).unwrap())
        .await
        .unwrap();
    assert_eq!(heavy.len(), 2);
    assert!(items.get_many(doc! { "sku": "z" }).await.unwrap().is_empty());
    assert_eq!(items.get_one(doc! { "sku": "z" }).await.unwrap(), None);

    assert_eq!(items.delete_one(doc! { "sku": "a" }).await.unwrap(), 1);
    assert_eq!(items.delete_one(doc! { "sku": "a" }).await.unwrap(), 0);
    assert_eq!(items.delete_many(Filter::all()).await.unwrap(), 2);
    assert_eq!(items.delete_many(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dynamic_store() {
    let store = DocumentStore::new(InMemoryStore::new()).into_dyn();

    {
        let users = store.collection("users");
        assert!(!users
            .put_one(doc! { "id": "u1" }, doc! { "id": "u1", "name": "Ann" })
            .await
            .unwrap());
        assert!(users
            .merge_patch(doc! { "id": "u1" }, &MergePatch::new(doc! { "name": "Bea" }))
            .await
            .unwrap());

        let borrowed = store.as_dyn();
        let stored = borrowed.collection("users").get_one(doc! { "id": "u1" }).await.unwrap().unwrap();
        assert_eq!(stored.get_str("name").unwrap(), "Bea");
    }

    assert!(store.as_static::<InMemoryStore>().is_some());

    let store = store.into_static::<InMemoryStore>().unwrap();
    assert_eq!(store.collection("users").get_many(Filter::all()).await.unwrap().len(), 1);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_borrowed_dyn_store_outlives_call() {
    let store = DocumentStore::new(InMemoryStore::new());
    store.collection("users").insert_one(doc! { "id": "u1" }).await.unwrap();

    let users: DynCollection<'_> = {
        let borrowed: DynDocumentStoreRef<'_> = store.as_dyn();
        borrowed.collection("users")
    };

    assert_eq!(users.name(), "users");
    assert_eq!(users.get_many(Filter::all()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_into_static_keeps_store_on_mismatch() {
    let backend: &'static InMemoryStore = Box::leak(Box::new(InMemoryStore::new()));
    let store = DocumentStore::new(backend).into_dyn();

    assert!(store.as_static::<InMemoryStore>().is_none());

    let store = store.into_static::<InMemoryStore>().unwrap_err();
    assert!(store.as_static::<&'static InMemoryStore>().is_some());
}

#[tokio::test]
async fn test_failed_read_aborts_upserts() {
    let store = DocumentStore::new(InMemoryStore::new());
    let users = store.collection("users");
    let unsupported = || doc! { "name": { "$regex": "^A" } };

    let err = users
        .put_one(unsupported(), doc! { "name": "Ann" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));

    let err = users
        .put_one_if_absent(unsupported(), doc! { "name": "Ann" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));
    assert!(users.get_many(Filter::all()).await.unwrap().is_empty());

    let err = users
        .put_many(
            vec![Filter::from(doc! { "id": "u1" }), Filter::from(unsupported())],
            vec![doc! { "id": "u1" }, doc! { "name": "Ann" }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));

    // The pair before the failing one stays written
    let stored = users.get_many(Filter::all()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("id").unwrap(), "u1");

    // Validation does not depend on what is stored
    let err = users
        .put_one(unsupported(), doc! { "name": "Ann" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidArgument(_)));
    assert_eq!(users.get_many(Filter::all()).await.unwrap().len(), 1);
}
