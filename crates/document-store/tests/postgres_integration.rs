//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    DocumentEnvelope, DocumentId, DocumentQuery, DocumentStore, DocumentStoreError,
    DocumentStoreExt, DocumentWrite, PostgresDocumentStore, SortOrder, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/002_unique_order_number.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn order(status: &str, customer: &str) -> DocumentEnvelope {
    DocumentEnvelope::new(
        "orders",
        DocumentId::new(),
        serde_json::json!({ "status": status, "customer": customer }),
    )
}

#[tokio::test]
#[serial]
async fn insert_and_get() {
    let store = get_test_store().await;
    let doc = order("pending", "c-1");
    let id = doc.id;

    let stored = store.insert(doc).await.unwrap();
    assert_eq!(stored.version, Version::first());

    let loaded = store.get("orders", id).await.unwrap().unwrap();
    assert_eq!(loaded.version, Version::first());
    assert_eq!(loaded.body["status"], "pending");
    assert!(store.get("pharmacies", id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn duplicate_insert_is_rejected() {
    let store = get_test_store().await;
    let doc = order("pending", "c-1");

    store.insert(doc.clone()).await.unwrap();
    let result = store.insert(doc).await;

    assert!(matches!(
        result,
        Err(DocumentStoreError::AlreadyExists { .. })
    ));
}

#[tokio::test]
#[serial]
async fn order_numbers_are_unique() {
    let store = get_test_store().await;
    let numbered = |number: &str| {
        DocumentEnvelope::new(
            "orders",
            DocumentId::new(),
            serde_json::json!({ "orderId": number, "status": "pending" }),
        )
    };

    store.insert(numbered("ORD-123456-001")).await.unwrap();
    let result = store.insert(numbered("ORD-123456-001")).await;
    assert!(matches!(
        result,
        Err(DocumentStoreError::UniqueViolation { ref constraint, .. })
            if constraint == "idx_documents_order_number"
    ));

    // Other collections may reuse the value
    let mut note = numbered("ORD-123456-001");
    note.collection = "notes".to_string();
    store.insert(note).await.unwrap();
    store.insert(numbered("ORD-123456-002")).await.unwrap();
}

#[tokio::test]
#[serial]
async fn optimistic_concurrency_conflict() {
    let store = get_test_store().await;
    let stored = store.insert(order("pending", "c-1")).await.unwrap();

    let mut first = stored.clone();
    first.body["status"] = serde_json::json!("confirmed");
    let updated = store.update(first, Version::first()).await.unwrap();
    assert_eq!(updated.version, Version::new(2));

    let mut stale = stored.clone();
    stale.body["status"] = serde_json::json!("cancelled");
    let result = store.update(stale, Version::first()).await;

    assert!(matches!(
        result,
        Err(DocumentStoreError::ConcurrencyConflict { .. })
    ));

    let loaded = store.get("orders", stored.id).await.unwrap().unwrap();
    assert_eq!(loaded.body["status"], "confirmed");
}

#[tokio::test]
#[serial]
async fn update_of_missing_document_fails() {
    let store = get_test_store().await;
    let result = store
        .update(order("pending", "c-1"), Version::first())
        .await;
    assert!(matches!(result, Err(DocumentStoreError::NotFound { .. })));
}

#[tokio::test]
#[serial]
async fn batch_rolls_back_on_conflict() {
    let store = get_test_store().await;
    let order_doc = store.insert(order("ready", "c-1")).await.unwrap();
    let pharmacy = store
        .insert(DocumentEnvelope::new(
            "pharmacies",
            DocumentId::new(),
            serde_json::json!({ "stock": 5 }),
        ))
        .await
        .unwrap();

    let mut delivered = order_doc.clone();
    delivered.body["status"] = serde_json::json!("delivered");
    let mut decremented = pharmacy.clone();
    decremented.body["stock"] = serde_json::json!(2);

    let result = store
        .commit(vec![
            DocumentWrite::update(delivered, Version::first()),
            DocumentWrite::update(decremented, Version::new(9)),
        ])
        .await;
    assert!(result.is_err());

    let loaded = store.get("orders", order_doc.id).await.unwrap().unwrap();
    assert_eq!(loaded.body["status"], "ready");
    assert_eq!(loaded.version, Version::first());
}

#[tokio::test]
#[serial]
async fn find_with_filters_and_paging() {
    let store = get_test_store().await;
    let mut ids = Vec::new();
    for (status, customer) in [
        ("ready", "c-1"),
        ("pending", "c-1"),
        ("ready", "c-2"),
        ("ready", "c-1"),
    ] {
        ids.push(store.insert(order(status, customer)).await.unwrap().id);
    }

    let query = DocumentQuery::new("orders")
        .field_eq("status", "ready")
        .field_eq("customer", "c-1");
    assert_eq!(store.count(query.clone()).await.unwrap(), 2);

    let newest = store.find(query.clone()).await.unwrap();
    assert_eq!(newest.len(), 2);
    assert_eq!(newest[0].id, ids[3]);

    let oldest = store
        .find(query.sort(SortOrder::OldestFirst).limit(1))
        .await
        .unwrap();
    assert_eq!(oldest.len(), 1);
    assert_eq!(oldest[0].id, ids[0]);

    let paged = store
        .find(DocumentQuery::new("orders").limit(2).offset(2))
        .await
        .unwrap();
    assert_eq!(paged.len(), 2);
}

#[tokio::test]
#[serial]
async fn find_missing_field() {
    let store = get_test_store().await;
    let unassigned = store.insert(order("ready", "c-1")).await.unwrap();

    let mut assigned = order("ready", "c-2");
    assigned.body["driver"] = serde_json::json!("d-1");
    store.insert(assigned).await.unwrap();

    let mut explicit_null = order("ready", "c-3");
    explicit_null.body["driver"] = serde_json::Value::Null;
    store.insert(explicit_null).await.unwrap();

    let query = DocumentQuery::new("orders")
        .field_eq("status", "ready")
        .field_missing("driver");
    let found = store.find(query).await.unwrap();

    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|d| d.id == unassigned.id));
}
