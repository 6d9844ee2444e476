use criterion::{Criterion, criterion_group, criterion_main};
use document_store::{
    DocumentEnvelope, DocumentId, DocumentQuery, DocumentStore, DocumentStoreExt,
    InMemoryDocumentStore,
};

fn make_order(status: &str) -> DocumentEnvelope {
    DocumentEnvelope::new(
        "orders",
        DocumentId::new(),
        serde_json::json!({
            "orderId": "ORD-123456-001",
            "status": status,
            "customer": "00000000-0000-0000-0000-000000000001",
            "items": [{ "medicine": "00000000-0000-0000-0000-000000000002", "quantity": 3, "price": 5.5 }],
            "totalAmount": 16.5
        }),
    )
}

fn bench_insert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("document_store/insert", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                store.insert(make_order("pending")).await.unwrap();
            });
        });
    });
}

fn bench_versioned_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let mut current = rt.block_on(async { store.insert(make_order("pending")).await.unwrap() });

    c.bench_function("document_store/versioned_update", |b| {
        b.iter(|| {
            rt.block_on(async {
                let expected = current.version;
                current = store.update(current.clone(), expected).await.unwrap();
            });
        });
    });
}

fn bench_find_page(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();

    // Pre-populate with 1000 orders, a quarter of them ready
    rt.block_on(async {
        for i in 0..1000 {
            let status = if i % 4 == 0 { "ready" } else { "pending" };
            store.insert(make_order(status)).await.unwrap();
        }
    });

    c.bench_function("document_store/find_ready_page_20", |b| {
        b.iter(|| {
            rt.block_on(async {
                let query = DocumentQuery::new("orders")
                    .field_eq("status", "ready")
                    .field_missing("driver")
                    .limit(20);
                store.find(query).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_insert, bench_versioned_update, bench_find_page);
criterion_main!(benches);
