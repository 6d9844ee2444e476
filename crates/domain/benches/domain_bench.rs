use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{ActorId, PharmacyId};
use criterion::{Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    Actor, ChangeStatus, DocumentCatalog, LifecycleConfig, Medicine, Money, Order, OrderService,
    OrderStatus, Pharmacy, PlaceOrder, StockLedger,
};

type Service = OrderService<InMemoryDocumentStore, DocumentCatalog<InMemoryDocumentStore>>;

async fn setup(lines: usize) -> (Service, PharmacyId, Vec<Medicine>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let catalog = DocumentCatalog::new(Arc::clone(&store));

    let mut pharmacy = Pharmacy::new(PharmacyId::new(), "Bench Pharmacy");
    let mut medicines = Vec::with_capacity(lines);
    for i in 0..lines {
        let medicine = Medicine::new(format!("Medicine {i}"), Money::from_cents(250));
        catalog.upsert_medicine(medicine.clone()).await.unwrap();
        pharmacy = pharmacy.with_stock(medicine.id, u32::MAX, Money::from_cents(300 + i as i64));
        medicines.push(medicine);
    }
    StockLedger::new(Arc::clone(&store), catalog.clone())
        .register_pharmacy(pharmacy.clone())
        .await
        .unwrap();

    let service = OrderService::new(store, catalog, LifecycleConfig::default());
    (service, pharmacy.id, medicines)
}

fn request(pharmacy: PharmacyId, medicines: &[Medicine]) -> PlaceOrder {
    medicines
        .iter()
        .fold(PlaceOrder::new(pharmacy, "1 Bench Road"), |request, medicine| {
            request.item(medicine.id, 2)
        })
}

fn bench_order_place_pure(c: &mut Criterion) {
    let medicines: Vec<_> = (0..10)
        .map(|i| Medicine::new(format!("Medicine {i}"), Money::from_cents(250)))
        .collect();
    let pharmacy = medicines
        .iter()
        .fold(Pharmacy::new(PharmacyId::new(), "Bench"), |p, m| {
            p.with_stock(m.id, 100, Money::from_cents(300))
        });
    let catalog: HashMap<_, _> = medicines.iter().map(|m| (m.id, m.clone())).collect();
    let validated = request(pharmacy.id, &medicines).validate().unwrap();
    let config = LifecycleConfig::default();
    let customer = ActorId::new();

    c.bench_function("domain/order_place_10_lines", |b| {
        b.iter(|| {
            Order::place(
                validated.clone(),
                customer,
                &pharmacy,
                &catalog,
                &config,
                Utc::now(),
            )
            .unwrap()
        });
    });
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, pharmacy, medicines) = rt.block_on(setup(5));
    let customer = Actor::customer(ActorId::new());

    c.bench_function("domain/place_order_5_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .place_order(&customer, request(pharmacy, &medicines))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, pharmacy, medicines) = rt.block_on(setup(3));
    let customer = Actor::customer(ActorId::new());
    let pharmacy_actor = Actor::pharmacy(pharmacy);
    let driver = Actor::driver(ActorId::new());

    c.bench_function("domain/place_to_delivered", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = service
                    .place_order(&customer, request(pharmacy, &medicines))
                    .await
                    .unwrap();
                let id = order.id.to_string();
                for status in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Ready] {
                    service
                        .pharmacy_update_status(&pharmacy_actor, &id, ChangeStatus::new(status))
                        .await
                        .unwrap();
                }
                service.assign_driver(&driver, &id).await.unwrap();
                for status in [OrderStatus::Delivering, OrderStatus::Delivered] {
                    service
                        .update_status(&driver, &id, ChangeStatus::new(status))
                        .await
                        .unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_place_pure,
    bench_place_order,
    bench_full_lifecycle,
);
criterion_main!(benches);
