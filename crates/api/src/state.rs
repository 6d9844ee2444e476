//! Shared application state.

use std::sync::Arc;

use document_store::DocumentStore;
use domain::{AccessGate, DocumentCatalog, LifecycleConfig, OrderService, StockLedger};

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub orders: OrderService<S, DocumentCatalog<S>>,
    pub stock: StockLedger<S, DocumentCatalog<S>>,
    pub catalog: DocumentCatalog<S>,
    pub access: Arc<dyn AccessGate>,
}

impl<S: DocumentStore> AppState<S> {
    /// Wires the domain services over one document store.
    pub fn new(store: Arc<S>, access: Arc<dyn AccessGate>, lifecycle: LifecycleConfig) -> Self {
        let catalog = DocumentCatalog::new(Arc::clone(&store));
        Self {
            orders: OrderService::new(Arc::clone(&store), catalog.clone(), lifecycle),
            stock: StockLedger::new(store, catalog.clone()),
            catalog,
            access,
        }
    }
}
