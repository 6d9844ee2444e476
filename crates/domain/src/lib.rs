//! Domain layer for the pharmacy ordering platform.
//!
//! This crate provides:
//! - the `Order` aggregate with its status transition table
//! - the lifecycle engine that persists orders and reconciles stock on delivery
//! - the stock ledger and the medicine catalog
//! - actor types and the access gate that resolves credentials to actors

pub mod access;
pub mod catalog;
pub mod config;
pub mod error;
pub mod order;
pub mod repository;
pub mod stock;
pub mod validation;

pub use access::{AccessConfigError, AccessGate, Actor, ActorType, AuthFailure, StaticAccessGate};
pub use catalog::{DocumentCatalog, Medicine, MedicineCatalog};
pub use config::LifecycleConfig;
pub use error::DomainError;
pub use order::{
    CancelOrder, ChangeStatus, CustomerRef, CustomerSummary, GuestCustomer, LineItem, ListOrders,
    Money, Order, OrderError, OrderFilter, OrderLine, OrderNumber, OrderService, OrderStatus,
    PlaceOrder, RateOrder, Rating, TrackingEntry,
};
pub use repository::{Document, Repository, Versioned};
pub use stock::{Pharmacy, StockEntry, StockError, StockLedger, StockShortfall, UpdateStock};
pub use validation::{FieldError, ValidationErrors};
