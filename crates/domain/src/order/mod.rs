//! Order aggregate, lifecycle engine and related types.

mod aggregate;
mod commands;
mod service;
mod state;
pub mod transitions;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use service::OrderService;
pub use state::{OrderStatus, UnknownStatus};
pub use value_objects::{
    CustomerRef, CustomerSummary, GuestCustomer, LineItem, Money, OrderNumber, Rating,
    TrackingEntry,
};

use thiserror::Error;

use crate::stock::StockShortfall;
use crate::validation::ValidationErrors;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// The request itself is malformed.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// One or more lines cannot be served from the pharmacy's stock.
    #[error("Insufficient stock: {}", describe_shortfalls(.0))]
    StockUnavailable(Vec<StockShortfall>),

    /// The actor may not perform this operation on this order.
    #[error("Not allowed to {action}: {reason}")]
    Forbidden {
        action: &'static str,
        reason: String,
    },

    /// The target status is not reachable from the current one.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The operation is not available in the order's current status.
    #[error("Cannot {action} an order that is {current_state}")]
    InvalidState {
        current_state: OrderStatus,
        action: &'static str,
    },

    #[error("A driver is already assigned to this order")]
    DriverAlreadyAssigned,

    #[error("Order has already been rated")]
    AlreadyRated,

    #[error("A prescription is required for: {}", .medicines.join(", "))]
    PrescriptionRequired { medicines: Vec<String> },

    /// More than one stored order carries this number.
    #[error("Order number {0} matches more than one order, use the order id")]
    AmbiguousOrderNumber(OrderNumber),

    #[error("Could not allocate an unused order number, retry the request")]
    OrderNumberUnavailable,
}

impl OrderError {
    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::StockUnavailable(_) => "stock_unavailable",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::InvalidState { .. } => "invalid_state",
            OrderError::DriverAlreadyAssigned => "driver_already_assigned",
            OrderError::AlreadyRated => "already_rated",
            OrderError::PrescriptionRequired { .. } => "prescription_required",
            OrderError::AmbiguousOrderNumber(_) => "ambiguous_order_number",
            OrderError::OrderNumberUnavailable => "order_number_unavailable",
        }
    }

    pub(crate) fn forbidden(action: &'static str, reason: impl Into<String>) -> Self {
        OrderError::Forbidden {
            action,
            reason: reason.into(),
        }
    }
}

impl From<ValidationErrors> for OrderError {
    fn from(errors: ValidationErrors) -> Self {
        OrderError::Validation(errors)
    }
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
