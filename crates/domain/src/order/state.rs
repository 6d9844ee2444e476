//! Order status machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// ```text
/// pending ──► confirmed ──► processing ──► ready ──► delivering ──► delivered
///    │            │                          │                         ▲
///    └────────────┴──► cancelled             └──── (admin) ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed by the customer, awaiting the pharmacy.
    #[default]
    Pending,

    /// Accepted by the pharmacy.
    Confirmed,

    /// Being prepared.
    Processing,

    /// Packed and waiting for a driver.
    Ready,

    /// Picked up by the assigned driver.
    Delivering,

    /// Handed to the customer (terminal state).
    Delivered,

    /// Cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Ready,
        OrderStatus::Delivering,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the customer may still cancel in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if a driver may claim the order in this status.
    pub fn can_assign_driver(&self) -> bool {
        matches!(self, OrderStatus::Ready)
    }

    /// Returns true if the order may be rated in this status.
    pub fn can_rate(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown order status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
