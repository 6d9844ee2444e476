//! Order aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{ActorId, DocumentId, MedicineId, PharmacyId};
use serde::{Deserialize, Serialize};

use crate::access::{Actor, ActorType};
use crate::catalog::Medicine;
use crate::config::LifecycleConfig;
use crate::repository::Document;
use crate::stock::{Pharmacy, StockShortfall};
use crate::validation::ValidationErrors;

use super::transitions;
use super::{
    CustomerRef, GuestCustomer, LineItem, Money, OrderError, OrderNumber, OrderStatus, Rating,
    TrackingEntry, ValidatedOrder,
};

/// A customer's order against one pharmacy.
///
/// Orders are never mutated in place: every operation returns the next state
/// of the order, which the lifecycle engine then persists with a version check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: DocumentId,
    pub order_id: OrderNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_customer: Option<GuestCustomer>,
    pub pharmacy: PharmacyId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub delivery_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<ActorId>,
    pub tracking_history: Vec<TrackingEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";
    const KIND: &'static str = "order";

    fn document_id(&self) -> DocumentId {
        self.id
    }
}

impl Order {
    /// Builds a new pending order from a validated request.
    ///
    /// Every line is checked against the pharmacy's stock, and all shortfalls
    /// are reported together. Prices come from the stock entries, never from
    /// the request.
    pub fn place(
        request: ValidatedOrder,
        customer: ActorId,
        pharmacy: &Pharmacy,
        medicines: &HashMap<MedicineId, Medicine>,
        config: &LifecycleConfig,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        if pharmacy.id != request.pharmacy {
            return Err(ValidationErrors::single("pharmacy", "does not match the loaded pharmacy").into());
        }
        if !pharmacy.active {
            return Err(ValidationErrors::single("pharmacy", "is not accepting orders").into());
        }

        let mut items = Vec::with_capacity(request.lines.len());
        let mut shortfalls = Vec::new();

        for line in &request.lines {
            let entry = pharmacy.stock_entry(line.medicine);
            match entry {
                Some(entry) if pharmacy.has_available(line.medicine, line.quantity) => {
                    items.push(LineItem {
                        medicine: line.medicine,
                        quantity: line.quantity,
                        price: entry.price,
                        pharmacy: pharmacy.id,
                    });
                }
                _ => shortfalls.push(StockShortfall {
                    medicine: line.medicine,
                    medicine_name: medicines.get(&line.medicine).map(|m| m.name.clone()),
                    requested: line.quantity,
                    available: entry.map(|e| e.quantity),
                }),
            }
        }

        if !shortfalls.is_empty() {
            return Err(OrderError::StockUnavailable(shortfalls));
        }

        if config.enforce_prescription && request.prescription_url.is_none() {
            let names: Vec<String> = items
                .iter()
                .filter_map(|item| medicines.get(&item.medicine))
                .filter(|m| m.requires_prescription)
                .map(|m| m.name.clone())
                .collect();
            if !names.is_empty() {
                return Err(OrderError::PrescriptionRequired { medicines: names });
            }
        }

        let total_amount = total_of(&items)
            .ok_or_else(|| ValidationErrors::single("items", "order total is too large"))?;

        Ok(Order {
            id: DocumentId::new(),
            order_id: OrderNumber::generate_with(now, &mut rand::thread_rng()),
            customer: Some(CustomerRef::Reference(customer)),
            guest_customer: request.guest_customer,
            pharmacy: pharmacy.id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            delivery_address: request.delivery_address,
            delivery_latitude: request.delivery_latitude,
            delivery_longitude: request.delivery_longitude,
            special_instructions: request.special_instructions,
            prescription_url: request.prescription_url,
            driver: None,
            tracking_history: vec![TrackingEntry::new(
                OrderStatus::Pending,
                now,
                Some("Order placed".to_string()),
            )],
            rating: None,
            review: None,
            actual_delivery_time: None,
            created_at: now,
            updated_at: now,
        })
    }

    // Queries

    /// Returns the owning customer's id, if the order has one.
    pub fn customer_id(&self) -> Option<ActorId> {
        self.customer.as_ref().map(CustomerRef::id)
    }

    pub fn is_owned_by(&self, customer: ActorId) -> bool {
        self.customer_id() == Some(customer)
    }

    pub fn is_assigned_to(&self, driver: ActorId) -> bool {
        self.driver == Some(driver)
    }

    /// Returns true if the actor may read this order.
    pub fn can_view(&self, actor: &Actor) -> bool {
        match actor.actor_type {
            ActorType::Admin => true,
            ActorType::Customer => self.is_owned_by(actor.id),
            ActorType::Pharmacy | ActorType::Driver => false,
        }
    }

    /// Sum of the line subtotals, `None` if it overflows.
    pub fn computed_total(&self) -> Option<Money> {
        total_of(&self.items)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    // Commands

    /// Moves the order to `target` on behalf of `actor`.
    ///
    /// The actor must own the order in its role (owning customer, owning
    /// pharmacy, assigned driver; admins own everything) and the move must be
    /// in the transition table.
    pub fn transition(
        &self,
        actor: &Actor,
        target: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        self.authorize(actor, "change order status")?;
        transitions::check(actor.actor_type, self.status, target)?;
        Ok(self.with_status(target, note, now))
    }

    /// Cancels the order on behalf of its customer, or of an admin.
    ///
    /// Customers may cancel only while the order is pending or confirmed;
    /// admins may cancel any order that is not yet terminal.
    pub fn cancel(
        &self,
        actor: &Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        if actor.is_admin() {
            let note = reason.unwrap_or_else(|| "Cancelled by admin".to_string());
            return self.transition(actor, OrderStatus::Cancelled, Some(note), now);
        }
        self.require_owner(actor, "cancel order")?;
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidState {
                current_state: self.status,
                action: "cancel",
            });
        }
        let note = reason.unwrap_or_else(|| "Cancelled by customer".to_string());
        self.transition(actor, OrderStatus::Cancelled, Some(note), now)
    }

    /// Records the customer's rating of a delivered order. Settable once.
    pub fn rate(
        &self,
        actor: &Actor,
        rating: Rating,
        review: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        self.require_owner(actor, "rate order")?;
        if !self.status.can_rate() {
            return Err(OrderError::InvalidState {
                current_state: self.status,
                action: "rate",
            });
        }
        if self.rating.is_some() {
            return Err(OrderError::AlreadyRated);
        }

        let mut next = self.clone();
        next.rating = Some(rating);
        next.review = review;
        next.updated_at = now;
        Ok(next)
    }

    /// Lets a driver claim a ready order that has no driver yet.
    ///
    /// The status stays `ready` unless `assign_driver_resets_status` is set,
    /// in which case it is forced to `confirmed` like the legacy backend did.
    pub fn assign_driver(
        &self,
        actor: &Actor,
        config: &LifecycleConfig,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        if !actor.is(ActorType::Driver) {
            return Err(OrderError::forbidden(
                "assign driver",
                "only drivers can take deliveries",
            ));
        }
        if !self.status.can_assign_driver() {
            return Err(OrderError::InvalidState {
                current_state: self.status,
                action: "assign a driver to",
            });
        }
        if self.driver.is_some() {
            return Err(OrderError::DriverAlreadyAssigned);
        }

        let mut next = self.clone();
        next.driver = Some(actor.id);
        next.updated_at = now;

        if config.assign_driver_resets_status {
            next = next.with_status(
                OrderStatus::Confirmed,
                Some("Driver assigned".to_string()),
                now,
            );
        }
        Ok(next)
    }

    fn authorize(&self, actor: &Actor, action: &'static str) -> Result<(), OrderError> {
        let allowed = match actor.actor_type {
            ActorType::Admin => true,
            ActorType::Customer => self.is_owned_by(actor.id),
            ActorType::Pharmacy => actor.owns_pharmacy(self.pharmacy),
            ActorType::Driver => self.is_assigned_to(actor.id),
        };
        if allowed {
            Ok(())
        } else {
            Err(OrderError::forbidden(
                action,
                format!("{} {} is not a party to order {}", actor.actor_type, actor.id, self.order_id),
            ))
        }
    }

    fn require_owner(&self, actor: &Actor, action: &'static str) -> Result<(), OrderError> {
        if actor.is(ActorType::Customer) && self.is_owned_by(actor.id) {
            Ok(())
        } else {
            Err(OrderError::forbidden(action, "only the ordering customer can do this"))
        }
    }

    fn with_status(&self, status: OrderStatus, note: Option<String>, now: DateTime<Utc>) -> Order {
        let mut next = self.clone();
        next.status = status;
        next.tracking_history.push(TrackingEntry::new(status, now, note));
        next.updated_at = now;
        if status == OrderStatus::Delivered {
            next.actual_delivery_time = Some(now);
        }
        next
    }
}

fn total_of(items: &[LineItem]) -> Option<Money> {
    items
        .iter()
        .try_fold(Money::zero(), |total, item| total.checked_add(item.subtotal()?))
}
