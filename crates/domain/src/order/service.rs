//! Order lifecycle engine.

use std::sync::Arc;

use chrono::Utc;
use common::{DocumentId, MedicineId, Page, Pagination, PharmacyId};
use document_store::{DocumentQuery, DocumentStore, DocumentStoreError, SortOrder};

use crate::access::{Actor, ActorType};
use crate::catalog::MedicineCatalog;
use crate::config::LifecycleConfig;
use crate::error::DomainError;
use crate::repository::{Repository, Versioned};
use crate::stock::Pharmacy;
use crate::validation::ValidationErrors;

use super::transitions;
use super::{
    CancelOrder, ChangeStatus, Order, OrderError, OrderFilter, OrderNumber, OrderStatus,
    PlaceOrder, RateOrder,
};

/// Targets reachable through the driver/admin status endpoint.
const STATUS_UPDATE_TARGETS: [OrderStatus; 5] = [
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Ready,
    OrderStatus::Delivering,
    OrderStatus::Delivered,
];

/// Order numbers tried before placement gives up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Runs every order operation against the document store.
///
/// Each mutation loads the order, derives the next state with the pure
/// methods on [`Order`], and commits it with a version check. Concurrent
/// writers on the same order therefore see a conflict instead of a lost
/// update.
pub struct OrderService<S, C> {
    store: Arc<S>,
    orders: Repository<S, Order>,
    pharmacies: Repository<S, Pharmacy>,
    catalog: C,
    config: LifecycleConfig,
}

impl<S, C> OrderService<S, C>
where
    S: DocumentStore,
    C: MedicineCatalog,
{
    pub fn new(store: Arc<S>, catalog: C, config: LifecycleConfig) -> Self {
        Self {
            orders: Repository::new(Arc::clone(&store)),
            pharmacies: Repository::new(Arc::clone(&store)),
            store,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Places a new order for the authenticated customer.
    ///
    /// Stock is checked but not reserved; it is only taken off when the order
    /// is delivered.
    #[tracing::instrument(skip(self, actor, request), fields(customer = %actor.id))]
    pub async fn place_order(&self, actor: &Actor, request: PlaceOrder) -> Result<Order, DomainError> {
        if !actor.is(ActorType::Customer) {
            return Err(OrderError::forbidden("place order", "only customers can place orders").into());
        }

        let result = self.try_place(actor, request).await;
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_total_amount").record(order.total_amount.as_decimal());
                tracing::info!(
                    order_id = %order.order_id,
                    pharmacy = %order.pharmacy,
                    total = %order.total_amount,
                    items = order.item_count(),
                    "order placed"
                );
            }
            Err(DomainError::Order(e)) => {
                metrics::counter!("order_creation_rejected_total", "reason" => e.kind())
                    .increment(1);
                tracing::warn!(error = %e, "order rejected");
            }
            Err(_) => {}
        }
        result
    }

    async fn try_place(&self, actor: &Actor, request: PlaceOrder) -> Result<Order, DomainError> {
        let request = request.validate().map_err(OrderError::from)?;

        let pharmacy = self
            .pharmacies
            .load_existing(request.pharmacy.document_id())
            .await?
            .value;
        let ids: Vec<MedicineId> = request.lines.iter().map(|line| line.medicine).collect();
        let medicines = self.catalog.medicines(&ids).await?;

        let mut order = Order::place(
            request,
            actor.id,
            &pharmacy,
            &medicines,
            &self.config,
            Utc::now(),
        )?;

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            if self.count_by_number(&order.order_id).await? == 0 {
                match self.orders.insert(&order).await {
                    Ok(stored) => return Ok(stored.value),
                    Err(DomainError::Store(DocumentStoreError::UniqueViolation { .. })) => {}
                    Err(e) => return Err(e),
                }
            }
            tracing::debug!(order_id = %order.order_id, "order number taken, regenerating");
            order.order_id = OrderNumber::generate();
        }
        Err(OrderError::OrderNumberUnavailable.into())
    }

    fn number_query(&self, number: &OrderNumber) -> DocumentQuery {
        self.orders.query().field_eq("orderId", number.as_str())
    }

    async fn count_by_number(&self, number: &OrderNumber) -> Result<u64, DomainError> {
        self.orders.count(self.number_query(number)).await
    }

    /// Loads an order by document id or by its `ORD-` number.
    pub async fn load_order(&self, order_ref: &str) -> Result<Versioned<Order>, DomainError> {
        let order_ref = order_ref.trim();

        if let Ok(id) = order_ref.parse::<DocumentId>() {
            return self.orders.load_existing(id).await;
        }
        if let Some(number) = OrderNumber::parse(order_ref) {
            if self.count_by_number(&number).await? > 1 {
                tracing::warn!(order_id = %number, "order number shared by several orders");
                return Err(OrderError::AmbiguousOrderNumber(number).into());
            }
            return self
                .orders
                .find_one(self.number_query(&number))
                .await?
                .ok_or_else(|| DomainError::not_found("order", number));
        }

        Err(OrderError::from(ValidationErrors::single(
            "id",
            "must be an order id or an ORD- order number",
        ))
        .into())
    }

    /// Returns an order its customer or an admin may read.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_order(&self, actor: &Actor, order_ref: &str) -> Result<Order, DomainError> {
        let order = self.load_order(order_ref).await?.value;
        if !order.can_view(actor) {
            return Err(OrderError::forbidden("view order", "order belongs to another customer").into());
        }
        Ok(order)
    }

    /// Status change by a driver or an admin.
    #[tracing::instrument(skip(self, actor, change), fields(actor = %actor.id))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_ref: &str,
        change: ChangeStatus,
    ) -> Result<Order, DomainError> {
        if !matches!(actor.actor_type, ActorType::Driver | ActorType::Admin) {
            return Err(OrderError::forbidden(
                "change order status",
                "only drivers and admins use this endpoint",
            )
            .into());
        }
        let target = change
            .validate(&STATUS_UPDATE_TARGETS)
            .map_err(OrderError::from)?;

        let current = self.load_order(order_ref).await?;
        let next = current
            .value
            .transition(actor, target, change.note(), Utc::now())?;
        self.commit_transition(current, next).await
    }

    /// Status change by the pharmacy that owns the order.
    #[tracing::instrument(skip(self, actor, change), fields(actor = %actor.id))]
    pub async fn pharmacy_update_status(
        &self,
        actor: &Actor,
        order_ref: &str,
        change: ChangeStatus,
    ) -> Result<Order, DomainError> {
        if !actor.is(ActorType::Pharmacy) {
            return Err(OrderError::forbidden(
                "change order status",
                "only pharmacies use this endpoint",
            )
            .into());
        }
        let target = change
            .validate(transitions::allowed_targets(ActorType::Pharmacy))
            .map_err(OrderError::from)?;

        let current = self.load_order(order_ref).await?;
        let next = current
            .value
            .transition(actor, target, change.note(), Utc::now())?;
        self.commit_transition(current, next).await
    }

    /// Cancels an order: a pending or confirmed one for its customer, any
    /// open one for an admin.
    #[tracing::instrument(skip(self, actor, cancel), fields(actor = %actor.id))]
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_ref: &str,
        cancel: CancelOrder,
    ) -> Result<Order, DomainError> {
        let current = self.load_order(order_ref).await?;
        let next = current.value.cancel(actor, cancel.reason(), Utc::now())?;
        self.commit_transition(current, next).await
    }

    /// Rates a delivered order.
    #[tracing::instrument(skip(self, actor, rate), fields(actor = %actor.id))]
    pub async fn rate_order(
        &self,
        actor: &Actor,
        order_ref: &str,
        rate: RateOrder,
    ) -> Result<Order, DomainError> {
        let (rating, review) = rate.validate().map_err(OrderError::from)?;

        let current = self.load_order(order_ref).await?;
        let next = current.value.rate(actor, rating, review, Utc::now())?;
        let stored = self.orders.update(&next, current.version).await?;

        metrics::counter!("orders_rated_total").increment(1);
        tracing::info!(order_id = %stored.value.order_id, rating = rating.value(), "order rated");
        Ok(stored.value)
    }

    /// Lets a driver claim a ready order. Two drivers racing on the same
    /// order cannot both win; the loser sees a conflict.
    #[tracing::instrument(skip(self, actor), fields(driver = %actor.id))]
    pub async fn assign_driver(&self, actor: &Actor, order_ref: &str) -> Result<Order, DomainError> {
        let current = self.load_order(order_ref).await?;
        let next = current
            .value
            .assign_driver(actor, &self.config, Utc::now())?;
        let stored = self.orders.update(&next, current.version).await?;

        metrics::counter!("drivers_assigned_total").increment(1);
        tracing::info!(order_id = %stored.value.order_id, "driver assigned");
        Ok(stored.value)
    }

    /// Orders of the authenticated customer, newest first.
    pub async fn list_customer_orders(
        &self,
        actor: &Actor,
        filter: OrderFilter,
    ) -> Result<Page<Order>, DomainError> {
        if !actor.is(ActorType::Customer) {
            return Err(OrderError::forbidden("list orders", "only customers have orders").into());
        }
        let query = self.orders.query().field_eq("customer", actor.id.to_string());
        self.page(query, filter).await
    }

    /// Orders placed with the authenticated pharmacy, newest first.
    pub async fn list_pharmacy_orders(
        &self,
        actor: &Actor,
        filter: OrderFilter,
    ) -> Result<Page<Order>, DomainError> {
        if !actor.is(ActorType::Pharmacy) {
            return Err(OrderError::forbidden("list pharmacy orders", "not a pharmacy account").into());
        }
        let pharmacy = PharmacyId::from_uuid(actor.id.as_uuid());
        let query = self.orders.query().field_eq("pharmacy", pharmacy.to_string());
        self.page(query, filter).await
    }

    /// Orders assigned to the authenticated driver, newest first.
    pub async fn list_driver_orders(
        &self,
        actor: &Actor,
        filter: OrderFilter,
    ) -> Result<Page<Order>, DomainError> {
        if !actor.is(ActorType::Driver) {
            return Err(OrderError::forbidden("list deliveries", "not a driver account").into());
        }
        let query = self.orders.query().field_eq("driver", actor.id.to_string());
        self.page(query, filter).await
    }

    /// Ready orders nobody has claimed yet, oldest first.
    pub async fn list_available_for_drivers(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> Result<Page<Order>, DomainError> {
        if !actor.is(ActorType::Driver) {
            return Err(OrderError::forbidden("list available orders", "not a driver account").into());
        }
        let query = self
            .orders
            .query()
            .field_eq("status", OrderStatus::Ready.as_str())
            .field_missing("driver")
            .sort(SortOrder::OldestFirst);
        self.page(query, OrderFilter { status: None, pagination }).await
    }

    async fn page(&self, query: DocumentQuery, filter: OrderFilter) -> Result<Page<Order>, DomainError> {
        let query = match filter.status {
            Some(status) => query.field_eq("status", status.as_str()),
            None => query,
        };
        let total = self.orders.count(query.clone()).await?;
        let items = self
            .orders
            .find(
                query
                    .offset(filter.pagination.offset())
                    .limit(filter.pagination.limit() as usize),
            )
            .await?;
        Ok(Page::new(items, filter.pagination, total))
    }

    /// Persists a status change. Delivery takes the ordered quantities off
    /// the pharmacy's stock in the same commit, so either both documents
    /// change or neither does.
    async fn commit_transition(
        &self,
        current: Versioned<Order>,
        next: Order,
    ) -> Result<Order, DomainError> {
        let mut writes = vec![self.orders.update_write(&next, current.version)?];

        let delivered = next.status == OrderStatus::Delivered;
        if delivered {
            let pharmacy = self
                .pharmacies
                .load_existing(next.pharmacy.document_id())
                .await?;
            let lines = next.items.iter().map(|item| (item.medicine, item.quantity));
            let reconciled = pharmacy.value.decremented(lines, next.updated_at);
            writes.push(self.pharmacies.update_write(&reconciled, pharmacy.version)?);
        }

        self.store.commit(writes).await?;

        if delivered {
            metrics::counter!("stock_reconciliations_total").increment(1);
            tracing::info!(
                order_id = %next.order_id,
                pharmacy = %next.pharmacy,
                lines = next.items.len(),
                "stock reconciled on delivery"
            );
        }
        metrics::counter!("order_transitions_total", "status" => next.status.as_str())
            .increment(1);
        tracing::info!(
            order_id = %next.order_id,
            from = %current.value.status,
            to = %next.status,
            "order status changed"
        );
        Ok(next)
    }
}
