//! Role-gated status transition table.
//!
//! | Actor    | Allowed current → target                                   |
//! |----------|------------------------------------------------------------|
//! | customer | pending/confirmed → cancelled                              |
//! | pharmacy | pending → confirmed, confirmed → processing, processing → ready |
//! | driver   | ready → delivering, delivering → delivered                 |
//! | admin    | any non-terminal → any status except pending               |
//!
//! Ownership (which customer, pharmacy or driver) is checked by the order
//! itself; this table only knows roles.

use crate::access::ActorType;

use super::OrderStatus::*;
use super::{OrderError, OrderStatus};

const CUSTOMER_TARGETS: &[OrderStatus] = &[Cancelled];
const PHARMACY_TARGETS: &[OrderStatus] = &[Confirmed, Processing, Ready];
const DRIVER_TARGETS: &[OrderStatus] = &[Delivering, Delivered];
const ADMIN_TARGETS: &[OrderStatus] = &[
    Confirmed, Processing, Ready, Delivering, Delivered, Cancelled,
];

/// Statuses an actor role may ever move an order to.
pub fn allowed_targets(actor: ActorType) -> &'static [OrderStatus] {
    match actor {
        ActorType::Customer => CUSTOMER_TARGETS,
        ActorType::Pharmacy => PHARMACY_TARGETS,
        ActorType::Driver => DRIVER_TARGETS,
        ActorType::Admin => ADMIN_TARGETS,
    }
}

/// Returns true if `actor` may move an order from `from` to `to`.
pub fn is_allowed(actor: ActorType, from: OrderStatus, to: OrderStatus) -> bool {
    check(actor, from, to).is_ok()
}

/// Checks a transition against the table.
///
/// A target outside the role's set is `Forbidden`; a target inside it that is
/// not reachable from `from` is `InvalidTransition`.
pub fn check(actor: ActorType, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if !allowed_targets(actor).contains(&to) {
        return Err(OrderError::Forbidden {
            action: "change order status",
            reason: format!("{actor} cannot move an order to {to}"),
        });
    }

    let reachable = match actor {
        ActorType::Customer => from.can_cancel(),
        ActorType::Pharmacy => matches!(
            (from, to),
            (Pending, Confirmed) | (Confirmed, Processing) | (Processing, Ready)
        ),
        ActorType::Driver => matches!((from, to), (Ready, Delivering) | (Delivering, Delivered)),
        ActorType::Admin => !from.is_terminal() && from != to,
    };

    if reachable {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed_pairs(actor: ActorType) -> Vec<(OrderStatus, OrderStatus)> {
        let mut pairs = Vec::new();
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if is_allowed(actor, from, to) {
                    pairs.push((from, to));
                }
            }
        }
        pairs
    }

    #[test]
    fn customer_may_only_cancel_early() {
        assert_eq!(
            allowed_pairs(ActorType::Customer),
            vec![(Pending, Cancelled), (Confirmed, Cancelled)]
        );
    }

    #[test]
    fn pharmacy_walks_preparation_steps() {
        assert_eq!(
            allowed_pairs(ActorType::Pharmacy),
            vec![(Pending, Confirmed), (Confirmed, Processing), (Processing, Ready)]
        );
    }

    #[test]
    fn driver_walks_delivery_steps() {
        assert_eq!(
            allowed_pairs(ActorType::Driver),
            vec![(Ready, Delivering), (Delivering, Delivered)]
        );
    }

    #[test]
    fn admin_overrides_any_non_terminal_status() {
        let pairs = allowed_pairs(ActorType::Admin);

        assert!(pairs.contains(&(Ready, Delivered)));
        assert!(pairs.contains(&(Processing, Cancelled)));
        assert!(pairs.contains(&(Delivering, Confirmed)));
        assert!(pairs.iter().all(|(from, to)| !from.is_terminal() && from != to));
        assert!(pairs.iter().all(|(_, to)| *to != Pending));
        // 5 non-terminal sources, 6 targets each, minus the self-transition where it applies
        assert_eq!(pairs.len(), 5 * 6 - 4);
    }

    #[test]
    fn nothing_leaves_a_terminal_status() {
        for actor in [
            ActorType::Customer,
            ActorType::Pharmacy,
            ActorType::Driver,
            ActorType::Admin,
        ] {
            for to in OrderStatus::ALL {
                assert!(!is_allowed(actor, Delivered, to));
                assert!(!is_allowed(actor, Cancelled, to));
            }
        }
    }

    #[test]
    fn target_outside_role_is_forbidden() {
        assert!(matches!(
            check(ActorType::Pharmacy, Ready, Delivered),
            Err(OrderError::Forbidden { .. })
        ));
        assert!(matches!(
            check(ActorType::Driver, Ready, Confirmed),
            Err(OrderError::Forbidden { .. })
        ));
    }

    #[test]
    fn unreachable_target_is_invalid_transition() {
        assert!(matches!(
            check(ActorType::Pharmacy, Pending, Ready),
            Err(OrderError::InvalidTransition {
                from: Pending,
                to: Ready
            })
        ));
        assert!(matches!(
            check(ActorType::Customer, Processing, Cancelled),
            Err(OrderError::InvalidTransition { .. })
        ));
    }
}
