//! Order requests and their validation.
//!
//! Requests keep identifiers and numbers in their raw form so that every
//! malformed field can be reported at once, with its path.

use common::{MedicineId, Pagination, PharmacyId};
use serde::{Deserialize, Serialize};

use super::{GuestCustomer, OrderStatus, Rating};
use crate::validation::ValidationErrors;

/// A requested line: `{medicine, quantity}`. A client-sent `price` is accepted
/// and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderLine {
    pub medicine: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Customer request to place an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceOrder {
    pub pharmacy: String,
    pub items: Vec<OrderLine>,
    pub delivery_address: String,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub special_instructions: Option<String>,
    pub prescription_url: Option<String>,
    pub guest_customer: Option<GuestCustomer>,
}

/// A requested medicine and its total quantity, after merging repeated lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub medicine: MedicineId,
    pub quantity: u32,
}

/// A place-order request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub pharmacy: PharmacyId,
    pub lines: Vec<RequestedLine>,
    pub delivery_address: String,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub special_instructions: Option<String>,
    pub prescription_url: Option<String>,
    pub guest_customer: Option<GuestCustomer>,
}

impl PlaceOrder {
    pub fn new(pharmacy: PharmacyId, delivery_address: impl Into<String>) -> Self {
        Self {
            pharmacy: pharmacy.to_string(),
            delivery_address: delivery_address.into(),
            ..Self::default()
        }
    }

    /// Adds a line to the request.
    pub fn item(mut self, medicine: MedicineId, quantity: i64) -> Self {
        self.items.push(OrderLine {
            medicine: medicine.to_string(),
            quantity,
            price: None,
        });
        self
    }

    pub fn prescription(mut self, url: impl Into<String>) -> Self {
        self.prescription_url = Some(url.into());
        self
    }

    /// Checks the request shape and merges repeated medicines, keeping the
    /// order in which each medicine first appears.
    pub fn validate(&self) -> Result<ValidatedOrder, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let pharmacy = match self.pharmacy.trim() {
            "" => {
                errors.add("pharmacy", "is required");
                None
            }
            raw => raw
                .parse::<PharmacyId>()
                .map_err(|_| errors.add("pharmacy", "must be a valid pharmacy id"))
                .ok(),
        };

        if self.items.is_empty() {
            errors.add("items", "must contain at least one item");
        }

        let mut lines: Vec<RequestedLine> = Vec::with_capacity(self.items.len());
        for (i, item) in self.items.iter().enumerate() {
            let medicine = item.medicine.trim().parse::<MedicineId>();
            if medicine.is_err() {
                errors.add(format!("items[{i}].medicine"), "must be a valid medicine id");
            }
            let quantity = u32::try_from(item.quantity).ok().filter(|q| *q >= 1);
            if quantity.is_none() {
                errors.add(format!("items[{i}].quantity"), "must be at least 1");
            }

            let (Ok(medicine), Some(quantity)) = (medicine, quantity) else {
                continue;
            };
            match lines.iter_mut().find(|line| line.medicine == medicine) {
                Some(line) => match line.quantity.checked_add(quantity) {
                    Some(total) => line.quantity = total,
                    None => errors.add(format!("items[{i}].quantity"), "is too large"),
                },
                None => lines.push(RequestedLine { medicine, quantity }),
            }
        }

        let delivery_address = self.delivery_address.trim();
        if delivery_address.is_empty() {
            errors.add("deliveryAddress", "is required");
        }
        if let Some(lat) = self.delivery_latitude
            && !(-90.0..=90.0).contains(&lat)
        {
            errors.add("deliveryLatitude", "must be between -90 and 90");
        }
        if let Some(lng) = self.delivery_longitude
            && !(-180.0..=180.0).contains(&lng)
        {
            errors.add("deliveryLongitude", "must be between -180 and 180");
        }
        if let Some(guest) = &self.guest_customer
            && guest.name.trim().is_empty()
        {
            errors.add("guestCustomer.name", "is required");
        }

        match pharmacy {
            Some(pharmacy) if errors.is_empty() => Ok(ValidatedOrder {
                pharmacy,
                lines,
                delivery_address: delivery_address.to_string(),
                delivery_latitude: self.delivery_latitude,
                delivery_longitude: self.delivery_longitude,
                special_instructions: non_blank(&self.special_instructions),
                prescription_url: non_blank(&self.prescription_url),
                guest_customer: self.guest_customer.clone(),
            }),
            _ => Err(errors),
        }
    }
}

/// Request to move an order to another status: `{status, note?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeStatus {
    pub status: String,
    pub note: Option<String>,
}

impl ChangeStatus {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status: status.to_string(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Parses the target status, which must be one of `allowed`.
    pub fn validate(&self, allowed: &[OrderStatus]) -> Result<OrderStatus, ValidationErrors> {
        let status = self.status.trim();
        if status.is_empty() {
            return Err(ValidationErrors::single("status", "is required"));
        }

        match status.parse::<OrderStatus>() {
            Ok(target) if allowed.contains(&target) => Ok(target),
            _ => {
                let names: Vec<&str> = allowed.iter().map(OrderStatus::as_str).collect();
                Err(ValidationErrors::single(
                    "status",
                    format!("must be one of: {}", names.join(", ")),
                ))
            }
        }
    }

    pub fn note(&self) -> Option<String> {
        non_blank(&self.note)
    }
}

/// Customer request to cancel: `{reason?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancelOrder {
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    pub fn reason(&self) -> Option<String> {
        non_blank(&self.reason)
    }
}

/// Customer rating of a delivered order: `{rating, review?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateOrder {
    pub rating: Option<i64>,
    pub review: Option<String>,
}

impl RateOrder {
    pub fn new(rating: i64) -> Self {
        Self {
            rating: Some(rating),
            review: None,
        }
    }

    pub fn with_review(mut self, review: impl Into<String>) -> Self {
        self.review = Some(review.into());
        self
    }

    pub fn validate(&self) -> Result<(Rating, Option<String>), ValidationErrors> {
        let rating = self
            .rating
            .ok_or_else(|| ValidationErrors::single("rating", "is required"))?;
        let rating = Rating::new(rating).ok_or_else(|| {
            ValidationErrors::single(
                "rating",
                format!("must be between {} and {}", Rating::MIN, Rating::MAX),
            )
        })?;
        Ok((rating, non_blank(&self.review)))
    }
}

/// Filters for order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub pagination: Pagination,
}

/// Raw listing query: `?status=&page=&limit=`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOrders {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListOrders {
    pub fn validate(&self) -> Result<OrderFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => raw
                .parse::<OrderStatus>()
                .map_err(|e| errors.add("status", e.to_string()))
                .ok(),
        };

        let pagination = Pagination::new(self.page, self.limit)
            .map_err(|e| {
                let field = match e {
                    common::PaginationError::Limit(_) => "limit",
                    common::PaginationError::Page(_) => "page",
                };
                errors.add(field, e.to_string());
            })
            .unwrap_or_default();

        errors.into_result()?;
        Ok(OrderFilter { status, pagination })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_passes() {
        let pharmacy = PharmacyId::new();
        let medicine = MedicineId::new();
        let request = PlaceOrder::new(pharmacy, "  12 Main St ")
            .item(medicine, 3)
            .validate()
            .unwrap();

        assert_eq!(request.pharmacy, pharmacy);
        assert_eq!(request.delivery_address, "12 Main St");
        assert_eq!(request.lines, vec![RequestedLine { medicine, quantity: 3 }]);
    }

    #[test]
    fn repeated_medicines_are_merged_in_first_seen_order() {
        let a = MedicineId::new();
        let b = MedicineId::new();
        let request = PlaceOrder::new(PharmacyId::new(), "12 Main St")
            .item(a, 1)
            .item(b, 2)
            .item(a, 4)
            .validate()
            .unwrap();

        assert_eq!(
            request.lines,
            vec![
                RequestedLine { medicine: a, quantity: 5 },
                RequestedLine { medicine: b, quantity: 2 },
            ]
        );
    }

    #[test]
    fn every_problem_is_reported() {
        let mut request = PlaceOrder::new(PharmacyId::new(), " ").item(MedicineId::new(), 0);
        request.pharmacy = "nope".to_string();
        request.items.push(OrderLine {
            medicine: "bad".to_string(),
            quantity: -2,
            price: Some(0.01),
        });
        request.delivery_latitude = Some(123.0);

        let errors = request.validate().unwrap_err();
        for field in [
            "pharmacy",
            "items[0].quantity",
            "items[1].medicine",
            "items[1].quantity",
            "deliveryAddress",
            "deliveryLatitude",
        ] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
    }

    #[test]
    fn empty_items_rejected() {
        let errors = PlaceOrder::new(PharmacyId::new(), "12 Main St")
            .validate()
            .unwrap_err();
        assert!(errors.has_field("items"));
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        let mut request = PlaceOrder::new(PharmacyId::new(), "12 Main St").item(MedicineId::new(), 1);
        request.special_instructions = Some("   ".to_string());
        request.prescription_url = Some(" https://files.example/rx.jpg ".to_string());

        let validated = request.validate().unwrap();
        assert_eq!(validated.special_instructions, None);
        assert_eq!(
            validated.prescription_url.as_deref(),
            Some("https://files.example/rx.jpg")
        );
    }

    #[test]
    fn change_status_must_be_in_allowed_set() {
        let allowed = [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Ready];

        assert_eq!(
            ChangeStatus::new(OrderStatus::Ready).validate(&allowed),
            Ok(OrderStatus::Ready)
        );
        assert!(ChangeStatus::new(OrderStatus::Delivered).validate(&allowed).is_err());
        assert!(ChangeStatus::default().validate(&allowed).is_err());

        let unknown = ChangeStatus {
            status: "shipped".to_string(),
            note: None,
        };
        assert!(unknown.validate(&allowed).unwrap_err().has_field("status"));
    }

    #[test]
    fn rate_order_validation() {
        let (rating, review) = RateOrder::new(4).with_review("Fast").validate().unwrap();
        assert_eq!(rating.value(), 4);
        assert_eq!(review.as_deref(), Some("Fast"));

        assert!(RateOrder::new(0).validate().is_err());
        assert!(RateOrder::new(6).validate().is_err());
        assert!(RateOrder::default().validate().is_err());
    }

    #[test]
    fn list_orders_defaults_and_limits() {
        let filter = ListOrders::default().validate().unwrap();
        assert_eq!(filter.status, None);
        assert_eq!(filter.pagination.page(), 1);
        assert_eq!(filter.pagination.limit(), 20);

        let query = ListOrders {
            status: Some("ready".to_string()),
            page: Some(2),
            limit: Some(50),
        };
        let filter = query.validate().unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Ready));
        assert_eq!(filter.pagination.offset(), 50);

        let query = ListOrders {
            status: Some("lost".to_string()),
            page: Some(0),
            limit: Some(51),
        };
        let errors = query.validate().unwrap_err();
        assert!(errors.has_field("status"));
        assert!(errors.has_field("limit") || errors.has_field("page"));
    }
}
