//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{ActorId, MedicineId, PharmacyId};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::OrderStatus;

/// Money amount represented in cents to avoid floating point issues.
///
/// On the wire it is a decimal number (`16.5`), matching what clients send
/// and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Largest amount accepted from clients: 1,000,000,000.00.
    pub const MAX_DECIMAL: f64 = 1_000_000_000.0;

    /// Creates a Money amount from a decimal value, rounding to the nearest cent.
    ///
    /// Returns `None` for NaN, infinities and magnitudes above
    /// [`Money::MAX_DECIMAL`].
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || value.abs() > Self::MAX_DECIMAL {
            return None;
        }
        Some(Self {
            cents: (value * 100.0).round() as i64,
        })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal value.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Money::from_decimal(value)
            .ok_or_else(|| serde::de::Error::custom("amount must be a finite number within range"))
    }
}

/// Human-readable order number, `ORD-<6 digits of time>-<3 random digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a number for an order placed now.
    pub fn generate() -> Self {
        Self::generate_with(Utc::now(), &mut rand::thread_rng())
    }

    /// Generates a number from the given clock reading and randomness.
    pub fn generate_with<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let time = now.timestamp_millis().rem_euclid(1_000_000);
        let suffix: u16 = rng.gen_range(0..1000);
        Self(format!("ORD-{time:06}-{suffix:03}"))
    }

    /// Parses a string that has the order number shape.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix("ORD-")?;
        let (time, suffix) = rest.split_once('-')?;
        let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());

        (digits(time, 6) && digits(suffix, 3)).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A priced line of an order. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub medicine: MedicineId,

    /// Quantity ordered (at least 1).
    pub quantity: u32,

    /// Unit price snapshotted from the pharmacy's stock at order time.
    pub price: Money,

    pub pharmacy: PharmacyId,
}

impl LineItem {
    /// Returns the total price for this line (quantity * price), or `None`
    /// if it does not fit in the money range.
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TrackingEntry {
    pub fn new(status: OrderStatus, timestamp: DateTime<Utc>, note: Option<String>) -> Self {
        Self {
            status,
            timestamp,
            note,
        }
    }
}

/// Contact details of a customer, as shown to pharmacies and drivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: ActorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The customer an order belongs to: either a bare reference or a populated
/// summary. Orders are always stored with the reference form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Reference(ActorId),
    Populated(CustomerSummary),
}

impl CustomerRef {
    pub fn id(&self) -> ActorId {
        match self {
            CustomerRef::Reference(id) => *id,
            CustomerRef::Populated(summary) => summary.id,
        }
    }

    /// Collapses a populated customer back to its reference.
    pub fn to_reference(&self) -> CustomerRef {
        CustomerRef::Reference(self.id())
    }
}

impl From<ActorId> for CustomerRef {
    fn from(id: ActorId) -> Self {
        CustomerRef::Reference(id)
    }
}

/// Contact details given at checkout instead of, or alongside, an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCustomer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A delivered order's rating, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(i64::from(value))
            .ok_or_else(|| format!("rating must be between {} and {}", Rating::MIN, Rating::MAX))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.dollars(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_from_decimal_rounds_to_cents() {
        assert_eq!(Money::from_decimal(5.5), Some(Money::from_cents(550)));
        assert_eq!(Money::from_decimal(0.1 + 0.2), Some(Money::from_cents(30)));
        assert_eq!(Money::from_decimal(f64::NAN), None);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1650).to_string(), "$16.50");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_serializes_as_decimal() {
        let json = serde_json::to_value(Money::from_cents(1650)).unwrap();
        assert_eq!(json, serde_json::json!(16.5));

        let parsed: Money = serde_json::from_value(serde_json::json!(5.5)).unwrap();
        assert_eq!(parsed.cents(), 550);

        let parsed: Money = serde_json::from_value(serde_json::json!(12)).unwrap();
        assert_eq!(parsed.cents(), 1200);
    }

    #[test]
    fn test_money_checked_arithmetic() {
        let total = Money::from_cents(550).checked_add(Money::from_cents(1100));
        assert_eq!(total, Some(Money::from_cents(1650)));
        assert_eq!(Money::from_cents(550).checked_mul(3), Some(Money::from_cents(1650)));

        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }

    #[test]
    fn test_money_rejects_amounts_out_of_range() {
        assert_eq!(
            Money::from_decimal(Money::MAX_DECIMAL),
            Some(Money::from_cents(100_000_000_000))
        );
        assert_eq!(Money::from_decimal(1e16), None);
        assert_eq!(Money::from_decimal(1e300), None);
        assert_eq!(Money::from_decimal(-1e300), None);
        assert!(serde_json::from_value::<Money>(serde_json::json!(1e300)).is_err());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.timestamp_millis_opt(1_717_171_234_567).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = OrderNumber::generate_with(now, &mut rng);

        assert!(number.as_str().starts_with("ORD-234567-"));
        assert!(OrderNumber::parse(number.as_str()).is_some());
        assert!(OrderNumber::parse(OrderNumber::generate().as_str()).is_some());
    }

    #[test]
    fn test_order_number_parse_rejects_other_shapes() {
        assert!(OrderNumber::parse("ORD-123456-007").is_some());
        assert!(OrderNumber::parse("ORD-12345-007").is_none());
        assert!(OrderNumber::parse("ORD-123456-07a").is_none());
        assert!(OrderNumber::parse("4f1c2d3e-0000-0000-0000-000000000000").is_none());
    }

    #[test]
    fn test_line_item_subtotal() {
        let item = LineItem {
            medicine: MedicineId::new(),
            quantity: 3,
            price: Money::from_cents(550),
            pharmacy: PharmacyId::new(),
        };
        assert_eq!(item.subtotal(), Some(Money::from_cents(1650)));
    }

    #[test]
    fn test_customer_ref_accepts_both_shapes() {
        let id = ActorId::new();

        let reference: CustomerRef = serde_json::from_value(serde_json::json!(id)).unwrap();
        assert_eq!(reference, CustomerRef::Reference(id));

        let populated: CustomerRef = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "Ana",
            "phone": "555-0100"
        }))
        .unwrap();
        assert!(matches!(populated, CustomerRef::Populated(_)));
        assert_eq!(populated.id(), id);
        assert_eq!(populated.to_reference(), reference);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_none());
        assert!(Rating::new(6).is_none());
        assert!(Rating::new(-1).is_none());
        assert_eq!(Rating::new(5).map(|r| r.value()), Some(5));

        assert!(serde_json::from_value::<Rating>(serde_json::json!(9)).is_err());
        let rating: Rating = serde_json::from_value(serde_json::json!(4)).unwrap();
        assert_eq!(rating.value(), 4);
    }
}
