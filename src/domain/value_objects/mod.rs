//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use validator::Validate;

/// Money in integer minor currency units (cents).
///
/// All arithmetic happens on the integer; `Decimal` only appears at the storage and display
/// boundary, so totals never pick up floating-point error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self { Self(minor) }
    pub fn minor(&self) -> i64 { self.0 }

    /// Rounds to two decimal places (half away from zero) before converting.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED;
        cents.to_i64().map(Self).ok_or(MoneyError::Overflow)
    }

    /// Like [`Money::from_decimal`] but refuses amounts finer than a cent.
    pub fn from_decimal_exact(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        Self::from_decimal(amount)
    }

    pub fn to_decimal(&self) -> Decimal { Decimal::new(self.0, 2) }
    pub fn is_negative(&self) -> bool { self.0 < 0 }

    pub fn add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).map(Money).ok_or(MoneyError::Overflow)
    }

    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        self.0.checked_mul(i64::from(qty)).map(Money).ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.to_decimal()) }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { Serialize::serialize(&self.to_decimal(), serializer) }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal_exact(amount).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Overflow, TooPrecise }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Overflow => write!(f, "Amount out of range"), Self::TooPrecise => write!(f, "Amount cannot have more than 2 decimal places") }
    }
}

/// URL-safe identifier derived from a display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Lowercases, turns whitespace runs into `-`, drops anything that is not `[a-z0-9_-]`,
    /// then collapses and trims dashes.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut raw = String::with_capacity(name.len());
        let mut in_space = false;
        for c in name.trim().chars().flat_map(char::to_lowercase) {
            if c.is_whitespace() {
                if !in_space { raw.push('-'); }
                in_space = true;
                continue;
            }
            in_space = false;
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' { raw.push(c); }
        }
        let slug = raw.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");
        if slug.is_empty() { return Err(SlugError::Empty); }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Name produces an empty slug") }
}

/// Cart or order line quantity; always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::BelowOne); }
        if value > i64::from(i32::MAX) { return Err(QuantityError::TooLarge); }
        u32::try_from(value).map(Self).map_err(|_| QuantityError::TooLarge)
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 { fn from(q: Quantity) -> u32 { q.0 } }

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { BelowOne, TooLarge }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::BelowOne => write!(f, "Quantity must be at least 1"), Self::TooLarge => write!(f, "Quantity too large") }
    }
}

/// A product image stored in the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef { pub url: String }

impl ImageRef {
    /// Object key relative to the bucket, e.g. `public/<id>-<ts>.jpg`.
    pub fn object_path(&self) -> Option<String> {
        self.url.rsplit('/').next().filter(|name| !name.is_empty()).map(|name| format!("public/{name}"))
    }
}

/// Mexican-style postal address, snapshotted onto orders at checkout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 3, message = "Street is too short"))]
    pub street: String,
    #[validate(length(min = 1, message = "Exterior number is required"))]
    pub exterior_num: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interior_num: Option<String>,
    #[validate(length(min = 3, message = "Colony is required"))]
    pub colony: String,
    #[validate(length(min = 2, message = "City is too short"))]
    pub city: String,
    #[validate(length(min = 2, message = "State is too short"))]
    pub state: String,
    #[validate(length(min = 5, message = "Postal code must have 5 digits"))]
    pub postal_code: String,
}

impl Address {
    /// Blank interior numbers come from empty form fields.
    pub fn normalized(mut self) -> Self {
        if self.interior_num.as_deref().map(str::trim).is_some_and(str::is_empty) { self.interior_num = None; }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_decimal() {
        assert_eq!(Money::from_decimal(Decimal::new(19999, 2)).unwrap().minor(), 19999);
        assert_eq!(Money::from_decimal(Decimal::new(2495, 1)).unwrap().minor(), 24950);
        assert_eq!(Money::from_decimal(Decimal::new(10005, 3)).unwrap().minor(), 1001);
    }

    #[test]
    fn test_money_exact_refuses_fractions_of_a_cent() {
        assert_eq!(Money::from_decimal_exact(Decimal::new(199999, 3)), Err(MoneyError::TooPrecise));
        assert_eq!(Money::from_decimal_exact(Decimal::new(199990, 3)).unwrap().minor(), 19999);
        assert!(serde_json::from_str::<Money>("199.999").is_err());
        assert_eq!(serde_json::from_str::<Money>("\"699.97\"").unwrap().minor(), 69997);
        assert_eq!(serde_json::to_value(Money::from_minor(69997)).unwrap(), serde_json::json!("699.97"));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_minor(24999).multiply(2).unwrap();
        let total = a.add(Money::from_minor(19999)).unwrap();
        assert_eq!(total.minor(), 69997);
        assert_eq!(total.to_string(), "699.97");
        assert_eq!(Money::from_minor(i64::MAX).multiply(2), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_slug() {
        assert_eq!(Slug::from_name("Summer  Sale!").unwrap().as_str(), "summer-sale");
        assert_eq!(Slug::from_name(" -Hoodie - Black- ").unwrap().as_str(), "hoodie-black");
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_quantity() {
        assert_eq!(Quantity::new(0), Err(QuantityError::BelowOne));
        assert_eq!(Quantity::new(-1), Err(QuantityError::BelowOne));
        assert_eq!(Quantity::new(3).unwrap().value(), 3);
        assert_eq!(Quantity::new(i64::from(i32::MAX)).unwrap().value(), i32::MAX as u32);
        assert_eq!(Quantity::new(3_000_000_000), Err(QuantityError::TooLarge));
    }

    #[test]
    fn test_image_object_path() {
        let img = ImageRef { url: "https://cdn.example.com/storage/v1/object/public/product-images/public/abc-1.png".into() };
        assert_eq!(img.object_path().as_deref(), Some("public/abc-1.png"));
    }

    #[test]
    fn test_address_validation() {
        let addr = Address { street: "Av".into(), exterior_num: "".into(), postal_code: "123".into(), ..Default::default() };
        let errors = addr.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("street"));
        assert!(fields.contains_key("exterior_num"));
        assert!(fields.contains_key("postal_code"));
    }
}
