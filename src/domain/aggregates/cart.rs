//! Cart Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{ImageRef, Money, MoneyError, Quantity};

/// What a cart line points at, resolved at read time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSnapshot {
    pub sku_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub base_price: Money,
    pub override_price: Option<Money>,
    pub options: Vec<String>,
    pub image: Option<ImageRef>,
}

impl SkuSnapshot {
    pub fn unit_price(&self) -> Money { self.override_price.unwrap_or(self.base_price) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: Quantity,
    /// `None` when the SKU or its product no longer resolves.
    pub sku: Option<SkuSnapshot>,
}

impl CartLine {
    pub fn line_total(&self) -> Option<Result<Money, MoneyError>> {
        self.sku.as_ref().map(|s| s.unit_price().multiply(self.quantity.value()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cart { pub id: Uuid, pub user_id: Uuid, pub lines: Vec<CartLine> }

impl Cart {
    pub fn empty(id: Uuid, user_id: Uuid) -> Self { Self { id, user_id, lines: vec![] } }

    /// Lines whose SKU and product still resolve. Orphans are skipped, not errors.
    pub fn valid_lines(&self) -> impl Iterator<Item = (&CartLine, &SkuSnapshot)> {
        self.lines.iter().filter_map(|l| l.sku.as_ref().map(|s| (l, s)))
    }

    pub fn has_valid_lines(&self) -> bool { self.valid_lines().next().is_some() }

    pub fn subtotal(&self) -> Result<Money, MoneyError> {
        self.valid_lines().try_fold(Money::ZERO, |acc, (l, s)| acc.add(s.unit_price().multiply(l.quantity.value())?))
    }

    pub fn item_count(&self) -> u32 { self.valid_lines().map(|(l, _)| l.quantity.value()).sum() }

    pub fn view(&self) -> Result<CartView, MoneyError> {
        let lines = self.lines.iter().map(|l| Ok(CartLineView {
            item_id: l.item_id,
            quantity: l.quantity,
            unit_price: l.sku.as_ref().map(SkuSnapshot::unit_price),
            line_total: l.line_total().transpose()?,
            available: l.sku.is_some(),
            sku: l.sku.clone(),
        })).collect::<Result<Vec<_>, MoneyError>>()?;
        Ok(CartView { cart_id: Some(self.id), lines, subtotal: self.subtotal()?, item_count: self.item_count() })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub item_id: Uuid,
    pub quantity: Quantity,
    pub sku: Option<SkuSnapshot>,
    pub unit_price: Option<Money>,
    pub line_total: Option<Money>,
    pub available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartView { pub cart_id: Option<Uuid>, pub lines: Vec<CartLineView>, pub subtotal: Money, pub item_count: u32 }

impl CartView {
    pub fn empty() -> Self { Self { cart_id: None, lines: vec![], subtotal: Money::ZERO, item_count: 0 } }
}

#[cfg(test)]
pub(crate) fn snapshot(name: &str, base: i64, over: Option<i64>) -> SkuSnapshot {
    SkuSnapshot {
        sku_id: Uuid::new_v4(), product_id: Uuid::new_v4(), product_name: name.into(), product_slug: name.to_lowercase(),
        base_price: Money::from_minor(base), override_price: over.map(Money::from_minor), options: vec![], image: None,
    }
}
