//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::value_objects::{Address, Money, MoneyError, Quantity};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Paid, Processing, Shipped, InTransit, OutForDelivery, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [Self::Pending, Self::Paid, Self::Processing, Self::Shipped, Self::InTransit, Self::OutForDelivery, Self::Delivered, Self::Cancelled];
    /// The shipment steps rendered by the tracking bar, in order.
    pub const TRACKED: [OrderStatus; 6] = [Self::Paid, Self::Processing, Self::Shipped, Self::InTransit, Self::OutForDelivery, Self::Delivered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Paid => "paid", Self::Processing => "processing", Self::Shipped => "shipped",
            Self::InTransit => "in_transit", Self::OutForDelivery => "out_for_delivery", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Position on the linear path; `cancelled` sits off it.
    pub fn position(&self) -> Option<usize> {
        match self { Self::Cancelled => None, s => Self::ALL.iter().position(|x| x == s) }
    }

    /// Whether moving from `previous` to `self` goes forward along the path (or into `cancelled`).
    /// Admin status updates do not enforce this.
    pub fn is_forward_of(&self, previous: OrderStatus) -> bool {
        match (self.position(), previous.position()) {
            (None, _) => !previous.is_terminal(),
            (Some(_), None) => false,
            (Some(next), Some(prev)) => next > prev,
        }
    }

    fn step_text(&self) -> (&'static str, &'static str) {
        match self {
            Self::Pending => ("Pending", "Awaiting payment"),
            Self::Paid => ("Paid", "Payment confirmed"),
            Self::Processing => ("Processing", "Preparing your order"),
            Self::Shipped => ("Shipped", "Packed and shipped"),
            Self::InTransit => ("In transit", "On its way to the hub"),
            Self::OutForDelivery => ("Out for delivery", "Arriving soon"),
            Self::Delivered => ("Delivered", "Order received"),
            Self::Cancelled => ("Cancelled", "Order cancelled"),
        }
    }

    pub fn tracking(&self) -> TrackingView {
        match self {
            Self::Pending => TrackingView::AwaitingPayment { message: "We are waiting for your payment to be confirmed.".into() },
            Self::Cancelled => TrackingView::Cancelled { message: "This order was cancelled.".into() },
            current => {
                let idx = Self::TRACKED.iter().position(|s| s == current).unwrap_or(0);
                let steps = Self::TRACKED.iter().enumerate().map(|(i, s)| {
                    let (label, subtitle) = s.step_text();
                    let state = if i < idx { StepState::Completed } else if i == idx { StepState::Current } else { StepState::Pending };
                    TrackingStep { status: *s, label, subtitle, state }
                }).collect();
                TrackingView::Steps { steps }
            }
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState { Completed, Current, Pending }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackingStep { pub status: OrderStatus, pub label: &'static str, pub subtitle: &'static str, pub state: StepState }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackingView {
    AwaitingPayment { message: String },
    Cancelled { message: String },
    Steps { steps: Vec<TrackingStep> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<Address>,
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub sku_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Quantity,
    /// Captured at checkout; never recomputed from the live catalog.
    pub price_at_purchase: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub tracking: TrackingView,
}

impl OrderDetail {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        let tracking = order.status.tracking();
        Self { order, items, tracking }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrderItem { pub product_id: Uuid, pub sku_id: Option<Uuid>, pub product_name: String, pub quantity: Quantity, pub price_at_purchase: Money }

/// An order ready to be written: lines priced from the cart at this instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDraft { pub user_id: Uuid, pub total: Money, pub shipping_address: Option<Address>, pub items: Vec<NewOrderItem> }

impl OrderDraft {
    pub fn from_cart(cart: &Cart, shipping_address: Option<Address>) -> Result<Self, OrderError> {
        let items: Vec<NewOrderItem> = cart.valid_lines().map(|(line, sku)| NewOrderItem {
            product_id: sku.product_id,
            sku_id: Some(sku.sku_id),
            product_name: sku.product_name.clone(),
            quantity: line.quantity,
            price_at_purchase: sku.unit_price(),
        }).collect();
        if items.is_empty() { return Err(OrderError::EmptyCart); }
        let total = items.iter().try_fold(Money::ZERO, |acc, i| acc.add(i.price_at_purchase.multiply(i.quantity.value())?))?;
        Ok(Self { user_id: cart.user_id, total, shipping_address, items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { EmptyCart, UnknownStatus(String), Amount(MoneyError) }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCart => write!(f, "Cart is empty"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status '{s}'"),
            Self::Amount(e) => write!(f, "{e}"),
        }
    }
}
impl From<MoneyError> for OrderError { fn from(e: MoneyError) -> Self { Self::Amount(e) } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::{snapshot, CartLine};

    #[test]
    fn test_status_parsing() {
        assert_eq!("out_for_delivery".parse::<OrderStatus>().unwrap(), OrderStatus::OutForDelivery);
        assert!(matches!("refunded".parse::<OrderStatus>(), Err(OrderError::UnknownStatus(_))));
        for s in OrderStatus::ALL { assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s); }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Shipped.is_forward_of(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.is_forward_of(OrderStatus::Shipped));
        assert!(OrderStatus::Cancelled.is_forward_of(OrderStatus::Processing));
        assert!(!OrderStatus::Cancelled.is_forward_of(OrderStatus::Delivered));
        assert!(!OrderStatus::Paid.is_forward_of(OrderStatus::Cancelled));
        assert!(OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_tracking_view() {
        let TrackingView::Steps { steps } = OrderStatus::Shipped.tracking() else { panic!("expected steps") };
        let states: Vec<_> = steps.iter().map(|s| s.state).collect();
        assert_eq!(states, vec![StepState::Completed, StepState::Completed, StepState::Current, StepState::Pending, StepState::Pending, StepState::Pending]);
        assert!(matches!(OrderStatus::Pending.tracking(), TrackingView::AwaitingPayment { .. }));
        assert!(matches!(OrderStatus::Cancelled.tracking(), TrackingView::Cancelled { .. }));
    }

    #[test]
    fn test_draft_snapshots_prices() {
        let mut cart = Cart::empty(Uuid::new_v4(), Uuid::new_v4());
        cart.lines.push(CartLine { item_id: Uuid::new_v4(), quantity: Quantity::new(2).unwrap(), sku: Some(snapshot("Jacket", 19999, Some(24999))) });
        cart.lines.push(CartLine { item_id: Uuid::new_v4(), quantity: Quantity::ONE, sku: Some(snapshot("Shirt", 19999, None)) });
        cart.lines.push(CartLine { item_id: Uuid::new_v4(), quantity: Quantity::ONE, sku: None });
        let draft = OrderDraft::from_cart(&cart, None).unwrap();
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].price_at_purchase.minor(), 24999);
        assert_eq!(draft.total.minor(), 69997);
        assert_eq!(draft.total.to_decimal().to_string(), "699.97");
    }

    #[test]
    fn test_draft_rejects_empty_cart() {
        let cart = Cart::empty(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(OrderDraft::from_cart(&cart, None), Err(OrderError::EmptyCart));
    }
}
