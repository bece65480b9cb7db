//! Domain events
//!
//! Published after a write commits so that cached pages (cart badge, catalog listings, order
//! tracking) can be refreshed by whoever renders them.

use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    CartChanged { user_id: Uuid },
    CatalogChanged { product_id: Option<Uuid> },
    OrderCreated { order_id: Uuid, user_id: Uuid },
    OrderPaid { order_id: Uuid },
    OrderStatusChanged { order_id: Uuid, status: OrderStatus },
    AddressesChanged { user_id: Uuid },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::CartChanged { .. } => "storefront.cart.changed",
            Self::CatalogChanged { .. } => "storefront.catalog.changed",
            Self::OrderCreated { .. } => "storefront.order.created",
            Self::OrderPaid { .. } => "storefront.order.paid",
            Self::OrderStatusChanged { .. } => "storefront.order.status_changed",
            Self::AddressesChanged { .. } => "storefront.account.addresses_changed",
        }
    }
}
