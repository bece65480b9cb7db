//! Persistence seams
//!
//! Every cross-row guarantee the service relies on lives behind these traits and is enforced by
//! the backend itself: one cart per user, one line per `(cart, sku)`, stock never below zero,
//! an order and its lines written together.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Attribute, AttributeOption, AttributeWithOptions, Cart, Category, Order, OrderDraft, OrderItem, OrderStatus, Product, ProductDraft, ProductFilter, Sku};
use crate::domain::value_objects::{Address, ImageRef, Quantity, Slug};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("Unique violation: {0}")]
    UniqueViolation(String),
    #[error("Insufficient stock for SKU {0}")]
    InsufficientStock(Uuid),
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem { pub id: Uuid, pub cart_id: Uuid, pub sku_id: Uuid, pub quantity: Quantity }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn insert_category(&self, name: &str, slug: &Slug) -> StoreResult<Category>;
    async fn update_category(&self, id: Uuid, name: &str, slug: &Slug) -> StoreResult<Category>;
    /// Fails with `ForeignKeyViolation` while any product links the category.
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;

    async fn list_attributes(&self) -> StoreResult<Vec<AttributeWithOptions>>;
    async fn insert_attribute(&self, name: &str) -> StoreResult<Attribute>;
    async fn rename_attribute(&self, id: Uuid, name: &str) -> StoreResult<Attribute>;
    /// Cascades to the options; fails with `ForeignKeyViolation` if a SKU uses one of them.
    async fn delete_attribute(&self, id: Uuid) -> StoreResult<()>;
    async fn insert_attribute_option(&self, attribute_id: Uuid, value: &str) -> StoreResult<AttributeOption>;
    async fn delete_attribute_option(&self, id: Uuid) -> StoreResult<()>;

    /// Product, category links, SKUs and SKU option links in one transaction.
    async fn insert_product(&self, draft: &ProductDraft) -> StoreResult<Product>;
    /// Overwrites the product and recreates its category links and SKUs from scratch.
    async fn replace_product(&self, id: Uuid, draft: &ProductDraft) -> StoreResult<Product>;
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;
    async fn product_categories(&self, product_id: Uuid) -> StoreResult<Vec<Category>>;
    async fn product_skus(&self, product_id: Uuid) -> StoreResult<Vec<Sku>>;
    async fn set_product_images(&self, id: Uuid, images: &[ImageRef]) -> StoreResult<()>;

    /// Conditional single-statement decrement; returns the remaining stock.
    async fn decrement_stock(&self, sku_id: Uuid, quantity: Quantity) -> StoreResult<i32>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, user_id: Uuid) -> StoreResult<Option<Uuid>>;
    /// Returns the winner's id when another request created the cart first.
    async fn create_cart(&self, user_id: Uuid) -> StoreResult<Uuid>;
    /// Adds one to the `(cart, sku)` line, inserting it with quantity 1 if absent.
    async fn increment_cart_item(&self, cart_id: Uuid, sku_id: Uuid) -> StoreResult<CartItem>;
    async fn set_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: Quantity) -> StoreResult<()>;
    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<()>;
    async fn load_cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Order row plus all lines, atomically.
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<Order>;
    /// Removes the order; lines go with it.
    async fn delete_order(&self, id: Uuid) -> StoreResult<()>;
    /// Stores the gateway reference and empties the cart in one transaction.
    async fn complete_checkout(&self, order_id: Uuid, gateway_order_id: &str, cart_id: Uuid) -> StoreResult<()>;
    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;
    /// Newest first; `None` lists every user's orders.
    async fn list_orders(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Order>>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()>;
    /// Marks the order paid and records `event_key` together. Returns `false`, changing
    /// nothing, when the key was already recorded.
    async fn record_payment(&self, order_id: Uuid, event_key: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>>;
    async fn insert_address(&self, user_id: Uuid, address: &Address) -> StoreResult<SavedAddress>;
    async fn get_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<Option<SavedAddress>>;
    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<()>;
}

pub trait Store: CatalogStore + CartStore + OrderStore + AddressStore {}
impl<T: CatalogStore + CartStore + OrderStore + AddressStore> Store for T {}
