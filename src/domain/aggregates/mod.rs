//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Attribute, AttributeOption, AttributeWithOptions, Category, NewSku, Product, ProductDetail, ProductDraft, ProductFilter, Sku, SkuDetail, SkuOptionValue};
pub use order::{NewOrderItem, Order, OrderDetail, OrderDraft, OrderError, OrderItem, OrderStatus, StepState, TrackingStep, TrackingView};
pub use cart::{Cart, CartLine, CartLineView, CartView, SkuSnapshot};
