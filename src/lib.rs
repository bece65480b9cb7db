//! Storefront
//!
//! Catalog, cart, checkout and order tracking for a single shop, with an admin back office.
//!
//! ## Features
//! - Products with categories, attributes and SKU variants
//! - One cart per user, consolidated per SKU
//! - Hosted-checkout payments with webhook confirmation and stock decrement
//! - Order status tracking
//! - PostgreSQL or in-memory storage

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod media;
pub mod payment;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
