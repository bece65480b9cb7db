//! Application services
//!
//! Every operation takes the shared [`AppState`](crate::state::AppState) and, where a user is
//! involved, the authenticated [`Principal`](crate::auth::Principal) explicitly.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod webhook;
