//! Checkout: cart snapshot, pending order, hosted payment session
//!
//! The order and its lines are written in one transaction before the gateway is called. If the
//! gateway refuses, the order is deleted again; the cart is emptied only once the gateway has
//! accepted the order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{OrderDraft, OrderError};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Address;
use crate::error::{AppError, Result};
use crate::payment::{CustomerInfo, GatewayOrderRequest, PaymentError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest { #[serde(default)] pub address_id: Option<Uuid> }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession { pub order_id: Uuid, pub checkout_url: String }

pub async fn create_order(state: &AppState, principal: &Principal, address_id: Option<Uuid>) -> Result<CheckoutSession> {
    if let Err(e) = state.payments.ensure_configured() {
        tracing::error!(error = %e, "checkout refused");
        return Err(AppError::PaymentMisconfigured);
    }

    let cart = match state.store.load_cart(principal.user_id).await? {
        Some(cart) if cart.has_valid_lines() => cart,
        _ => return Err(AppError::EmptyCart),
    };
    let address = shipping_address(state, principal, address_id).await?;
    let draft = OrderDraft::from_cart(&cart, address).map_err(|e| match e {
        OrderError::EmptyCart => AppError::EmptyCart,
        other => AppError::validation(other.to_string()),
    })?;

    let order = state.store.insert_order(&draft).await?;
    tracing::info!(order_id = %order.id, user_id = %principal.user_id, total = %draft.total, lines = draft.items.len(), "order created");

    let customer = CustomerInfo { name: principal.display_name(), email: principal.email.clone().unwrap_or_default() };
    let request = GatewayOrderRequest::hosted(order.id, &draft, customer, &state.config.payment, &state.config.site_url, Utc::now());
    let gateway_order = match state.payments.create_order(&request, &order.id.to_string()).await {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "gateway refused order, deleting it");
            if let Err(cleanup) = state.store.delete_order(order.id).await {
                tracing::error!(order_id = %order.id, error = %cleanup, "failed to delete order after gateway failure");
            }
            return Err(match e {
                PaymentError::Misconfigured(_) => AppError::PaymentMisconfigured,
                other => AppError::PaymentGateway(other.to_string()),
            });
        }
    };

    // The gateway now holds a payable session for this order; it is returned even if finalizing fails.
    match state.store.complete_checkout(order.id, &gateway_order.id, cart.id).await {
        Ok(()) => {
            tracing::info!(order_id = %order.id, gateway_order_id = %gateway_order.id, "checkout session opened");
            state.events.publish(DomainEvent::CartChanged { user_id: principal.user_id }).await;
        }
        Err(e) => tracing::error!(
            order_id = %order.id, gateway_order_id = %gateway_order.id, cart_id = %cart.id, error = %e,
            "order accepted by gateway but not finalized; needs reconciliation"
        ),
    }
    state.events.publish(DomainEvent::OrderCreated { order_id: order.id, user_id: principal.user_id }).await;

    Ok(CheckoutSession { order_id: order.id, checkout_url: gateway_order.checkout_url })
}

/// The chosen address, else the most recent one on file.
async fn shipping_address(state: &AppState, principal: &Principal, address_id: Option<Uuid>) -> Result<Option<Address>> {
    match address_id {
        Some(id) => state.store.get_address(principal.user_id, id).await?
            .map(|saved| Some(saved.address))
            .ok_or_else(|| AppError::NotFound("Address".into())),
        None => Ok(state.store.list_addresses(principal.user_id).await?.into_iter().next().map(|saved| saved.address)),
    }
}
