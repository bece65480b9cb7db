//! Hosted-checkout payment gateway
//!
//! The gateway creates a remote order for our pending order and returns a URL to its hosted
//! payment page. Payment confirmation arrives later through the webhook.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{PaymentConfig, MAX_CHECKOUT_EXPIRY_MINUTES};
use crate::domain::aggregates::OrderDraft;

const ACCEPT_V2: &str = "application/vnd.conekta-v2.1.0+json";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway misconfigured: {0}")]
    Misconfigured(String),
    #[error("authentication with the payment provider failed")]
    Authentication,
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomerInfo { pub name: String, pub email: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayLineItem { pub name: String, pub unit_price: i64, pub quantity: u32 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostedCheckout {
    #[serde(rename = "type")]
    pub kind: String,
    pub allowed_payment_methods: Vec<String>,
    pub success_url: String,
    pub failure_url: String,
    pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayMetadata { pub our_order_id: Uuid }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayOrderRequest {
    pub currency: String,
    pub customer_info: CustomerInfo,
    pub line_items: Vec<GatewayLineItem>,
    pub checkout: HostedCheckout,
    pub metadata: GatewayMetadata,
}

impl GatewayOrderRequest {
    /// Hosted-checkout request for an order already written as `pending`.
    pub fn hosted(order_id: Uuid, draft: &OrderDraft, customer: CustomerInfo, config: &PaymentConfig, site_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            currency: config.currency.clone(),
            customer_info: customer,
            line_items: draft.items.iter().map(|i| GatewayLineItem {
                name: i.product_name.clone(),
                unit_price: i.price_at_purchase.minor(),
                quantity: i.quantity.value(),
            }).collect(),
            checkout: HostedCheckout {
                kind: "HostedPayment".into(),
                allowed_payment_methods: vec!["card".into(), "cash".into(), "bank_transfer".into()],
                success_url: format!("{site_url}/pago/exitoso"),
                failure_url: format!("{site_url}/pago/fallido"),
                expires_at: (now + Duration::minutes(config.checkout_expiry_minutes.clamp(1, MAX_CHECKOUT_EXPIRY_MINUTES))).timestamp(),
            },
            metadata: GatewayMetadata { our_order_id: order_id },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayOrder { pub id: String, pub checkout_url: String }

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Checked before any write so a broken deployment never leaves pending orders behind.
    fn ensure_configured(&self) -> Result<(), PaymentError>;
    async fn create_order(&self, request: &GatewayOrderRequest, idempotency_key: &str) -> Result<GatewayOrder, PaymentError>;
}

pub struct HttpGateway { client: reqwest::Client, base_url: String, api_key: Option<String> }

#[derive(Deserialize)]
struct OrderResponse {
    id: Option<String>,
    checkout: Option<CheckoutResponse>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct CheckoutResponse { url: Option<String> }

#[derive(Deserialize)]
struct ErrorDetail { message: Option<String> }

impl HttpGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self { client: reqwest::Client::new(), base_url: config.api_url.clone(), api_key: config.api_key.clone() }
    }

    fn key(&self) -> Result<&str, PaymentError> {
        match self.api_key.as_deref() {
            None => Err(PaymentError::Misconfigured("API key is not set".into())),
            Some(k) if !k.starts_with("key_") => Err(PaymentError::Misconfigured("API key has an unexpected format".into())),
            Some(k) => Ok(k),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn ensure_configured(&self) -> Result<(), PaymentError> { self.key().map(|_| ()) }

    async fn create_order(&self, request: &GatewayOrderRequest, idempotency_key: &str) -> Result<GatewayOrder, PaymentError> {
        let key = self.key()?;
        tracing::debug!(order_id = %request.metadata.our_order_id, lines = request.line_items.len(), "submitting order to gateway");
        let response = self.client.post(format!("{}/orders", self.base_url))
            .bearer_auth(key)
            .header(header::ACCEPT, ACCEPT_V2)
            .header("Idempotency-Key", idempotency_key)
            .json(request)
            .send().await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PaymentError::Authentication);
        }
        let body: OrderResponse = response.json().await.map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let message = body.details.into_iter().find_map(|d| d.message)
                .unwrap_or_else(|| format!("gateway returned status {}", status.as_u16()));
            return Err(PaymentError::Rejected { status: status.as_u16(), message });
        }
        let id = body.id.ok_or_else(|| PaymentError::InvalidResponse("missing order id".into()))?;
        let checkout_url = body.checkout.and_then(|c| c.url).ok_or_else(|| PaymentError::InvalidResponse("missing checkout url".into()))?;
        Ok(GatewayOrder { id, checkout_url })
    }
}

/// Replays queued outcomes and records every request it receives.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedGateway {
    misconfigured: bool,
    outcomes: parking_lot::Mutex<std::collections::VecDeque<Result<GatewayOrder, PaymentError>>>,
    requests: parking_lot::Mutex<Vec<(GatewayOrderRequest, String)>>,
}

#[cfg(test)]
impl ScriptedGateway {
    pub fn succeeding(id: &str) -> Self {
        let g = Self::default();
        g.push(Ok(GatewayOrder { id: id.into(), checkout_url: format!("https://pay.example.com/{id}") }));
        g
    }

    pub fn failing(message: &str) -> Self {
        let g = Self::default();
        g.push(Err(PaymentError::Rejected { status: 422, message: message.into() }));
        g
    }

    pub fn misconfigured() -> Self { Self { misconfigured: true, ..Self::default() } }

    pub fn push(&self, outcome: Result<GatewayOrder, PaymentError>) { self.outcomes.lock().push_back(outcome); }

    pub fn requests(&self) -> Vec<(GatewayOrderRequest, String)> { self.requests.lock().clone() }
}

#[cfg(test)]
#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.misconfigured { Err(PaymentError::Misconfigured("API key is not set".into())) } else { Ok(()) }
    }

    async fn create_order(&self, request: &GatewayOrderRequest, idempotency_key: &str) -> Result<GatewayOrder, PaymentError> {
        self.requests.lock().push((request.clone(), idempotency_key.to_string()));
        self.outcomes.lock().pop_front().unwrap_or_else(|| Err(PaymentError::Transport("no scripted outcome".into())))
    }
}
