//! Payment gateway notifications
//!
//! Only `order.paid` does anything: the order flips to `paid` and every line's SKU stock is
//! decremented. Each payment is recorded under a dedup key in the same transaction as the status
//! change, so a redelivered event is acknowledged without touching stock again.

use futures::future::join_all;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub const ORDER_PAID: &str = "order.paid";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData { #[serde(default)] pub object: Option<WebhookObject> }

#[derive(Debug, Deserialize)]
pub struct WebhookObject { #[serde(default)] pub metadata: Option<WebhookMetadata> }

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata { #[serde(default)] pub our_order_id: Option<String> }

impl WebhookEvent {
    pub fn order_id(&self) -> Option<&str> {
        self.data.as_ref()?.object.as_ref()?.metadata.as_ref()?.our_order_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Ignored,
    Duplicate,
    Processed { decremented: usize, failed: Vec<Uuid> },
}

pub async fn handle(state: &AppState, event: WebhookEvent) -> Result<WebhookOutcome> {
    if event.kind != ORDER_PAID {
        tracing::debug!(kind = %event.kind, "webhook ignored");
        return Ok(WebhookOutcome::Ignored);
    }
    let raw = event.order_id().ok_or_else(|| AppError::MalformedWebhook("missing order id".into()))?;
    let order_id = Uuid::parse_str(raw).map_err(|_| AppError::MalformedWebhook(format!("invalid order id '{raw}'")))?;

    if !state.store.record_payment(order_id, &format!("{ORDER_PAID}:{order_id}")).await? {
        tracing::info!(%order_id, "duplicate payment notification acknowledged");
        return Ok(WebhookOutcome::Duplicate);
    }
    tracing::info!(%order_id, "order marked paid");

    let items = state.store.order_items(order_id).await?;
    let results = join_all(items.iter().filter_map(|i| i.sku_id.map(|sku| (sku, i.quantity))).map(|(sku_id, quantity)| async move {
        (sku_id, quantity, state.store.decrement_stock(sku_id, quantity).await)
    })).await;

    let mut decremented = 0;
    let mut failed = Vec::new();
    for (sku_id, quantity, result) in results {
        match result {
            Ok(remaining) => {
                decremented += 1;
                tracing::debug!(%order_id, %sku_id, quantity = quantity.value(), remaining, "stock decremented");
            }
            Err(e) => {
                tracing::warn!(%order_id, %sku_id, quantity = quantity.value(), error = %e, "stock decrement failed");
                failed.push(sku_id);
            }
        }
    }

    state.events.publish(DomainEvent::OrderPaid { order_id }).await;
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(WebhookOutcome::Processed { decremented, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::domain::aggregates::OrderStatus;
    use crate::payment::ScriptedGateway;
    use crate::services::{cart, checkout, fixtures};
    use crate::state::testing::Harness;
    use crate::store::{CatalogStore, OrderStore};
    use serde_json::json;

    fn paid(order_id: Uuid) -> WebhookEvent {
        serde_json::from_value(json!({"type": "order.paid", "data": {"object": {"metadata": {"our_order_id": order_id.to_string()}}}})).unwrap()
    }

    async fn checked_out(h: &Harness, sku: Uuid, qty: i64) -> Uuid {
        let user = Principal::customer(Uuid::new_v4());
        let item = cart::add_item(&h.state, &user, sku).await.unwrap();
        cart::update_quantity(&h.state, &user, item.id, qty).await.unwrap();
        checkout::create_order(&h.state, &user, None).await.unwrap().order_id
    }

    #[tokio::test]
    async fn test_paid_event_marks_order_and_decrements_stock() {
        let h = Harness::with_gateway(ScriptedGateway::succeeding("gw_1"));
        let (product, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 5)]).await;
        let order_id = checked_out(&h, skus[0], 2).await;

        let outcome = handle(&h.state, paid(order_id)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed { decremented: 1, failed: vec![] });
        assert_eq!(h.store.get_order(order_id).await.unwrap().unwrap().status, OrderStatus::Paid);
        assert_eq!(h.store.product_skus(product.id).await.unwrap()[0].stock, 3);
        assert!(h.events.events().contains(&DomainEvent::OrderPaid { order_id }));
    }

    #[tokio::test]
    async fn test_redelivery_decrements_once() {
        let h = Harness::with_gateway(ScriptedGateway::succeeding("gw_1"));
        let (product, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 5)]).await;
        let order_id = checked_out(&h, skus[0], 2).await;

        handle(&h.state, paid(order_id)).await.unwrap();
        assert_eq!(handle(&h.state, paid(order_id)).await.unwrap(), WebhookOutcome::Duplicate);
        assert_eq!(h.store.product_skus(product.id).await.unwrap()[0].stock, 3);
    }

    #[tokio::test]
    async fn test_concurrent_payments_never_oversell() {
        let h = Harness::new();
        h.gateway.push(Ok(crate::payment::GatewayOrder { id: "gw_a".into(), checkout_url: "https://pay/a".into() }));
        h.gateway.push(Ok(crate::payment::GatewayOrder { id: "gw_b".into(), checkout_url: "https://pay/b".into() }));
        let (product, skus) = fixtures::product(&h.store, "Last one", 24999, &[(None, 1)]).await;
        let first = checked_out(&h, skus[0], 1).await;
        let second = checked_out(&h, skus[0], 1).await;

        let (a, b) = tokio::join!(handle(&h.state, paid(first)), handle(&h.state, paid(second)));
        let failures: usize = [a.unwrap(), b.unwrap()].iter().map(|o| match o {
            WebhookOutcome::Processed { failed, .. } => failed.len(),
            other => panic!("unexpected {other:?}"),
        }).sum();
        assert_eq!(failures, 1);
        assert_eq!(h.store.product_skus(product.id).await.unwrap()[0].stock, 0);
        assert_eq!(h.store.get_order(first).await.unwrap().unwrap().status, OrderStatus::Paid);
        assert_eq!(h.store.get_order(second).await.unwrap().unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_missing_order_id_is_malformed() {
        let h = Harness::new();
        let event: WebhookEvent = serde_json::from_value(json!({"type": "order.paid", "data": {"object": {}}})).unwrap();
        assert!(matches!(handle(&h.state, event).await, Err(AppError::MalformedWebhook(_))));
    }

    #[tokio::test]
    async fn test_other_events_are_ignored() {
        let h = Harness::new();
        let event: WebhookEvent = serde_json::from_value(json!({"type": "charge.created"})).unwrap();
        assert_eq!(handle(&h.state, event).await.unwrap(), WebhookOutcome::Ignored);
    }
}
