//! Order history and status tracking

use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{Order, OrderDetail, OrderStatus};
use crate::domain::events::DomainEvent;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// The caller's orders, newest first.
pub async fn list_mine(state: &AppState, principal: &Principal) -> Result<Vec<Order>> {
    Ok(state.store.list_orders(Some(principal.user_id)).await?)
}

pub async fn list_all(state: &AppState, principal: &Principal) -> Result<Vec<Order>> {
    principal.require_admin()?;
    Ok(state.store.list_orders(None).await?)
}

/// Order with lines and tracking. Other users' orders read as missing unless the caller is admin.
pub async fn detail(state: &AppState, principal: &Principal, order_id: Uuid) -> Result<OrderDetail> {
    let order = state.store.get_order(order_id).await?
        .filter(|o| o.user_id == principal.user_id || principal.is_admin())
        .ok_or_else(|| AppError::NotFound("Order".into()))?;
    let items = state.store.order_items(order.id).await?;
    Ok(OrderDetail::new(order, items))
}

/// Admin overwrite of the status; any valid status may follow any other.
pub async fn set_status(state: &AppState, principal: &Principal, order_id: Uuid, status: &str) -> Result<OrderStatus> {
    principal.require_admin()?;
    let status: OrderStatus = status.parse().map_err(|e: crate::domain::aggregates::OrderError| AppError::field("status", e.to_string()))?;
    state.store.set_order_status(order_id, status).await?;
    tracing::info!(%order_id, %status, by = %principal.user_id, "order status updated");
    state.events.publish(DomainEvent::OrderStatusChanged { order_id, status }).await;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderDraft, TrackingView};
    use crate::domain::value_objects::Money;
    use crate::state::testing::Harness;
    use crate::store::OrderStore;

    async fn order_for(h: &Harness, user_id: Uuid) -> Order {
        h.store.insert_order(&OrderDraft { user_id, total: Money::from_minor(100), shipping_address: None, items: vec![] }).await.unwrap()
    }

    #[tokio::test]
    async fn test_unknown_status_leaves_order_unchanged() {
        let h = Harness::new();
        let admin = Principal::admin(Uuid::new_v4());
        let order = order_for(&h, Uuid::new_v4()).await;

        assert!(matches!(set_status(&h.state, &admin, order.id, "lost").await, Err(AppError::Validation { .. })));
        assert_eq!(h.store.get_order(order.id).await.unwrap().unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_status_changes_are_admin_only_and_permissive() {
        let h = Harness::new();
        let admin = Principal::admin(Uuid::new_v4());
        let customer = Principal::customer(Uuid::new_v4());
        let order = order_for(&h, customer.user_id).await;

        assert!(matches!(set_status(&h.state, &customer, order.id, "shipped").await, Err(AppError::Unauthorized)));
        assert_eq!(set_status(&h.state, &admin, order.id, "shipped").await.unwrap(), OrderStatus::Shipped);
        assert_eq!(set_status(&h.state, &admin, order.id, "paid").await.unwrap(), OrderStatus::Paid);
        assert!(matches!(set_status(&h.state, &admin, Uuid::new_v4(), "paid").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_detail_is_scoped_to_owner() {
        let h = Harness::new();
        let owner = Principal::customer(Uuid::new_v4());
        let stranger = Principal::customer(Uuid::new_v4());
        let order = order_for(&h, owner.user_id).await;

        let detail = detail(&h.state, &owner, order.id).await.unwrap();
        assert!(matches!(detail.tracking, TrackingView::AwaitingPayment { .. }));
        assert!(matches!(super::detail(&h.state, &stranger, order.id).await, Err(AppError::NotFound(_))));
        assert!(super::detail(&h.state, &Principal::admin(Uuid::new_v4()), order.id).await.is_ok());

        assert_eq!(list_mine(&h.state, &owner).await.unwrap().len(), 1);
        assert!(list_mine(&h.state, &stranger).await.unwrap().is_empty());
        assert!(matches!(list_all(&h.state, &stranger).await, Err(AppError::Unauthorized)));
    }
}
