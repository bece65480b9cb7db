//! Cart consolidation: one cart per user, one line per SKU

use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::CartView;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Quantity;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::{CartItem, StoreError};

/// Adds one unit of `sku_id`, creating the cart on first use.
pub async fn add_item(state: &AppState, principal: &Principal, sku_id: Uuid) -> Result<CartItem> {
    let user_id = principal.user_id;
    let cart_id = match state.store.find_cart(user_id).await? {
        Some(id) => id,
        None => state.store.create_cart(user_id).await?,
    };
    let item = state.store.increment_cart_item(cart_id, sku_id).await.map_err(|e| match e {
        StoreError::ForeignKeyViolation(_) => AppError::NotFound("Product variant".into()),
        other => other.into(),
    })?;
    tracing::info!(%user_id, %sku_id, quantity = item.quantity.value(), "cart item added");
    state.events.publish(DomainEvent::CartChanged { user_id }).await;
    Ok(item)
}

/// Overwrites the line quantity. Concurrent updates are last-write-wins.
pub async fn update_quantity(state: &AppState, principal: &Principal, item_id: Uuid, quantity: i64) -> Result<()> {
    let quantity = Quantity::new(quantity).map_err(|e| AppError::field("quantity", e.to_string()))?;
    state.store.set_cart_item_quantity(principal.user_id, item_id, quantity).await?;
    tracing::info!(user_id = %principal.user_id, %item_id, quantity = quantity.value(), "cart quantity updated");
    state.events.publish(DomainEvent::CartChanged { user_id: principal.user_id }).await;
    Ok(())
}

pub async fn remove_item(state: &AppState, principal: &Principal, item_id: Uuid) -> Result<()> {
    state.store.delete_cart_item(principal.user_id, item_id).await?;
    tracing::info!(user_id = %principal.user_id, %item_id, "cart item removed");
    state.events.publish(DomainEvent::CartChanged { user_id: principal.user_id }).await;
    Ok(())
}

pub async fn view(state: &AppState, principal: &Principal) -> Result<CartView> {
    match state.store.load_cart(principal.user_id).await? {
        Some(cart) => Ok(cart.view()?),
        None => Ok(CartView::empty()),
    }
}

/// Units in the cart, for the header badge.
pub async fn count(state: &AppState, principal: &Principal) -> Result<u32> {
    Ok(state.store.load_cart(principal.user_id).await?.map_or(0, |c| c.item_count()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use crate::state::testing::Harness;

    #[tokio::test]
    async fn test_repeated_adds_consolidate_into_one_line() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 10)]).await;
        let user = Principal::customer(Uuid::new_v4());
        for _ in 0..4 {
            add_item(&h.state, &user, skus[0]).await.unwrap();
        }
        let cart = view(&h.state, &user).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity.value(), 4);
        assert_eq!(count(&h.state, &user).await.unwrap(), 4);
        assert_eq!(h.events.events().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_first_adds_share_one_cart() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 10)]).await;
        let user = Principal::customer(Uuid::new_v4());
        let (a, b) = tokio::join!(add_item(&h.state, &user, skus[0]), add_item(&h.state, &user, skus[0]));
        assert_eq!(a.unwrap().cart_id, b.unwrap().cart_id);
        assert_eq!(count(&h.state, &user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_quantity_rejects_below_one() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 10)]).await;
        let user = Principal::customer(Uuid::new_v4());
        let item = add_item(&h.state, &user, skus[0]).await.unwrap();

        for bad in [0, -1] {
            assert!(matches!(update_quantity(&h.state, &user, item.id, bad).await, Err(AppError::Validation { .. })));
        }
        update_quantity(&h.state, &user, item.id, 3).await.unwrap();
        assert_eq!(view(&h.state, &user).await.unwrap().lines[0].quantity.value(), 3);
    }

    #[tokio::test]
    async fn test_subtotal_uses_override_prices() {
        let h = Harness::new();
        let (_, tee) = fixtures::product(&h.store, "Tee", 10000, &[(Some(24999), 10)]).await;
        let (_, cap) = fixtures::product(&h.store, "Cap", 19999, &[(None, 10)]).await;
        let user = Principal::customer(Uuid::new_v4());
        add_item(&h.state, &user, tee[0]).await.unwrap();
        add_item(&h.state, &user, tee[0]).await.unwrap();
        add_item(&h.state, &user, cap[0]).await.unwrap();

        let cart = view(&h.state, &user).await.unwrap();
        assert_eq!(cart.subtotal.minor(), 69997);
        assert_eq!(cart.subtotal.to_string(), "699.97");
    }

    #[tokio::test]
    async fn test_unknown_sku_and_foreign_items() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 10)]).await;
        let owner = Principal::customer(Uuid::new_v4());
        let other = Principal::customer(Uuid::new_v4());
        assert!(matches!(add_item(&h.state, &owner, Uuid::new_v4()).await, Err(AppError::NotFound(_))));

        let item = add_item(&h.state, &owner, skus[0]).await.unwrap();
        assert!(matches!(update_quantity(&h.state, &other, item.id, 5).await, Err(AppError::NotFound(_))));
        remove_item(&h.state, &other, item.id).await.unwrap();
        assert_eq!(count(&h.state, &owner).await.unwrap(), 1);

        remove_item(&h.state, &owner, item.id).await.unwrap();
        assert_eq!(count(&h.state, &owner).await.unwrap(), 0);
    }
}
