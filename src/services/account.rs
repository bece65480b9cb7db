//! Saved shipping addresses

use uuid::Uuid;
use validator::Validate;

use crate::auth::Principal;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Address;
use crate::error::Result;
use crate::state::AppState;
use crate::store::SavedAddress;

pub async fn list_addresses(state: &AppState, principal: &Principal) -> Result<Vec<SavedAddress>> {
    Ok(state.store.list_addresses(principal.user_id).await?)
}

pub async fn add_address(state: &AppState, principal: &Principal, address: Address) -> Result<SavedAddress> {
    let address = address.normalized();
    address.validate()?;
    let saved = state.store.insert_address(principal.user_id, &address).await?;
    tracing::info!(user_id = %principal.user_id, address_id = %saved.id, "address saved");
    state.events.publish(DomainEvent::AddressesChanged { user_id: principal.user_id }).await;
    Ok(saved)
}

pub async fn delete_address(state: &AppState, principal: &Principal, address_id: Uuid) -> Result<()> {
    state.store.delete_address(principal.user_id, address_id).await?;
    tracing::info!(user_id = %principal.user_id, %address_id, "address deleted");
    state.events.publish(DomainEvent::AddressesChanged { user_id: principal.user_id }).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::state::testing::Harness;

    fn address() -> Address {
        Address {
            street: "Calle 5 de Mayo".into(), exterior_num: "12".into(), interior_num: Some("  ".into()),
            colony: "Centro".into(), city: "Puebla".into(), state: "Puebla".into(), postal_code: "72000".into(),
        }
    }

    #[tokio::test]
    async fn test_add_list_delete() {
        let h = Harness::new();
        let user = Principal::customer(Uuid::new_v4());
        let saved = add_address(&h.state, &user, address()).await.unwrap();
        assert_eq!(saved.address.interior_num, None);
        assert_eq!(list_addresses(&h.state, &user).await.unwrap().len(), 1);

        delete_address(&h.state, &Principal::customer(Uuid::new_v4()), saved.id).await.unwrap();
        assert_eq!(list_addresses(&h.state, &user).await.unwrap().len(), 1);
        delete_address(&h.state, &user, saved.id).await.unwrap();
        assert!(list_addresses(&h.state, &user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_field_errors_are_reported_per_field() {
        let h = Harness::new();
        let user = Principal::customer(Uuid::new_v4());
        let bad = Address { postal_code: "72".into(), street: "x".into(), ..address() };
        match add_address(&h.state, &user, bad).await {
            Err(AppError::Validation { fields, .. }) => {
                assert!(fields.contains_key("postal_code"));
                assert!(fields.contains_key("street"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
