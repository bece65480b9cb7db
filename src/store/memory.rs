//! In-process backend
//!
//! Mirrors the Postgres schema's constraints (unique keys, restrict/cascade foreign keys,
//! conditional stock updates) under a single lock. Used when no `DATABASE_URL` is configured
//! and by the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use uuid::Uuid;

use super::{AddressStore, CartItem, CartStore, CatalogStore, OrderStore, SavedAddress, StoreError, StoreResult};
use crate::domain::aggregates::{Attribute, AttributeOption, AttributeWithOptions, Cart, CartLine, Category, Order, OrderDraft, OrderItem, OrderStatus, Product, ProductDraft, ProductFilter, Sku, SkuSnapshot};
use crate::domain::value_objects::{Address, ImageRef, Quantity, Slug};

#[derive(Default)]
struct Tables {
    categories: Vec<Category>,
    products: Vec<Product>,
    product_categories: Vec<(Uuid, Uuid)>,
    attributes: Vec<Attribute>,
    options: Vec<AttributeOption>,
    skus: Vec<Sku>,
    carts: Vec<(Uuid, Uuid)>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    addresses: Vec<SavedAddress>,
    processed_webhooks: HashSet<String>,
    #[cfg(test)]
    fail_checkout_completion: bool,
}

impl Tables {
    fn check_product_refs(&self, draft: &ProductDraft) -> StoreResult<()> {
        if let Some(missing) = draft.category_ids.iter().find(|id| !self.categories.iter().any(|c| c.id == **id)) {
            return Err(StoreError::ForeignKeyViolation(format!("category {missing} does not exist")));
        }
        let options = draft.skus.iter().flat_map(|s| s.option_ids.iter());
        for id in options {
            if !self.options.iter().any(|o| o.id == *id) {
                return Err(StoreError::ForeignKeyViolation(format!("attribute option {id} does not exist")));
            }
        }
        Ok(())
    }

    fn check_slug_free(&self, slug: &Slug, except: Option<Uuid>) -> StoreResult<()> {
        if self.products.iter().any(|p| p.slug == slug.as_str() && Some(p.id) != except) {
            return Err(StoreError::UniqueViolation(format!("product slug '{slug}' already exists")));
        }
        Ok(())
    }

    fn write_product_links(&mut self, product_id: Uuid, draft: &ProductDraft) {
        let mut seen = HashSet::new();
        for cat in &draft.category_ids {
            if seen.insert(*cat) { self.product_categories.push((product_id, *cat)); }
        }
        for sku in &draft.skus {
            let mut seen = HashSet::new();
            let option_ids: Vec<Uuid> = sku.option_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
            self.skus.push(Sku { id: Uuid::now_v7(), product_id, price: sku.price, stock: sku.stock, option_ids });
        }
    }

    fn remove_skus_of(&mut self, product_id: Uuid) {
        let removed: HashSet<Uuid> = self.skus.iter().filter(|s| s.product_id == product_id).map(|s| s.id).collect();
        self.skus.retain(|s| s.product_id != product_id);
        self.cart_items.retain(|ci| !removed.contains(&ci.sku_id));
        for item in self.order_items.iter_mut() {
            if item.sku_id.is_some_and(|id| removed.contains(&id)) { item.sku_id = None; }
        }
    }

    fn option_in_use(&self, option_id: Uuid) -> bool { self.skus.iter().any(|s| s.option_ids.contains(&option_id)) }

    fn snapshot(&self, sku_id: Uuid) -> Option<SkuSnapshot> {
        let sku = self.skus.iter().find(|s| s.id == sku_id)?;
        let product = self.products.iter().find(|p| p.id == sku.product_id && p.active)?;
        let mut labelled: Vec<(&str, &str)> = sku.option_ids.iter().filter_map(|oid| {
            let opt = self.options.iter().find(|o| o.id == *oid)?;
            let attr = self.attributes.iter().find(|a| a.id == opt.attribute_id)?;
            Some((attr.name.as_str(), opt.value.as_str()))
        }).collect();
        labelled.sort_by(|a, b| a.0.cmp(b.0));
        Some(SkuSnapshot {
            sku_id: sku.id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            base_price: product.base_price,
            override_price: sku.price,
            options: labelled.into_iter().map(|(_, v)| v.to_string()).collect(),
            image: product.images.first().cloned(),
        })
    }

    fn cart_of(&self, user_id: Uuid) -> Option<Uuid> { self.carts.iter().find(|(_, u)| *u == user_id).map(|(id, _)| *id) }
}

/// Lock-guarded tables; no lock is ever held across an `.await`.
#[derive(Default)]
pub struct MemoryStore { tables: Mutex<Tables> }

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Makes every later `complete_checkout` fail as if the database were gone.
    #[cfg(test)]
    pub(crate) fn fail_checkout_completion(&self) { self.tables.lock().fail_checkout_completion = true; }
}

fn now() -> DateTime<Utc> { Utc::now() }

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut cats = self.tables.lock().categories.clone();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    async fn insert_category(&self, name: &str, slug: &Slug) -> StoreResult<Category> {
        let mut t = self.tables.lock();
        if t.categories.iter().any(|c| c.slug == slug.as_str()) {
            return Err(StoreError::UniqueViolation(format!("category slug '{slug}' already exists")));
        }
        let cat = Category { id: Uuid::now_v7(), name: name.to_string(), slug: slug.to_string(), created_at: now() };
        t.categories.push(cat.clone());
        Ok(cat)
    }

    async fn update_category(&self, id: Uuid, name: &str, slug: &Slug) -> StoreResult<Category> {
        let mut t = self.tables.lock();
        if t.categories.iter().any(|c| c.slug == slug.as_str() && c.id != id) {
            return Err(StoreError::UniqueViolation(format!("category slug '{slug}' already exists")));
        }
        let cat = t.categories.iter_mut().find(|c| c.id == id).ok_or(StoreError::NotFound("Category"))?;
        cat.name = name.to_string();
        cat.slug = slug.to_string();
        Ok(cat.clone())
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        if !t.categories.iter().any(|c| c.id == id) { return Err(StoreError::NotFound("Category")); }
        if t.product_categories.iter().any(|(_, c)| *c == id) {
            return Err(StoreError::ForeignKeyViolation(format!("category {id} is referenced by product_categories")));
        }
        t.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn list_attributes(&self) -> StoreResult<Vec<AttributeWithOptions>> {
        let t = self.tables.lock();
        let mut attrs: Vec<AttributeWithOptions> = t.attributes.iter().map(|a| {
            let mut options: Vec<AttributeOption> = t.options.iter().filter(|o| o.attribute_id == a.id).cloned().collect();
            options.sort_by(|x, y| x.value.cmp(&y.value));
            AttributeWithOptions { attribute: a.clone(), options }
        }).collect();
        attrs.sort_by(|a, b| a.attribute.name.cmp(&b.attribute.name));
        Ok(attrs)
    }

    async fn insert_attribute(&self, name: &str) -> StoreResult<Attribute> {
        let attr = Attribute { id: Uuid::now_v7(), name: name.to_string() };
        self.tables.lock().attributes.push(attr.clone());
        Ok(attr)
    }

    async fn rename_attribute(&self, id: Uuid, name: &str) -> StoreResult<Attribute> {
        let mut t = self.tables.lock();
        let attr = t.attributes.iter_mut().find(|a| a.id == id).ok_or(StoreError::NotFound("Attribute"))?;
        attr.name = name.to_string();
        Ok(attr.clone())
    }

    async fn delete_attribute(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        if !t.attributes.iter().any(|a| a.id == id) { return Err(StoreError::NotFound("Attribute")); }
        if t.options.iter().any(|o| o.attribute_id == id && t.option_in_use(o.id)) {
            return Err(StoreError::ForeignKeyViolation(format!("options of attribute {id} are referenced by sku_options")));
        }
        t.options.retain(|o| o.attribute_id != id);
        t.attributes.retain(|a| a.id != id);
        Ok(())
    }

    async fn insert_attribute_option(&self, attribute_id: Uuid, value: &str) -> StoreResult<AttributeOption> {
        let mut t = self.tables.lock();
        if !t.attributes.iter().any(|a| a.id == attribute_id) {
            return Err(StoreError::ForeignKeyViolation(format!("attribute {attribute_id} does not exist")));
        }
        if t.options.iter().any(|o| o.attribute_id == attribute_id && o.value == value) {
            return Err(StoreError::UniqueViolation(format!("option '{value}' already exists")));
        }
        let opt = AttributeOption { id: Uuid::now_v7(), attribute_id, value: value.to_string() };
        t.options.push(opt.clone());
        Ok(opt)
    }

    async fn delete_attribute_option(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        if !t.options.iter().any(|o| o.id == id) { return Err(StoreError::NotFound("Attribute option")); }
        if t.option_in_use(id) {
            return Err(StoreError::ForeignKeyViolation(format!("option {id} is referenced by sku_options")));
        }
        t.options.retain(|o| o.id != id);
        Ok(())
    }

    async fn insert_product(&self, draft: &ProductDraft) -> StoreResult<Product> {
        let mut t = self.tables.lock();
        t.check_slug_free(&draft.slug, None)?;
        t.check_product_refs(draft)?;
        let product = Product {
            id: Uuid::now_v7(), name: draft.name.clone(), slug: draft.slug.to_string(), description: draft.description.clone(),
            base_price: draft.base_price, images: vec![], active: draft.active, created_at: now(),
        };
        t.products.push(product.clone());
        t.write_product_links(product.id, draft);
        Ok(product)
    }

    async fn replace_product(&self, id: Uuid, draft: &ProductDraft) -> StoreResult<Product> {
        let mut t = self.tables.lock();
        if !t.products.iter().any(|p| p.id == id) { return Err(StoreError::NotFound("Product")); }
        t.check_slug_free(&draft.slug, Some(id))?;
        t.check_product_refs(draft)?;
        t.product_categories.retain(|(p, _)| *p != id);
        t.remove_skus_of(id);
        t.write_product_links(id, draft);
        let product = t.products.iter_mut().find(|p| p.id == id).ok_or(StoreError::NotFound("Product"))?;
        product.name = draft.name.clone();
        product.slug = draft.slug.to_string();
        product.description = draft.description.clone();
        product.base_price = draft.base_price;
        product.active = draft.active;
        Ok(product.clone())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        Ok(self.tables.lock().products.iter().find(|p| p.slug == slug).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let t = self.tables.lock();
        let mut products: Vec<Product> = t.products.iter().filter(|p| {
            let cats: Vec<Category> = t.product_categories.iter().filter(|(pid, _)| *pid == p.id)
                .filter_map(|(_, cid)| t.categories.iter().find(|c| c.id == *cid).cloned()).collect();
            filter.matches(p, &cats)
        }).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn product_categories(&self, product_id: Uuid) -> StoreResult<Vec<Category>> {
        let t = self.tables.lock();
        let mut cats: Vec<Category> = t.product_categories.iter().filter(|(p, _)| *p == product_id)
            .filter_map(|(_, c)| t.categories.iter().find(|x| x.id == *c).cloned()).collect();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    async fn product_skus(&self, product_id: Uuid) -> StoreResult<Vec<Sku>> {
        Ok(self.tables.lock().skus.iter().filter(|s| s.product_id == product_id).cloned().collect())
    }

    async fn set_product_images(&self, id: Uuid, images: &[ImageRef]) -> StoreResult<()> {
        let mut t = self.tables.lock();
        let product = t.products.iter_mut().find(|p| p.id == id).ok_or(StoreError::NotFound("Product"))?;
        product.images = images.to_vec();
        Ok(())
    }

    async fn decrement_stock(&self, sku_id: Uuid, quantity: Quantity) -> StoreResult<i32> {
        let mut t = self.tables.lock();
        let sku = t.skus.iter_mut().find(|s| s.id == sku_id).ok_or(StoreError::NotFound("SKU"))?;
        let qty = i32::try_from(quantity.value()).map_err(|_| StoreError::InsufficientStock(sku_id))?;
        if sku.stock < qty { return Err(StoreError::InsufficientStock(sku_id)); }
        sku.stock -= qty;
        Ok(sku.stock)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_cart(&self, user_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.tables.lock().cart_of(user_id))
    }

    async fn create_cart(&self, user_id: Uuid) -> StoreResult<Uuid> {
        let mut t = self.tables.lock();
        if let Some(existing) = t.cart_of(user_id) { return Ok(existing); }
        let id = Uuid::now_v7();
        t.carts.push((id, user_id));
        Ok(id)
    }

    async fn increment_cart_item(&self, cart_id: Uuid, sku_id: Uuid) -> StoreResult<CartItem> {
        let mut t = self.tables.lock();
        if !t.carts.iter().any(|(id, _)| *id == cart_id) {
            return Err(StoreError::ForeignKeyViolation(format!("cart {cart_id} does not exist")));
        }
        if !t.skus.iter().any(|s| s.id == sku_id) {
            return Err(StoreError::ForeignKeyViolation(format!("sku {sku_id} does not exist")));
        }
        if let Some(item) = t.cart_items.iter_mut().find(|ci| ci.cart_id == cart_id && ci.sku_id == sku_id) {
            item.quantity = Quantity::new(i64::from(item.quantity.value()) + 1).map_err(|e| StoreError::Database(e.to_string()))?;
            return Ok(item.clone());
        }
        let item = CartItem { id: Uuid::now_v7(), cart_id, sku_id, quantity: Quantity::ONE };
        t.cart_items.push(item.clone());
        Ok(item)
    }

    async fn set_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: Quantity) -> StoreResult<()> {
        let mut t = self.tables.lock();
        let cart_id = t.cart_of(user_id).ok_or(StoreError::NotFound("Cart item"))?;
        let item = t.cart_items.iter_mut().find(|ci| ci.id == item_id && ci.cart_id == cart_id).ok_or(StoreError::NotFound("Cart item"))?;
        item.quantity = quantity;
        Ok(())
    }

    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        if let Some(cart_id) = t.cart_of(user_id) {
            t.cart_items.retain(|ci| !(ci.id == item_id && ci.cart_id == cart_id));
        }
        Ok(())
    }

    async fn load_cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>> {
        let t = self.tables.lock();
        let Some(cart_id) = t.cart_of(user_id) else { return Ok(None) };
        let lines = t.cart_items.iter().filter(|ci| ci.cart_id == cart_id)
            .map(|ci| CartLine { item_id: ci.id, quantity: ci.quantity, sku: t.snapshot(ci.sku_id) })
            .collect();
        Ok(Some(Cart { id: cart_id, user_id, lines }))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<Order> {
        let mut t = self.tables.lock();
        if let Some(missing) = draft.items.iter().find(|i| !t.products.iter().any(|p| p.id == i.product_id)) {
            return Err(StoreError::ForeignKeyViolation(format!("product {} does not exist", missing.product_id)));
        }
        let order = Order {
            id: Uuid::now_v7(), user_id: draft.user_id, total: draft.total, status: OrderStatus::Pending,
            shipping_address: draft.shipping_address.clone(), gateway_order_id: None, created_at: now(),
        };
        let items: Vec<OrderItem> = draft.items.iter().map(|i| OrderItem {
            id: Uuid::now_v7(), order_id: order.id, product_id: i.product_id, sku_id: i.sku_id,
            product_name: i.product_name.clone(), quantity: i.quantity, price_at_purchase: i.price_at_purchase,
        }).collect();
        t.orders.push(order.clone());
        t.order_items.extend(items);
        Ok(order)
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        t.orders.retain(|o| o.id != id);
        t.order_items.retain(|i| i.order_id != id);
        Ok(())
    }

    async fn complete_checkout(&self, order_id: Uuid, gateway_order_id: &str, cart_id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.lock();
        #[cfg(test)]
        if t.fail_checkout_completion {
            return Err(StoreError::Database("connection reset".into()));
        }
        let order = t.orders.iter_mut().find(|o| o.id == order_id).ok_or(StoreError::NotFound("Order"))?;
        order.gateway_order_id = Some(gateway_order_id.to_string());
        t.cart_items.retain(|ci| ci.cart_id != cart_id);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        Ok(self.tables.lock().order_items.iter().filter(|i| i.order_id == order_id).cloned().collect())
    }

    async fn list_orders(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Order>> {
        let t = self.tables.lock();
        let mut orders: Vec<Order> = t.orders.iter().filter(|o| user_id.map_or(true, |u| o.user_id == u)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()> {
        let mut t = self.tables.lock();
        let order = t.orders.iter_mut().find(|o| o.id == id).ok_or(StoreError::NotFound("Order"))?;
        order.status = status;
        Ok(())
    }

    async fn record_payment(&self, order_id: Uuid, event_key: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock();
        if !t.orders.iter().any(|o| o.id == order_id) { return Err(StoreError::NotFound("Order")); }
        if !t.processed_webhooks.insert(event_key.to_string()) { return Ok(false); }
        if let Some(order) = t.orders.iter_mut().find(|o| o.id == order_id) { order.status = OrderStatus::Paid; }
        Ok(true)
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>> {
        let mut list: Vec<SavedAddress> = self.tables.lock().addresses.iter().filter(|a| a.user_id == user_id).cloned().collect();
        list.reverse();
        Ok(list)
    }

    async fn insert_address(&self, user_id: Uuid, address: &Address) -> StoreResult<SavedAddress> {
        let saved = SavedAddress { id: Uuid::now_v7(), user_id, address: address.clone(), created_at: now() };
        self.tables.lock().addresses.push(saved.clone());
        Ok(saved)
    }

    async fn get_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<Option<SavedAddress>> {
        Ok(self.tables.lock().addresses.iter().find(|a| a.id == id && a.user_id == user_id).cloned())
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
        self.tables.lock().addresses.retain(|a| !(a.id == id && a.user_id == user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewSku;
    use crate::domain::value_objects::Money;

    fn draft(name: &str, category_ids: Vec<Uuid>, skus: Vec<NewSku>) -> ProductDraft {
        ProductDraft { name: name.into(), slug: Slug::from_name(name).unwrap(), description: None, base_price: Money::from_minor(1000), active: true, category_ids, skus }
    }

    #[tokio::test]
    async fn test_category_delete_is_restricted_while_referenced() {
        let store = MemoryStore::new();
        let used = store.insert_category("Shirts", &Slug::from_name("Shirts").unwrap()).await.unwrap();
        let unused = store.insert_category("Hats", &Slug::from_name("Hats").unwrap()).await.unwrap();
        store.insert_product(&draft("Tee", vec![used.id], vec![])).await.unwrap();

        assert!(matches!(store.delete_category(used.id).await, Err(StoreError::ForeignKeyViolation(_))));
        assert!(store.list_categories().await.unwrap().iter().any(|c| c.id == used.id));

        store.delete_category(unused.id).await.unwrap();
        assert!(!store.list_categories().await.unwrap().iter().any(|c| c.id == unused.id));
    }

    #[tokio::test]
    async fn test_attribute_delete_cascades_unless_in_use() {
        let store = MemoryStore::new();
        let size = store.insert_attribute("Size").await.unwrap();
        let m = store.insert_attribute_option(size.id, "M").await.unwrap();
        assert!(matches!(store.insert_attribute_option(size.id, "M").await, Err(StoreError::UniqueViolation(_))));

        let color = store.insert_attribute("Color").await.unwrap();
        store.insert_attribute_option(color.id, "Red").await.unwrap();
        store.insert_product(&draft("Tee", vec![], vec![NewSku { price: None, stock: 1, option_ids: vec![m.id] }])).await.unwrap();

        assert!(matches!(store.delete_attribute(size.id).await, Err(StoreError::ForeignKeyViolation(_))));
        assert!(matches!(store.delete_attribute_option(m.id).await, Err(StoreError::ForeignKeyViolation(_))));
        store.delete_attribute(color.id).await.unwrap();
        let attrs = store.list_attributes().await.unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].options.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_product_drops_old_skus_and_cart_lines() {
        let store = MemoryStore::new();
        let product = store.insert_product(&draft("Tee", vec![], vec![NewSku { price: None, stock: 5, option_ids: vec![] }])).await.unwrap();
        let old_sku = store.product_skus(product.id).await.unwrap()[0].id;
        let user = Uuid::new_v4();
        let cart = store.create_cart(user).await.unwrap();
        store.increment_cart_item(cart, old_sku).await.unwrap();

        store.replace_product(product.id, &draft("Tee", vec![], vec![NewSku { price: None, stock: 0, option_ids: vec![] }])).await.unwrap();
        let skus = store.product_skus(product.id).await.unwrap();
        assert_eq!(skus.len(), 1);
        assert_ne!(skus[0].id, old_sku);
        assert!(store.load_cart(user).await.unwrap().unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_sku_links_each_option_once() {
        let store = MemoryStore::new();
        let size = store.insert_attribute("Size").await.unwrap();
        let s = store.insert_attribute_option(size.id, "S").await.unwrap();
        let color = store.insert_attribute("Color").await.unwrap();
        let red = store.insert_attribute_option(color.id, "Red").await.unwrap();
        let product = store.insert_product(&draft("Tee", vec![], vec![NewSku { price: None, stock: 1, option_ids: vec![s.id, red.id, s.id] }])).await.unwrap();
        assert_eq!(store.product_skus(product.id).await.unwrap()[0].option_ids, vec![s.id, red.id]);
    }

    #[tokio::test]
    async fn test_create_cart_is_unique_per_user() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let a = store.create_cart(user).await.unwrap();
        let b = store.create_cart(user).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_record_payment_once() {
        let store = MemoryStore::new();
        let order = store.insert_order(&OrderDraft { user_id: Uuid::new_v4(), total: Money::ZERO, shipping_address: None, items: vec![] }).await.unwrap();
        assert!(store.record_payment(order.id, "k").await.unwrap());
        store.set_order_status(order.id, OrderStatus::Shipped).await.unwrap();
        assert!(!store.record_payment(order.id, "k").await.unwrap());
        assert_eq!(store.get_order(order.id).await.unwrap().unwrap().status, OrderStatus::Shipped);
        assert!(matches!(store.record_payment(Uuid::new_v4(), "x").await, Err(StoreError::NotFound(_))));
    }
}
