//! PostgreSQL backend (sqlx)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{AddressStore, CartItem, CartStore, CatalogStore, OrderStore, SavedAddress, StoreError, StoreResult};
use crate::domain::aggregates::{Attribute, AttributeOption, AttributeWithOptions, Cart, CartLine, Category, Order, OrderDraft, OrderItem, OrderStatus, Product, ProductDraft, ProductFilter, Sku, SkuSnapshot};
use crate::domain::value_objects::{Address, ImageRef, Money, Quantity, Slug};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            match db.code().as_deref() {
                Some("23503") => return Self::ForeignKeyViolation(db.message().to_string()),
                Some("23505") => return Self::UniqueViolation(db.message().to_string()),
                _ => {}
            }
        }
        Self::Database(e.to_string())
    }
}

fn money(amount: Decimal) -> StoreResult<Money> {
    Money::from_decimal(amount).map_err(|e| StoreError::Database(format!("stored amount {amount}: {e}")))
}

fn quantity(q: i32) -> StoreResult<Quantity> {
    Quantity::new(i64::from(q)).map_err(|e| StoreError::Database(format!("stored quantity {q}: {e}")))
}

fn db_quantity(q: Quantity) -> StoreResult<i32> {
    i32::try_from(q.value()).map_err(|_| StoreError::Database(format!("quantity {} exceeds column range", q.value())))
}

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String, created_at: DateTime<Utc> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self { Category { id: r.id, name: r.name, slug: r.slug, created_at: r.created_at } }
}

#[derive(sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, slug: String, description: Option<String>, price: Decimal, images: Json<Vec<ImageRef>>, active: bool, created_at: DateTime<Utc> }

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> StoreResult<Self> {
        Ok(Product { id: r.id, name: r.name, slug: r.slug, description: r.description, base_price: money(r.price)?, images: r.images.0, active: r.active, created_at: r.created_at })
    }
}

#[derive(sqlx::FromRow)]
struct SkuRow { id: Uuid, product_id: Uuid, price: Option<Decimal>, stock: i32, option_ids: Vec<Uuid> }

#[derive(sqlx::FromRow)]
struct CartLineRow {
    item_id: Uuid,
    quantity: i32,
    sku_id: Option<Uuid>,
    sku_price: Option<Decimal>,
    product_id: Option<Uuid>,
    product_name: Option<String>,
    product_slug: Option<String>,
    base_price: Option<Decimal>,
    images: Option<Json<Vec<ImageRef>>>,
    options: Vec<String>,
}

impl CartLineRow {
    fn into_line(self) -> StoreResult<CartLine> {
        let sku = match (self.sku_id, self.product_id, self.product_name, self.product_slug, self.base_price) {
            (Some(sku_id), Some(product_id), Some(product_name), Some(product_slug), Some(base)) => Some(SkuSnapshot {
                sku_id, product_id, product_name, product_slug,
                base_price: money(base)?,
                override_price: self.sku_price.map(money).transpose()?,
                options: self.options,
                image: self.images.and_then(|imgs| imgs.0.into_iter().next()),
            }),
            _ => None,
        };
        Ok(CartLine { item_id: self.item_id, quantity: quantity(self.quantity)?, sku })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow { id: Uuid, user_id: Uuid, total_amount: Decimal, status: String, shipping_address: Option<Json<Address>>, gateway_order_id: Option<String>, created_at: DateTime<Utc> }

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> StoreResult<Self> {
        let status = r.status.parse::<OrderStatus>().map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Order { id: r.id, user_id: r.user_id, total: money(r.total_amount)?, status, shipping_address: r.shipping_address.map(|a| a.0), gateway_order_id: r.gateway_order_id, created_at: r.created_at })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { id: Uuid, order_id: Uuid, product_id: Uuid, sku_id: Option<Uuid>, product_name: String, quantity: i32, price_at_purchase: Decimal }

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;
    fn try_from(r: OrderItemRow) -> StoreResult<Self> {
        Ok(OrderItem { id: r.id, order_id: r.order_id, product_id: r.product_id, sku_id: r.sku_id, product_name: r.product_name, quantity: quantity(r.quantity)?, price_at_purchase: money(r.price_at_purchase)? })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow { id: Uuid, user_id: Uuid, street: String, exterior_num: String, interior_num: Option<String>, colony: String, city: String, state: String, postal_code: String, created_at: DateTime<Utc> }

impl From<AddressRow> for SavedAddress {
    fn from(r: AddressRow) -> Self {
        SavedAddress {
            id: r.id, user_id: r.user_id, created_at: r.created_at,
            address: Address { street: r.street, exterior_num: r.exterior_num, interior_num: r.interior_num, colony: r.colony, city: r.city, state: r.state, postal_code: r.postal_code },
        }
    }
}

const SKU_SELECT: &str = "SELECT s.id, s.product_id, s.price, s.stock, \
    COALESCE(array_agg(so.option_id) FILTER (WHERE so.option_id IS NOT NULL), '{}') AS option_ids \
    FROM skus s LEFT JOIN sku_options so ON so.sku_id = s.id";

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn write_product_links(tx: &mut Transaction<'_, Postgres>, product_id: Uuid, draft: &ProductDraft) -> StoreResult<()> {
        if !draft.category_ids.is_empty() {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) SELECT DISTINCT $1::uuid, c FROM UNNEST($2::uuid[]) AS c")
                .bind(product_id).bind(&draft.category_ids).execute(&mut **tx).await?;
        }
        for (position, sku) in draft.skus.iter().enumerate() {
            let sku_id = Uuid::now_v7();
            sqlx::query("INSERT INTO skus (id, product_id, price, stock, position) VALUES ($1, $2, $3, $4, $5)")
                .bind(sku_id).bind(product_id).bind(sku.price.map(|p| p.to_decimal())).bind(sku.stock).bind(position as i32)
                .execute(&mut **tx).await?;
            if !sku.option_ids.is_empty() {
                sqlx::query("INSERT INTO sku_options (sku_id, option_id) SELECT DISTINCT $1::uuid, o FROM UNNEST($2::uuid[]) AS o")
                    .bind(sku_id).bind(&sku.option_ids).execute(&mut **tx).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn insert_category(&self, name: &str, slug: &Slug) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>("INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(Uuid::now_v7()).bind(name).bind(slug.as_str()).fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn update_category(&self, id: Uuid, name: &str, slug: &Slug) -> StoreResult<Category> {
        sqlx::query_as::<_, CategoryRow>("UPDATE categories SET name = $2, slug = $3 WHERE id = $1 RETURNING *")
            .bind(id).bind(name).bind(slug.as_str()).fetch_optional(&self.pool).await?
            .map(Category::from).ok_or(StoreError::NotFound("Category"))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Category")); }
        Ok(())
    }

    async fn list_attributes(&self) -> StoreResult<Vec<AttributeWithOptions>> {
        let attrs: Vec<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM attributes ORDER BY name").fetch_all(&self.pool).await?;
        let options: Vec<(Uuid, Uuid, String)> = sqlx::query_as("SELECT id, attribute_id, value FROM attribute_options ORDER BY value").fetch_all(&self.pool).await?;
        Ok(attrs.into_iter().map(|(id, name)| AttributeWithOptions {
            attribute: Attribute { id, name },
            options: options.iter().filter(|o| o.1 == id).map(|(oid, aid, value)| AttributeOption { id: *oid, attribute_id: *aid, value: value.clone() }).collect(),
        }).collect())
    }

    async fn insert_attribute(&self, name: &str) -> StoreResult<Attribute> {
        let (id, name): (Uuid, String) = sqlx::query_as("INSERT INTO attributes (id, name) VALUES ($1, $2) RETURNING id, name")
            .bind(Uuid::now_v7()).bind(name).fetch_one(&self.pool).await?;
        Ok(Attribute { id, name })
    }

    async fn rename_attribute(&self, id: Uuid, name: &str) -> StoreResult<Attribute> {
        let row: Option<(Uuid, String)> = sqlx::query_as("UPDATE attributes SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id).bind(name).fetch_optional(&self.pool).await?;
        row.map(|(id, name)| Attribute { id, name }).ok_or(StoreError::NotFound("Attribute"))
    }

    async fn delete_attribute(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM attributes WHERE id = $1").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Attribute")); }
        Ok(())
    }

    async fn insert_attribute_option(&self, attribute_id: Uuid, value: &str) -> StoreResult<AttributeOption> {
        let (id, attribute_id, value): (Uuid, Uuid, String) = sqlx::query_as("INSERT INTO attribute_options (id, attribute_id, value) VALUES ($1, $2, $3) RETURNING id, attribute_id, value")
            .bind(Uuid::now_v7()).bind(attribute_id).bind(value).fetch_one(&self.pool).await?;
        Ok(AttributeOption { id, attribute_id, value })
    }

    async fn delete_attribute_option(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM attribute_options WHERE id = $1").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Attribute option")); }
        Ok(())
    }

    async fn insert_product(&self, draft: &ProductDraft) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProductRow>("INSERT INTO products (id, name, slug, description, price, images, active) VALUES ($1, $2, $3, $4, $5, '[]', $6) RETURNING *")
            .bind(Uuid::now_v7()).bind(&draft.name).bind(draft.slug.as_str()).bind(&draft.description).bind(draft.base_price.to_decimal()).bind(draft.active)
            .fetch_one(&mut *tx).await?;
        Self::write_product_links(&mut tx, row.id, draft).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn replace_product(&self, id: Uuid, draft: &ProductDraft) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProductRow>("UPDATE products SET name = $2, slug = $3, description = $4, price = $5, active = $6 WHERE id = $1 RETURNING *")
            .bind(id).bind(&draft.name).bind(draft.slug.as_str()).bind(&draft.description).bind(draft.base_price.to_decimal()).bind(draft.active)
            .fetch_optional(&mut *tx).await?.ok_or(StoreError::NotFound("Product"))?;
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM skus WHERE product_id = $1").bind(id).execute(&mut *tx).await?;
        Self::write_product_links(&mut tx, id, draft).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1").bind(slug).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT p.* FROM products p \
             WHERE ($1 OR p.active) \
               AND ($2::text IS NULL OR EXISTS (SELECT 1 FROM product_categories pc JOIN categories c ON c.id = pc.category_id WHERE pc.product_id = p.id AND c.slug = $2)) \
               AND ($3::text IS NULL OR p.name ILIKE '%' || $3 || '%') \
             ORDER BY p.created_at DESC")
            .bind(filter.include_inactive).bind(&filter.category).bind(search)
            .fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn product_categories(&self, product_id: Uuid) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT c.* FROM categories c JOIN product_categories pc ON pc.category_id = c.id WHERE pc.product_id = $1 ORDER BY c.name")
            .bind(product_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn product_skus(&self, product_id: Uuid) -> StoreResult<Vec<Sku>> {
        let rows = sqlx::query_as::<_, SkuRow>(&format!("{SKU_SELECT} WHERE s.product_id = $1 GROUP BY s.id ORDER BY s.position"))
            .bind(product_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| Ok(Sku { id: r.id, product_id: r.product_id, price: r.price.map(money).transpose()?, stock: r.stock, option_ids: r.option_ids })).collect()
    }

    async fn set_product_images(&self, id: Uuid, images: &[ImageRef]) -> StoreResult<()> {
        let res = sqlx::query("UPDATE products SET images = $2 WHERE id = $1").bind(id).bind(Json(images)).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Product")); }
        Ok(())
    }

    async fn decrement_stock(&self, sku_id: Uuid, quantity: Quantity) -> StoreResult<i32> {
        let qty = db_quantity(quantity)?;
        let remaining: Option<i32> = sqlx::query_scalar("UPDATE skus SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock")
            .bind(sku_id).bind(qty).fetch_optional(&self.pool).await?;
        match remaining {
            Some(stock) => Ok(stock),
            None => {
                let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM skus WHERE id = $1)").bind(sku_id).fetch_one(&self.pool).await?;
                Err(if exists { StoreError::InsufficientStock(sku_id) } else { StoreError::NotFound("SKU") })
            }
        }
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find_cart(&self, user_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1").bind(user_id).fetch_optional(&self.pool).await?)
    }

    async fn create_cart(&self, user_id: Uuid) -> StoreResult<Uuid> {
        let created: Option<Uuid> = sqlx::query_scalar("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING RETURNING id")
            .bind(Uuid::now_v7()).bind(user_id).fetch_optional(&self.pool).await?;
        match created {
            Some(id) => Ok(id),
            None => self.find_cart(user_id).await?.ok_or(StoreError::NotFound("Cart")),
        }
    }

    async fn increment_cart_item(&self, cart_id: Uuid, sku_id: Uuid) -> StoreResult<CartItem> {
        let (id, cart_id, sku_id, qty): (Uuid, Uuid, Uuid, i32) = sqlx::query_as(
            "INSERT INTO cart_items (id, cart_id, sku_id, quantity) VALUES ($1, $2, $3, 1) \
             ON CONFLICT (cart_id, sku_id) DO UPDATE SET quantity = cart_items.quantity + 1 \
             RETURNING id, cart_id, sku_id, quantity")
            .bind(Uuid::now_v7()).bind(cart_id).bind(sku_id).fetch_one(&self.pool).await?;
        Ok(CartItem { id, cart_id, sku_id, quantity: quantity(qty)? })
    }

    async fn set_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, qty: Quantity) -> StoreResult<()> {
        let res = sqlx::query("UPDATE cart_items ci SET quantity = $3 FROM carts c WHERE ci.id = $2 AND ci.cart_id = c.id AND c.user_id = $1")
            .bind(user_id).bind(item_id).bind(db_quantity(qty)?).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Cart item")); }
        Ok(())
    }

    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM cart_items ci USING carts c WHERE ci.id = $2 AND ci.cart_id = c.id AND c.user_id = $1")
            .bind(user_id).bind(item_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn load_cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>> {
        let Some(cart_id) = self.find_cart(user_id).await? else { return Ok(None) };
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.id AS item_id, ci.quantity, s.id AS sku_id, s.price AS sku_price, \
                    p.id AS product_id, p.name AS product_name, p.slug AS product_slug, p.price AS base_price, p.images, \
                    COALESCE((SELECT array_agg(ao.value ORDER BY a.name) FROM sku_options so \
                              JOIN attribute_options ao ON ao.id = so.option_id \
                              JOIN attributes a ON a.id = ao.attribute_id \
                              WHERE so.sku_id = s.id), '{}') AS options \
             FROM cart_items ci \
             LEFT JOIN skus s ON s.id = ci.sku_id \
             LEFT JOIN products p ON p.id = s.product_id AND p.active \
             WHERE ci.cart_id = $1 ORDER BY ci.created_at, ci.id")
            .bind(cart_id).fetch_all(&self.pool).await?;
        let lines = rows.into_iter().map(CartLineRow::into_line).collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(Cart { id: cart_id, user_id, lines }))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>("INSERT INTO orders (id, user_id, total_amount, status, shipping_address) VALUES ($1, $2, $3, $4, $5) RETURNING *")
            .bind(Uuid::now_v7()).bind(draft.user_id).bind(draft.total.to_decimal()).bind(OrderStatus::Pending.as_str()).bind(draft.shipping_address.as_ref().map(Json))
            .fetch_one(&mut *tx).await?;
        for (position, item) in draft.items.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, sku_id, product_name, quantity, price_at_purchase, position) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(Uuid::now_v7()).bind(row.id).bind(item.product_id).bind(item.sku_id).bind(&item.product_name)
                .bind(db_quantity(item.quantity)?).bind(item.price_at_purchase.to_decimal()).bind(position as i32)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        row.try_into()
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn complete_checkout(&self, order_id: Uuid, gateway_order_id: &str, cart_id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query("UPDATE orders SET gateway_order_id = $2 WHERE id = $1").bind(order_id).bind(gateway_order_id).execute(&mut *tx).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Order")); }
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>("SELECT id, order_id, product_id, sku_id, product_name, quantity, price_at_purchase FROM order_items WHERE order_id = $1 ORDER BY position")
            .bind(order_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(OrderItem::try_from).collect()
    }

    async fn list_orders(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<()> {
        let res = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1").bind(id).bind(status.as_str()).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Order")); }
        Ok(())
    }

    async fn record_payment(&self, order_id: Uuid, event_key: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1").bind(order_id).bind(OrderStatus::Paid.as_str()).execute(&mut *tx).await?;
        if res.rows_affected() == 0 { return Err(StoreError::NotFound("Order")); }
        let recorded = sqlx::query("INSERT INTO processed_webhooks (event_key, order_id) VALUES ($1, $2) ON CONFLICT (event_key) DO NOTHING")
            .bind(event_key).bind(order_id).execute(&mut *tx).await?;
        if recorded.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AddressStore for PgStore {
    async fn list_addresses(&self, user_id: Uuid) -> StoreResult<Vec<SavedAddress>> {
        let rows = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at DESC").bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SavedAddress::from).collect())
    }

    async fn insert_address(&self, user_id: Uuid, a: &Address) -> StoreResult<SavedAddress> {
        let row = sqlx::query_as::<_, AddressRow>("INSERT INTO addresses (id, user_id, street, exterior_num, interior_num, colony, city, state, postal_code) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *")
            .bind(Uuid::now_v7()).bind(user_id).bind(&a.street).bind(&a.exterior_num).bind(&a.interior_num).bind(&a.colony).bind(&a.city).bind(&a.state).bind(&a.postal_code)
            .fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn get_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<Option<SavedAddress>> {
        let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2").bind(id).bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(SavedAddress::from))
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2").bind(id).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }
}
