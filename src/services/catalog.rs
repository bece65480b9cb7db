//! Catalog: storefront reads and back-office maintenance

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Principal;
use crate::domain::aggregates::{Attribute, AttributeOption, AttributeWithOptions, Category, NewSku, Product, ProductDetail, ProductDraft, ProductFilter};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{ImageRef, Money, Slug};
use crate::domain::variants::{generate_combinations, AttributeSelection};
use crate::error::{AppError, Result};
use crate::media::image_path;
use crate::state::AppState;
use crate::store::StoreError;

fn slug_for(name: &str) -> Result<Slug> {
    Slug::from_name(name).map_err(|e| AppError::field("name", e.to_string()))
}

/// Maps constraint violations to a message about the thing being touched.
fn in_use(what: &'static str) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::ForeignKeyViolation(_) => AppError::Conflict(format!("{what} is in use and cannot be deleted")),
        other => other.into(),
    }
}

fn already_exists(what: &'static str) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::UniqueViolation(_) => AppError::Conflict(format!("{what} already exists")),
        other => other.into(),
    }
}

// --- storefront ---

/// Active products only, whatever the filter asks for.
pub async fn list_products(state: &AppState, filter: ProductFilter) -> Result<Vec<Product>> {
    let filter = ProductFilter { include_inactive: false, ..filter };
    Ok(state.store.list_products(&filter).await?)
}

pub async fn product_by_slug(state: &AppState, slug: &str) -> Result<ProductDetail> {
    let product = state.store.find_product_by_slug(slug).await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("Product".into()))?;
    detail_of(state, product).await
}

pub async fn list_categories(state: &AppState) -> Result<Vec<Category>> {
    Ok(state.store.list_categories().await?)
}

async fn detail_of(state: &AppState, product: Product) -> Result<ProductDetail> {
    let categories = state.store.product_categories(product.id).await?;
    let skus = state.store.product_skus(product.id).await?;
    let attributes = state.store.list_attributes().await?;
    Ok(ProductDetail::assemble(product, categories, skus, &attributes))
}

// --- categories ---

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
}

pub async fn create_category(state: &AppState, principal: &Principal, input: CategoryInput) -> Result<Category> {
    principal.require_admin()?;
    input.validate()?;
    let name = input.name.trim();
    let category = state.store.insert_category(name, &slug_for(name)?).await.map_err(already_exists("A category with this name"))?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(category)
}

pub async fn update_category(state: &AppState, principal: &Principal, id: Uuid, input: CategoryInput) -> Result<Category> {
    principal.require_admin()?;
    input.validate()?;
    let name = input.name.trim();
    let category = state.store.update_category(id, name, &slug_for(name)?).await.map_err(already_exists("A category with this name"))?;
    tracing::info!(category_id = %id, "category updated");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(category)
}

pub async fn delete_category(state: &AppState, principal: &Principal, id: Uuid) -> Result<()> {
    principal.require_admin()?;
    state.store.delete_category(id).await.map_err(in_use("Category"))?;
    tracing::info!(category_id = %id, "category deleted");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(())
}

// --- attributes ---

#[derive(Debug, Deserialize, Validate)]
pub struct AttributeInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OptionInput {
    #[validate(length(min = 1, message = "Value is required"))]
    pub value: String,
}

pub async fn list_attributes(state: &AppState) -> Result<Vec<AttributeWithOptions>> {
    Ok(state.store.list_attributes().await?)
}

pub async fn create_attribute(state: &AppState, principal: &Principal, input: AttributeInput) -> Result<Attribute> {
    principal.require_admin()?;
    input.validate()?;
    let attribute = state.store.insert_attribute(input.name.trim()).await?;
    tracing::info!(attribute_id = %attribute.id, name = %attribute.name, "attribute created");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(attribute)
}

pub async fn rename_attribute(state: &AppState, principal: &Principal, id: Uuid, input: AttributeInput) -> Result<Attribute> {
    principal.require_admin()?;
    input.validate()?;
    let attribute = state.store.rename_attribute(id, input.name.trim()).await?;
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(attribute)
}

pub async fn delete_attribute(state: &AppState, principal: &Principal, id: Uuid) -> Result<()> {
    principal.require_admin()?;
    state.store.delete_attribute(id).await.map_err(in_use("Attribute"))?;
    tracing::info!(attribute_id = %id, "attribute deleted");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(())
}

pub async fn add_option(state: &AppState, principal: &Principal, attribute_id: Uuid, input: OptionInput) -> Result<AttributeOption> {
    principal.require_admin()?;
    input.validate()?;
    let option = state.store.insert_attribute_option(attribute_id, input.value.trim()).await.map_err(|e| match e {
        StoreError::UniqueViolation(_) => AppError::Conflict("This option already exists".into()),
        StoreError::ForeignKeyViolation(_) => AppError::NotFound("Attribute".into()),
        other => other.into(),
    })?;
    tracing::info!(%attribute_id, option_id = %option.id, value = %option.value, "attribute option added");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(option)
}

pub async fn delete_option(state: &AppState, principal: &Principal, id: Uuid) -> Result<()> {
    principal.require_admin()?;
    state.store.delete_attribute_option(id).await.map_err(in_use("Option"))?;
    tracing::info!(option_id = %id, "attribute option deleted");
    state.events.publish(DomainEvent::CatalogChanged { product_id: None }).await;
    Ok(())
}

// --- variants ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantPreview { pub option_ids: Vec<Uuid>, pub labels: Vec<String>, pub title: String }

/// Every combination of the selected options, labelled for the admin form.
pub async fn preview_variants(state: &AppState, principal: &Principal, selections: Vec<AttributeSelection>) -> Result<Vec<VariantPreview>> {
    principal.require_admin()?;
    let combinations = generate_combinations(&selections).map_err(|e| AppError::field("attributes", e.to_string()))?;
    let attributes = state.store.list_attributes().await?;
    for selection in &selections {
        let attribute = attributes.iter().find(|a| a.attribute.id == selection.attribute_id)
            .ok_or_else(|| AppError::field("attributes", format!("Unknown attribute {}", selection.attribute_id)))?;
        if let Some(stray) = selection.option_ids.iter().find(|id| attribute.option(**id).is_none()) {
            return Err(AppError::field("attributes", format!("Option {stray} does not belong to {}", attribute.attribute.name)));
        }
    }
    Ok(combinations.into_iter().map(|option_ids| {
        let labels: Vec<String> = option_ids.iter().filter_map(|id| {
            attributes.iter().find_map(|a| a.option(*id).map(|o| format!("{}: {}", a.attribute.name, o.value)))
        }).collect();
        let title = labels.iter().filter_map(|l| l.split_once(": ").map(|(_, v)| v)).collect::<Vec<_>>().join(" / ");
        VariantPreview { option_ids, labels, title }
    }).collect())
}

// --- products ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SkuInput {
    #[serde(default)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub option_ids: Vec<Uuid>,
}

fn default_active() -> bool { true }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    #[validate]
    pub skus: Vec<SkuInput>,
}

fn price(field: &str, amount: Decimal) -> Result<Money> {
    let money = Money::from_decimal_exact(amount).map_err(|e| AppError::field(field, e.to_string()))?;
    if money.is_negative() {
        return Err(AppError::field(field, "Price cannot be negative"));
    }
    Ok(money)
}

fn distinct(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl ProductInput {
    fn into_draft(self) -> Result<ProductDraft> {
        self.validate()?;
        let base_price = price("base_price", self.base_price)?;
        let skus = self.skus.into_iter().enumerate().map(|(i, s)| -> Result<NewSku> { Ok(NewSku {
            price: s.price.map(|p| price(&format!("skus[{i}].price"), p)).transpose()?,
            stock: s.stock,
            option_ids: distinct(s.option_ids),
        }) }).collect::<Result<Vec<_>>>()?;
        let name = self.name.trim().to_string();
        Ok(ProductDraft {
            slug: slug_for(&name)?,
            name,
            description: self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            base_price,
            active: self.active,
            category_ids: distinct(self.category_ids),
            skus,
        })
    }
}

/// A SKU names at most one option per attribute, and only options that exist.
async fn check_sku_options(state: &AppState, draft: &ProductDraft) -> Result<()> {
    if draft.skus.iter().all(|s| s.option_ids.is_empty()) {
        return Ok(());
    }
    let attributes = state.store.list_attributes().await?;
    for (i, sku) in draft.skus.iter().enumerate() {
        let field = format!("skus[{i}].option_ids");
        let mut used = HashSet::new();
        for option_id in &sku.option_ids {
            let attribute = attributes.iter().find(|a| a.option(*option_id).is_some())
                .ok_or_else(|| AppError::field(&field, format!("Unknown option {option_id}")))?;
            if !used.insert(attribute.attribute.id) {
                return Err(AppError::field(&field, format!("Only one {} option allowed per variant", attribute.attribute.name)));
            }
        }
    }
    Ok(())
}

fn product_write_error(e: StoreError) -> AppError {
    match e {
        StoreError::UniqueViolation(msg) if msg.contains("slug") => AppError::Conflict("A product with this name already exists".into()),
        StoreError::ForeignKeyViolation(msg) => AppError::field("category_ids", format!("Unknown category or option: {msg}")),
        other => other.into(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSaved {
    #[serde(flatten)]
    pub product: ProductDetail,
    /// Set when an update replaced SKUs that already existed, discarding their stock.
    pub replaced_variants: bool,
}

pub async fn admin_list_products(state: &AppState, principal: &Principal, filter: ProductFilter) -> Result<Vec<Product>> {
    principal.require_admin()?;
    Ok(state.store.list_products(&ProductFilter { include_inactive: true, ..filter }).await?)
}

pub async fn admin_product(state: &AppState, principal: &Principal, id: Uuid) -> Result<ProductDetail> {
    principal.require_admin()?;
    let product = state.store.get_product(id).await?.ok_or_else(|| AppError::NotFound("Product".into()))?;
    detail_of(state, product).await
}

pub async fn create_product(state: &AppState, principal: &Principal, input: ProductInput) -> Result<ProductDetail> {
    principal.require_admin()?;
    let draft = input.into_draft()?;
    check_sku_options(state, &draft).await?;
    let product = state.store.insert_product(&draft).await.map_err(product_write_error)?;
    tracing::info!(product_id = %product.id, slug = %product.slug, skus = draft.skus.len(), "product created");
    state.events.publish(DomainEvent::CatalogChanged { product_id: Some(product.id) }).await;
    detail_of(state, product).await
}

/// Replaces the product wholesale, SKUs included.
pub async fn update_product(state: &AppState, principal: &Principal, id: Uuid, input: ProductInput) -> Result<ProductSaved> {
    principal.require_admin()?;
    let draft = input.into_draft()?;
    check_sku_options(state, &draft).await?;
    let previous = state.store.product_skus(id).await?;
    let product = state.store.replace_product(id, &draft).await.map_err(product_write_error)?;
    let replaced_variants = !previous.is_empty();
    if replaced_variants {
        tracing::warn!(product_id = %id, discarded = previous.len(), "existing SKUs replaced; their stock and prices were reset");
    }
    tracing::info!(product_id = %id, skus = draft.skus.len(), "product updated");
    state.events.publish(DomainEvent::CatalogChanged { product_id: Some(id) }).await;
    Ok(ProductSaved { product: detail_of(state, product).await?, replaced_variants })
}

#[derive(Debug, Clone)]
pub struct ImageUpload { pub file_name: String, pub content_type: String, pub bytes: Vec<u8> }

/// Stores the files and appends their public URLs to the product's image list.
pub async fn upload_images(state: &AppState, principal: &Principal, product_id: Uuid, uploads: Vec<ImageUpload>) -> Result<Vec<ImageRef>> {
    principal.require_admin()?;
    if uploads.is_empty() {
        return Err(AppError::field("images", "At least one image is required"));
    }
    if let Some(bad) = uploads.iter().find(|u| u.bytes.is_empty() || !u.content_type.starts_with("image/")) {
        return Err(AppError::field("images", format!("{} is not a valid image", bad.file_name)));
    }
    let product = state.store.get_product(product_id).await?.ok_or_else(|| AppError::NotFound("Product".into()))?;

    let now = Utc::now();
    let mut images = product.images.clone();
    let mut stored = Vec::with_capacity(uploads.len());
    for (i, upload) in uploads.into_iter().enumerate() {
        let path = image_path(product_id, &upload.file_name, now + Duration::milliseconds(i as i64));
        let url = match state.media.upload(&path, upload.bytes, &upload.content_type).await {
            Ok(url) => url,
            Err(e) => {
                discard(state, &stored).await;
                return Err(e.into());
            }
        };
        stored.push(path);
        images.push(ImageRef { url });
    }
    if let Err(e) = state.store.set_product_images(product_id, &images).await {
        discard(state, &stored).await;
        return Err(e.into());
    }
    tracing::info!(%product_id, added = stored.len(), "product images uploaded");
    state.events.publish(DomainEvent::CatalogChanged { product_id: Some(product_id) }).await;
    Ok(images)
}

async fn discard(state: &AppState, paths: &[String]) {
    for path in paths {
        if let Err(e) = state.media.remove(path).await {
            tracing::warn!(%path, error = %e, "failed to remove orphaned image");
        }
    }
}

/// Drops `url` from the product, then deletes the stored object.
pub async fn delete_image(state: &AppState, principal: &Principal, product_id: Uuid, url: &str) -> Result<Vec<ImageRef>> {
    principal.require_admin()?;
    let product = state.store.get_product(product_id).await?.ok_or_else(|| AppError::NotFound("Product".into()))?;
    let removed = product.images.iter().find(|i| i.url == url).cloned().ok_or_else(|| AppError::NotFound("Image".into()))?;
    let images: Vec<ImageRef> = product.images.into_iter().filter(|i| i.url != url).collect();
    state.store.set_product_images(product_id, &images).await?;
    if let Some(path) = removed.object_path() {
        if let Err(e) = state.media.remove(&path).await {
            tracing::warn!(%product_id, %path, error = %e, "image unlinked but object not deleted");
        }
    }
    state.events.publish(DomainEvent::CatalogChanged { product_id: Some(product_id) }).await;
    Ok(images)
}
