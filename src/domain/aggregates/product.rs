//! Catalog records: products, categories, attributes and SKUs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{ImageRef, Money, Slug};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category { pub id: Uuid, pub name: String, pub slug: String, pub created_at: DateTime<Utc> }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOption { pub id: Uuid, pub attribute_id: Uuid, pub value: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeWithOptions {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub options: Vec<AttributeOption>,
}

impl AttributeWithOptions {
    pub fn option(&self, id: Uuid) -> Option<&AttributeOption> { self.options.iter().find(|o| o.id == id) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub base_price: Money,
    pub images: Vec<ImageRef>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Overrides the product base price when set.
    pub price: Option<Money>,
    pub stock: i32,
    pub option_ids: Vec<Uuid>,
}

impl Sku {
    pub fn unit_price(&self, product: &Product) -> Money { self.price.unwrap_or(product.base_price) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuOptionValue { pub option_id: Uuid, pub attribute: String, pub value: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuDetail {
    pub id: Uuid,
    pub price: Money,
    pub override_price: Option<Money>,
    pub stock: i32,
    pub options: Vec<SkuOptionValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<Category>,
    pub skus: Vec<SkuDetail>,
}

impl ProductDetail {
    /// Builds the storefront view from raw SKUs and the attribute catalog.
    pub fn assemble(product: Product, categories: Vec<Category>, skus: Vec<Sku>, attributes: &[AttributeWithOptions]) -> Self {
        let skus = skus.into_iter().map(|sku| {
            let options = sku.option_ids.iter().filter_map(|id| {
                attributes.iter().find_map(|a| a.option(*id).map(|o| SkuOptionValue { option_id: o.id, attribute: a.attribute.name.clone(), value: o.value.clone() }))
            }).collect();
            SkuDetail { id: sku.id, price: sku.unit_price(&product), override_price: sku.price, stock: sku.stock, options }
        }).collect();
        Self { product, categories, skus }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSku { pub price: Option<Money>, pub stock: i32, pub option_ids: Vec<Uuid> }

/// Everything needed to create a product, or to replace one wholesale on edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub base_price: Money,
    pub active: bool,
    pub category_ids: Vec<Uuid>,
    pub skus: Vec<NewSku>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub include_inactive: bool,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product, categories: &[Category]) -> bool {
        if !self.include_inactive && !product.active { return false; }
        if let Some(slug) = &self.category {
            if !categories.iter().any(|c| &c.slug == slug) { return false; }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => product.name.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64) -> Product {
        Product { id: Uuid::new_v4(), name: "Classic Tee".into(), slug: "classic-tee".into(), description: None, base_price: Money::from_minor(price), images: vec![], active: true, created_at: Utc::now() }
    }

    #[test]
    fn test_sku_price_falls_back_to_base() {
        let p = product(19999);
        let mut sku = Sku { id: Uuid::new_v4(), product_id: p.id, price: None, stock: 3, option_ids: vec![] };
        assert_eq!(sku.unit_price(&p).minor(), 19999);
        sku.price = Some(Money::from_minor(24950));
        assert_eq!(sku.unit_price(&p).minor(), 24950);
    }

    #[test]
    fn test_assemble_labels_options() {
        let p = product(1000);
        let size = Attribute { id: Uuid::new_v4(), name: "Size".into() };
        let m = AttributeOption { id: Uuid::new_v4(), attribute_id: size.id, value: "M".into() };
        let attrs = vec![AttributeWithOptions { attribute: size, options: vec![m.clone()] }];
        let sku = Sku { id: Uuid::new_v4(), product_id: p.id, price: None, stock: 1, option_ids: vec![m.id] };
        let detail = ProductDetail::assemble(p, vec![], vec![sku], &attrs);
        assert_eq!(detail.skus[0].options[0].attribute, "Size");
        assert_eq!(detail.skus[0].options[0].value, "M");
        assert_eq!(detail.skus[0].price.minor(), 1000);
    }

    #[test]
    fn test_filter() {
        let mut p = product(1000);
        let cat = Category { id: Uuid::new_v4(), name: "Shirts".into(), slug: "shirts".into(), created_at: Utc::now() };
        let f = ProductFilter { search: Some("TEE".into()), category: Some("shirts".into()), ..Default::default() };
        assert!(f.matches(&p, &[cat.clone()]));
        assert!(!f.matches(&p, &[]));
        p.active = false;
        assert!(!f.matches(&p, &[cat]));
    }
}
