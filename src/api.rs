//! HTTP surface

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{AttributeWithOptions, Attribute, AttributeOption, CartView, Category, Order, OrderDetail, OrderStatus, Product, ProductDetail, ProductFilter};
use crate::domain::value_objects::{Address, ImageRef};
use crate::domain::variants::AttributeSelection;
use crate::error::{ActionResponse, AppError, Result};
use crate::services::catalog::{AttributeInput, CategoryInput, ImageUpload, OptionInput, ProductInput, ProductSaved, VariantPreview};
use crate::services::checkout::{CheckoutRequest, CheckoutSession};
use crate::services::{account, cart, catalog, checkout, orders, webhook};
use crate::state::AppState;
use crate::store::{CartItem, SavedAddress};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// JSON body whose rejections render in the standard envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Body<T>(pub T);

type Reply<T> = Result<Json<ActionResponse<T>>>;
type Created<T> = Result<(StatusCode, Json<ActionResponse<T>>)>;

fn reply<T>(data: T) -> Reply<T> { Ok(Json(ActionResponse::data(data))) }
fn created<T>(message: &str, data: T) -> Created<T> { Ok((StatusCode::CREATED, Json(ActionResponse::ok(message, data)))) }
fn done(message: &str) -> Reply<()> { Ok(Json(ActionResponse::done(message))) }

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:slug", get(product_by_slug))
        .route("/api/v1/categories", get(list_categories))
        .route("/api/v1/cart", get(view_cart))
        .route("/api/v1/cart/count", get(cart_count))
        .route("/api/v1/cart/items", post(add_cart_item))
        .route("/api/v1/cart/items/:id", put(update_cart_item).delete(remove_cart_item))
        .route("/api/v1/checkout", post(create_checkout))
        .route("/api/v1/account/addresses", get(list_addresses).post(add_address))
        .route("/api/v1/account/addresses/:id", delete(delete_address))
        .route("/api/v1/account/orders", get(my_orders))
        .route("/api/v1/account/orders/:id", get(order_detail))
        .route("/api/v1/admin/categories", get(admin_categories).post(create_category))
        .route("/api/v1/admin/categories/:id", put(update_category).delete(delete_category))
        .route("/api/v1/admin/attributes", get(admin_attributes).post(create_attribute))
        .route("/api/v1/admin/attributes/:id", put(rename_attribute).delete(delete_attribute))
        .route("/api/v1/admin/attributes/:id/options", post(add_option))
        .route("/api/v1/admin/attribute-options/:id", delete(delete_option))
        .route("/api/v1/admin/products", get(admin_products).post(create_product))
        .route("/api/v1/admin/products/variants", post(preview_variants))
        .route("/api/v1/admin/products/:id", get(admin_product).put(update_product))
        .route("/api/v1/admin/products/:id/images", post(upload_images).delete(delete_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .route("/api/v1/admin/orders", get(all_orders))
        .route("/api/v1/admin/orders/:id/status", put(set_order_status))
        .route("/api/webhooks/payments", post(payment_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- storefront ---

async fn list_products(State(s): State<AppState>, Query(filter): Query<ProductFilter>) -> Reply<Vec<Product>> {
    reply(catalog::list_products(&s, filter).await?)
}

async fn product_by_slug(State(s): State<AppState>, Path(slug): Path<String>) -> Reply<ProductDetail> {
    reply(catalog::product_by_slug(&s, &slug).await?)
}

async fn list_categories(State(s): State<AppState>) -> Reply<Vec<Category>> {
    reply(catalog::list_categories(&s).await?)
}

// --- cart ---

#[derive(Debug, Deserialize)] pub struct AddItemRequest { pub sku_id: Uuid }
#[derive(Debug, Deserialize)] pub struct QuantityRequest { pub quantity: i64 }

async fn view_cart(State(s): State<AppState>, p: Principal) -> Reply<CartView> {
    reply(cart::view(&s, &p).await?)
}

async fn cart_count(State(s): State<AppState>, p: Principal) -> Reply<Value> {
    reply(json!({"count": cart::count(&s, &p).await?}))
}

async fn add_cart_item(State(s): State<AppState>, p: Principal, Body(r): Body<AddItemRequest>) -> Reply<CartItem> {
    let item = cart::add_item(&s, &p, r.sku_id).await?;
    Ok(Json(ActionResponse::ok("Product added to cart", item)))
}

async fn update_cart_item(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<QuantityRequest>) -> Reply<()> {
    cart::update_quantity(&s, &p, id, r.quantity).await?;
    done("Quantity updated")
}

async fn remove_cart_item(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<()> {
    cart::remove_item(&s, &p, id).await?;
    done("Product removed from cart")
}

async fn create_checkout(State(s): State<AppState>, p: Principal, body: Option<Body<CheckoutRequest>>) -> Created<CheckoutSession> {
    let address_id = body.and_then(|Body(r)| r.address_id);
    created("Order created", checkout::create_order(&s, &p, address_id).await?)
}

// --- account ---

async fn list_addresses(State(s): State<AppState>, p: Principal) -> Reply<Vec<SavedAddress>> {
    reply(account::list_addresses(&s, &p).await?)
}

async fn add_address(State(s): State<AppState>, p: Principal, Body(address): Body<Address>) -> Created<SavedAddress> {
    created("Address saved", account::add_address(&s, &p, address).await?)
}

async fn delete_address(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<()> {
    account::delete_address(&s, &p, id).await?;
    done("Address deleted")
}

async fn my_orders(State(s): State<AppState>, p: Principal) -> Reply<Vec<Order>> {
    reply(orders::list_mine(&s, &p).await?)
}

async fn order_detail(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<OrderDetail> {
    reply(orders::detail(&s, &p, id).await?)
}

// --- admin: catalog ---

async fn admin_categories(State(s): State<AppState>, p: Principal) -> Reply<Vec<Category>> {
    p.require_admin()?;
    reply(catalog::list_categories(&s).await?)
}

async fn create_category(State(s): State<AppState>, p: Principal, Body(r): Body<CategoryInput>) -> Created<Category> {
    created("Category created", catalog::create_category(&s, &p, r).await?)
}

async fn update_category(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<CategoryInput>) -> Reply<Category> {
    Ok(Json(ActionResponse::ok("Category updated", catalog::update_category(&s, &p, id, r).await?)))
}

async fn delete_category(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<()> {
    catalog::delete_category(&s, &p, id).await?;
    done("Category deleted")
}

async fn admin_attributes(State(s): State<AppState>, p: Principal) -> Reply<Vec<AttributeWithOptions>> {
    p.require_admin()?;
    reply(catalog::list_attributes(&s).await?)
}

async fn create_attribute(State(s): State<AppState>, p: Principal, Body(r): Body<AttributeInput>) -> Created<Attribute> {
    created("Attribute created", catalog::create_attribute(&s, &p, r).await?)
}

async fn rename_attribute(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<AttributeInput>) -> Reply<Attribute> {
    Ok(Json(ActionResponse::ok("Attribute updated", catalog::rename_attribute(&s, &p, id, r).await?)))
}

async fn delete_attribute(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<()> {
    catalog::delete_attribute(&s, &p, id).await?;
    done("Attribute deleted")
}

async fn add_option(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<OptionInput>) -> Created<AttributeOption> {
    created("Option added", catalog::add_option(&s, &p, id, r).await?)
}

async fn delete_option(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<()> {
    catalog::delete_option(&s, &p, id).await?;
    done("Option deleted")
}

#[derive(Debug, Deserialize)] pub struct VariantRequest { pub attributes: Vec<AttributeSelection> }

async fn preview_variants(State(s): State<AppState>, p: Principal, Body(r): Body<VariantRequest>) -> Reply<Vec<VariantPreview>> {
    reply(catalog::preview_variants(&s, &p, r.attributes).await?)
}

async fn admin_products(State(s): State<AppState>, p: Principal, Query(filter): Query<ProductFilter>) -> Reply<Vec<Product>> {
    reply(catalog::admin_list_products(&s, &p, filter).await?)
}

async fn admin_product(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>) -> Reply<ProductDetail> {
    reply(catalog::admin_product(&s, &p, id).await?)
}

async fn create_product(State(s): State<AppState>, p: Principal, Body(r): Body<ProductInput>) -> Created<ProductDetail> {
    created("Product created", catalog::create_product(&s, &p, r).await?)
}

async fn update_product(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<ProductInput>) -> Reply<ProductSaved> {
    let saved = catalog::update_product(&s, &p, id, r).await?;
    let message = if saved.replaced_variants {
        "Product updated. Existing variants were replaced and their stock and prices reset"
    } else {
        "Product updated"
    };
    Ok(Json(ActionResponse::ok(message, saved)))
}

async fn upload_images(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, mut multipart: Multipart) -> Reply<Vec<ImageRef>> {
    p.require_admin()?;
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else { continue };
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field.bytes().await?.to_vec();
        uploads.push(ImageUpload { file_name, content_type, bytes });
    }
    Ok(Json(ActionResponse::ok("Images uploaded", catalog::upload_images(&s, &p, id, uploads).await?)))
}

#[derive(Debug, Deserialize)] pub struct DeleteImageRequest { pub url: String }

async fn delete_image(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<DeleteImageRequest>) -> Reply<Vec<ImageRef>> {
    Ok(Json(ActionResponse::ok("Image deleted", catalog::delete_image(&s, &p, id, &r.url).await?)))
}

// --- admin: orders ---

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: String }

async fn all_orders(State(s): State<AppState>, p: Principal) -> Reply<Vec<Order>> {
    reply(orders::list_all(&s, &p).await?)
}

async fn set_order_status(State(s): State<AppState>, p: Principal, Path(id): Path<Uuid>, Body(r): Body<StatusRequest>) -> Reply<OrderStatus> {
    Ok(Json(ActionResponse::ok("Status updated", orders::set_status(&s, &p, id, &r.status).await?)))
}

// --- webhooks ---

async fn payment_webhook(State(s): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let event: webhook::WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({"received": false, "error": format!("invalid payload: {e}")})));
        }
    };
    match webhook::handle(&s, event).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "webhook handled");
            (StatusCode::OK, Json(json!({"received": true})))
        }
        Err(e) => {
            tracing::warn!(error = %e, "webhook rejected");
            (StatusCode::BAD_REQUEST, Json(json!({"received": false, "error": e.to_string()})))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use crate::payment::ScriptedGateway;
    use crate::services::fixtures;
    use crate::state::testing::{Harness, SECRET};
    use axum::{body::Body as HttpBody, http::Request, response::Response};
    use tower::ServiceExt;

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<HttpBody> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder.header("content-type", "application/json").body(HttpBody::from(body.to_string())).unwrap(),
            None => builder.body(HttpBody::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new();
        let response = router(h.state).oneshot(request("GET", "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_requires_session() {
        let h = Harness::new();
        let response = router(h.state).oneshot(request("GET", "/api/v1/cart", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Authentication required");

        let forged = issue_token("wrong-secret", Uuid::new_v4(), None);
        let response = router(Harness::new().state).oneshot(request("GET", "/api/v1/cart", Some(&forged), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_add_then_count() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 3)]).await;
        let token = issue_token(SECRET, Uuid::new_v4(), None);
        let app = router(h.state);

        for _ in 0..2 {
            let response = app.clone().oneshot(request("POST", "/api/v1/cart/items", Some(&token), Some(json!({"sku_id": skus[0]})))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let body = json_body(app.clone().oneshot(request("GET", "/api/v1/cart/count", Some(&token), None)).await.unwrap()).await;
        assert_eq!(body["data"]["count"], 2);

        let body = json_body(app.oneshot(request("GET", "/api/v1/cart", Some(&token), None)).await.unwrap()).await;
        assert_eq!(body["data"]["subtotal"], "499.98");
    }

    #[tokio::test]
    async fn test_quantity_validation_renders_field_errors() {
        let h = Harness::new();
        let (_, skus) = fixtures::product(&h.store, "Tee", 24999, &[(None, 3)]).await;
        let token = issue_token(SECRET, Uuid::new_v4(), None);
        let app = router(h.state);
        let added = json_body(app.clone().oneshot(request("POST", "/api/v1/cart/items", Some(&token), Some(json!({"sku_id": skus[0]})))).await.unwrap()).await;
        let item_id = added["data"]["id"].as_str().unwrap().to_string();

        let response = app.oneshot(request("PUT", &format!("/api/v1/cart/items/{item_id}"), Some(&token), Some(json!({"quantity": 0})))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["errors"]["quantity"].is_array());
    }

    #[tokio::test]
    async fn test_admin_routes_refuse_customers() {
        let h = Harness::new();
        let app = router(h.state);
        let customer = issue_token(SECRET, Uuid::new_v4(), None);
        let response = app.clone().oneshot(request("POST", "/api/v1/admin/categories", Some(&customer), Some(json!({"name": "Hats"})))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = issue_token(SECRET, Uuid::new_v4(), Some("admin"));
        let response = app.clone().oneshot(request("POST", "/api/v1/admin/categories", Some(&admin), Some(json!({"name": "Hats"})))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(app.oneshot(request("GET", "/api/v1/categories", None, None)).await.unwrap()).await;
        assert_eq!(body["data"][0]["slug"], "hats");
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart() {
        let h = Harness::with_gateway(ScriptedGateway::succeeding("gw"));
        let token = issue_token(SECRET, Uuid::new_v4(), None);
        let response = router(h.state).oneshot(request("POST", "/api/v1/checkout", Some(&token), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Your cart is empty");
    }

    #[tokio::test]
    async fn test_webhook_acknowledgements() {
        let h = Harness::new();
        let app = router(h.state);

        let response = app.clone().oneshot(request("POST", "/api/webhooks/payments", None, Some(json!({"type": "order.paid", "data": {"object": {"metadata": {}}}})))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["received"], false);

        let response = app.clone().oneshot(request("POST", "/api/webhooks/payments", None, Some(json!({"type": "charge.created"})))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"received": true}));

        let garbage = Request::builder().method("POST").uri("/api/webhooks/payments").body(HttpBody::from("not json")).unwrap();
        assert_eq!(app.oneshot(garbage).await.unwrap().status(), StatusCode::BAD_REQUEST);
    }
}
