//! Error type and the uniform `{success, message, errors?}` response envelope

use axum::{extract::rejection::JsonRejection, extract::multipart::MultipartError, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::domain::value_objects::MoneyError;
use crate::media::MediaError;
use crate::store::StoreError;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Body returned by every form-style endpoint.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), errors: None, data: Some(data) }
    }

    pub fn data(data: T) -> Self { Self::ok("OK", data) }
}

impl ActionResponse<()> {
    pub fn done(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), errors: None, data: None }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not authorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Persistence(String),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Payment error: {0}")]
    PaymentGateway(String),

    #[error("Payment system misconfigured")]
    PaymentMisconfigured,

    #[error("Malformed webhook: {0}")]
    MalformedWebhook(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), fields: FieldErrors::new() }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation { message: "Validation failed".into(), fields: FieldErrors::from([(field.to_string(), vec![message])]) }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::EmptyCart | Self::MalformedWebhook(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentMisconfigured => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Flattens nested errors into dotted paths such as `skus[0].stock`.
fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(errs) => out.entry(path).or_default().extend(errs.iter().map(|e| field_message(field, e))),
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items { collect_field_errors(&format!("{path}[{i}]"), inner, out); }
            }
        }
    }
}

fn field_message(field: &str, e: &ValidationError) -> String {
    e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("Invalid {field}"))
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        collect_field_errors("", &errors, &mut fields);
        Self::Validation { message: "Validation failed".into(), fields }
    }
}

impl From<MoneyError> for AppError {
    fn from(e: MoneyError) -> Self { Self::validation(e.to_string()) }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self { Self::validation(rejection.body_text()) }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self { Self::field("images", e.body_text()) }
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self { Self::Persistence(format!("image storage: {e}")) }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(entity) => Self::NotFound(entity.to_string()),
            StoreError::ForeignKeyViolation(msg) | StoreError::UniqueViolation(msg) => Self::Conflict(msg),
            StoreError::InsufficientStock(sku) => Self::Conflict(format!("Insufficient stock for SKU {sku}")),
            StoreError::Database(msg) => Self::Persistence(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Persistence(msg) => tracing::error!(error = %msg, "storage failure"),
            Self::PaymentGateway(msg) => tracing::warn!(error = %msg, "payment gateway rejected request"),
            Self::PaymentMisconfigured => tracing::error!("payment gateway is not configured"),
            _ => tracing::debug!(error = %self, status = status.as_u16(), "request failed"),
        }
        let (message, errors) = match self {
            Self::Validation { message, fields } => (message, (!fields.is_empty()).then_some(fields)),
            other => (other.to_string(), None),
        };
        (status, Json(ActionResponse::<()> { success: false, message, errors, data: None })).into_response()
    }
}
