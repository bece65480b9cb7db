//! Bearer-token authentication
//!
//! Tokens are issued by the hosted auth provider and signed with a shared HS256 secret. They are
//! verified once per request and turned into a [`Principal`], which every service operation takes
//! as an explicit argument.

use axum::{async_trait, extract::FromRequestParts, http::{header, request::Parts}};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata { #[serde(default)] pub role: Option<String> }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata { #[serde(default)] pub full_name: Option<String> }

/// Claims carried by the provider's access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { Customer, Admin }

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn customer(user_id: Uuid) -> Self { Self { user_id, email: None, full_name: None, role: Role::Customer } }

    pub fn admin(user_id: Uuid) -> Self { Self { role: Role::Admin, ..Self::customer(user_id) } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() { Ok(()) } else {
            tracing::warn!(user_id = %self.user_id, "admin operation refused");
            Err(AppError::Unauthorized)
        }
    }

    /// Name shown to the payment gateway; falls back to the mail's local part.
    pub fn display_name(&self) -> String {
        self.full_name.clone().filter(|n| !n.trim().is_empty())
            .or_else(|| self.email.as_deref().and_then(|e| e.split('@').next()).map(str::to_string))
            .unwrap_or_else(|| "Cliente".to_string())
    }
}

impl TryFrom<Claims> for Principal {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken("subject is not a user id".into()))?;
        let role = match claims.app_metadata.role.as_deref() { Some("admin") => Role::Admin, _ => Role::Customer };
        Ok(Self { user_id, email: claims.email, full_name: claims.user_metadata.full_name, role })
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    ExpiredToken,
}

pub struct JwtVerifier { key: Option<DecodingKey>, validation: Validation }

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.as_str()]);
        let key = (!config.jwt_secret.is_empty()).then(|| DecodingKey::from_secret(config.jwt_secret.as_bytes()));
        Self { key, validation }
    }

    /// Rejects everything when no secret is configured.
    pub fn verify(&self, token: &str) -> Result<Principal, JwtError> {
        let key = self.key.as_ref().ok_or_else(|| JwtError::InvalidToken("no verification key configured".into()))?;
        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
            _ => JwtError::InvalidToken(e.to_string()),
        })?;
        Principal::try_from(data.claims)
    }

    pub fn extract_from_header(value: &str) -> Option<&str> {
        value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }
        let token = parts.headers.get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(JwtVerifier::extract_from_header)
            .ok_or(AppError::Unauthenticated)?;
        match state.auth.verify(token) {
            Ok(principal) => {
                parts.extensions.insert(principal.clone());
                Ok(principal)
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = %parts.uri, "token rejected");
                Err(AppError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, user_id: Uuid, role: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some("ana@example.com".into()),
        exp: chrono::Utc::now().timestamp() + 3600,
        aud: Some("authenticated".into()),
        app_metadata: AppMetadata { role: role.map(str::to_string) },
        user_metadata: UserMetadata { full_name: Some("Ana López".into()) },
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("token encodes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> JwtVerifier { JwtVerifier::new(&AuthConfig { jwt_secret: "test-secret".into(), audience: "authenticated".into() }) }

    #[test]
    fn test_verify_resolves_role() {
        let id = Uuid::new_v4();
        let admin = verifier().verify(&issue_token("test-secret", id, Some("admin"))).unwrap();
        assert_eq!(admin.user_id, id);
        assert!(admin.is_admin());
        let customer = verifier().verify(&issue_token("test-secret", id, None)).unwrap();
        assert!(!customer.is_admin());
        assert!(matches!(customer.require_admin(), Err(AppError::Unauthorized)));
        assert_eq!(customer.display_name(), "Ana López");
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = issue_token("other-secret", Uuid::new_v4(), None);
        assert!(matches!(verifier().verify(&token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_empty_secret_rejects_everything() {
        let open = JwtVerifier::new(&AuthConfig { jwt_secret: String::new(), audience: "authenticated".into() });
        assert!(open.verify(&issue_token("any-secret", Uuid::new_v4(), Some("admin"))).is_err());
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtVerifier::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtVerifier::extract_from_header("Basic abc"), None);
        assert_eq!(JwtVerifier::extract_from_header("Bearer "), None);
    }
}
