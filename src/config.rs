//! Service configuration, read from the environment (and `.env` via dotenvy)
//!
//! | Variable | Default |
//! |----------|---------|
//! | PORT | 8083 |
//! | DATABASE_URL | unset: in-memory store |
//! | DATABASE_MAX_CONNECTIONS | 10 |
//! | NATS_URL | unset: events are only logged |
//! | SITE_URL | http://localhost:3000 |
//! | AUTH_JWT_SECRET / AUTH_JWT_AUDIENCE | - / authenticated |
//! | PAYMENT_API_KEY / PAYMENT_API_URL | - / https://api.conekta.io |
//! | PAYMENT_CURRENCY | MXN |
//! | CHECKOUT_EXPIRY_MINUTES | 30 |
//! | STORAGE_URL / STORAGE_BUCKET / STORAGE_SERVICE_KEY | - / product-images / - |

use std::fmt;
use std::str::FromStr;

/// Hosted checkouts never stay open longer than a week.
pub const MAX_CHECKOUT_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub site_url: String,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
}

#[derive(Clone)]
pub struct AuthConfig { pub jwt_secret: String, pub audience: String }

#[derive(Clone)]
pub struct PaymentConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub currency: String,
    pub checkout_expiry_minutes: i64,
}

#[derive(Clone)]
pub struct StorageConfig { pub url: Option<String>, pub bucket: String, pub service_key: Option<String> }

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig").field("jwt_secret", &"<redacted>").field("audience", &self.audience).finish()
    }
}

impl fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("currency", &self.currency)
            .field("checkout_expiry_minutes", &self.checkout_expiry_minutes)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig").field("url", &self.url).field("bucket", &self.bucket).field("service_key", &self.service_key.as_ref().map(|_| "<redacted>")).finish()
    }
}

impl Config {
    pub fn from_env() -> Self { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(&get, key);
        Self {
            port: parsed(&get, "PORT").unwrap_or(8083),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parsed(&get, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            nats_url: non_empty("NATS_URL"),
            site_url: non_empty("SITE_URL").unwrap_or_else(|| "http://localhost:3000".into()).trim_end_matches('/').to_string(),
            auth: AuthConfig {
                jwt_secret: non_empty("AUTH_JWT_SECRET").unwrap_or_default(),
                audience: non_empty("AUTH_JWT_AUDIENCE").unwrap_or_else(|| "authenticated".into()),
            },
            payment: PaymentConfig {
                api_key: non_empty("PAYMENT_API_KEY"),
                api_url: non_empty("PAYMENT_API_URL").unwrap_or_else(|| "https://api.conekta.io".into()).trim_end_matches('/').to_string(),
                currency: non_empty("PAYMENT_CURRENCY").unwrap_or_else(|| "MXN".into()),
                checkout_expiry_minutes: parsed::<i64>(&get, "CHECKOUT_EXPIRY_MINUTES").unwrap_or(30).clamp(1, MAX_CHECKOUT_EXPIRY_MINUTES),
            },
            storage: StorageConfig {
                url: non_empty("STORAGE_URL").map(|u| u.trim_end_matches('/').to_string()),
                bucket: non_empty("STORAGE_BUCKET").unwrap_or_else(|| "product-images".into()),
                service_key: non_empty("STORAGE_SERVICE_KEY"),
            },
        }
    }
}

fn lookup(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(get, key)?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %value, "ignoring unparsable setting");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.port, 8083);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.payment.checkout_expiry_minutes, 30);
        assert_eq!(cfg.payment.currency, "MXN");
        assert_eq!(cfg.storage.bucket, "product-images");
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let env: HashMap<&str, &str> = HashMap::from([("PORT", "9000"), ("DATABASE_URL", "  "), ("SITE_URL", "https://shop.example.com/"), ("PAYMENT_API_KEY", "key_abc")]);
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.port, 9000);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.site_url, "https://shop.example.com");
        assert!(!format!("{:?}", cfg).contains("key_abc"));
    }

    #[test]
    fn test_numeric_settings_of_each_width() {
        let env: HashMap<&str, &str> = HashMap::from([("PORT", "8090"), ("DATABASE_MAX_CONNECTIONS", "25"), ("CHECKOUT_EXPIRY_MINUTES", "45")]);
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.port, 8090);
        assert_eq!(cfg.database_max_connections, 25);
        assert_eq!(cfg.payment.checkout_expiry_minutes, 45);

        let cfg = Config::from_lookup(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(cfg.port, 8083);
    }

    #[test]
    fn test_checkout_expiry_is_clamped() {
        let huge = Config::from_lookup(|k| (k == "CHECKOUT_EXPIRY_MINUTES").then(|| i64::MAX.to_string()));
        assert_eq!(huge.payment.checkout_expiry_minutes, MAX_CHECKOUT_EXPIRY_MINUTES);
        let negative = Config::from_lookup(|k| (k == "CHECKOUT_EXPIRY_MINUTES").then(|| "-5".to_string()));
        assert_eq!(negative.payment.checkout_expiry_minutes, 1);
    }
}
