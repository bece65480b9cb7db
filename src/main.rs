//! Storefront service binary

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::auth::JwtVerifier;
use storefront::events::{EventPublisher, LogPublisher, NatsPublisher};
use storefront::media::{HttpObjectStore, MemoryObjectStore, ObjectStore};
use storefront::payment::{HttpGateway, PaymentGateway};
use storefront::store::{MemoryStore, PgStore, Store};
use storefront::{api, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let media: Arc<dyn ObjectStore> = if config.storage.url.is_some() {
        Arc::new(HttpObjectStore::new(&config.storage))
    } else {
        tracing::warn!("STORAGE_URL not set, product images are kept in memory");
        Arc::new(MemoryObjectStore::default())
    };

    let payments: Arc<dyn PaymentGateway> = Arc::new(HttpGateway::new(&config.payment));
    if let Err(e) = payments.ensure_configured() {
        tracing::warn!(error = %e, "checkout will be refused until the payment gateway is configured");
    }
    if config.auth.jwt_secret.is_empty() {
        tracing::warn!("AUTH_JWT_SECRET not set, every authenticated request will be rejected");
    }

    let port = config.port;
    let state = AppState {
        store,
        payments,
        media,
        events,
        auth: Arc::new(JwtVerifier::new(&config.auth)),
        config: Arc::new(config),
    };

    tracing::info!("🚀 Storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, api::router(state)).await?;
    Ok(())
}
