use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::events::EventPublisher;
use crate::media::ObjectStore;
use crate::payment::PaymentGateway;
use crate::store::Store;

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn PaymentGateway>,
    pub media: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventPublisher>,
    pub auth: Arc<JwtVerifier>,
    pub config: Arc<Config>,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::AuthConfig;
    use crate::events::RecordingPublisher;
    use crate::media::MemoryObjectStore;
    use crate::payment::ScriptedGateway;
    use crate::store::MemoryStore;

    pub const SECRET: &str = "test-secret";

    /// State over in-memory backends, with handles kept for assertions.
    pub struct Harness {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub gateway: Arc<ScriptedGateway>,
        pub media: Arc<MemoryObjectStore>,
        pub events: Arc<RecordingPublisher>,
    }

    impl Harness {
        pub fn new() -> Self { Self::with_gateway(ScriptedGateway::default()) }

        pub fn with_gateway(gateway: ScriptedGateway) -> Self {
            let mut config = Config::from_lookup(|_| None);
            config.auth = AuthConfig { jwt_secret: SECRET.into(), audience: "authenticated".into() };
            config.site_url = "https://shop.example.com".into();
            let store = Arc::new(MemoryStore::new());
            let gateway = Arc::new(gateway);
            let media = Arc::new(MemoryObjectStore::default());
            let events = Arc::new(RecordingPublisher::default());
            let state = AppState {
                store: store.clone(),
                payments: gateway.clone(),
                media: media.clone(),
                events: events.clone(),
                auth: Arc::new(JwtVerifier::new(&config.auth)),
                config: Arc::new(config),
            };
            Self { state, store, gateway, media, events }
        }
    }
}
