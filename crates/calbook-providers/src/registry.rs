//! Adapter registry.
//!
//! Maps provider type names to factories and hands out one adapter instance
//! per credential. Instances are cached by credential id so that every
//! operation on a credential shares the same token cache, and therefore the
//! same single-flight refresh.

use std::collections::HashMap;
use std::sync::Arc;

use calbook_core::{Credential, ProviderType};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ProviderResult;
use crate::provider::ProviderAdapter;
use crate::tokens::TokenStore;

#[cfg(feature = "google")]
use crate::google::{GoogleCalendarAdapter, GoogleConfig};
#[cfg(feature = "office365")]
use crate::office365::{Office365CalendarAdapter, Office365Config};
#[cfg(feature = "zoom")]
use crate::zoom::{ZoomConfig, ZoomVideoAdapter};

/// Builds an adapter for one credential.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, credential: &Credential) -> ProviderResult<Arc<dyn ProviderAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&Credential) -> ProviderResult<Arc<dyn ProviderAdapter>> + Send + Sync,
{
    fn build(&self, credential: &Credential) -> ProviderResult<Arc<dyn ProviderAdapter>> {
        self(credential)
    }
}

/// Client registrations of the built-in adapters. A missing entry leaves
/// that provider unregistered.
#[derive(Clone, Default)]
pub struct ProvidersConfig {
    #[cfg(feature = "google")]
    pub google: Option<GoogleConfig>,
    #[cfg(feature = "office365")]
    pub office365: Option<Office365Config>,
    #[cfg(feature = "zoom")]
    pub zoom: Option<ZoomConfig>,
    /// Where built adapters save refreshed tokens.
    pub tokens: Option<Arc<dyn TokenStore>>,
}

impl ProvidersConfig {
    /// Builder: save refreshed tokens to `store`.
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }
}

impl std::fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("ProvidersConfig");
        #[cfg(feature = "google")]
        out.field("google", &self.google);
        #[cfg(feature = "office365")]
        out.field("office365", &self.office365);
        #[cfg(feature = "zoom")]
        out.field("zoom", &self.zoom);
        out.field("tokens", &self.tokens.is_some()).finish()
    }
}

/// An adapter resolved for a specific credential.
#[derive(Clone)]
pub struct BoundAdapter {
    pub credential_id: i64,
    pub provider: ProviderType,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for BoundAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundAdapter")
            .field("credential_id", &self.credential_id)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<ProviderType, Arc<dyn AdapterFactory>>,
    instances: Mutex<HashMap<i64, BoundAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in adapters that have a configuration.
    pub fn with_defaults(config: ProvidersConfig) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "google")]
        if let Some(google) = config.google {
            let tokens = config.tokens.clone();
            registry.register(
                ProviderType::google_calendar(),
                move |credential: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> {
                    let adapter = GoogleCalendarAdapter::new(&google, credential)?;
                    Ok(Arc::new(match &tokens {
                        Some(store) => adapter.with_token_store(credential.id, store.clone()),
                        None => adapter,
                    }))
                },
            );
        }

        #[cfg(feature = "office365")]
        if let Some(office365) = config.office365 {
            let tokens = config.tokens.clone();
            registry.register(
                ProviderType::office365_calendar(),
                move |credential: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> {
                    let adapter = Office365CalendarAdapter::new(&office365, credential)?;
                    Ok(Arc::new(match &tokens {
                        Some(store) => adapter.with_token_store(credential.id, store.clone()),
                        None => adapter,
                    }))
                },
            );
        }

        #[cfg(feature = "zoom")]
        if let Some(zoom) = config.zoom {
            let tokens = config.tokens.clone();
            registry.register(
                ProviderType::zoom_video(),
                move |credential: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> {
                    let adapter = ZoomVideoAdapter::new(&zoom, credential)?;
                    Ok(Arc::new(match &tokens {
                        Some(store) => adapter.with_token_store(credential.id, store.clone()),
                        None => adapter,
                    }))
                },
            );
        }

        registry
    }

    /// Registers (or replaces) the factory for a provider type.
    pub fn register(&mut self, provider: ProviderType, factory: impl AdapterFactory + 'static) {
        self.factories.insert(provider, Arc::new(factory));
    }

    pub fn is_registered(&self, provider: &ProviderType) -> bool {
        self.factories.contains_key(provider)
    }

    /// Returns the adapter for `credential`, building it on first use.
    ///
    /// Returns `Ok(None)` for provider types without a factory; such
    /// credentials are skipped by the caller.
    pub async fn resolve(&self, credential: &Credential) -> ProviderResult<Option<BoundAdapter>> {
        let Some(factory) = self.factories.get(&credential.provider) else {
            warn!(
                credential_id = credential.id,
                provider = %credential.provider,
                "ignoring credential of unknown provider type"
            );
            return Ok(None);
        };

        let mut instances = self.instances.lock().await;
        if let Some(bound) = instances.get(&credential.id)
            && bound.provider == credential.provider
        {
            return Ok(Some(bound.clone()));
        }

        let adapter = factory
            .build(credential)
            .map_err(|e| e.with_provider(credential.provider.as_str()))?;
        debug!(credential_id = credential.id, provider = %credential.provider, "built adapter");
        let bound = BoundAdapter {
            credential_id: credential.id,
            provider: credential.provider.clone(),
            adapter,
        };
        instances.insert(credential.id, bound.clone());
        Ok(Some(bound))
    }

    /// Drops the cached adapter of a credential, e.g. after it was re-authorized.
    pub async fn evict(&self, credential_id: i64) -> bool {
        self.instances.lock().await.remove(&credential_id).is_some()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&str> = self.factories.keys().map(ProviderType::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ProviderErrorCode};
    use crate::provider::{BoxFuture, EventResult};
    use calbook_core::{BusyInterval, CalendarEvent, IntegrationCalendar, TimeWindow};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullAdapter(ProviderType);

    impl ProviderAdapter for NullAdapter {
        fn provider_type(&self) -> &ProviderType {
            &self.0
        }

        fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<IntegrationCalendar>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn busy_intervals<'a>(
            &'a self,
            _window: TimeWindow,
            _selected: &'a [IntegrationCalendar],
        ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn create_event<'a>(&'a self, _event: &'a CalendarEvent) -> BoxFuture<'a, ProviderResult<EventResult>> {
            Box::pin(async { Ok(EventResult::new("null")) })
        }

        fn update_event<'a>(
            &'a self,
            external_id: &'a str,
            _event: &'a CalendarEvent,
        ) -> BoxFuture<'a, ProviderResult<EventResult>> {
            Box::pin(async move { Ok(EventResult::new(external_id)) })
        }

        fn delete_event<'a>(&'a self, _external_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn credential(id: i64, provider: &str) -> Credential {
        Credential {
            id,
            owner_id: 1,
            provider: ProviderType::new(provider),
            key: serde_json::Value::Null,
        }
    }

    fn counting_registry(builds: Arc<AtomicUsize>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(
            ProviderType::new("test_calendar"),
            move |c: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NullAdapter(c.provider.clone())))
            },
        );
        registry
    }

    #[tokio::test]
    async fn adapters_are_cached_per_credential() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(builds.clone());

        let first = registry.resolve(&credential(1, "test_calendar")).await.unwrap().unwrap();
        let again = registry.resolve(&credential(1, "test_calendar")).await.unwrap().unwrap();
        let other = registry.resolve(&credential(2, "test_calendar")).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first.adapter, &again.adapter));
        assert!(!Arc::ptr_eq(&first.adapter, &other.adapter));
        assert_eq!(other.credential_id, 2);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn evict_rebuilds_on_next_use() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(builds.clone());

        registry.resolve(&credential(1, "test_calendar")).await.unwrap();
        assert!(registry.evict(1).await);
        assert!(!registry.evict(1).await);
        registry.resolve(&credential(1, "test_calendar")).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_provider_is_skipped() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let resolved = registry.resolve(&credential(3, "caldav_calendar")).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn factory_failure_is_tagged() {
        let mut registry = AdapterRegistry::new();
        registry.register(
            ProviderType::new("broken_calendar"),
            |_: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> {
                Err(ProviderError::configuration("bad key"))
            },
        );

        let err = registry
            .resolve(&credential(4, "broken_calendar"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
        assert_eq!(err.provider(), Some("broken_calendar"));
    }

    #[cfg(all(feature = "google", feature = "office365", feature = "zoom"))]
    #[test]
    fn defaults_register_configured_providers() {
        let registry = AdapterRegistry::with_defaults(ProvidersConfig {
            google: Some(GoogleConfig::new("id", "secret")),
            office365: None,
            zoom: Some(ZoomConfig::new("id", "secret")),
            tokens: None,
        });
        assert!(registry.is_registered(&ProviderType::google_calendar()));
        assert!(!registry.is_registered(&ProviderType::office365_calendar()));
        assert!(registry.is_registered(&ProviderType::zoom_video()));
    }

    #[cfg(feature = "google")]
    #[tokio::test]
    async fn built_in_factory_reads_credential_key() {
        let registry = AdapterRegistry::with_defaults(ProvidersConfig {
            google: Some(GoogleConfig::new("id", "secret")),
            ..Default::default()
        });
        let mut google = credential(5, ProviderType::GOOGLE_CALENDAR);
        google.key = serde_json::json!({"access_token": "t", "refresh_token": "r"});
        let bound = registry.resolve(&google).await.unwrap().unwrap();
        assert_eq!(bound.adapter.provider_type(), &ProviderType::google_calendar());
    }
}
