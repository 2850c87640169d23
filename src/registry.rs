//! Provider registry.
//!
//! Holds the configured catalog providers and answers the two questions the
//! coordinator asks: "who is enabled, in what order?" and "who is called
//! `x`?". [`SharedRegistry`] wraps a registry in a swappable handle so a
//! config reload can replace the whole provider set atomically while
//! in-flight lookups keep the snapshot they started with.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provider::{CatalogProvider, ProviderInfo};
use crate::providers::{DeezerProvider, MusicBrainzProvider, SpotifyProvider};

/// An immutable set of catalog providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn CatalogProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration. Unknown provider names are a
    /// configuration error; disabled providers are still registered so they
    /// show up in [`infos`](Self::infos).
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for provider_config in &config.providers {
            let provider: Arc<dyn CatalogProvider> = match provider_config.name.as_str() {
                "musicbrainz" => Arc::new(MusicBrainzProvider::new(provider_config)),
                "deezer" => Arc::new(DeezerProvider::new(provider_config)),
                "spotify" => Arc::new(SpotifyProvider::new(provider_config)),
                other => {
                    return Err(Error::config(format!("unknown provider '{other}'")));
                }
            };
            registry.register(provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn CatalogProvider>) {
        info!(
            provider = provider.name(),
            priority = provider.priority(),
            enabled = provider.enabled(),
            "registered catalog provider"
        );
        self.providers.push(provider);
    }

    /// Look up a provider by its stable name, enabled or not.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CatalogProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Enabled providers, highest priority first. The sort is stable, so
    /// providers sharing a priority keep registration order.
    pub fn enabled(&self) -> Vec<Arc<dyn CatalogProvider>> {
        let mut enabled: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.enabled())
            .cloned()
            .collect();
        enabled.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        enabled
    }

    /// Descriptions of every registered provider, for status surfaces.
    pub fn infos(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(|p| p.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Swappable handle over a [`ProviderRegistry`].
///
/// Readers take a cheap `Arc` snapshot; a reload builds a fresh registry and
/// swaps it in. Nothing blocks for longer than the pointer exchange.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Arc<ProviderRegistry>>>,
}

impl SharedRegistry {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// The current registry. Lookups hold this snapshot for their whole run,
    /// so a concurrent swap never changes a lookup's provider set midway.
    pub fn snapshot(&self) -> Arc<ProviderRegistry> {
        self.inner.read().clone()
    }

    /// Replace the registry.
    pub fn swap(&self, registry: ProviderRegistry) {
        let registry = Arc::new(registry);
        info!(providers = registry.len(), "swapped provider registry");
        *self.inner.write() = registry;
    }
}
