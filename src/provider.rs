//! Trait definition for external catalog providers.
//!
//! Each provider wraps a single external music catalog (MusicBrainz, Deezer,
//! Spotify, ...) and exposes a uniform lookup interface. Implementations are
//! responsible for translating their own response shapes into the harmonized
//! entity shapes of [`crate::model`] -- pre-merge, single-source, with a
//! confidence reflecting only that provider's own certainty -- attaching
//! exactly one [`ProviderSource`](crate::model::ProviderSource), and raising
//! typed errors (404 -> [`Error::NotFound`], other HTTP failures ->
//! [`Error::Http`]).

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{HarmonizedRelease, HarmonizedTrack};

/// Identity and capability summary for a configured provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub priority: i32,
    pub enabled: bool,
    pub supports_user_auth: bool,
}

/// Async trait all catalog providers implement.
///
/// Providers are wrapped in an `Arc` and shared across concurrent lookups;
/// rate limiting and retry discipline live inside the implementation, so a
/// caller never needs to throttle its own calls.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Short, lowercase, stable identifier (e.g. `"musicbrainz"`).
    fn name(&self) -> &'static str;

    /// Human-readable name (e.g. `"MusicBrainz"`).
    fn display_name(&self) -> &'static str;

    /// Higher priorities resolve first; merge tie-breaks follow this order.
    fn priority(&self) -> i32;

    /// Disabled providers are skipped by the coordinator.
    fn enabled(&self) -> bool;

    /// Whether the provider can act on behalf of an authenticated user.
    fn supports_user_auth(&self) -> bool {
        false
    }

    /// Look up a release by its normalized GTIN-14 barcode.
    async fn lookup_by_gtin(&self, gtin: &str) -> Result<HarmonizedRelease>;

    /// Look up a recording by its normalized ISRC.
    async fn lookup_by_isrc(&self, isrc: &str) -> Result<HarmonizedTrack>;

    /// Free-text release search, at most `limit` results, ordered by the
    /// provider's own relevance.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<HarmonizedRelease>>;

    /// Whether `url` is a catalog page this provider can resolve.
    fn matches_url(&self, _url: &str) -> bool {
        false
    }

    /// Resolve a catalog page URL into a release. Only called when
    /// [`matches_url`](Self::matches_url) accepted the URL.
    async fn lookup_by_url(&self, url: &str) -> Result<HarmonizedRelease> {
        Err(Error::not_found(format!(
            "{} cannot resolve url: {url}",
            self.name()
        )))
    }

    /// Identity summary for this provider.
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            display_name: self.display_name().to_string(),
            priority: self.priority(),
            enabled: self.enabled(),
            supports_user_auth: self.supports_user_auth(),
        }
    }
}
