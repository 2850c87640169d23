//! Lookup coordinator.
//!
//! The single entry point for resolving identifiers. A lookup runs through a
//! fixed pipeline: validate and normalize the identifier, consult the
//! snapshot cache, fan out to the enabled providers with bounded
//! concurrency, merge the candidates, and store the merged result back into
//! the cache.
//!
//! Cache failures are never fatal: a broken store degrades every lookup to a
//! cache miss, logged at warn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{fingerprint, RequestKind, Snapshot, SnapshotStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ids::{canonical_gtin, is_valid_isrc, normalize_isrc, normalize_string};
use crate::merge::{merge_releases, merge_tracks};
use crate::model::{HarmonizedRelease, HarmonizedTrack, ProviderSource};
use crate::provider::{CatalogProvider, ProviderInfo};
use crate::registry::SharedRegistry;

/// How many hits each provider contributes to a search snapshot. The cached
/// list must not depend on the caller's `limit`, so providers are always
/// queried with this cap and per-call limits truncate from the snapshot.
const SEARCH_PROVIDER_LIMIT: usize = 25;

/// Per-call options for a lookup.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Restrict the lookup to this subset of providers (by name). `None`
    /// means all enabled providers.
    pub providers: Option<Vec<String>>,
    /// Skip the snapshot cache for this call; the fresh result is still
    /// stored.
    pub bypass_cache: bool,
}

/// Coordinates identifier resolution across the provider registry and the
/// snapshot cache.
pub struct LookupCoordinator {
    registry: SharedRegistry,
    store: Arc<dyn SnapshotStore>,
    default_ttl: Duration,
    /// Provider name -> TTL override. A merged result lives for the minimum
    /// TTL across the providers that contributed to it.
    ttl_overrides: HashMap<String, Duration>,
    fanout_limit: usize,
}

impl LookupCoordinator {
    pub fn new(registry: SharedRegistry, store: Arc<dyn SnapshotStore>, config: &Config) -> Self {
        let ttl_overrides = config
            .providers
            .iter()
            .filter_map(|p| {
                p.cache_ttl_secs
                    .map(|secs| (p.name.clone(), Duration::from_secs(secs)))
            })
            .collect();

        Self {
            registry,
            store,
            default_ttl: Duration::from_secs(config.cache.ttl_secs),
            ttl_overrides,
            fanout_limit: config.fanout_concurrency,
        }
    }

    /// Resolve a release by barcode.
    pub async fn lookup_by_gtin(
        &self,
        gtin: &str,
        options: &LookupOptions,
    ) -> Result<HarmonizedRelease> {
        let gtin = canonical_gtin(gtin)
            .ok_or_else(|| Error::validation(format!("invalid GTIN '{gtin}'")))?;

        let providers = self.select_providers(options)?;
        let key = cache_key(RequestKind::Gtin, &gtin, &providers);

        if !options.bypass_cache {
            if let Some(mut release) = self.cached::<HarmonizedRelease>(&key).await {
                mark_cached(&mut release.sources, &key);
                return Ok(release);
            }
        }

        let candidates = self
            .fan_out(&providers, |provider| {
                let gtin = gtin.clone();
                async move { provider.lookup_by_gtin(&gtin).await }
            })
            .await;
        let candidates = collect_candidates(candidates, "gtin", &gtin)?;

        let ttl = self.ttl_for(&candidates_providers(&candidates, |r| r.sources.as_slice()));
        let release = merge_releases(candidates)?;
        info!(
            gtin,
            sources = release.sources.len(),
            confidence = release.confidence,
            "resolved release by barcode"
        );
        self.store(&key, &release, ttl).await;
        Ok(release)
    }

    /// Resolve a recording by ISRC.
    pub async fn lookup_by_isrc(
        &self,
        isrc: &str,
        options: &LookupOptions,
    ) -> Result<HarmonizedTrack> {
        let isrc = normalize_isrc(isrc);
        if !is_valid_isrc(&isrc) {
            return Err(Error::validation(format!("invalid ISRC '{isrc}'")));
        }

        let providers = self.select_providers(options)?;
        let key = cache_key(RequestKind::Isrc, &isrc, &providers);

        if !options.bypass_cache {
            if let Some(mut track) = self.cached::<HarmonizedTrack>(&key).await {
                mark_cached(&mut track.sources, &key);
                return Ok(track);
            }
        }

        let candidates = self
            .fan_out(&providers, |provider| {
                let isrc = isrc.clone();
                async move { provider.lookup_by_isrc(&isrc).await }
            })
            .await;
        let candidates = collect_candidates(candidates, "isrc", &isrc)?;

        let ttl = self.ttl_for(&candidates_providers(&candidates, |t| t.sources.as_slice()));
        let track = merge_tracks(candidates)?;
        info!(
            isrc,
            sources = track.sources.len(),
            confidence = track.confidence,
            "resolved track by isrc"
        );
        self.store(&key, &track, ttl).await;
        Ok(track)
    }

    /// Resolve a provider catalog page URL into a release.
    ///
    /// Dispatched to the single highest-priority enabled provider that
    /// recognizes the URL; there is no fan-out or merge.
    pub async fn lookup_by_url(
        &self,
        url: &str,
        options: &LookupOptions,
    ) -> Result<HarmonizedRelease> {
        if url.trim().is_empty() {
            return Err(Error::validation("empty url"));
        }

        let providers = self.select_providers(options)?;
        let provider = providers
            .iter()
            .find(|p| p.matches_url(url))
            .ok_or_else(|| Error::validation(format!("no provider recognizes url '{url}'")))?;

        let key = cache_key(RequestKind::Url, url, std::slice::from_ref(provider));

        if !options.bypass_cache {
            if let Some(mut release) = self.cached::<HarmonizedRelease>(&key).await {
                mark_cached(&mut release.sources, &key);
                return Ok(release);
            }
        }

        let release = provider.lookup_by_url(url).await?;
        let ttl = self.ttl_for(&[provider.name()]);
        info!(url, provider = provider.name(), "resolved release by url");
        self.store(&key, &release, ttl).await;
        Ok(release)
    }

    /// Free-text release search across all selected providers.
    ///
    /// Results are not merged; they are concatenated in provider-priority
    /// order, each scored by its provider, and truncated to `limit`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        options: &LookupOptions,
    ) -> Result<Vec<HarmonizedRelease>> {
        if query.trim().is_empty() {
            return Err(Error::validation("empty search query"));
        }
        let limit = limit.max(1);

        let providers = self.select_providers(options)?;
        // The cache holds the full result list keyed by the normalized
        // query, so differing limits share one snapshot.
        let key = cache_key(RequestKind::Query, &normalize_string(query), &providers);

        if !options.bypass_cache {
            if let Some(mut results) = self.cached::<Vec<HarmonizedRelease>>(&key).await {
                for release in &mut results {
                    mark_cached(&mut release.sources, &key);
                }
                results.truncate(limit);
                return Ok(results);
            }
        }

        let outcomes = self
            .fan_out(&providers, |provider| {
                let query = query.to_string();
                async move { provider.search(&query, SEARCH_PROVIDER_LIMIT).await }
            })
            .await;

        let mut results = Vec::new();
        let mut failures = 0;
        let total = outcomes.len();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(hits) => results.extend(hits),
                Err(Error::NotFound(_)) => {}
                Err(error) => {
                    warn!(provider = name, %error, "provider search failed");
                    failures += 1;
                }
            }
        }
        if failures == total && total > 0 {
            return Err(Error::AggregateFailure(format!(
                "search '{query}' failed on all {total} providers"
            )));
        }

        debug!(query, hits = results.len(), "search complete");
        self.store(&key, &results, self.default_ttl).await;
        results.truncate(limit);
        Ok(results)
    }

    /// Identity summaries of the enabled providers, priority order.
    pub fn enabled_providers(&self) -> Vec<ProviderInfo> {
        self.registry
            .snapshot()
            .enabled()
            .iter()
            .map(|p| p.info())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Pipeline pieces
    // -----------------------------------------------------------------------

    /// The enabled providers this call should consult, priority order.
    fn select_providers(&self, options: &LookupOptions) -> Result<Vec<Arc<dyn CatalogProvider>>> {
        let mut providers = self.registry.snapshot().enabled();
        if let Some(names) = &options.providers {
            providers.retain(|p| names.iter().any(|n| n == p.name()));
        }
        if providers.is_empty() {
            return Err(Error::AggregateFailure(
                "no enabled providers to query".to_string(),
            ));
        }
        Ok(providers)
    }

    /// Run `call` against every provider with bounded concurrency.
    ///
    /// Results come back in provider order regardless of completion order,
    /// so merge tie-breaks stay deterministic.
    async fn fan_out<T, F, Fut>(
        &self,
        providers: &[Arc<dyn CatalogProvider>],
        call: F,
    ) -> Vec<(&'static str, Result<T>)>
    where
        F: Fn(Arc<dyn CatalogProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut outcomes: Vec<(usize, &'static str, Result<T>)> =
            stream::iter(providers.iter().cloned().enumerate())
                .map(|(index, provider)| {
                    let name = provider.name();
                    let fut = call(provider);
                    async move { (index, name, fut.await) }
                })
                .buffer_unordered(self.fanout_limit)
                .collect()
                .await;

        outcomes.sort_by_key(|(index, ..)| *index);
        outcomes
            .into_iter()
            .map(|(_, name, outcome)| (name, outcome))
            .collect()
    }

    /// Fetch and decode a cached snapshot; any cache failure is a miss.
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let snapshot = match self.store.get(key).await {
            Ok(hit) => hit?,
            Err(error) => {
                warn!(%error, "snapshot fetch failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_value(snapshot.payload) {
            Ok(value) => {
                debug!(fingerprint = key, "serving lookup from snapshot");
                Some(value)
            }
            Err(error) => {
                warn!(%error, "stale snapshot shape, treating as miss");
                None
            }
        }
    }

    /// Store a merged result; failures degrade to a warning.
    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to serialize snapshot payload");
                return;
            }
        };
        let snapshot = Snapshot {
            payload,
            stored_at: chrono::Utc::now(),
        };
        if let Err(error) = self.store.set(key, snapshot, ttl).await {
            warn!(%error, "failed to store snapshot");
        }
    }

    /// TTL for a result: the minimum override across contributing providers,
    /// or the default when none of them carries one.
    fn ttl_for(&self, contributing: &[&str]) -> Duration {
        contributing
            .iter()
            .filter_map(|name| self.ttl_overrides.get(*name).copied())
            .min()
            .unwrap_or(self.default_ttl)
    }
}

/// Fingerprint over the provider names a call will consult.
fn cache_key(kind: RequestKind, value: &str, providers: &[Arc<dyn CatalogProvider>]) -> String {
    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    fingerprint(kind, value, &names)
}

/// Mark every source record as served from the given snapshot.
fn mark_cached(sources: &mut [ProviderSource], key: &str) {
    for source in sources {
        source.snapshot_id = Some(key.to_string());
    }
}

/// Split fan-out outcomes into merge candidates, or classify the failure
/// when nothing came back: all-not-found stays `NotFound`, anything else
/// becomes `AggregateFailure`.
fn collect_candidates<T>(
    outcomes: Vec<(&'static str, Result<T>)>,
    kind: &str,
    value: &str,
) -> Result<Vec<T>> {
    let total = outcomes.len();
    let mut candidates = Vec::new();
    let mut not_found = 0;
    let mut failures = 0;

    for (name, outcome) in outcomes {
        match outcome {
            Ok(candidate) => candidates.push(candidate),
            Err(Error::NotFound(_)) => {
                debug!(provider = name, kind, value, "provider has no match");
                not_found += 1;
            }
            Err(error) => {
                warn!(provider = name, kind, value, %error, "provider lookup failed");
                failures += 1;
            }
        }
    }

    if candidates.is_empty() {
        if failures > 0 {
            return Err(Error::AggregateFailure(format!(
                "{kind} '{value}': {failures} of {total} providers failed, rest had no match"
            )));
        }
        return Err(Error::not_found(format!(
            "{kind} '{value}' not known to any of {total} providers"
        )));
    }
    Ok(candidates)
}

/// Names of the providers that produced candidates, via their source lists.
fn candidates_providers<'a, T>(
    candidates: &'a [T],
    sources: impl Fn(&'a T) -> &'a [ProviderSource],
) -> Vec<&'a str> {
    candidates
        .iter()
        .flat_map(|c| sources(c).iter().map(|s| s.provider.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::cache::MemorySnapshotStore;
    use crate::config::ProviderConfig;
    use crate::model::ReleaseType;
    use crate::registry::ProviderRegistry;

    /// Scripted provider for coordinator tests.
    struct StubProvider {
        name: &'static str,
        priority: i32,
        confidence: f64,
        fail_with: Option<fn() -> Error>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(name: &'static str, priority: i32, confidence: f64) -> Self {
            Self {
                name,
                priority,
                confidence,
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str, priority: i32, fail_with: fn() -> Error) -> Self {
            Self {
                fail_with: Some(fail_with),
                ..Self::new(name, priority, 0.5)
            }
        }

        fn release(&self, title: &str) -> HarmonizedRelease {
            let mut provider_ids = HashMap::new();
            provider_ids.insert(self.name.to_string(), format!("{}-1", self.name));
            HarmonizedRelease {
                gtin: None,
                title: title.to_string(),
                title_normalized: normalize_string(title),
                artist_credits: Vec::new(),
                date: None,
                release_type: ReleaseType::Album,
                status: None,
                label: None,
                media: Vec::new(),
                artwork: Vec::new(),
                genres: Vec::new(),
                tags: Vec::new(),
                language: None,
                provider_ids,
                sources: vec![ProviderSource::new(self.name, format!("{}-1", self.name), None)],
                merged_at: Utc::now(),
                confidence: self.confidence,
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        fn display_name(&self) -> &'static str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn enabled(&self) -> bool {
            true
        }

        async fn lookup_by_gtin(&self, gtin: &str) -> Result<HarmonizedRelease> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            let mut release = self.release(&format!("{} release", self.name));
            release.gtin = Some(gtin.to_string());
            Ok(release)
        }

        async fn lookup_by_isrc(&self, isrc: &str) -> Result<HarmonizedTrack> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(HarmonizedTrack {
                isrc: Some(isrc.to_string()),
                title: format!("{} track", self.name),
                title_normalized: normalize_string(&format!("{} track", self.name)),
                position: 1,
                disc_number: None,
                duration_ms: None,
                artist_credits: Vec::new(),
                credits: Vec::new(),
                explicit: false,
                provider_ids: HashMap::new(),
                sources: vec![ProviderSource::new(self.name, "t1", None)],
                merged_at: Utc::now(),
                confidence: self.confidence,
            })
        }

        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<HarmonizedRelease>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(vec![self.release(&format!("{query} ({})", self.name))])
        }

        fn matches_url(&self, url: &str) -> bool {
            url.contains(self.name)
        }

        async fn lookup_by_url(&self, _url: &str) -> Result<HarmonizedRelease> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(self.release(&format!("{} via url", self.name)))
        }
    }

    fn coordinator_with(
        providers: Vec<Arc<StubProvider>>,
    ) -> (LookupCoordinator, Arc<MemorySnapshotStore>) {
        let mut registry = ProviderRegistry::new();
        for provider in &providers {
            registry.register(provider.clone());
        }
        let store = Arc::new(MemorySnapshotStore::new());
        let mut config = Config::default();
        for provider in &providers {
            config.providers.push(ProviderConfig::named(provider.name));
        }
        let coordinator =
            LookupCoordinator::new(SharedRegistry::new(registry), store.clone(), &config);
        (coordinator, store)
    }

    const GTIN: &str = "00602445790920";

    #[tokio::test]
    async fn merges_candidates_across_providers() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let dz = Arc::new(StubProvider::new("deezer", 5, 0.85));
        let (coordinator, _) = coordinator_with(vec![mb.clone(), dz.clone()]);

        let release = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();

        assert_eq!(release.title, "musicbrainz release");
        assert_eq!(release.sources.len(), 2);
        assert!(release.provider_ids.contains_key("deezer"));
        assert_eq!(mb.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dz.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeat_lookup_served_from_snapshot() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let (coordinator, store) = coordinator_with(vec![mb.clone()]);

        let first = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();
        assert!(first.sources[0].snapshot_id.is_none());
        assert_eq!(store.len(), 1);

        let second = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();
        // No second provider call; the snapshot id marks the cache hit.
        assert_eq!(mb.calls.load(Ordering::SeqCst), 1);
        assert!(second.sources[0].snapshot_id.is_some());
    }

    #[tokio::test]
    async fn bypass_cache_refetches_and_restores() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let (coordinator, _) = coordinator_with(vec![mb.clone()]);

        coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();
        let bypass = LookupOptions {
            bypass_cache: true,
            ..Default::default()
        };
        let fresh = coordinator.lookup_by_gtin(GTIN, &bypass).await.unwrap();

        assert_eq!(mb.calls.load(Ordering::SeqCst), 2);
        assert!(fresh.sources[0].snapshot_id.is_none());
    }

    #[tokio::test]
    async fn provider_filter_restricts_fanout_and_cache_key() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let dz = Arc::new(StubProvider::new("deezer", 5, 0.85));
        let (coordinator, store) = coordinator_with(vec![mb.clone(), dz.clone()]);

        let only_deezer = LookupOptions {
            providers: Some(vec!["deezer".to_string()]),
            ..Default::default()
        };
        let release = coordinator.lookup_by_gtin(GTIN, &only_deezer).await.unwrap();
        assert_eq!(release.title, "deezer release");
        assert_eq!(mb.calls.load(Ordering::SeqCst), 0);

        // Different provider set, different snapshot.
        coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_provider_filter_is_aggregate_failure() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let (coordinator, _) = coordinator_with(vec![mb]);

        let err = coordinator
            .lookup_by_gtin(
                GTIN,
                &LookupOptions {
                    providers: Some(vec!["napster".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AggregateFailure(_)));
    }

    #[tokio::test]
    async fn invalid_gtin_rejected_before_any_provider_call() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let (coordinator, _) = coordinator_with(vec![mb.clone()]);

        let err = coordinator
            .lookup_by_gtin("036000291453", &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mb.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disallowed_gtin_length_rejected_despite_consistent_check_digit() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let (coordinator, _) = coordinator_with(vec![mb.clone()]);

        // 9 digits; zero-padding would make the check digit line up.
        let err = coordinator
            .lookup_by_gtin("096385074", &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mb.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_not_found_stays_not_found() {
        let a = Arc::new(StubProvider::failing("musicbrainz", 10, || {
            Error::not_found("nope")
        }));
        let b = Arc::new(StubProvider::failing("deezer", 5, || {
            Error::not_found("nope")
        }));
        let (coordinator, _) = coordinator_with(vec![a, b]);

        let err = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn all_errors_become_aggregate_failure() {
        let a = Arc::new(StubProvider::failing("musicbrainz", 10, || {
            Error::http(503, "down")
        }));
        let b = Arc::new(StubProvider::failing("deezer", 5, || {
            Error::http(500, "boom")
        }));
        let (coordinator, _) = coordinator_with(vec![a, b]);

        let err = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AggregateFailure(_)));
    }

    #[tokio::test]
    async fn partial_failure_still_merges_the_rest() {
        let ok = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let bad = Arc::new(StubProvider::failing("deezer", 5, || {
            Error::http(503, "down")
        }));
        let (coordinator, _) = coordinator_with(vec![ok, bad]);

        let release = coordinator
            .lookup_by_gtin(GTIN, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(release.sources.len(), 1);
        assert_eq!(release.sources[0].provider, "musicbrainz");
    }

    #[tokio::test]
    async fn isrc_lookup_validates_and_merges() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let sp = Arc::new(StubProvider::new("spotify", 1, 0.8));
        let (coordinator, _) = coordinator_with(vec![mb, sp]);

        let err = coordinator
            .lookup_by_isrc("bogus", &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let track = coordinator
            .lookup_by_isrc("us-rc1-76-07839", &LookupOptions::default())
            .await
            .unwrap();
        // Normalized before the providers see it.
        assert_eq!(track.isrc.as_deref(), Some("USRC17607839"));
        assert_eq!(track.sources.len(), 2);
        assert_eq!(track.title, "musicbrainz track");
    }

    #[tokio::test]
    async fn url_lookup_dispatches_to_matching_provider_only() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let dz = Arc::new(StubProvider::new("deezer", 5, 0.85));
        let (coordinator, _) = coordinator_with(vec![mb.clone(), dz.clone()]);

        let release = coordinator
            .lookup_by_url("https://deezer.example/album/1", &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(release.title, "deezer via url");
        assert_eq!(mb.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dz.calls.load(Ordering::SeqCst), 1);

        let err = coordinator
            .lookup_by_url("https://nobody.example/x", &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn search_concatenates_in_priority_order_and_truncates() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let dz = Arc::new(StubProvider::new("deezer", 5, 0.85));
        let (coordinator, _) = coordinator_with(vec![dz, mb]);

        let results = coordinator
            .search("homogenic", 10, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "homogenic (musicbrainz)");
        assert_eq!(results[1].title, "homogenic (deezer)");

        let truncated = coordinator
            .search("homogenic", 1, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0].title, "homogenic (musicbrainz)");
    }

    #[tokio::test]
    async fn small_first_limit_does_not_cap_later_searches() {
        let mb = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let dz = Arc::new(StubProvider::new("deezer", 5, 0.85));
        let (coordinator, _) = coordinator_with(vec![mb.clone(), dz.clone()]);

        let first = coordinator
            .search("post", 1, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // The snapshot holds every provider's hits, not the first caller's
        // truncation, and the repeat is served without refetching.
        let second = coordinator
            .search("post", 10, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(mb.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dz.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn search_tolerates_partial_failures() {
        let ok = Arc::new(StubProvider::new("musicbrainz", 10, 0.95));
        let bad = Arc::new(StubProvider::failing("deezer", 5, || {
            Error::http(500, "boom")
        }));
        let (coordinator, _) = coordinator_with(vec![ok, bad.clone()]);

        let results = coordinator
            .search("post", 10, &LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let all_bad = Arc::new(StubProvider::failing("musicbrainz", 10, || {
            Error::http(500, "boom")
        }));
        let (coordinator, _) = coordinator_with(vec![all_bad]);
        let err = coordinator
            .search("post", 10, &LookupOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AggregateFailure(_)));
    }
}
