//! Spotify metadata provider.
//!
//! Uses the Spotify Web API with a pre-provisioned bearer token from the
//! provider credentials. Token acquisition and refresh are out of scope; the
//! provider reports itself disabled when no token is configured.
//!
//! Lookup mapping:
//! - GTIN -> `search?q=upc:<upc>&type=album`, then `/albums/<id>` for tracks.
//! - ISRC -> `search?q=isrc:<isrc>&type=track`.
//! - search -> `search?q=<query>&type=album`.
//! - URL -> `/albums/<id>` for `open.spotify.com/album/<id>` pages.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::client::ProviderClient;
use super::{search_confidence, upc_form, urlencode};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::ids::normalize_string;
use crate::model::{
    ArtistCredit, Artwork, HarmonizedRelease, HarmonizedTrack, LabelInfo, Medium, PartialDate,
    ProviderSource, ReleaseType,
};
use crate::provider::CatalogProvider;

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Confidence for direct (id-based) lookups.
const LOOKUP_CONFIDENCE: f64 = 0.8;

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpSearchAlbums {
    albums: SpPage<SpAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpSearchTracks {
    tracks: SpPage<SpTrack>,
}

#[derive(Debug, Deserialize)]
struct SpPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SpAlbum {
    id: String,
    name: String,
    album_type: Option<String>,
    release_date: Option<String>,
    label: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    images: Vec<SpImage>,
    #[serde(default)]
    artists: Vec<SpArtist>,
    external_ids: Option<SpExternalIds>,
    external_urls: Option<SpExternalUrls>,
    tracks: Option<SpPage<SpTrack>>,
}

#[derive(Debug, Deserialize)]
struct SpTrack {
    id: String,
    name: String,
    duration_ms: Option<u64>,
    track_number: Option<u32>,
    disc_number: Option<u32>,
    #[serde(default)]
    explicit: bool,
    #[serde(default)]
    artists: Vec<SpArtist>,
    external_ids: Option<SpExternalIds>,
    external_urls: Option<SpExternalUrls>,
}

#[derive(Debug, Deserialize)]
struct SpArtist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SpExternalIds {
    upc: Option<String>,
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpExternalUrls {
    spotify: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Spotify catalog provider.
pub struct SpotifyProvider {
    client: ProviderClient,
    base_url: String,
    token: Option<String>,
    priority: i32,
    enabled: bool,
}

impl SpotifyProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: ProviderClient::new("spotify", config, None),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.credentials.token.clone(),
            priority: config.priority,
            enabled: config.enabled,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::config("spotify: no bearer token configured"))
    }

    fn credits(artists: &[SpArtist]) -> Vec<ArtistCredit> {
        artists
            .iter()
            .map(|a| {
                let mut credit = ArtistCredit::new(a.name.clone());
                credit
                    .external_ids
                    .insert("spotify".to_string(), a.id.clone());
                credit
            })
            .collect()
    }

    fn to_track(track: SpTrack) -> HarmonizedTrack {
        let mut provider_ids = HashMap::new();
        provider_ids.insert("spotify".to_string(), track.id.clone());

        HarmonizedTrack {
            isrc: track
                .external_ids
                .and_then(|ids| ids.isrc)
                .filter(|i| !i.is_empty()),
            title_normalized: normalize_string(&track.name),
            position: track.track_number.unwrap_or(1).max(1),
            disc_number: track.disc_number,
            duration_ms: track.duration_ms,
            artist_credits: Self::credits(&track.artists),
            credits: Vec::new(),
            explicit: track.explicit,
            provider_ids,
            sources: vec![ProviderSource::new(
                "spotify",
                track.id,
                track.external_urls.and_then(|u| u.spotify),
            )],
            merged_at: Utc::now(),
            confidence: LOOKUP_CONFIDENCE,
            title: track.name,
        }
    }

    fn to_release(album: SpAlbum, confidence: f64) -> HarmonizedRelease {
        let artist_credits = Self::credits(&album.artists);

        let mut by_disc: BTreeMap<u32, Vec<HarmonizedTrack>> = BTreeMap::new();
        for track in album.tracks.map(|t| t.items).unwrap_or_default() {
            let track = Self::to_track(track);
            by_disc
                .entry(track.disc_number.unwrap_or(1))
                .or_default()
                .push(track);
        }
        let media: Vec<Medium> = by_disc
            .into_iter()
            .map(|(position, tracks)| Medium {
                format: None,
                position,
                tracks,
            })
            .collect();

        let mut provider_ids = HashMap::new();
        provider_ids.insert("spotify".to_string(), album.id.clone());

        HarmonizedRelease {
            gtin: album
                .external_ids
                .and_then(|ids| ids.upc)
                .filter(|u| !u.is_empty()),
            title_normalized: normalize_string(&album.name),
            artist_credits,
            date: album.release_date.as_deref().and_then(PartialDate::parse),
            release_type: album
                .album_type
                .as_deref()
                .map(ReleaseType::from_wire)
                .unwrap_or(ReleaseType::Other),
            status: None,
            label: album.label.filter(|l| !l.is_empty()).map(|name| LabelInfo {
                name: Some(name),
                catalog_number: None,
            }),
            media,
            artwork: album
                .images
                .into_iter()
                .map(|image| Artwork {
                    url: image.url,
                    width: image.width,
                    height: image.height,
                })
                .collect(),
            genres: album.genres,
            tags: Vec::new(),
            language: None,
            provider_ids,
            sources: vec![ProviderSource::new(
                "spotify",
                album.id,
                album.external_urls.and_then(|u| u.spotify),
            )],
            merged_at: Utc::now(),
            confidence,
            title: album.name,
        }
    }

    fn extract_album_id(url: &str) -> Option<&str> {
        if !url.contains("open.spotify.com") {
            return None;
        }
        let rest = url.split("/album/").nth(1)?;
        let id = rest.split(['/', '?', '#']).next()?;
        (!id.is_empty()).then_some(id)
    }

    async fn fetch_album(&self, id: &str) -> Result<SpAlbum> {
        let url = format!("{}/albums/{}", self.base_url, id);
        self.client.get_json(&url, Some(self.token()?)).await
    }
}

#[async_trait]
impl CatalogProvider for SpotifyProvider {
    fn name(&self) -> &'static str {
        "spotify"
    }

    fn display_name(&self) -> &'static str {
        "Spotify"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        // Without a token every call would fail; keep the provider out of
        // fan-out instead.
        self.enabled && self.token.is_some()
    }

    fn supports_user_auth(&self) -> bool {
        true
    }

    async fn lookup_by_gtin(&self, gtin: &str) -> Result<HarmonizedRelease> {
        let upc = upc_form(gtin);
        let url = format!(
            "{}/search?q={}&type=album&limit=1",
            self.base_url,
            urlencode(&format!("upc:{upc}"))
        );
        let found: SpSearchAlbums = self.client.get_json(&url, Some(self.token()?)).await?;

        let hit = found
            .albums
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("spotify: no album for upc {gtin}")))?;

        // The search payload omits tracks; fetch the full album.
        let album = self.fetch_album(&hit.id).await?;
        let mut release = Self::to_release(album, LOOKUP_CONFIDENCE);
        if release.gtin.is_none() {
            release.gtin = Some(gtin.to_string());
        }
        Ok(release)
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<HarmonizedTrack> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.base_url,
            urlencode(&format!("isrc:{isrc}"))
        );
        let found: SpSearchTracks = self.client.get_json(&url, Some(self.token()?)).await?;

        let hit = found
            .tracks
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("spotify: no track for isrc {isrc}")))?;

        let mut track = Self::to_track(hit);
        if track.isrc.is_none() {
            track.isrc = Some(isrc.to_string());
        }
        Ok(track)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<HarmonizedRelease>> {
        let url = format!(
            "{}/search?q={}&type=album&limit={}",
            self.base_url,
            urlencode(query),
            limit.clamp(1, 50)
        );
        let found: SpSearchAlbums = self.client.get_json(&url, Some(self.token()?)).await?;

        Ok(found
            .albums
            .items
            .into_iter()
            .map(|album| {
                let confidence = search_confidence(query, &album.name);
                Self::to_release(album, confidence)
            })
            .collect())
    }

    fn matches_url(&self, url: &str) -> bool {
        Self::extract_album_id(url).is_some()
    }

    async fn lookup_by_url(&self, url: &str) -> Result<HarmonizedRelease> {
        let id = Self::extract_album_id(url)
            .ok_or_else(|| Error::validation(format!("not a spotify album url: {url}")))?
            .to_string();

        let album = self.fetch_album(&id).await?;
        Ok(Self::to_release(album, LOOKUP_CONFIDENCE))
    }
}
