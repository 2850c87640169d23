//! Deezer metadata provider.
//!
//! Wraps the Deezer public API (no credentials required). Deezer reports
//! missing data as HTTP 200 with an `error` object in the body rather than a
//! 404, so every response is decoded through [`DzResponse`] first.
//!
//! Lookup mapping:
//! - GTIN -> `album/upc:<upc>` (Deezer wants the 12-digit UPC form).
//! - ISRC -> `track/isrc:<isrc>`.
//! - search -> `search/album?q=<query>`.
//! - URL -> `album/<id>` for `deezer.com/.../album/<id>` pages.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
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

const DEFAULT_BASE_URL: &str = "https://api.deezer.com";

/// Confidence for direct (id-based) lookups; Deezer does not score them.
const LOOKUP_CONFIDENCE: f64 = 0.85;

/// Deezer API error code for "no data".
const CODE_NO_DATA: u32 = 800;
/// Deezer API error code for "quota exceeded".
const CODE_QUOTA: u32 = 4;

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

/// Either the expected payload or Deezer's embedded error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DzResponse<T> {
    Failure { error: DzErrorBody },
    Success(T),
}

#[derive(Debug, Deserialize)]
struct DzErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DzAlbum {
    id: u64,
    title: String,
    upc: Option<String>,
    link: Option<String>,
    cover_xl: Option<String>,
    genres: Option<DzGenreList>,
    label: Option<String>,
    release_date: Option<String>,
    record_type: Option<String>,
    artist: Option<DzArtist>,
    tracks: Option<DzTrackList>,
}

#[derive(Debug, Deserialize)]
struct DzGenreList {
    #[serde(default)]
    data: Vec<DzGenre>,
}

#[derive(Debug, Deserialize)]
struct DzGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DzTrackList {
    #[serde(default)]
    data: Vec<DzTrack>,
}

#[derive(Debug, Deserialize)]
struct DzTrack {
    id: u64,
    title: String,
    isrc: Option<String>,
    link: Option<String>,
    /// Seconds, not milliseconds.
    duration: Option<u64>,
    track_position: Option<u32>,
    disk_number: Option<u32>,
    explicit_lyrics: Option<bool>,
    artist: Option<DzArtist>,
}

#[derive(Debug, Deserialize)]
struct DzArtist {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DzSearchPage {
    #[serde(default)]
    data: Vec<DzAlbum>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Deezer catalog provider.
pub struct DeezerProvider {
    client: ProviderClient,
    base_url: String,
    priority: i32,
    enabled: bool,
}

impl DeezerProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: ProviderClient::new("deezer", config, None),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            priority: config.priority,
            enabled: config.enabled,
        }
    }

    /// Fetch and unwrap Deezer's 200-with-error-body convention.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        match self.client.get_json::<DzResponse<T>>(url, None).await? {
            DzResponse::Success(value) => Ok(value),
            DzResponse::Failure { error } => Err(Self::map_error(error, url)),
        }
    }

    fn map_error(error: DzErrorBody, url: &str) -> Error {
        let message = error.message.unwrap_or_default();
        match error.code {
            Some(CODE_NO_DATA) => Error::not_found(format!("deezer: {url}")),
            Some(CODE_QUOTA) => Error::RateLimitExceeded("deezer".to_string()),
            code => Error::decode(format!(
                "deezer error {kind:?} (code {code:?}): {message}",
                kind = error.kind
            )),
        }
    }

    fn credit(artist: Option<&DzArtist>) -> Vec<ArtistCredit> {
        artist
            .map(|a| {
                let mut credit = ArtistCredit::new(a.name.clone());
                credit
                    .external_ids
                    .insert("deezer".to_string(), a.id.to_string());
                vec![credit]
            })
            .unwrap_or_default()
    }

    fn to_track(track: DzTrack) -> HarmonizedTrack {
        let mut provider_ids = HashMap::new();
        provider_ids.insert("deezer".to_string(), track.id.to_string());

        HarmonizedTrack {
            isrc: track.isrc.filter(|i| !i.is_empty()),
            title_normalized: normalize_string(&track.title),
            position: track.track_position.unwrap_or(1).max(1),
            disc_number: track.disk_number,
            duration_ms: track.duration.map(|secs| secs * 1_000),
            artist_credits: Self::credit(track.artist.as_ref()),
            credits: Vec::new(),
            explicit: track.explicit_lyrics.unwrap_or(false),
            provider_ids,
            sources: vec![ProviderSource::new(
                "deezer",
                track.id.to_string(),
                track.link,
            )],
            merged_at: Utc::now(),
            confidence: LOOKUP_CONFIDENCE,
            title: track.title,
        }
    }

    fn to_release(album: DzAlbum, confidence: f64) -> HarmonizedRelease {
        let artist_credits = Self::credit(album.artist.as_ref());

        // Deezer returns one flat track list; disk numbers reconstruct the
        // media split.
        let mut by_disc: BTreeMap<u32, Vec<HarmonizedTrack>> = BTreeMap::new();
        for track in album.tracks.map(|t| t.data).unwrap_or_default() {
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
        provider_ids.insert("deezer".to_string(), album.id.to_string());

        HarmonizedRelease {
            gtin: album.upc.filter(|u| !u.is_empty()),
            title_normalized: normalize_string(&album.title),
            artist_credits,
            date: album.release_date.as_deref().and_then(PartialDate::parse),
            release_type: album
                .record_type
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
                .cover_xl
                .into_iter()
                .map(|url| Artwork {
                    url,
                    // cover_xl is served at a fixed 1000x1000.
                    width: Some(1000),
                    height: Some(1000),
                })
                .collect(),
            genres: album
                .genres
                .map(|g| g.data.into_iter().map(|genre| genre.name).collect())
                .unwrap_or_default(),
            tags: Vec::new(),
            language: None,
            provider_ids,
            sources: vec![ProviderSource::new(
                "deezer",
                album.id.to_string(),
                album.link,
            )],
            merged_at: Utc::now(),
            confidence,
            title: album.title,
        }
    }

    fn extract_album_id(url: &str) -> Option<u64> {
        if !url.contains("deezer.com") {
            return None;
        }
        let rest = url.split("/album/").nth(1)?;
        rest.split(['/', '?', '#']).next()?.parse().ok()
    }
}

#[async_trait]
impl CatalogProvider for DeezerProvider {
    fn name(&self) -> &'static str {
        "deezer"
    }

    fn display_name(&self) -> &'static str {
        "Deezer"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn lookup_by_gtin(&self, gtin: &str) -> Result<HarmonizedRelease> {
        // Deezer indexes albums by their 12-digit UPC.
        let upc = upc_form(gtin);
        let url = format!("{}/album/upc:{}", self.base_url, upc);
        let album: DzAlbum = self.get(&url).await?;

        let mut release = Self::to_release(album, LOOKUP_CONFIDENCE);
        if release.gtin.is_none() {
            release.gtin = Some(gtin.to_string());
        }
        Ok(release)
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<HarmonizedTrack> {
        let url = format!("{}/track/isrc:{}", self.base_url, isrc);
        let track: DzTrack = self.get(&url).await?;

        let mut harmonized = Self::to_track(track);
        if harmonized.isrc.is_none() {
            harmonized.isrc = Some(isrc.to_string());
        }
        Ok(harmonized)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<HarmonizedRelease>> {
        let url = format!(
            "{}/search/album?q={}&limit={}",
            self.base_url,
            urlencode(query),
            limit.clamp(1, 100)
        );
        let page: DzSearchPage = self.get(&url).await?;

        Ok(page
            .data
            .into_iter()
            .map(|album| {
                let confidence = search_confidence(query, &album.title);
                Self::to_release(album, confidence)
            })
            .collect())
    }

    fn matches_url(&self, url: &str) -> bool {
        Self::extract_album_id(url).is_some()
    }

    async fn lookup_by_url(&self, url: &str) -> Result<HarmonizedRelease> {
        let id = Self::extract_album_id(url)
            .ok_or_else(|| Error::validation(format!("not a deezer album url: {url}")))?;

        let api_url = format!("{}/album/{}", self.base_url, id);
        let album: DzAlbum = self.get(&api_url).await?;
        Ok(Self::to_release(album, LOOKUP_CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_album_id_from_urls() {
        assert_eq!(
            DeezerProvider::extract_album_id("https://www.deezer.com/en/album/302127"),
            Some(302127)
        );
        assert_eq!(
            DeezerProvider::extract_album_id("https://deezer.com/album/99?utm=x"),
            Some(99)
        );
        assert_eq!(
            DeezerProvider::extract_album_id("https://www.deezer.com/track/3135556"),
            None
        );
        assert_eq!(
            DeezerProvider::extract_album_id("https://open.spotify.com/album/abc"),
            None
        );
    }

    #[test]
    fn error_codes_map_to_typed_errors() {
        let not_found = DeezerProvider::map_error(
            DzErrorBody {
                kind: Some("DataException".to_string()),
                message: Some("no data".to_string()),
                code: Some(800),
            },
            "u",
        );
        assert!(matches!(not_found, Error::NotFound(_)));

        let quota = DeezerProvider::map_error(
            DzErrorBody {
                kind: Some("Exception".to_string()),
                message: None,
                code: Some(4),
            },
            "u",
        );
        assert!(matches!(quota, Error::RateLimitExceeded(_)));

        let other = DeezerProvider::map_error(
            DzErrorBody {
                kind: None,
                message: None,
                code: Some(300),
            },
            "u",
        );
        assert!(matches!(other, Error::Decode(_)));
    }

    #[test]
    fn tracks_group_into_media_by_disc() {
        let album = DzAlbum {
            id: 1,
            title: "Double".to_string(),
            upc: Some("036000291452".to_string()),
            link: None,
            cover_xl: None,
            genres: None,
            label: None,
            release_date: Some("1999-06-01".to_string()),
            record_type: Some("album".to_string()),
            artist: Some(DzArtist {
                id: 7,
                name: "Artist".to_string(),
            }),
            tracks: Some(DzTrackList {
                data: vec![
                    DzTrack {
                        id: 10,
                        title: "One".to_string(),
                        isrc: None,
                        link: None,
                        duration: Some(200),
                        track_position: Some(1),
                        disk_number: Some(1),
                        explicit_lyrics: None,
                        artist: None,
                    },
                    DzTrack {
                        id: 11,
                        title: "Two".to_string(),
                        isrc: None,
                        link: None,
                        duration: Some(180),
                        track_position: Some(1),
                        disk_number: Some(2),
                        explicit_lyrics: Some(true),
                        artist: None,
                    },
                ],
            }),
        };

        let release = DeezerProvider::to_release(album, 0.85);
        assert_eq!(release.media.len(), 2);
        assert_eq!(release.media[0].position, 1);
        assert_eq!(release.media[0].tracks[0].title, "One");
        assert_eq!(release.media[0].tracks[0].duration_ms, Some(200_000));
        assert_eq!(release.media[1].position, 2);
        assert!(release.media[1].tracks[0].explicit);
        assert_eq!(release.release_type, ReleaseType::Album);
        assert_eq!(
            release.date,
            Some(PartialDate {
                year: Some(1999),
                month: Some(6),
                day: Some(1),
            })
        );
    }
}
