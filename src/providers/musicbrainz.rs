//! MusicBrainz metadata provider.
//!
//! Wraps the MusicBrainz WS/2 JSON API. MusicBrainz is the standards-body
//! style registry in the provider set: open data, no credentials, but a
//! mandatory User-Agent and a strict 1 request/second courtesy limit (the
//! default rate budget honors it; config can tighten or relax it).
//!
//! Lookup mapping:
//! - GTIN -> `release?query=barcode:<gtin>` (search, Lucene syntax).
//! - ISRC -> `isrc/<isrc>?inc=artist-credits` (direct lookup).
//! - search -> `release?query=<query>`.
//! - URL -> `release/<mbid>` for `musicbrainz.org/release/...` pages.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::client::ProviderClient;
use super::urlencode;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::ids::normalize_string;
use crate::model::{
    ArtistCredit, Artwork, HarmonizedRelease, HarmonizedTrack, LabelInfo, Medium, PartialDate,
    ProviderSource, ReleaseType,
};
use crate::provider::CatalogProvider;

const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = "harmonia/0.1 (https://github.com/harmonia-project/harmonia)";

/// Confidence assigned to direct (id-based) lookups.
const LOOKUP_CONFIDENCE: f64 = 0.95;

// ---------------------------------------------------------------------------
// WS/2 response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MbReleaseSearch {
    #[serde(default)]
    releases: Vec<MbRelease>,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    id: String,
    /// Search relevance 0-100; absent on direct lookups.
    score: Option<u8>,
    title: String,
    status: Option<String>,
    date: Option<String>,
    barcode: Option<String>,
    #[serde(rename = "artist-credit")]
    artist_credit: Option<Vec<MbArtistCredit>>,
    #[serde(rename = "release-group")]
    release_group: Option<MbReleaseGroup>,
    #[serde(rename = "label-info")]
    label_info: Option<Vec<MbLabelInfo>>,
    media: Option<Vec<MbMedium>>,
    #[serde(rename = "text-representation")]
    text_representation: Option<MbTextRepresentation>,
}

#[derive(Debug, Deserialize)]
struct MbTextRepresentation {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MbReleaseGroup {
    #[serde(rename = "primary-type")]
    primary_type: Option<String>,
    #[serde(rename = "secondary-types")]
    secondary_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MbArtistCredit {
    name: String,
    joinphrase: Option<String>,
    artist: Option<MbArtist>,
}

#[derive(Debug, Deserialize)]
struct MbArtist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbLabelInfo {
    #[serde(rename = "catalog-number")]
    catalog_number: Option<String>,
    label: Option<MbLabel>,
}

#[derive(Debug, Deserialize)]
struct MbLabel {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MbMedium {
    format: Option<String>,
    position: Option<u32>,
    #[serde(default)]
    tracks: Option<Vec<MbTrack>>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    position: Option<u32>,
    title: Option<String>,
    length: Option<u64>,
    recording: Option<MbRecording>,
}

#[derive(Debug, Deserialize)]
struct MbIsrcLookup {
    #[serde(default)]
    recordings: Vec<MbRecording>,
}

#[derive(Debug, Deserialize)]
struct MbRecording {
    id: String,
    title: Option<String>,
    length: Option<u64>,
    #[serde(rename = "artist-credit")]
    artist_credit: Option<Vec<MbArtistCredit>>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// MusicBrainz catalog provider.
pub struct MusicBrainzProvider {
    client: ProviderClient,
    base_url: String,
    priority: i32,
    enabled: bool,
}

impl MusicBrainzProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: ProviderClient::new("musicbrainz", config, Some(USER_AGENT)),
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

    fn release_page(mbid: &str) -> String {
        format!("https://musicbrainz.org/release/{mbid}")
    }

    /// Front-cover URL on the Cover Art Archive, which serves art for any
    /// release MBID (404s for releases without art are the caller's problem).
    fn cover_art(mbid: &str) -> Artwork {
        Artwork {
            url: format!("https://coverartarchive.org/release/{mbid}/front"),
            width: None,
            height: None,
        }
    }

    fn credits(credits: Option<Vec<MbArtistCredit>>) -> Vec<ArtistCredit> {
        credits
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let mut external_ids = HashMap::new();
                let artist_name = c.artist.as_ref().map(|a| a.name.clone());
                if let Some(artist) = c.artist {
                    external_ids.insert("musicbrainz".to_string(), artist.id);
                }
                ArtistCredit {
                    // `name` is the credited form; keep the canonical artist
                    // name when the credit differs from it.
                    credited_as: artist_name
                        .as_deref()
                        .filter(|canonical| *canonical != c.name)
                        .map(|_| c.name.clone()),
                    name: artist_name.unwrap_or_else(|| c.name.clone()),
                    join_phrase: c.joinphrase.filter(|j| !j.is_empty()),
                    roles: Vec::new(),
                    external_ids,
                }
            })
            .collect()
    }

    fn release_type(group: Option<&MbReleaseGroup>) -> ReleaseType {
        let Some(group) = group else {
            return ReleaseType::Other;
        };
        // Secondary types are more specific than the primary one.
        if let Some(secondary) = &group.secondary_types {
            for kind in secondary {
                let mapped = ReleaseType::from_wire(kind);
                if mapped != ReleaseType::Other {
                    return mapped;
                }
            }
        }
        group
            .primary_type
            .as_deref()
            .map(ReleaseType::from_wire)
            .unwrap_or(ReleaseType::Other)
    }

    fn to_release(&self, release: MbRelease, fallback_confidence: f64) -> HarmonizedRelease {
        let confidence = release
            .score
            .map(|s| f64::from(s.min(100)) / 100.0)
            .unwrap_or(fallback_confidence);

        let artist_credits = Self::credits(release.artist_credit);
        let release_type = Self::release_type(release.release_group.as_ref());

        let label = release
            .label_info
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|info| LabelInfo {
                name: info.label.and_then(|l| l.name),
                catalog_number: info.catalog_number,
            });

        let media = release
            .media
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, medium)| {
                let tracks = medium
                    .tracks
                    .unwrap_or_default()
                    .into_iter()
                    .enumerate()
                    .map(|(track_idx, track)| {
                        self.to_track_from_medium(track, track_idx as u32 + 1, &artist_credits)
                    })
                    .collect();
                Medium {
                    format: medium.format,
                    position: medium.position.unwrap_or(idx as u32 + 1),
                    tracks,
                }
            })
            .collect();

        let mut provider_ids = HashMap::new();
        provider_ids.insert("musicbrainz".to_string(), release.id.clone());

        HarmonizedRelease {
            gtin: release.barcode.filter(|b| !b.is_empty()),
            title_normalized: normalize_string(&release.title),
            title: release.title,
            artist_credits,
            date: release.date.as_deref().and_then(PartialDate::parse),
            release_type,
            status: release.status.map(|s| s.to_lowercase()),
            label,
            media,
            artwork: vec![Self::cover_art(&release.id)],
            genres: Vec::new(),
            tags: Vec::new(),
            language: release
                .text_representation
                .and_then(|t| t.language)
                .filter(|l| !l.is_empty()),
            provider_ids,
            sources: vec![ProviderSource::new(
                "musicbrainz",
                release.id.clone(),
                Some(Self::release_page(&release.id)),
            )],
            merged_at: Utc::now(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    fn to_track_from_medium(
        &self,
        track: MbTrack,
        fallback_position: u32,
        release_credits: &[ArtistCredit],
    ) -> HarmonizedTrack {
        let recording = track.recording;
        let title = track
            .title
            .or_else(|| recording.as_ref().and_then(|r| r.title.clone()))
            .unwrap_or_default();

        let mut provider_ids = HashMap::new();
        let mut sources = Vec::new();
        if let Some(recording) = &recording {
            provider_ids.insert("musicbrainz".to_string(), recording.id.clone());
            sources.push(ProviderSource::new(
                "musicbrainz",
                recording.id.clone(),
                Some(format!("https://musicbrainz.org/recording/{}", recording.id)),
            ));
        }

        let artist_credits = recording
            .and_then(|r| r.artist_credit)
            .map(|c| Self::credits(Some(c)))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| release_credits.to_vec());

        HarmonizedTrack {
            isrc: None,
            title_normalized: normalize_string(&title),
            title,
            position: track.position.unwrap_or(fallback_position).max(1),
            disc_number: None,
            duration_ms: track.length,
            artist_credits,
            credits: Vec::new(),
            explicit: false,
            provider_ids,
            sources,
            merged_at: Utc::now(),
            confidence: LOOKUP_CONFIDENCE,
        }
    }

    fn extract_release_mbid(url: &str) -> Option<&str> {
        let rest = url.split("musicbrainz.org/release/").nth(1)?;
        let mbid = rest
            .split(['/', '?', '#'])
            .next()
            .filter(|s| !s.is_empty())?;
        Some(mbid)
    }
}

#[async_trait]
impl CatalogProvider for MusicBrainzProvider {
    fn name(&self) -> &'static str {
        "musicbrainz"
    }

    fn display_name(&self) -> &'static str {
        "MusicBrainz"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn lookup_by_gtin(&self, gtin: &str) -> Result<HarmonizedRelease> {
        let url = format!(
            "{}/release/?query={}&fmt=json&limit=10",
            self.base_url,
            urlencode(&format!("barcode:{gtin}"))
        );
        let body: MbReleaseSearch = self.client.get_json(&url, None).await?;

        // The search endpoint orders by score; the first hit is the best.
        let release = body
            .releases
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("musicbrainz: no release with barcode {gtin}")))?;

        debug!(gtin, mbid = %release.id, "musicbrainz barcode hit");
        let mut harmonized = self.to_release(release, LOOKUP_CONFIDENCE);
        if harmonized.gtin.is_none() {
            harmonized.gtin = Some(gtin.to_string());
        }
        Ok(harmonized)
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<HarmonizedTrack> {
        let url = format!(
            "{}/isrc/{}?fmt=json&inc=artist-credits",
            self.base_url, isrc
        );
        let body: MbIsrcLookup = self.client.get_json(&url, None).await?;

        let recording = body
            .recordings
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("musicbrainz: no recording for {isrc}")))?;

        let title = recording.title.clone().unwrap_or_default();
        let mut provider_ids = HashMap::new();
        provider_ids.insert("musicbrainz".to_string(), recording.id.clone());

        Ok(HarmonizedTrack {
            isrc: Some(isrc.to_string()),
            title_normalized: normalize_string(&title),
            title,
            // An ISRC identifies a recording, not a slot on a release; no
            // position is available from this endpoint.
            position: 1,
            disc_number: None,
            duration_ms: recording.length,
            artist_credits: Self::credits(recording.artist_credit),
            credits: Vec::new(),
            explicit: false,
            provider_ids,
            sources: vec![ProviderSource::new(
                "musicbrainz",
                recording.id.clone(),
                Some(format!("https://musicbrainz.org/recording/{}", recording.id)),
            )],
            merged_at: Utc::now(),
            confidence: LOOKUP_CONFIDENCE,
        })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<HarmonizedRelease>> {
        let url = format!(
            "{}/release/?query={}&fmt=json&limit={}",
            self.base_url,
            urlencode(query),
            limit.clamp(1, 100)
        );
        let body: MbReleaseSearch = self.client.get_json(&url, None).await?;

        Ok(body
            .releases
            .into_iter()
            .map(|r| self.to_release(r, 0.5))
            .collect())
    }

    fn matches_url(&self, url: &str) -> bool {
        Self::extract_release_mbid(url).is_some()
    }

    async fn lookup_by_url(&self, url: &str) -> Result<HarmonizedRelease> {
        let mbid = Self::extract_release_mbid(url)
            .ok_or_else(|| Error::validation(format!("not a musicbrainz release url: {url}")))?;

        let api_url = format!(
            "{}/release/{}?fmt=json&inc=artist-credits+labels+recordings+release-groups",
            self.base_url, mbid
        );
        let release: MbRelease = self.client.get_json(&api_url, None).await?;
        Ok(self.to_release(release, LOOKUP_CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_release_mbid_from_urls() {
        let mbid = "f27ec8db-af05-4f36-916e-3d57f91ecf5e";
        assert_eq!(
            MusicBrainzProvider::extract_release_mbid(&format!(
                "https://musicbrainz.org/release/{mbid}"
            )),
            Some(mbid)
        );
        assert_eq!(
            MusicBrainzProvider::extract_release_mbid(&format!(
                "https://musicbrainz.org/release/{mbid}/cover-art"
            )),
            Some(mbid)
        );
        assert_eq!(
            MusicBrainzProvider::extract_release_mbid("https://musicbrainz.org/artist/xyz"),
            None
        );
        assert_eq!(
            MusicBrainzProvider::extract_release_mbid("https://deezer.com/album/123"),
            None
        );
    }

    #[test]
    fn secondary_type_beats_primary() {
        let group = MbReleaseGroup {
            primary_type: Some("Album".to_string()),
            secondary_types: Some(vec!["Live".to_string()]),
        };
        assert_eq!(
            MusicBrainzProvider::release_type(Some(&group)),
            ReleaseType::Live
        );

        let plain = MbReleaseGroup {
            primary_type: Some("EP".to_string()),
            secondary_types: None,
        };
        assert_eq!(
            MusicBrainzProvider::release_type(Some(&plain)),
            ReleaseType::Ep
        );
        assert_eq!(MusicBrainzProvider::release_type(None), ReleaseType::Other);
    }

    #[test]
    fn credit_keeps_canonical_and_credited_names() {
        let credits = MusicBrainzProvider::credits(Some(vec![MbArtistCredit {
            name: "Björk Guðmundsdóttir".to_string(),
            joinphrase: Some(" feat. ".to_string()),
            artist: Some(MbArtist {
                id: "mbid-1".to_string(),
                name: "Björk".to_string(),
            }),
        }]));

        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].name, "Björk");
        assert_eq!(
            credits[0].credited_as.as_deref(),
            Some("Björk Guðmundsdóttir")
        );
        assert_eq!(credits[0].join_phrase.as_deref(), Some(" feat. "));
        assert_eq!(
            credits[0].external_ids.get("musicbrainz").map(String::as_str),
            Some("mbid-1")
        );
    }
}
