//! Harmonized entity data model.
//!
//! These are the shapes providers translate their own responses into and the
//! mergers reconcile: one record per release, track or artist, carrying the
//! full provenance of every provider that contributed. All of them are
//! immutable value objects -- produced once by a provider or a merge, never
//! mutated afterward.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Provenance record attached to every harmonized entity.
///
/// Immutable once created; merging concatenates these, it never drops them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSource {
    /// Stable provider name (e.g. "musicbrainz").
    pub provider: String,
    /// Provider-internal identifier for the fetched entity.
    pub external_id: String,
    /// Canonical page for the entity on the provider, if any.
    pub url: Option<String>,
    /// When the provider was queried.
    pub fetched_at: DateTime<Utc>,
    /// Snapshot-cache entry this record was served from, if any.
    pub snapshot_id: Option<String>,
}

impl ProviderSource {
    /// Provenance for a fresh fetch from `provider`.
    pub fn new(
        provider: impl Into<String>,
        external_id: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            external_id: external_id.into(),
            url,
            fetched_at: Utc::now(),
            snapshot_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Credits and supporting value types
// ---------------------------------------------------------------------------

/// A display-level artist attribution.
///
/// `join_phrase` (e.g. "feat.", "&") glues consecutive credits together when
/// rendering multi-artist attributions in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    /// Alias the artist was credited under, if different from `name`.
    pub credited_as: Option<String>,
    pub join_phrase: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Per-provider external ids for the credited artist.
    #[serde(default)]
    pub external_ids: HashMap<String, String>,
}

impl ArtistCredit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credited_as: None,
            join_phrase: None,
            roles: Vec::new(),
            external_ids: HashMap::new(),
        }
    }
}

/// A date with independently optional year/month/day parts, as catalogs
/// frequently report only a year or a year-month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    /// Parse `"YYYY"`, `"YYYY-MM"` or `"YYYY-MM-DD"`. Returns `None` when no
    /// year can be extracted; out-of-range month/day parts are dropped.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, '-');
        let year = parts.next()?.trim().parse::<i32>().ok()?;
        let month = parts
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m));
        let day = parts
            .next()
            .and_then(|d| d.parse::<u32>().ok())
            .filter(|d| (1..=31).contains(d));
        Some(Self {
            year: Some(year),
            // A day without a valid month is meaningless.
            day: if month.is_some() { day } else { None },
            month,
        })
    }
}

/// Release type, a closed enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Album,
    Single,
    Ep,
    Compilation,
    Soundtrack,
    Live,
    Remix,
    #[default]
    Other,
}

impl ReleaseType {
    /// Map a provider's free-form type string onto the closed enum.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "album" => Self::Album,
            "single" => Self::Single,
            "ep" => Self::Ep,
            "compilation" => Self::Compilation,
            "soundtrack" => Self::Soundtrack,
            "live" => Self::Live,
            "remix" => Self::Remix,
            _ => Self::Other,
        }
    }
}

/// Artist type, a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtistType {
    Person,
    Group,
    Orchestra,
    Choir,
    Character,
    Other,
}

/// Label and catalog-number info for a release.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelInfo {
    pub name: Option<String>,
    pub catalog_number: Option<String>,
}

/// A piece of release artwork.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artwork {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One physical or logical medium of a release (disc, cassette side, digital
/// bundle), holding an ordered track list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medium {
    pub format: Option<String>,
    /// 1-based position of this medium within the release.
    pub position: u32,
    pub tracks: Vec<HarmonizedTrack>,
}

// ---------------------------------------------------------------------------
// Harmonized entities
// ---------------------------------------------------------------------------

/// A recording/track after harmonization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizedTrack {
    pub isrc: Option<String>,
    pub title: String,
    /// Fuzzy-match key built with [`crate::ids::normalize_string`].
    pub title_normalized: String,
    /// 1-based position within its medium. Always positive.
    pub position: u32,
    pub disc_number: Option<u32>,
    pub duration_ms: Option<u64>,
    /// Ordered display credits.
    pub artist_credits: Vec<ArtistCredit>,
    /// Detailed (role-carrying) credits, when a provider exposes them.
    #[serde(default)]
    pub credits: Vec<ArtistCredit>,
    pub explicit: bool,
    /// Provider name -> provider-internal id.
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
    /// Non-empty provenance list.
    pub sources: Vec<ProviderSource>,
    pub merged_at: DateTime<Utc>,
    /// Certainty in `[0, 1]`; single-source values reflect only that
    /// provider's own scoring.
    pub confidence: f64,
}

/// A release after harmonization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizedRelease {
    /// Normalized GTIN-14 barcode, when known.
    pub gtin: Option<String>,
    pub title: String,
    pub title_normalized: String,
    pub artist_credits: Vec<ArtistCredit>,
    pub date: Option<PartialDate>,
    pub release_type: ReleaseType,
    /// Provider-reported status (e.g. "official", "promotion").
    pub status: Option<String>,
    pub label: Option<LabelInfo>,
    /// Ordered media, each with its ordered track list.
    pub media: Vec<Medium>,
    #[serde(default)]
    pub artwork: Vec<Artwork>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Detected language of the release text, if reported.
    pub language: Option<String>,
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
    pub sources: Vec<ProviderSource>,
    pub merged_at: DateTime<Utc>,
    pub confidence: f64,
}

/// An artist after harmonization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizedArtist {
    pub name: String,
    pub name_normalized: String,
    pub sort_name: Option<String>,
    /// Comment distinguishing same-named artists.
    pub disambiguation: Option<String>,
    pub artist_type: Option<ArtistType>,
    /// ISO 3166-1 alpha-2 country code.
    pub country: Option<String>,
    pub begin_date: Option<PartialDate>,
    pub end_date: Option<PartialDate>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
    pub sources: Vec<ProviderSource>,
    pub merged_at: DateTime<Utc>,
    pub confidence: f64,
}
