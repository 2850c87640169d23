//! Entity mergers.
//!
//! Each merger reconciles candidate entities from several providers into one
//! record. The candidate with the highest confidence becomes the base (first
//! wins on ties, so callers pass candidates in provider-priority order);
//! every other candidate only fills gaps the base left. Provenance is never
//! dropped: provider ids are unioned with the base winning conflicts, and
//! source records are concatenated in candidate order.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::ids::normalize_string;
use crate::model::{HarmonizedArtist, HarmonizedRelease, HarmonizedTrack};

/// Index of the highest-confidence candidate; earliest wins ties.
fn base_index(confidences: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_confidence = f64::NEG_INFINITY;
    for (index, confidence) in confidences.enumerate() {
        if confidence > best_confidence {
            best = index;
            best_confidence = confidence;
        }
    }
    best
}

/// Union another candidate's provider ids into the base's; existing entries
/// win conflicts.
fn union_ids(base: &mut HashMap<String, String>, other: HashMap<String, String>) {
    for (provider, id) in other {
        base.entry(provider).or_insert(id);
    }
}

/// Union string lists, deduplicating on the normalized form and keeping the
/// first-seen casing.
fn union_strings(lists: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for value in list {
            if seen.insert(normalize_string(&value)) {
                out.push(value);
            }
        }
    }
    out
}

/// Merge release candidates into one harmonized release.
pub fn merge_releases(mut candidates: Vec<HarmonizedRelease>) -> Result<HarmonizedRelease> {
    if candidates.is_empty() {
        return Err(Error::MergeEmpty("release"));
    }
    let base = base_index(candidates.iter().map(|c| c.confidence));

    // Drain list-valued fields up front so provenance and unions follow the
    // original candidate order, independent of where the base sits.
    let mut sources = Vec::new();
    let mut genre_lists = Vec::new();
    let mut tag_lists = Vec::new();
    for candidate in candidates.iter_mut() {
        sources.append(&mut candidate.sources);
        genre_lists.push(std::mem::take(&mut candidate.genres));
        tag_lists.push(std::mem::take(&mut candidate.tags));
    }

    let mut merged = candidates.remove(base);
    for other in candidates {
        union_ids(&mut merged.provider_ids, other.provider_ids);
        if merged.gtin.is_none() {
            merged.gtin = other.gtin;
        }
        if merged.date.is_none() {
            merged.date = other.date;
        }
        if merged.status.is_none() {
            merged.status = other.status;
        }
        if merged.label.is_none() {
            merged.label = other.label;
        }
        if merged.language.is_none() {
            merged.language = other.language;
        }
        if merged.artist_credits.is_empty() {
            merged.artist_credits = other.artist_credits;
        }
        if merged.media.is_empty() {
            merged.media = other.media;
        }
        if merged.artwork.is_empty() {
            merged.artwork = other.artwork;
        }
    }

    merged.genres = union_strings(genre_lists);
    merged.tags = union_strings(tag_lists);
    merged.sources = sources;
    merged.merged_at = Utc::now();
    Ok(merged)
}

/// Merge track candidates into one harmonized track.
pub fn merge_tracks(mut candidates: Vec<HarmonizedTrack>) -> Result<HarmonizedTrack> {
    if candidates.is_empty() {
        return Err(Error::MergeEmpty("track"));
    }
    let base = base_index(candidates.iter().map(|c| c.confidence));

    let mut sources = Vec::new();
    for candidate in candidates.iter_mut() {
        sources.append(&mut candidate.sources);
    }

    let mut merged = candidates.remove(base);
    for other in candidates {
        union_ids(&mut merged.provider_ids, other.provider_ids);
        if merged.isrc.is_none() {
            merged.isrc = other.isrc;
        }
        if merged.disc_number.is_none() {
            merged.disc_number = other.disc_number;
        }
        if merged.duration_ms.is_none() {
            merged.duration_ms = other.duration_ms;
        }
        if merged.artist_credits.is_empty() {
            merged.artist_credits = other.artist_credits;
        }
        if merged.credits.is_empty() {
            merged.credits = other.credits;
        }
        // Any provider flagging the track explicit makes the merge explicit.
        merged.explicit = merged.explicit || other.explicit;
    }

    merged.sources = sources;
    merged.merged_at = Utc::now();
    Ok(merged)
}

/// Merge artist candidates into one harmonized artist.
pub fn merge_artists(mut candidates: Vec<HarmonizedArtist>) -> Result<HarmonizedArtist> {
    if candidates.is_empty() {
        return Err(Error::MergeEmpty("artist"));
    }
    let base = base_index(candidates.iter().map(|c| c.confidence));

    let mut sources = Vec::new();
    let mut alias_lists = Vec::new();
    let mut genre_lists = Vec::new();
    for candidate in candidates.iter_mut() {
        sources.append(&mut candidate.sources);
        alias_lists.push(std::mem::take(&mut candidate.aliases));
        genre_lists.push(std::mem::take(&mut candidate.genres));
    }

    let mut merged = candidates.remove(base);
    for other in candidates {
        union_ids(&mut merged.provider_ids, other.provider_ids);
        if merged.sort_name.is_none() {
            merged.sort_name = other.sort_name;
        }
        if merged.disambiguation.is_none() {
            merged.disambiguation = other.disambiguation;
        }
        if merged.artist_type.is_none() {
            merged.artist_type = other.artist_type;
        }
        if merged.country.is_none() {
            merged.country = other.country;
        }
        if merged.begin_date.is_none() {
            merged.begin_date = other.begin_date;
        }
        if merged.end_date.is_none() {
            merged.end_date = other.end_date;
        }
    }

    merged.aliases = union_strings(alias_lists);
    merged.genres = union_strings(genre_lists);
    merged.sources = sources;
    merged.merged_at = Utc::now();
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PartialDate, ProviderSource, ReleaseType};

    fn release(provider: &str, confidence: f64) -> HarmonizedRelease {
        let mut provider_ids = HashMap::new();
        provider_ids.insert(provider.to_string(), format!("{provider}-id"));
        HarmonizedRelease {
            gtin: None,
            title: "Homogenic".to_string(),
            title_normalized: "homogenic".to_string(),
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
            sources: vec![ProviderSource::new(provider, format!("{provider}-id"), None)],
            merged_at: Utc::now(),
            confidence,
        }
    }

    fn track(provider: &str, confidence: f64) -> HarmonizedTrack {
        let mut provider_ids = HashMap::new();
        provider_ids.insert(provider.to_string(), format!("{provider}-id"));
        HarmonizedTrack {
            isrc: None,
            title: "Joga".to_string(),
            title_normalized: "joga".to_string(),
            position: 3,
            disc_number: None,
            duration_ms: None,
            artist_credits: Vec::new(),
            credits: Vec::new(),
            explicit: false,
            provider_ids,
            sources: vec![ProviderSource::new(provider, format!("{provider}-id"), None)],
            merged_at: Utc::now(),
            confidence,
        }
    }

    fn artist(provider: &str, confidence: f64) -> HarmonizedArtist {
        let mut provider_ids = HashMap::new();
        provider_ids.insert(provider.to_string(), format!("{provider}-id"));
        HarmonizedArtist {
            name: "Björk".to_string(),
            name_normalized: "bjork".to_string(),
            sort_name: None,
            disambiguation: None,
            artist_type: None,
            country: None,
            begin_date: None,
            end_date: None,
            aliases: Vec::new(),
            genres: Vec::new(),
            provider_ids,
            sources: vec![ProviderSource::new(provider, format!("{provider}-id"), None)],
            merged_at: Utc::now(),
            confidence,
        }
    }

    #[test]
    fn empty_candidates_error() {
        assert!(matches!(
            merge_releases(Vec::new()),
            Err(Error::MergeEmpty("release"))
        ));
        assert!(matches!(
            merge_tracks(Vec::new()),
            Err(Error::MergeEmpty("track"))
        ));
        assert!(matches!(
            merge_artists(Vec::new()),
            Err(Error::MergeEmpty("artist"))
        ));
    }

    #[test]
    fn highest_confidence_wins_base() {
        let mut a = release("deezer", 0.85);
        a.title = "Homogenic (Deezer)".to_string();
        let mut b = release("musicbrainz", 0.95);
        b.title = "Homogenic (MB)".to_string();

        let merged = merge_releases(vec![a, b]).unwrap();
        assert_eq!(merged.title, "Homogenic (MB)");
        assert!((merged.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn first_candidate_wins_confidence_ties() {
        let mut a = release("musicbrainz", 0.9);
        a.title = "First".to_string();
        let mut b = release("deezer", 0.9);
        b.title = "Second".to_string();

        let merged = merge_releases(vec![a, b]).unwrap();
        assert_eq!(merged.title, "First");
    }

    #[test]
    fn provider_ids_union_base_wins() {
        let mut a = release("musicbrainz", 0.95);
        a.provider_ids
            .insert("shared".to_string(), "base".to_string());
        let mut b = release("deezer", 0.85);
        b.provider_ids
            .insert("shared".to_string(), "other".to_string());

        let merged = merge_releases(vec![a, b]).unwrap();
        assert_eq!(merged.provider_ids.get("shared"), Some(&"base".to_string()));
        assert_eq!(
            merged.provider_ids.get("musicbrainz"),
            Some(&"musicbrainz-id".to_string())
        );
        assert_eq!(
            merged.provider_ids.get("deezer"),
            Some(&"deezer-id".to_string())
        );
    }

    #[test]
    fn sources_concatenate_in_candidate_order() {
        let a = release("deezer", 0.85);
        let b = release("musicbrainz", 0.95);
        let c = release("spotify", 0.8);

        // Base is the middle candidate; sources still follow input order.
        let merged = merge_releases(vec![a, b, c]).unwrap();
        let providers: Vec<_> = merged.sources.iter().map(|s| s.provider.as_str()).collect();
        assert_eq!(providers, vec!["deezer", "musicbrainz", "spotify"]);
    }

    #[test]
    fn base_fields_fill_from_others() {
        let mut a = release("musicbrainz", 0.95);
        a.gtin = None;
        a.date = None;
        let mut b = release("deezer", 0.85);
        b.gtin = Some("00602445790920".to_string());
        b.date = PartialDate::parse("1997-09-22");
        b.status = Some("official".to_string());

        let merged = merge_releases(vec![a, b]).unwrap();
        assert_eq!(merged.gtin.as_deref(), Some("00602445790920"));
        assert_eq!(merged.date, PartialDate::parse("1997-09-22"));
        assert_eq!(merged.status.as_deref(), Some("official"));
    }

    #[test]
    fn genres_union_dedupes_on_normalized_form() {
        let mut a = release("musicbrainz", 0.95);
        a.genres = vec!["Electronic".to_string(), "Trip-Hop".to_string()];
        let mut b = release("deezer", 0.85);
        b.genres = vec!["electronic".to_string(), "Ambient".to_string()];

        let merged = merge_releases(vec![a, b]).unwrap();
        // First-seen casing survives.
        assert_eq!(merged.genres, vec!["Electronic", "Trip-Hop", "Ambient"]);
    }

    #[test]
    fn merged_at_is_fresh() {
        let mut a = release("musicbrainz", 0.95);
        a.merged_at = Utc::now() - chrono::Duration::hours(5);
        let merged = merge_releases(vec![a]).unwrap();
        assert!(Utc::now().signed_duration_since(merged.merged_at) < chrono::Duration::seconds(5));
    }

    #[test]
    fn track_merge_fills_gaps_and_ors_explicit() {
        let mut a = track("musicbrainz", 0.95);
        a.isrc = None;
        a.duration_ms = None;
        let mut b = track("spotify", 0.8);
        b.isrc = Some("GBAYK9700004".to_string());
        b.duration_ms = Some(305_000);
        b.explicit = true;

        let merged = merge_tracks(vec![a, b]).unwrap();
        assert_eq!(merged.isrc.as_deref(), Some("GBAYK9700004"));
        assert_eq!(merged.duration_ms, Some(305_000));
        assert!(merged.explicit);
        assert_eq!(merged.sources.len(), 2);
        assert!((merged.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn artist_merge_unions_aliases() {
        let mut a = artist("musicbrainz", 0.95);
        a.aliases = vec!["Bjork".to_string()];
        a.country = Some("IS".to_string());
        let mut b = artist("deezer", 0.85);
        b.aliases = vec!["BJÖRK".to_string(), "Björk Guðmundsdóttir".to_string()];
        b.sort_name = Some("Björk".to_string());

        let merged = merge_artists(vec![a, b]).unwrap();
        // "BJÖRK" normalizes to "bjork", same as the base alias.
        assert_eq!(merged.aliases, vec!["Bjork", "Björk Guðmundsdóttir"]);
        assert_eq!(merged.country.as_deref(), Some("IS"));
        assert_eq!(merged.sort_name.as_deref(), Some("Björk"));
        assert_eq!(merged.sources.len(), 2);
    }
}
