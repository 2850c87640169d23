//! Concrete catalog provider implementations.
//!
//! - [`musicbrainz`] -- the MusicBrainz open registry (WS/2 JSON API).
//! - [`deezer`] -- the Deezer public API.
//! - [`spotify`] -- the Spotify Web API (bearer-token auth).
//!
//! All of them share the HTTP plumbing in [`client`]: a `reqwest` client
//! composed with the per-provider request budget and retry policy.

pub mod client;
pub mod deezer;
pub mod musicbrainz;
pub mod spotify;

pub use deezer::DeezerProvider;
pub use musicbrainz::MusicBrainzProvider;
pub use spotify::SpotifyProvider;

use crate::ids::normalize_string;

/// Minimal percent-encoding for query parameter values.
pub(crate) fn urlencode(s: &str) -> String {
    const HEX: [u8; 16] = *b"0123456789ABCDEF";

    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

/// UPC form of a normalized GTIN-14: the last 12 digits.
///
/// UPC-A codes legitimately start with zeroes, so only the GTIN-14 packaging
/// prefix may be dropped, never every leading zero.
pub(crate) fn upc_form(gtin: &str) -> &str {
    if gtin.len() > 12 {
        &gtin[gtin.len() - 12..]
    } else {
        gtin
    }
}

/// Score how well a search result title matches the query, on the normalized
/// forms. Exact matches score high; loose containment still beats an
/// unrelated title so provider ordering can break ties.
pub(crate) fn search_confidence(query: &str, title: &str) -> f64 {
    let query = normalize_string(query);
    let title = normalize_string(title);

    if query.is_empty() || title.is_empty() {
        return 0.1;
    }
    if query == title {
        0.9
    } else if title.contains(&query) {
        0.7
    } else if query.contains(&title) {
        0.6
    } else {
        0.4
    }
}
