//! Snapshot cache for resolved lookups.
//!
//! Every lookup is identified by a content-addressed fingerprint over the
//! request kind, the normalized request value and the sorted set of providers
//! consulted. The coordinator stores the merged result under that
//! fingerprint and serves repeats from the snapshot until it expires.
//!
//! [`SnapshotStore`] is the seam; [`MemorySnapshotStore`] is the in-process
//! implementation. A persistent store can be slotted in without touching the
//! coordinator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;

/// What kind of request a fingerprint covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Gtin,
    Isrc,
    Url,
    Query,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtin => "gtin",
            Self::Isrc => "isrc",
            Self::Url => "url",
            Self::Query => "query",
        }
    }
}

/// Content-addressed key for a lookup: hex SHA-256 over the request kind,
/// the normalized value, and the sorted provider names. Same request against
/// the same provider set always lands on the same snapshot.
pub fn fingerprint(kind: RequestKind, value: &str, providers: &[&str]) -> String {
    let mut names: Vec<&str> = providers.to_vec();
    names.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(value.as_bytes());
    for name in names {
        hasher.update([0]);
        hasher.update(name.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A cached lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The merged entity (or search result list), serialized.
    pub payload: serde_json::Value,
    pub stored_at: DateTime<Utc>,
}

/// Storage seam for snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch a live snapshot. Expired entries are reported as absent.
    async fn get(&self, fingerprint: &str) -> Result<Option<Snapshot>>;

    /// Store a snapshot under `fingerprint` for `ttl`.
    async fn set(&self, fingerprint: &str, snapshot: Snapshot, ttl: Duration) -> Result<()>;
}

struct Entry {
    snapshot: Snapshot,
    expires_at: Instant,
}

/// In-process snapshot store with per-entry TTLs.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: DashMap<String, Entry>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<Snapshot>> {
        // The read guard must drop before the remove below; holding both
        // deadlocks on the shard lock.
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.snapshot.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!(fingerprint, "evicting expired snapshot");
            self.entries.remove(fingerprint);
        }
        Ok(None)
    }

    async fn set(&self, fingerprint: &str, snapshot: Snapshot, ttl: Duration) -> Result<()> {
        self.entries.insert(
            fingerprint.to_string(),
            Entry {
                snapshot,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
