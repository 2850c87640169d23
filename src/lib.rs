//! Harmonia resolves music identifiers into harmonized metadata.
//!
//! Given a GTIN barcode, an ISRC, a catalog page URL or a free-text query,
//! the [`LookupCoordinator`] fans out to the configured catalog providers
//! (MusicBrainz, Deezer, Spotify), merges what they return into a single
//! harmonized entity with full provenance, and caches the result under a
//! content-addressed fingerprint.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use harmonia::cache::MemorySnapshotStore;
//! use harmonia::coordinator::{LookupCoordinator, LookupOptions};
//! use harmonia::registry::{ProviderRegistry, SharedRegistry};
//!
//! # async fn run() -> harmonia::Result<()> {
//! let config = harmonia::config::load(std::path::Path::new("harmonia.toml"))?;
//! let registry = SharedRegistry::new(ProviderRegistry::from_config(&config)?);
//! let coordinator = LookupCoordinator::new(
//!     registry,
//!     Arc::new(MemorySnapshotStore::new()),
//!     &config,
//! );
//!
//! let release = coordinator
//!     .lookup_by_gtin("602-445-790920", &LookupOptions::default())
//!     .await?;
//! println!("{} ({} sources)", release.title, release.sources.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ids;
pub mod limiter;
pub mod merge;
pub mod model;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;

pub use coordinator::{LookupCoordinator, LookupOptions};
pub use error::{Error, Result};
pub use model::{HarmonizedArtist, HarmonizedRelease, HarmonizedTrack};
pub use provider::{CatalogProvider, ProviderInfo};
pub use registry::{ProviderRegistry, SharedRegistry};
