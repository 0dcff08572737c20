//! Stereux Core
//!
//! Playback queue engine of the Stereux player: a sliding window of random,
//! distinct songs from a SQLite catalog, with media and artwork downloaded in
//! the background so the current song is always playable.
//!
//! # Modules
//! - `storage` - SQLite catalog and the `CatalogStore` trait
//! - `download` - transfers, materializer, per-entry download state
//! - `playlist` - window buffer and navigation
//! - `source` - feeding scraped songs into the catalog
//! - `config` - `PlayerConfig`
//! - `error` - `PlayerError` and `Result`

pub mod config;
pub mod download;
pub mod error;
pub mod playlist;
pub mod source;
pub mod storage;

pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
pub use playlist::{PlaylistManager, PlaylistWindow};
pub use storage::{CatalogEntry, CatalogStore, Database, Source};
