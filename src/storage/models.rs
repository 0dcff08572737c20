//! Database models for Stereux Core
//!
//! # SQLite Adaptations
//! - `Source` stored as an integer tag
//! - Local paths stored as TEXT, NULL until the song has been materialized
//! - `added_at` stored as TEXT in ISO 8601 format
//!
//! `SongRow` is the raw row shape; everything outside the storage module works
//! with the typed `CatalogEntry`.

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

// ============================================================================
// ENUMS
// ============================================================================

/// Site a catalog entry was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Source {
    /// NoCopyrightSounds
    Ncs = 1,
}

impl Source {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Source::Ncs),
            other => Err(PlayerError::invariant(format!("unknown song source tag {}", other))),
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// CATALOG ENTRY
// ============================================================================

/// One playable song
///
/// Identity for de-duplication is `(title, creators)`, not `id`: the same
/// track scraped from two pages is a duplicate even though it owns two rows.
/// `PartialEq`, `Eq`, `Hash` and `Ord` all follow that rule. Use `id` when a
/// stable key is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Assigned by the catalog store; `None` before insertion
    #[serde(default)]
    pub id: Option<i64>,
    pub source: Source,
    pub title: String,
    /// Artist or artists, free text
    pub creators: String,
    #[serde(default)]
    pub genre: Option<String>,
    /// Link to the media file
    pub media_url: String,
    /// Link to the cover image; `None` means the default artwork is shown
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// Page with more information about the song
    pub info_url: String,
    #[serde(default)]
    pub local_media_path: Option<PathBuf>,
    #[serde(default)]
    pub local_artwork_path: Option<PathBuf>,
}

impl CatalogEntry {
    /// Create a not-yet-inserted entry
    pub fn new(
        source: Source,
        title: impl Into<String>,
        creators: impl Into<String>,
        media_url: impl Into<String>,
        info_url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            source,
            title: title.into(),
            creators: creators.into(),
            genre: None,
            media_url: media_url.into(),
            artwork_url: None,
            info_url: info_url.into(),
            local_media_path: None,
            local_artwork_path: None,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_artwork_url(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }

    /// Id of an inserted entry
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| PlayerError::MissingId(self.display_name()))
    }

    /// Whether `other` counts as the same song
    pub fn is_duplicate_of(&self, other: &CatalogEntry) -> bool {
        self == other
    }

    /// "Creators - Title"
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.creators, self.title)
    }

    pub fn has_artwork(&self) -> bool {
        self.artwork_url.as_deref().map_or(false, |u| !u.trim().is_empty())
    }

    /// Artwork to show: the local file if there is one, otherwise `default`
    pub fn artwork_or<'a>(&'a self, default: &'a Path) -> &'a Path {
        self.local_artwork_path.as_deref().unwrap_or(default)
    }

    /// Whether every file this entry needs is present on disk
    ///
    /// Media must exist; artwork only counts when the entry has an artwork URL.
    pub async fn is_materialized(&self) -> bool {
        let media_ok = match &self.local_media_path {
            Some(path) => is_file(path).await,
            None => false,
        };
        if !media_ok {
            return false;
        }
        if !self.has_artwork() {
            return true;
        }
        match &self.local_artwork_path {
            Some(path) => is_file(path).await,
            None => false,
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

impl PartialEq for CatalogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.creators == other.creators
    }
}

impl Eq for CatalogEntry {}

impl Hash for CatalogEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
        self.creators.hash(state);
    }
}

impl PartialOrd for CatalogEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CatalogEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.title
            .cmp(&other.title)
            .then_with(|| self.creators.cmp(&other.creators))
    }
}

// ============================================================================
// ROWS
// ============================================================================

/// Raw `Songs` row
#[derive(Debug, Clone, FromRow)]
pub struct SongRow {
    pub id: i64,
    pub source: i32,
    pub title: String,
    pub creators: String,
    pub genre: Option<String>,
    pub media_url: String,
    pub artwork_url: Option<String>,
    pub info_url: String,
    pub local_artwork_path: Option<String>,
    pub local_media_path: Option<String>,
    pub added_at: String,
}

impl TryFrom<SongRow> for CatalogEntry {
    type Error = PlayerError;

    fn try_from(row: SongRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.id),
            source: Source::from_i32(row.source)?,
            title: row.title,
            creators: row.creators,
            genre: row.genre,
            media_url: row.media_url,
            artwork_url: row.artwork_url,
            info_url: row.info_url,
            local_media_path: non_empty_path(row.local_media_path),
            local_artwork_path: non_empty_path(row.local_artwork_path),
        })
    }
}

fn non_empty_path(value: Option<String>) -> Option<PathBuf> {
    value.filter(|s| !s.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, creators: &str) -> CatalogEntry {
        CatalogEntry::new(Source::Ncs, title, creators, "https://x/a.mp3", "https://x/a")
    }

    #[test]
    fn test_duplicates_ignore_id_and_urls() {
        let mut a = entry("Blank", "Disfigure");
        a.id = Some(1);
        let mut b = entry("Blank", "Disfigure");
        b.id = Some(7);
        b.media_url = "https://y/other.mp3".into();

        assert!(a.is_duplicate_of(&b));
        assert_eq!(a, b);
        assert_ne!(a, entry("Blank", "Someone Else"));
    }

    #[test]
    fn test_ordering_by_title_then_creators() {
        let mut songs = vec![entry("B", "a"), entry("A", "z"), entry("A", "b")];
        songs.sort();
        let keys: Vec<_> = songs.iter().map(|s| (s.title.as_str(), s.creators.as_str())).collect();
        assert_eq!(keys, vec![("A", "b"), ("A", "z"), ("B", "a")]);
    }

    #[test]
    fn test_row_conversion() {
        let row = SongRow {
            id: 4,
            source: 1,
            title: "Invincible".into(),
            creators: "DEAF KEV".into(),
            genre: Some("Dubstep".into()),
            media_url: "https://x/4.mp3".into(),
            artwork_url: None,
            info_url: "https://x/4".into(),
            local_artwork_path: Some(String::new()),
            local_media_path: Some("/tmp/4/4.mp3".into()),
            added_at: "2025-01-01T00:00:00Z".into(),
        };
        let song = CatalogEntry::try_from(row).unwrap();
        assert_eq!(song.id, Some(4));
        assert_eq!(song.local_artwork_path, None);
        assert_eq!(song.local_media_path, Some(PathBuf::from("/tmp/4/4.mp3")));
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(Source::from_i32(9).is_err());
    }

    #[tokio::test]
    async fn test_is_materialized_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("1.mp3");
        let mut song = entry("Fade", "Alan Walker");
        song.local_media_path = Some(media.clone());
        assert!(!song.is_materialized().await);

        tokio::fs::write(&media, b"id3").await.unwrap();
        assert!(song.is_materialized().await);

        // Artwork becomes mandatory once there is a URL for it
        song.artwork_url = Some("https://x/1.jpg".into());
        assert!(!song.is_materialized().await);
    }
}
