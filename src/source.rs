// Stereux Core - Sliding-window playlist engine for the Stereux player
// Copyright (C) 2025 Stereux contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Catalog producers
//!
//! Scraping runs out of band. Whatever produces songs implements
//! `SongSource`; `populate_catalog` feeds the result into the catalog store
//! in one bulk insert.

use crate::error::{PlayerError, Result};
use crate::storage::{CatalogEntry, CatalogStore, Source};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Bulk producer of catalog entries for one source
#[async_trait]
pub trait SongSource: Send + Sync {
    fn source(&self) -> Source;

    /// Zero or more entries, not yet inserted
    async fn fetch_songs(&self) -> Result<Vec<CatalogEntry>>;
}

/// Songs exported by a scraper as a JSON array
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    source: Source,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>, source: Source) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SongSource for JsonFileSource {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_songs(&self) -> Result<Vec<CatalogEntry>> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        let songs: Vec<CatalogEntry> = serde_json::from_str(&json)?;

        songs
            .into_iter()
            .map(|mut song| {
                if song.source != self.source {
                    return Err(PlayerError::ConfigurationError(format!(
                        "'{}' belongs to {:?}, expected {:?}",
                        song.display_name(),
                        song.source,
                        self.source
                    )));
                }
                // Ids and local files belong to the catalog that imports the song
                song.id = None;
                song.local_media_path = None;
                song.local_artwork_path = None;
                Ok(song)
            })
            .collect()
    }
}

/// Insert everything a source produces, optionally replacing the catalog
///
/// Returns the number of inserted songs. A replacing import that fails keeps
/// the previous catalog.
pub async fn populate_catalog(
    store: &dyn CatalogStore,
    source: &dyn SongSource,
    replace: bool,
) -> Result<u64> {
    let songs = source.fetch_songs().await?;

    let inserted = if replace {
        store.replace_all(&songs).await?
    } else {
        store.insert_many(&songs).await?
    };
    tracing::info!(source = ?source.source(), inserted, replace, "catalog populated");
    Ok(inserted)
}
