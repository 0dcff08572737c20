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


//! Entry materializer
//!
//! Downloads the media file and artwork of one catalog entry into its own
//! directory and records the resulting paths in the catalog:
//!
//! ```text
//! <data_root>/<id>/<id>.<media ext>
//! <data_root>/<id>/<id>.<artwork ext>
//! ```
//!
//! The two transfers run as separate tasks. Network concurrency across all
//! entries is bounded by one shared semaphore. A transfer still waiting for a
//! permit starts without one once its entry is prioritized, so the entry being
//! played never queues behind prefetch work.
//!
//! Each transfer writes to a `.part` file unique to its generation and renames
//! it into place on success. A file at the final path is always complete.

use crate::config::PlayerConfig;
use crate::download::progress::{ProgressCallback, ProgressSink, TransferKind};
use crate::download::tracker::{InFlight, LocalFiles, TransferHandle};
use crate::download::transfer::{resolve_url, Transfer};
use crate::error::{PlayerError, Result};
use crate::storage::{CatalogEntry, CatalogStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use url::Url;

const DEFAULT_MEDIA_EXT: &str = "mp3";
const DEFAULT_ARTWORK_EXT: &str = "jpg";

/// Result of a materialization
#[derive(Debug)]
pub struct MaterializeOutcome {
    /// The entry with its local paths set
    pub entry: CatalogEntry,

    /// Whether anything was downloaded
    pub fetched: bool,

    /// Set when the files exist but the catalog write failed
    pub warning: Option<PlayerError>,
}

pub struct EntryMaterializer {
    store: Arc<dyn CatalogStore>,
    transfer: Arc<dyn Transfer>,
    data_root: PathBuf,
    base_url: Url,
    semaphore: Arc<Semaphore>,
    generation: AtomicU64,
}

impl EntryMaterializer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        transfer: Arc<dyn Transfer>,
        data_root: impl Into<PathBuf>,
        base_url: Url,
        max_concurrent_transfers: usize,
    ) -> Self {
        Self {
            store,
            transfer,
            data_root: data_root.into(),
            base_url,
            semaphore: Arc::new(Semaphore::new(max_concurrent_transfers.max(1))),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(
        store: Arc<dyn CatalogStore>,
        transfer: Arc<dyn Transfer>,
        config: &PlayerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            store,
            transfer,
            config.data_root.clone(),
            config.base_url()?,
            config.max_concurrent_transfers,
        ))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Directory holding the files of one entry
    pub fn entry_dir(&self, id: i64) -> PathBuf {
        self.data_root.join(id.to_string())
    }

    /// Materialize an entry and wait for it
    ///
    /// An entry whose files are already on disk is returned as-is without any
    /// transfer.
    pub async fn materialize(
        &self,
        entry: &CatalogEntry,
        progress: Option<ProgressCallback>,
    ) -> Result<MaterializeOutcome> {
        if entry.is_materialized().await {
            tracing::debug!(id = ?entry.id, "already materialized");
            return Ok(MaterializeOutcome {
                entry: entry.clone(),
                fetched: false,
                warning: None,
            });
        }

        let mut in_flight = self.start(entry, progress).await?;
        let files = in_flight.wait().await?;
        Ok(self.commit(entry, files).await)
    }

    /// Wipe the entry directory and spawn both transfers
    ///
    /// Returns as soon as the tasks are spawned. Failures to prepare the
    /// transfers are reported as `MaterializationFailed`.
    pub async fn start(
        &self,
        entry: &CatalogEntry,
        progress: Option<ProgressCallback>,
    ) -> Result<InFlight> {
        let id = entry.require_id()?;
        self.prepare(id, entry, progress)
            .await
            .map_err(|e| match e {
                e @ PlayerError::MaterializationFailed { .. } => e,
                other => PlayerError::materialization_failed(id, other),
            })
    }

    async fn prepare(
        &self,
        id: i64,
        entry: &CatalogEntry,
        progress: Option<ProgressCallback>,
    ) -> Result<InFlight> {
        let media_url = resolve_url(&self.base_url, &entry.media_url)?;
        let artwork_url = match &entry.artwork_url {
            Some(raw) if entry.has_artwork() => Some(resolve_url(&self.base_url, raw)?),
            _ => None,
        };

        let dir = self.entry_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(id, dir = %dir.display(), "removed previous entry directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dir).await?;

        let media_path = dir.join(file_name(id, &media_url, DEFAULT_MEDIA_EXT));
        let artwork_path = artwork_url
            .as_ref()
            .map(|url| dir.join(file_name(id, url, DEFAULT_ARTWORK_EXT)));

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (urgent, _) = watch::channel(false);
        let media = self.spawn_transfer(
            media_url,
            media_path.clone(),
            progress
                .clone()
                .map(|cb| ProgressSink::new(id, TransferKind::Media, cb)),
            generation,
            urgent.subscribe(),
        );
        let artwork = match (artwork_url, &artwork_path) {
            (Some(url), Some(path)) => Some(self.spawn_transfer(
                url,
                path.clone(),
                progress.map(|cb| ProgressSink::new(id, TransferKind::Artwork, cb)),
                generation,
                urgent.subscribe(),
            )),
            _ => None,
        };

        let in_flight = InFlight::new(
            id,
            media,
            artwork,
            LocalFiles {
                media_path,
                artwork_path,
            },
        );
        Ok(in_flight.with_urgency(urgent))
    }

    fn spawn_transfer(
        &self,
        url: Url,
        destination: PathBuf,
        progress: Option<ProgressSink>,
        generation: u64,
        urgent: watch::Receiver<bool>,
    ) -> TransferHandle {
        let transfer = self.transfer.clone();
        let semaphore = self.semaphore.clone();
        let partial = partial_path(&destination, generation);

        tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = semaphore.acquire_owned() => Some(
                    permit.map_err(|_| PlayerError::invariant("transfer semaphore closed"))?,
                ),
                true = prioritized(urgent) => None,
            };
            let written = transfer.fetch(&url, &partial, progress).await?;
            tokio::fs::rename(&partial, &destination).await?;
            Ok(written)
        })
    }

    /// Apply finished files to an entry and persist them
    ///
    /// Never fails: a catalog write error becomes the outcome's warning.
    pub async fn commit(&self, entry: &CatalogEntry, files: LocalFiles) -> MaterializeOutcome {
        let warning = match entry.id {
            Some(id) => {
                let persisted = self
                    .store
                    .record_local_paths(id, files.artwork_path.as_deref(), &files.media_path)
                    .await;
                match persisted {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(id, error = %e, "local paths not persisted");
                        Some(PlayerError::PersistenceWarning {
                            id,
                            message: e.to_string(),
                        })
                    }
                }
            }
            None => None,
        };

        let mut entry = entry.clone();
        entry.local_media_path = Some(files.media_path);
        entry.local_artwork_path = files.artwork_path;

        tracing::info!(id = ?entry.id, song = %entry.display_name(), "materialized");

        MaterializeOutcome {
            entry,
            fetched: true,
            warning,
        }
    }
}

/// `<destination>.<generation>.part`
fn partial_path(destination: &Path, generation: u64) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(format!(".{}.part", generation));
    PathBuf::from(name)
}

/// Resolves once the entry is prioritized; `false` if its switch is gone
async fn prioritized(mut urgent: watch::Receiver<bool>) -> bool {
    urgent.wait_for(|now| *now).await.is_ok()
}

/// Delete every entry directory under `data_root`, returning how many
///
/// Only directories named by a catalog id are touched; anything else in the
/// data root (such as the catalog database) stays.
pub async fn purge_entry_dirs(data_root: &Path) -> Result<usize> {
    let mut dirs = match tokio::fs::read_dir(data_root).await {
        Ok(dirs) => dirs,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(dir) = dirs.next_entry().await? {
        let is_entry = dir.file_name().to_str().map_or(false, |name| name.parse::<i64>().is_ok());
        if is_entry && dir.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(dir.path()).await?;
            removed += 1;
        }
    }

    tracing::info!(removed, root = %data_root.display(), "entry directories purged");
    Ok(removed)
}

/// `<id>.<ext>`, the extension taken from the last path segment of the URL
fn file_name(id: i64, url: &Url, default_ext: &str) -> String {
    let ext = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| default_ext.to_string());

    format!("{}.{}", id, ext)
}
