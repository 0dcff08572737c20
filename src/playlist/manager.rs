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


//! Playlist window manager
//!
//! Owns the window, the download tracker and the random draw. Every method
//! that changes state takes `&mut self`: there is exactly one writer, and
//! callers that share a manager put it behind a `tokio::sync::Mutex`, which
//! queues navigation requests instead of interleaving them.
//!
//! Background materializations only run transfers. Their results are picked
//! up (reaped) at the start of the next operation, applied to the window by
//! id and recorded in the tracker. Evicting an entry aborts its transfers;
//! if the same id is drawn again, its new transfers start only after the
//! aborted ones are gone.
//!
//! The current entry never waits on other entries: its transfers skip the
//! shared concurrency bound as soon as it becomes current.
//!
//! # Usage Example
//! ```no_run
//! use std::sync::Arc;
//! use stereux_core::config::PlayerConfig;
//! use stereux_core::download::{EntryMaterializer, HttpTransfer};
//! use stereux_core::playlist::PlaylistManager;
//! use stereux_core::storage::{CatalogStore, Database};
//!
//! # async fn example() -> stereux_core::Result<()> {
//! let config = PlayerConfig::default();
//! let store: Arc<dyn CatalogStore> = Arc::new(Database::new(&config.database_path).await?);
//! let transfer = Arc::new(HttpTransfer::from_config(&config)?);
//! let materializer = EntryMaterializer::from_config(store.clone(), transfer, &config)?;
//!
//! let mut playlist = PlaylistManager::new(store, materializer, &config).await?;
//! playlist.prefetch_neighbors().await?;
//!
//! let now_playing = playlist.current_entry().await?;
//! let up_next = playlist.advance().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::PlayerConfig;
use crate::download::{DownloadStatus, DownloadTracker, EntryMaterializer, ProgressCallback};
use crate::error::{PlayerError, Result};
use crate::playlist::window::PlaylistWindow;
use crate::storage::{CatalogEntry, CatalogStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Which end of the window a new entry enters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Front,
    Back,
}

pub struct PlaylistManager {
    store: Arc<dyn CatalogStore>,
    materializer: Arc<EntryMaterializer>,
    window: PlaylistWindow,
    tracker: DownloadTracker,
    highest_id: i64,
    rng: StdRng,
    max_draw_attempts: u32,
    max_materialize_attempts: u32,
    progress: Option<ProgressCallback>,
}

impl PlaylistManager {
    /// Build and fill a window of random, pairwise distinct entries
    ///
    /// Nothing is downloaded here; call `prefetch_neighbors` afterwards.
    pub async fn new(
        store: Arc<dyn CatalogStore>,
        materializer: EntryMaterializer,
        config: &PlayerConfig,
    ) -> Result<Self> {
        Self::with_rng(store, materializer, config, StdRng::from_entropy()).await
    }

    pub async fn with_rng(
        store: Arc<dyn CatalogStore>,
        materializer: EntryMaterializer,
        config: &PlayerConfig,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;

        let highest_id = match store.highest_id().await {
            Ok(id) => id,
            Err(PlayerError::EmptyCatalog) => 0,
            Err(e) => return Err(e),
        };
        if highest_id < 1 {
            return Err(PlayerError::InsufficientCatalog {
                highest_id,
                needed: config.window_capacity,
            });
        }

        let capacity = config.window_capacity.min(highest_id as usize);

        let mut manager = Self {
            store,
            materializer: Arc::new(materializer),
            window: PlaylistWindow::new(capacity),
            tracker: DownloadTracker::new(),
            highest_id,
            rng,
            max_draw_attempts: config.max_draw_attempts,
            max_materialize_attempts: config.max_materialize_attempts,
            progress: None,
        };

        while !manager.window.is_full() {
            let entry = manager.draw_unique().await?;
            manager.window.push_back(entry.clone())?;
            manager.register(&entry).await?;
        }

        tracing::info!(
            capacity,
            highest_id,
            ids = ?manager.window.ids(),
            "playlist window built"
        );

        Ok(manager)
    }

    pub fn window(&self) -> &PlaylistWindow {
        &self.window
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn middle(&self) -> usize {
        self.window.middle()
    }

    pub fn highest_id(&self) -> i64 {
        self.highest_id
    }

    pub fn download_state(&self, id: i64) -> Option<DownloadStatus> {
        self.tracker.status(id)
    }

    /// Ids with a tracker record, sorted
    pub fn tracked_ids(&self) -> Vec<i64> {
        self.tracker.ids()
    }

    /// Callback for progress of every transfer started from now on
    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress = callback;
    }

    /// The entry at the middle of the window, with its files on disk
    ///
    /// Waits only on this entry's own transfers. A failed materialization is
    /// retried up to `max_materialize_attempts` times before the error is
    /// returned.
    pub async fn current_entry(&mut self) -> Result<CatalogEntry> {
        self.reap().await?;

        let entry = self
            .window
            .current()
            .cloned()
            .ok_or_else(|| PlayerError::invariant("playlist window is empty"))?;
        if entry.is_materialized().await {
            return Ok(entry);
        }

        let id = entry.require_id()?;
        if self.tracker.is_complete(id) {
            // Files vanished after completion; refetch without touching the tracker
            tracing::warn!(id, "files of a completed song are missing, fetching again");
            self.tracker.drain_retired(id).await;
            let mut in_flight = self.materializer.start(&entry, self.progress.clone()).await?;
            in_flight.prioritize();
            let files = in_flight.wait().await?;
            let outcome = self.materializer.commit(&entry, files).await;
            self.window.replace(outcome.entry.clone());
            return Ok(outcome.entry);
        }

        self.ensure_ready(id).await
    }

    /// Slide forward: drop the head, draw a new tail, return the new current
    pub async fn advance(&mut self) -> Result<CatalogEntry> {
        self.slide(Edge::Back).await?;
        self.current_entry().await
    }

    /// Slide backward: drop the tail, draw a new head, return the new current
    pub async fn retreat(&mut self) -> Result<CatalogEntry> {
        self.slide(Edge::Front).await?;
        self.current_entry().await
    }

    /// Start background materialization of every waiting entry
    ///
    /// The neighbors of the middle go first, then the rest of the window from
    /// the center outward. Returns how many entries were started.
    pub async fn prefetch_neighbors(&mut self) -> Result<usize> {
        self.reap().await?;

        let mut started = 0;
        for index in self.window.center_out_order() {
            let Some(id) = self.window.get(index).and_then(|e| e.id) else {
                continue;
            };
            if self.tracker.status(id) == Some(DownloadStatus::NotStarted)
                && self.spawn_background(id).await
            {
                started += 1;
            }
        }

        tracing::debug!(started, "prefetch scheduled");
        Ok(started)
    }

    /// Settle every background materialization whose transfers finished
    pub async fn reap(&mut self) -> Result<usize> {
        self.tracker.prune_retired();
        let finished = self.tracker.finished_ids();
        for &id in &finished {
            if let Err(e) = self.settle(id).await {
                if matches!(e, PlayerError::InvariantViolation(_)) {
                    return Err(e);
                }
                tracing::warn!(id, error = %e, "background materialization failed");
            }
        }
        Ok(finished.len())
    }

    async fn slide(&mut self, edge: Edge) -> Result<()> {
        self.reap().await?;

        let evicted = match edge {
            Edge::Back => self.window.pop_front(),
            Edge::Front => self.window.pop_back(),
        }
        .ok_or_else(|| PlayerError::invariant("playlist window is empty"))?;

        let entry = match self.draw_unique().await {
            Ok(entry) => entry,
            Err(e) => {
                // Put the evicted entry back so the window stays full
                match edge {
                    Edge::Back => self.window.push_front(evicted)?,
                    Edge::Front => self.window.push_back(evicted)?,
                }
                return Err(e);
            }
        };

        // A catalog no larger than the window can hand back the evicted entry
        let evicted_id = evicted.id;
        let redrawn = evicted_id.is_some() && evicted_id == entry.id;
        let entry = if redrawn { evicted } else { entry };

        if let (Some(id), false) = (evicted_id, redrawn) {
            if let Some(status) = self.tracker.remove(id) {
                tracing::debug!(id, ?status, "evicted from window");
            }
        }

        match edge {
            Edge::Back => self.window.push_back(entry.clone())?,
            Edge::Front => self.window.push_front(entry.clone())?,
        }

        if !redrawn && !self.register(&entry).await? {
            self.spawn_background(entry.require_id()?).await;
        }
        Ok(())
    }

    /// Track a new window entry; returns whether it is already complete
    async fn register(&mut self, entry: &CatalogEntry) -> Result<bool> {
        let id = entry.require_id()?;
        if entry.is_materialized().await {
            self.tracker.register_complete(id)?;
            Ok(true)
        } else {
            self.tracker.register(id);
            Ok(false)
        }
    }

    /// Random entry not duplicating anything in the window
    ///
    /// Draws uniformly from `[1, highest_id]`. After `max_draw_attempts`
    /// misses it scans every id once from a random offset, and only then
    /// gives up with `InsufficientCatalog`.
    async fn draw_unique(&mut self) -> Result<CatalogEntry> {
        for _ in 0..self.max_draw_attempts {
            let id = self.rng.gen_range(1..=self.highest_id);
            if let Some(entry) = self.try_candidate(id).await? {
                return Ok(entry);
            }
        }

        let start = self.rng.gen_range(0..self.highest_id);
        tracing::debug!(start = start + 1, "random draws exhausted, scanning catalog");
        for offset in 0..self.highest_id {
            let id = (start + offset) % self.highest_id + 1;
            if let Some(entry) = self.try_candidate(id).await? {
                return Ok(entry);
            }
        }

        Err(PlayerError::InsufficientCatalog {
            highest_id: self.highest_id,
            needed: self.window.capacity(),
        })
    }

    async fn try_candidate(&self, id: i64) -> Result<Option<CatalogEntry>> {
        if self.window.contains_id(id) {
            return Ok(None);
        }

        match self.store.get_by_id(id).await {
            Ok(entry) if self.window.contains_duplicate_of(&entry) => {
                tracing::debug!(id, song = %entry.display_name(), "duplicate drawn");
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(PlayerError::RecordNotFound(_)) => {
                tracing::warn!(id, "catalog id within range is missing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Start transfers for a `NotStarted` entry and hand them to the tracker
    async fn start(&mut self, id: i64) -> Result<()> {
        let entry = self
            .window
            .find(id)
            .cloned()
            .ok_or_else(|| PlayerError::invariant(format!("song {} is not in the window", id)))?;

        // An evicted generation of this id must be gone before its files are reused
        self.tracker.drain_retired(id).await;

        match self.materializer.start(&entry, self.progress.clone()).await {
            Ok(in_flight) => {
                if self.window.current().and_then(|e| e.id) == Some(id) {
                    in_flight.prioritize();
                }
                self.tracker.mark_in_progress(id, in_flight)
            }
            Err(e) => {
                self.tracker.mark_failed(id)?;
                Err(e)
            }
        }
    }

    /// Fire-and-forget start; failures leave the entry `NotStarted`
    async fn spawn_background(&mut self, id: i64) -> bool {
        match self.start(id).await {
            Ok(()) => {
                tracing::debug!(id, "background materialization started");
                true
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "could not start background materialization");
                false
            }
        }
    }

    /// Join an in-flight entry and apply the result
    async fn settle(&mut self, id: i64) -> Result<CatalogEntry> {
        let in_flight = self
            .tracker
            .in_flight_mut(id)
            .ok_or_else(|| PlayerError::invariant(format!("song {} is not in flight", id)))?;

        let result = in_flight.wait().await;
        match result {
            Ok(files) => {
                let entry = self.window.find(id).cloned().ok_or_else(|| {
                    PlayerError::invariant(format!("tracked song {} is not in the window", id))
                })?;
                let outcome = self.materializer.commit(&entry, files).await;
                self.window.replace(outcome.entry.clone());
                self.tracker.mark_complete(id)?;
                Ok(outcome.entry)
            }
            Err(e) => {
                let failures = self.tracker.mark_failed(id)?;
                tracing::warn!(id, failures, error = %e, "materialization failed");
                Err(e)
            }
        }
    }

    /// Materialize the given window entry now, retrying on failure
    async fn ensure_ready(&mut self, id: i64) -> Result<CatalogEntry> {
        let mut last_error = None;

        for attempt in 1..=self.max_materialize_attempts {
            if self.tracker.status(id) != Some(DownloadStatus::InProgress) {
                self.tracker.register(id);
                match self.start(id).await {
                    Ok(()) => {}
                    Err(e @ PlayerError::InvariantViolation(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(id, attempt, error = %e, "materialization could not start");
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            if let Some(in_flight) = self.tracker.in_flight_mut(id) {
                in_flight.prioritize();
            }
            match self.settle(id).await {
                Ok(entry) => return Ok(entry),
                Err(e @ PlayerError::InvariantViolation(_)) => return Err(e),
                Err(e) => last_error = Some(e),
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        tracing::error!(id, attempts = self.max_materialize_attempts, %cause, "giving up on song");
        Err(PlayerError::materialization_failed(id, cause))
    }
}
