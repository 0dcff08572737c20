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


//! Transfer progress tracking and reporting
//!
//! Progress is reported through a callback handed to each operation by its
//! caller. There is no process-wide progress state: two materializations
//! running at once report through whatever callbacks their callers passed.
//!
//! # Progress Information
//! - Song id and which file (media or artwork)
//! - Bytes downloaded / total bytes (0 if the server sent no length)
//! - Percentage complete and average speed
//! - Transfer state

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which of the two files of a song is being transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    Media,
    Artwork,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Media => "media",
            TransferKind::Artwork => "artwork",
        }
    }
}

/// Lifecycle of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Request sent, waiting for the body
    Connecting,
    /// Receiving bytes
    Downloading,
    /// File fully written
    Completed,
    /// Transfer failed
    Failed,
}

/// Progress snapshot for a single transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Catalog id of the song
    pub entry_id: i64,

    pub kind: TransferKind,

    /// Bytes downloaded so far
    pub bytes_downloaded: u64,

    /// Total bytes to download (0 if unknown)
    pub total_bytes: u64,

    /// Percentage complete (0.0 - 100.0)
    pub percent_complete: f64,

    /// Average speed in bytes per second
    pub download_speed: f64,

    pub state: TransferState,
}

impl TransferProgress {
    pub fn new(entry_id: i64, kind: TransferKind, total_bytes: u64) -> Self {
        Self {
            entry_id,
            kind,
            bytes_downloaded: 0,
            total_bytes,
            percent_complete: 0.0,
            download_speed: 0.0,
            state: TransferState::Connecting,
        }
    }

    /// Calculate percentage from bytes
    pub fn calculate_percentage(&mut self) {
        if self.total_bytes > 0 {
            self.percent_complete =
                (self.bytes_downloaded as f64 / self.total_bytes as f64 * 100.0).min(100.0);
        } else {
            self.percent_complete = 0.0;
        }
    }

    /// Format progress as display string
    pub fn display_string(&self) -> String {
        match self.state {
            TransferState::Connecting => {
                format!("song {} {}: connecting", self.entry_id, self.kind.as_str())
            }
            TransferState::Downloading => format!(
                "song {} {}: {:.1}% ({:.1} MB) - {:.1} MB/s",
                self.entry_id,
                self.kind.as_str(),
                self.percent_complete,
                self.bytes_downloaded as f64 / 1_000_000.0,
                self.download_speed / 1_000_000.0
            ),
            TransferState::Completed => {
                format!("song {} {}: completed", self.entry_id, self.kind.as_str())
            }
            TransferState::Failed => {
                format!("song {} {}: failed", self.entry_id, self.kind.as_str())
            }
        }
    }
}

/// Callback type for progress updates
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Throttles progress callbacks for one transfer
#[derive(Debug)]
pub struct ProgressTracker {
    progress: TransferProgress,

    start_time: Instant,

    /// Last time a callback was allowed
    last_update: Instant,

    /// Minimum interval between progress callbacks
    update_interval: Duration,
}

impl ProgressTracker {
    pub fn new(entry_id: i64, kind: TransferKind, total_bytes: u64) -> Self {
        let now = Instant::now();
        Self {
            progress: TransferProgress::new(entry_id, kind, total_bytes),
            start_time: now,
            last_update: now,
            update_interval: Duration::from_millis(200),
        }
    }

    pub fn with_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    /// Update progress with a new position
    ///
    /// Returns true if enough time has passed and the callback should run.
    pub fn update(&mut self, bytes_downloaded: u64) -> bool {
        self.progress.state = TransferState::Downloading;
        self.progress.bytes_downloaded = bytes_downloaded;
        self.progress.calculate_percentage();

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.progress.download_speed = bytes_downloaded as f64 / elapsed;
        }

        let now = Instant::now();
        if now.duration_since(self.last_update) >= self.update_interval {
            self.last_update = now;
            true
        } else {
            false
        }
    }

    /// Mark the transfer finished; the final snapshot is always reported
    pub fn finish(&mut self, bytes_downloaded: u64) -> TransferProgress {
        self.update(bytes_downloaded);
        if self.progress.total_bytes == 0 {
            self.progress.total_bytes = bytes_downloaded;
        }
        self.progress.percent_complete = 100.0;
        self.progress.state = TransferState::Completed;
        self.progress.clone()
    }

    pub fn fail(&mut self) -> TransferProgress {
        self.progress.state = TransferState::Failed;
        self.progress.clone()
    }

    /// Get a cloned progress snapshot
    pub fn snapshot(&self) -> TransferProgress {
        self.progress.clone()
    }
}

/// Where one transfer reports to: the callback plus the labels it reports under
#[derive(Clone)]
pub struct ProgressSink {
    pub entry_id: i64,
    pub kind: TransferKind,
    pub callback: ProgressCallback,
}

impl ProgressSink {
    pub fn new(entry_id: i64, kind: TransferKind, callback: ProgressCallback) -> Self {
        Self { entry_id, kind, callback }
    }

    pub fn tracker(&self, total_bytes: u64) -> ProgressTracker {
        ProgressTracker::new(self.entry_id, self.kind, total_bytes)
    }

    pub fn emit(&self, progress: TransferProgress) {
        (self.callback)(progress);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("entry_id", &self.entry_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
