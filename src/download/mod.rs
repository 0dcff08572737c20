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


//! Downloading catalog entries to local disk
//!
//! - `transfer` - one URL into one file (reqwest streaming)
//! - `progress` - per-transfer progress snapshots and throttling
//! - `materializer` - media and artwork of an entry, fetched concurrently
//! - `tracker` - per-entry NotStarted / InProgress / Complete bookkeeping

pub mod materializer;
pub mod progress;
pub mod tracker;
pub mod transfer;

// Re-export commonly used types
pub use materializer::{purge_entry_dirs, EntryMaterializer, MaterializeOutcome};
pub use progress::{ProgressCallback, ProgressSink, TransferKind, TransferProgress, TransferState};
pub use tracker::{DownloadState, DownloadStatus, DownloadTracker, InFlight, LocalFiles};
pub use transfer::{resolve_url, HttpTransfer, Transfer};
