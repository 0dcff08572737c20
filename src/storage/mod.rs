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


//! Database storage and models
//!
//! This module holds the song catalog in SQLite via sqlx and exposes it to the
//! rest of the crate through the `CatalogStore` trait.
//!
//! # Database Schema
//! - Songs: one row per scraped song, plus the local paths of its downloaded
//!   media and artwork once materialized
//!
//! # Usage Example
//! ```no_run
//! use stereux_core::storage::{CatalogStore, Database, CatalogEntry, Source};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./songs.db").await?;
//!
//! let song = CatalogEntry::new(
//!     Source::Ncs,
//!     "Sky High",
//!     "Elektronomia",
//!     "https://ncs.io/track/download/sky-high",
//!     "https://ncs.io/skyhigh",
//! );
//! let id = db.insert(&song).await?;
//! let stored = db.get_by_id(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

// Re-export commonly used types
pub use catalog::CatalogStore;
pub use database::Database;
pub use models::{CatalogEntry, SongRow, Source};
