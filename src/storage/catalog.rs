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


//! Catalog store contract
//!
//! The playlist and the materializer only see the catalog through this trait,
//! so tests and alternative backends can stand in for SQLite. Random sampling
//! is not part of the contract: callers draw ids from `[1, highest_id]`.

use crate::error::{PlayerError, Result};
use crate::storage::models::CatalogEntry;
use crate::storage::{queries, Database};
use async_trait::async_trait;
use std::path::Path;

/// Durable table of catalog entries
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Highest assigned id; `EmptyCatalog` when there are no rows
    async fn highest_id(&self) -> Result<i64>;

    /// Entry by id; `RecordNotFound` on a miss
    async fn get_by_id(&self, id: i64) -> Result<CatalogEntry>;

    /// Insert one entry, returning its id
    async fn insert(&self, entry: &CatalogEntry) -> Result<i64>;

    /// Insert many entries, returning how many were inserted
    async fn insert_many(&self, entries: &[CatalogEntry]) -> Result<u64>;

    /// Persist the materialized files of an entry
    async fn record_local_paths(
        &self,
        id: i64,
        artwork_path: Option<&Path>,
        media_path: &Path,
    ) -> Result<()>;

    /// Delete an entry, returning whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Remove every entry
    async fn truncate(&self) -> Result<u64>;

    /// Replace every entry with `entries` atomically, returning how many were
    /// inserted
    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<u64>;
}

#[async_trait]
impl CatalogStore for Database {
    async fn highest_id(&self) -> Result<i64> {
        queries::highest_id(self.pool())
            .await?
            .ok_or(PlayerError::EmptyCatalog)
    }

    async fn get_by_id(&self, id: i64) -> Result<CatalogEntry> {
        queries::find_song_by_id(self.pool(), id)
            .await?
            .ok_or_else(|| PlayerError::not_found(format!("song {}", id)))
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<i64> {
        queries::insert_song(self.pool(), entry).await
    }

    async fn insert_many(&self, entries: &[CatalogEntry]) -> Result<u64> {
        queries::insert_songs(self.pool(), entries).await
    }

    async fn record_local_paths(
        &self,
        id: i64,
        artwork_path: Option<&Path>,
        media_path: &Path,
    ) -> Result<()> {
        queries::record_local_paths(self.pool(), id, artwork_path, media_path).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        queries::delete_song(self.pool(), id).await
    }

    async fn truncate(&self) -> Result<u64> {
        queries::truncate_songs(self.pool()).await
    }

    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<u64> {
        queries::replace_songs(self.pool(), entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Source;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_store_contract_on_database() {
        let store: Arc<dyn CatalogStore> = Arc::new(Database::new_in_memory().await.unwrap());

        assert!(matches!(store.highest_id().await, Err(PlayerError::EmptyCatalog)));

        let entry = CatalogEntry::new(Source::Ncs, "Mortals", "Warriyo", "/m/1.mp3", "/song/1");
        let id = store.insert(&entry).await.unwrap();
        assert_eq!(store.highest_id().await.unwrap(), id);
        assert_eq!(store.get_by_id(id).await.unwrap().title, "Mortals");

        assert!(matches!(store.get_by_id(id + 1).await, Err(PlayerError::RecordNotFound(_))));

        assert!(store.delete(id).await.unwrap());
        assert_eq!(store.insert_many(&[entry.clone(), entry]).await.unwrap(), 2);
        assert_eq!(store.truncate().await.unwrap(), 2);

        assert_eq!(store.replace_all(&[mortals()]).await.unwrap(), 1);
        assert_eq!(store.highest_id().await.unwrap(), 1);
    }

    fn mortals() -> CatalogEntry {
        CatalogEntry::new(Source::Ncs, "Mortals", "Warriyo", "/m/1.mp3", "/song/1")
    }
}
