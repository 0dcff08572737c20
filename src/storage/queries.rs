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


//! Database query functions
//!
//! Repository functions over the `Songs` table. All of them take the pool
//! explicitly; `Database` wraps them behind the `CatalogStore` trait.
//!
//! # Query Patterns
//! - Async/await for all database operations
//! - Rows are read as `SongRow` and converted to `CatalogEntry`
//! - Bulk inserts run in a single transaction

use crate::error::{PlayerError, Result};
use crate::storage::models::{CatalogEntry, SongRow};
use chrono::NaiveDateTime;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;

// ============================================================================
// SONG QUERIES
// ============================================================================

const INSERT_SONG: &str = r#"
    INSERT INTO Songs (
        source, title, creators, genre, media_url, artwork_url, info_url,
        local_artwork_path, local_media_path
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

fn path_text(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

/// Insert a new song
///
/// Returns the id assigned to the song.
pub async fn insert_song(pool: &SqlitePool, song: &CatalogEntry) -> Result<i64> {
    let result = sqlx::query(INSERT_SONG)
        .bind(song.source.as_i32())
        .bind(&song.title)
        .bind(&song.creators)
        .bind(&song.genre)
        .bind(&song.media_url)
        .bind(&song.artwork_url)
        .bind(&song.info_url)
        .bind(path_text(song.local_artwork_path.as_deref()))
        .bind(path_text(song.local_media_path.as_deref()))
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert many songs in one transaction
///
/// Returns the number of inserted rows. Either all songs are inserted or none.
pub async fn insert_songs(pool: &SqlitePool, songs: &[CatalogEntry]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let inserted = insert_all(&mut tx, songs).await?;
    tx.commit().await?;
    Ok(inserted)
}

/// Swap the whole catalog for `songs` in one transaction
///
/// Ids restart at 1. If any insert fails the previous catalog is kept.
pub async fn replace_songs(pool: &SqlitePool, songs: &[CatalogEntry]) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM Songs").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'Songs'")
        .execute(&mut *tx)
        .await?;
    let inserted = insert_all(&mut tx, songs).await?;

    tx.commit().await?;
    Ok(inserted)
}

async fn insert_all(tx: &mut Transaction<'_, Sqlite>, songs: &[CatalogEntry]) -> Result<u64> {
    let mut inserted = 0u64;

    for song in songs {
        let result = sqlx::query(INSERT_SONG)
            .bind(song.source.as_i32())
            .bind(&song.title)
            .bind(&song.creators)
            .bind(&song.genre)
            .bind(&song.media_url)
            .bind(&song.artwork_url)
            .bind(&song.info_url)
            .bind(path_text(song.local_artwork_path.as_deref()))
            .bind(path_text(song.local_media_path.as_deref()))
            .execute(&mut **tx)
            .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Find song by id
pub async fn find_song_by_id(pool: &SqlitePool, id: i64) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query_as::<_, SongRow>("SELECT * FROM Songs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(CatalogEntry::try_from).transpose()
}

/// Highest id in the table, `None` when empty
pub async fn highest_id(pool: &SqlitePool) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM Songs")
        .fetch_one(pool)
        .await?;

    Ok(id)
}

/// Store the local files of a materialized song
///
/// Fails with `RecordNotFound` if no row has this id.
pub async fn record_local_paths(
    pool: &SqlitePool,
    id: i64,
    artwork_path: Option<&Path>,
    media_path: &Path,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE Songs SET local_artwork_path = ?, local_media_path = ? WHERE id = ?",
    )
    .bind(path_text(artwork_path))
    .bind(path_text(Some(media_path)))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PlayerError::not_found(format!("song {}", id)));
    }

    Ok(())
}

/// Forget the local files of every song (after the data root was wiped)
pub async fn clear_local_paths(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE Songs SET local_artwork_path = NULL, local_media_path = NULL",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a song
pub async fn delete_song(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM Songs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every song and restart ids at 1
///
/// The playlist draws ids uniformly from `[1, MAX(id)]`, so the sequence is
/// reset to keep that range dense after a re-import.
pub async fn truncate_songs(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM Songs").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'Songs'")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Count all songs
pub async fn count_songs(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Songs")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Count songs that have a recorded local media file
pub async fn count_materialized(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM Songs WHERE local_media_path IS NOT NULL AND local_media_path != ''",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Time of the most recent insert, `None` when empty
pub async fn latest_added_at(pool: &SqlitePool) -> Result<Option<NaiveDateTime>> {
    let added: Option<NaiveDateTime> = sqlx::query_scalar("SELECT MAX(added_at) FROM Songs")
        .fetch_one(pool)
        .await?;

    Ok(added)
}
