//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stereux_core::download::{EntryMaterializer, ProgressSink, Transfer};
use stereux_core::{
    CatalogEntry, CatalogStore, Database, PlayerConfig, PlayerError, PlaylistManager, Result,
    Source,
};
use url::Url;

/// In-process transfer: sleeps, then writes the URL as the file body
#[derive(Default)]
pub struct FakeTransfer {
    latency: Duration,
    failures_left: AtomicU32,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    stalls: Mutex<Vec<(String, Duration)>>,
    stalls_finished: AtomicUsize,
}

impl FakeTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Make the next `n` fetches fail after writing a partial file
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// The first fetch whose URL contains `fragment` hangs for `delay`, then
    /// writes a partial file and fails
    pub fn stall_once(&self, fragment: impl Into<String>, delay: Duration) {
        self.stalls.lock().unwrap().push((fragment.into(), delay));
    }

    /// Stalls not yet picked up by a fetch
    pub fn pending_stalls(&self) -> usize {
        self.stalls.lock().unwrap().len()
    }

    /// Stalled fetches that ran to the end instead of being cancelled
    pub fn stalls_finished(&self) -> usize {
        self.stalls_finished.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    fn take_stall(&self, url: &Url) -> Option<Duration> {
        let mut stalls = self.stalls.lock().unwrap();
        let index = stalls.iter().position(|(fragment, _)| url.as_str().contains(fragment.as_str()))?;
        Some(stalls.remove(index).1)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        progress: Option<ProgressSink>,
    ) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let stall = self.take_stall(url);

        tokio::time::sleep(self.latency).await;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
            let _ = tokio::fs::write(destination, b"partial").await;
            self.stalls_finished.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(PlayerError::network_error("stalled connection dropped", true));
        }
        let fail = self.take_failure();

        let result = async {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if fail {
                tokio::fs::write(destination, b"partial").await?;
                return Err(PlayerError::network_error("connection reset", true));
            }

            let body = url.as_str().as_bytes();
            tokio::fs::write(destination, body).await?;
            if let Some(sink) = &progress {
                sink.emit(sink.tracker(body.len() as u64).finish(body.len() as u64));
            }
            Ok(body.len() as u64)
        }
        .await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Store whose `record_local_paths` always fails
pub struct FailingPersistStore {
    inner: Arc<Database>,
}

impl FailingPersistStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CatalogStore for FailingPersistStore {
    async fn highest_id(&self) -> Result<i64> {
        self.inner.highest_id().await
    }

    async fn get_by_id(&self, id: i64) -> Result<CatalogEntry> {
        self.inner.get_by_id(id).await
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<i64> {
        self.inner.insert(entry).await
    }

    async fn insert_many(&self, entries: &[CatalogEntry]) -> Result<u64> {
        self.inner.insert_many(entries).await
    }

    async fn record_local_paths(
        &self,
        _id: i64,
        _artwork_path: Option<&Path>,
        _media_path: &Path,
    ) -> Result<()> {
        Err(PlayerError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            "database is locked",
        )))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn truncate(&self) -> Result<u64> {
        self.inner.truncate().await
    }

    async fn replace_all(&self, entries: &[CatalogEntry]) -> Result<u64> {
        self.inner.replace_all(entries).await
    }
}

pub fn song(n: usize) -> CatalogEntry {
    CatalogEntry::new(
        Source::Ncs,
        format!("Track {}", n),
        format!("Artist {}", n),
        format!("/track/download/track-{}.mp3", n),
        format!("/track-{}", n),
    )
    .with_artwork_url(format!("https://ncs.io/img/track-{}.jpg", n))
}

/// In-memory catalog with `count` distinct songs, ids `1..=count`
pub async fn seeded_db(count: usize) -> Arc<Database> {
    let db = Database::new_in_memory().await.unwrap();
    let songs: Vec<_> = (1..=count).map(song).collect();
    if !songs.is_empty() {
        db.insert_many(&songs).await.unwrap();
    }
    Arc::new(db)
}

pub fn test_config(data_root: &Path, capacity: usize) -> PlayerConfig {
    PlayerConfig {
        data_root: data_root.to_path_buf(),
        database_path: data_root.join("songs.db"),
        window_capacity: capacity,
        ..PlayerConfig::default()
    }
}

pub fn materializer(
    store: Arc<dyn CatalogStore>,
    transfer: Arc<FakeTransfer>,
    config: &PlayerConfig,
) -> EntryMaterializer {
    EntryMaterializer::from_config(store, transfer, config).unwrap()
}

pub async fn playlist(
    store: Arc<dyn CatalogStore>,
    transfer: Arc<FakeTransfer>,
    config: &PlayerConfig,
    seed: u64,
) -> Result<PlaylistManager> {
    let materializer = materializer(store.clone(), transfer, config);
    PlaylistManager::with_rng(store, materializer, config, StdRng::seed_from_u64(seed)).await
}

/// Every entry in the window is distinct by title and creators
pub fn assert_no_duplicates(manager: &PlaylistManager) {
    let entries: Vec<_> = manager.window().iter().collect();
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            assert!(!a.is_duplicate_of(b), "duplicate in window: {}", a.display_name());
        }
    }
}

/// Names of leftover `.part` files in a directory
pub fn part_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".part"))
                .collect()
        })
        .unwrap_or_default()
}

pub async fn assert_playable(entry: &CatalogEntry) {
    let media = entry.local_media_path.as_ref().expect("media path set");
    assert!(tokio::fs::metadata(media).await.is_ok(), "missing {}", media.display());
    if entry.has_artwork() {
        let artwork = entry.local_artwork_path.as_ref().expect("artwork path set");
        assert!(tokio::fs::metadata(artwork).await.is_ok(), "missing {}", artwork.display());
    }
}
