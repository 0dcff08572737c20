//! Download state tracker
//!
//! Per-entry bookkeeping keyed by catalog id:
//!
//! ```text
//! NotStarted --mark_in_progress--> InProgress --mark_complete--> Complete
//!                                  InProgress --mark_failed----> NotStarted
//! ```
//!
//! `Complete` is terminal. The tracker itself is not shared: it is owned by
//! the playlist manager and only mutated on its navigation path, so any
//! illegal transition is reported as `InvariantViolation`.
//!
//! Removing an entry aborts its transfers. The aborted handles are kept until
//! the tasks are gone, so a later generation of the same id can wait for them
//! before writing to the same files.

use crate::error::{PlayerError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle of one spawned transfer; resolves to the bytes written
pub type TransferHandle = JoinHandle<Result<u64>>;

/// Files produced by a finished materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFiles {
    pub media_path: PathBuf,
    pub artwork_path: Option<PathBuf>,
}

/// The in-flight media/artwork pair of one entry
///
/// Dropping it detaches both tasks; `abort` cancels them.
#[derive(Debug)]
pub struct InFlight {
    entry_id: i64,
    media: Option<TransferHandle>,
    artwork: Option<TransferHandle>,
    awaited: bool,
    files: LocalFiles,
    urgent: Option<watch::Sender<bool>>,
}

impl InFlight {
    pub fn new(
        entry_id: i64,
        media: TransferHandle,
        artwork: Option<TransferHandle>,
        files: LocalFiles,
    ) -> Self {
        Self {
            entry_id,
            media: Some(media),
            artwork,
            awaited: false,
            files,
            urgent: None,
        }
    }

    /// Attach the switch that lets queued transfers skip the shared bound
    pub fn with_urgency(mut self, urgent: watch::Sender<bool>) -> Self {
        self.urgent = Some(urgent);
        self
    }

    /// Let transfers still waiting for a permit start right away
    pub fn prioritize(&self) {
        if let Some(urgent) = &self.urgent {
            urgent.send_replace(true);
        }
    }

    pub fn is_prioritized(&self) -> bool {
        self.urgent.as_ref().map_or(false, |urgent| *urgent.borrow())
    }

    pub fn entry_id(&self) -> i64 {
        self.entry_id
    }

    /// Destination paths the transfers write to
    pub fn files(&self) -> &LocalFiles {
        &self.files
    }

    /// Whether both transfers have finished (successfully or not)
    pub fn is_finished(&self) -> bool {
        let media_done = self.media.as_ref().map_or(true, |h| h.is_finished());
        let artwork_done = self.artwork.as_ref().map_or(true, |h| h.is_finished());
        media_done && artwork_done
    }

    /// Join both transfers
    ///
    /// Can only be called once. Any failure of either transfer fails the pair
    /// with `MaterializationFailed`.
    pub async fn wait(&mut self) -> Result<LocalFiles> {
        if self.awaited {
            return Err(PlayerError::invariant(format!(
                "transfers of song {} were already awaited",
                self.entry_id
            )));
        }
        self.awaited = true;

        let media = self.media.take();
        let artwork = self.artwork.take();
        let id = self.entry_id;

        let (media_result, artwork_result) = tokio::join!(join(media), join(artwork));
        media_result.map_err(|e| PlayerError::materialization_failed(id, e))?;
        artwork_result.map_err(|e| PlayerError::materialization_failed(id, e))?;

        Ok(self.files.clone())
    }

    /// Cancel both transfers, returning the handles of the aborted tasks
    pub fn abort(&mut self) -> Vec<TransferHandle> {
        let handles: Vec<TransferHandle> =
            self.media.take().into_iter().chain(self.artwork.take()).collect();
        for handle in &handles {
            handle.abort();
        }
        handles
    }
}

async fn join(handle: Option<TransferHandle>) -> Result<()> {
    match handle {
        Some(handle) => handle.await?.map(|_| ()),
        None => Ok(()),
    }
}

/// Materialization state of one entry
#[derive(Debug)]
pub enum DownloadState {
    NotStarted,
    InProgress(InFlight),
    Complete,
}

impl DownloadState {
    pub fn status(&self) -> DownloadStatus {
        match self {
            DownloadState::NotStarted => DownloadStatus::NotStarted,
            DownloadState::InProgress(_) => DownloadStatus::InProgress,
            DownloadState::Complete => DownloadStatus::Complete,
        }
    }
}

/// Observable part of `DownloadState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    NotStarted,
    InProgress,
    Complete,
}

/// Per-entry state machine keyed by catalog id
#[derive(Debug, Default)]
pub struct DownloadTracker {
    states: HashMap<i64, DownloadState>,
    failures: HashMap<i64, u32>,
    retired: HashMap<i64, Vec<TransferHandle>>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entry as `NotStarted`; no-op if it is already tracked
    pub fn register(&mut self, id: i64) {
        self.states.entry(id).or_insert(DownloadState::NotStarted);
    }

    /// Track an entry whose files are already on disk
    pub fn register_complete(&mut self, id: i64) -> Result<()> {
        match self.states.get(&id) {
            Some(DownloadState::InProgress(_)) => Err(PlayerError::invariant(format!(
                "song {} is in flight and cannot be registered as complete",
                id
            ))),
            _ => {
                self.states.insert(id, DownloadState::Complete);
                Ok(())
            }
        }
    }

    /// `NotStarted -> InProgress`
    pub fn mark_in_progress(&mut self, id: i64, in_flight: InFlight) -> Result<()> {
        match self.states.get_mut(&id) {
            Some(state @ DownloadState::NotStarted) => {
                *state = DownloadState::InProgress(in_flight);
                Ok(())
            }
            Some(other) => Err(PlayerError::invariant(format!(
                "song {} cannot start materializing from {:?}",
                id,
                other.status()
            ))),
            None => Err(PlayerError::invariant(format!("song {} is not tracked", id))),
        }
    }

    /// `InProgress -> Complete`
    ///
    /// An id that is no longer tracked belongs to an evicted entry; its result
    /// is dropped silently.
    pub fn mark_complete(&mut self, id: i64) -> Result<()> {
        match self.states.get_mut(&id) {
            Some(state @ DownloadState::InProgress(_)) => {
                *state = DownloadState::Complete;
                self.failures.remove(&id);
                Ok(())
            }
            Some(DownloadState::Complete) | None => Ok(()),
            Some(DownloadState::NotStarted) => Err(PlayerError::invariant(format!(
                "song {} completed without being started",
                id
            ))),
        }
    }

    /// `InProgress -> NotStarted`, returning the failure count so far
    pub fn mark_failed(&mut self, id: i64) -> Result<u32> {
        match self.states.get_mut(&id) {
            Some(state @ DownloadState::InProgress(_)) => {
                *state = DownloadState::NotStarted;
                Ok(self.record_failure(id))
            }
            Some(DownloadState::NotStarted) | None => Ok(self.record_failure(id)),
            Some(DownloadState::Complete) => Err(PlayerError::invariant(format!(
                "song {} is complete and cannot fail",
                id
            ))),
        }
    }

    fn record_failure(&mut self, id: i64) -> u32 {
        let count = self.failures.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// Forget an evicted entry, aborting any in-flight transfers
    ///
    /// Returns the status the entry had.
    pub fn remove(&mut self, id: i64) -> Option<DownloadStatus> {
        self.failures.remove(&id);
        let state = self.states.remove(&id)?;
        let status = state.status();

        if let DownloadState::InProgress(mut in_flight) = state {
            let aborted = in_flight.abort();
            if !aborted.is_empty() {
                self.retired.entry(id).or_default().extend(aborted);
            }
        }
        Some(status)
    }

    /// Wait until aborted transfers of an earlier generation of `id` are gone
    pub async fn drain_retired(&mut self, id: i64) {
        if let Some(handles) = self.retired.remove(&id) {
            for handle in handles {
                // Cancelled or finished, the result is stale either way
                let _ = handle.await;
            }
        }
    }

    /// Drop handles of aborted transfers that already stopped
    pub fn prune_retired(&mut self) {
        self.retired.retain(|_, handles| {
            handles.retain(|handle| !handle.is_finished());
            !handles.is_empty()
        });
    }

    /// Whether aborted transfers of `id` may still be running
    pub fn has_retired(&self, id: i64) -> bool {
        self.retired.contains_key(&id)
    }

    pub fn is_complete(&self, id: i64) -> bool {
        matches!(self.states.get(&id), Some(DownloadState::Complete))
    }

    pub fn status(&self, id: i64) -> Option<DownloadStatus> {
        self.states.get(&id).map(DownloadState::status)
    }

    pub fn failures(&self, id: i64) -> u32 {
        self.failures.get(&id).copied().unwrap_or(0)
    }

    pub fn in_flight_mut(&mut self, id: i64) -> Option<&mut InFlight> {
        match self.states.get_mut(&id) {
            Some(DownloadState::InProgress(in_flight)) => Some(in_flight),
            _ => None,
        }
    }

    /// Ids whose transfers have all finished and await settling
    pub fn finished_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .states
            .iter()
            .filter_map(|(id, state)| match state {
                DownloadState::InProgress(in_flight) if in_flight.is_finished() => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All tracked ids, sorted
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.states.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn files(id: i64) -> LocalFiles {
        LocalFiles {
            media_path: PathBuf::from(format!("/data/{id}/{id}.mp3")),
            artwork_path: None,
        }
    }

    fn ok_in_flight(id: i64) -> InFlight {
        InFlight::new(id, tokio::spawn(async { Ok(3) }), None, files(id))
    }

    #[tokio::test]
    async fn test_state_machine_happy_path() {
        let mut tracker = DownloadTracker::new();
        tracker.register(1);
        assert_eq!(tracker.status(1), Some(DownloadStatus::NotStarted));

        tracker.mark_in_progress(1, ok_in_flight(1)).unwrap();
        assert_eq!(tracker.status(1), Some(DownloadStatus::InProgress));

        let got = tracker.in_flight_mut(1).unwrap().wait().await.unwrap();
        assert_eq!(got, files(1));

        tracker.mark_complete(1).unwrap();
        assert!(tracker.is_complete(1));
    }

    #[tokio::test]
    async fn test_double_start_is_invariant_violation() {
        let mut tracker = DownloadTracker::new();
        tracker.register(1);
        tracker.mark_in_progress(1, ok_in_flight(1)).unwrap();

        let err = tracker.mark_in_progress(1, ok_in_flight(1)).unwrap_err();
        assert!(matches!(err, PlayerError::InvariantViolation(_)));

        assert!(tracker.mark_in_progress(2, ok_in_flight(2)).is_err());
    }

    #[tokio::test]
    async fn test_complete_never_regresses() {
        let mut tracker = DownloadTracker::new();
        tracker.register_complete(4).unwrap();

        assert!(tracker.mark_in_progress(4, ok_in_flight(4)).is_err());
        assert!(tracker.mark_failed(4).is_err());
        tracker.register(4);
        assert!(tracker.is_complete(4));
    }

    #[tokio::test]
    async fn test_failure_resets_to_not_started() {
        let mut tracker = DownloadTracker::new();
        tracker.register(5);
        let failing = InFlight::new(
            5,
            tokio::spawn(async { Err(PlayerError::Timeout(1)) }),
            None,
            files(5),
        );
        tracker.mark_in_progress(5, failing).unwrap();

        let err = tracker.in_flight_mut(5).unwrap().wait().await.unwrap_err();
        assert!(matches!(err, PlayerError::MaterializationFailed { id: 5, .. }));

        assert_eq!(tracker.mark_failed(5).unwrap(), 1);
        assert_eq!(tracker.status(5), Some(DownloadStatus::NotStarted));
        tracker.mark_in_progress(5, ok_in_flight(5)).unwrap();
    }

    #[tokio::test]
    async fn test_wait_twice_is_rejected() {
        let mut in_flight = ok_in_flight(1);
        in_flight.wait().await.unwrap();
        assert!(matches!(in_flight.wait().await, Err(PlayerError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_evicted_completion_is_ignored() {
        let mut tracker = DownloadTracker::new();
        tracker.register(9);
        tracker.mark_in_progress(9, ok_in_flight(9)).unwrap();

        assert!(tracker.remove(9).is_some());
        tracker.mark_complete(9).unwrap();
        assert_eq!(tracker.status(9), None);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_remove_aborts_in_flight_transfers() {
        let wrote = Arc::new(AtomicBool::new(false));
        let flag = wrote.clone();
        let stale = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(7)
        });

        let mut tracker = DownloadTracker::new();
        tracker.register(3);
        tracker.mark_in_progress(3, InFlight::new(3, stale, None, files(3))).unwrap();

        assert_eq!(tracker.remove(3), Some(DownloadStatus::InProgress));
        assert!(tracker.has_retired(3));

        tracker.drain_retired(3).await;
        assert!(!tracker.has_retired(3));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!wrote.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_prune_retired_forgets_stopped_tasks() {
        let mut tracker = DownloadTracker::new();
        tracker.register(4);
        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        });
        tracker.mark_in_progress(4, InFlight::new(4, slow, None, files(4))).unwrap();
        tracker.remove(4);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tracker.prune_retired();
        assert!(!tracker.has_retired(4));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_prioritize_flips_the_switch() {
        let (urgent, watcher) = watch::channel(false);
        let in_flight = ok_in_flight(1).with_urgency(urgent);
        assert!(!in_flight.is_prioritized());

        in_flight.prioritize();
        assert!(in_flight.is_prioritized());
        assert!(*watcher.borrow());

        // Without a switch it is a no-op
        ok_in_flight(2).prioritize();
    }

    #[tokio::test]
    async fn test_finished_ids_only_lists_settled_pairs() {
        let mut tracker = DownloadTracker::new();
        tracker.register(1);
        tracker.register(2);
        tracker.mark_in_progress(1, ok_in_flight(1)).unwrap();

        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        });
        tracker.mark_in_progress(2, InFlight::new(2, slow, None, files(2))).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.finished_ids(), vec![1]);
        assert_eq!(tracker.ids(), vec![1, 2]);
    }
}
