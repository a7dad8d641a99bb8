//! Controller module - room playback logic and event handling
//!
//! The controller owns every command path that mutates playback state.
//! It is organized into submodules by responsibility:
//!
//! - `input`: keyboard and OS media-control surfaces
//! - `playback`: play/pause/seek commands, skip/retry policy, admin gate
//! - `sync`: the periodic progress/analytics and visual sampler tasks
//! - `remote_events`: inbound room events applied through the same paths

mod input;
mod playback;
mod remote_events;
mod sync;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::driver::MediaDriver;
use crate::model::{DriftTracker, PlaybackStore, RetryBudget};
use crate::resolver::SourceResolver;
use crate::session::Session;
use crate::transport::RoomTransport;

/// Coordinates the store, the media driver and the room transport.
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RoomController {
    pub(crate) store: PlaybackStore,
    pub(crate) driver: MediaDriver,
    pub(crate) transport: Arc<dyn RoomTransport>,
    pub(crate) resolver: Arc<dyn SourceResolver>,
    pub(crate) session: Session,
    /// Identity of the current song load. Bumped on every `play`; any
    /// async callback must check it still holds before applying its
    /// effect, so a stale failure or tick never touches a newer song.
    epoch: Arc<AtomicU64>,
    pub(crate) retry: Arc<Mutex<RetryBudget>>,
    pub(crate) drift: Arc<Mutex<DriftTracker>>,
    sync_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RoomController {
    pub fn new(
        store: PlaybackStore,
        driver: MediaDriver,
        transport: Arc<dyn RoomTransport>,
        resolver: Arc<dyn SourceResolver>,
        session: Session,
    ) -> Self {
        Self {
            store,
            driver,
            transport,
            resolver,
            session,
            epoch: Arc::new(AtomicU64::new(0)),
            retry: Arc::new(Mutex::new(RetryBudget::default())),
            drift: Arc::new(Mutex::new(DriftTracker::default())),
            sync_tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store(&self) -> &PlaybackStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn epoch_is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    /// Replaces the per-song periodic tasks, aborting the previous
    /// song's tasks so stale callbacks cannot mutate newer state.
    pub(crate) async fn replace_sync_tasks(&self, tasks: Vec<JoinHandle<()>>) {
        let mut slot = self.sync_tasks.lock().await;
        for task in slot.drain(..) {
            task.abort();
        }
        *slot = tasks;
    }

    /// Tears down timers and listeners when the session ends.
    pub async fn shutdown(&self) {
        self.session.request_quit();
        self.replace_sync_tasks(Vec::new()).await;
    }
}
