//! Playback state store: the single dispatch entry point through which
//! every component mutates shared playback state.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::playback::{reduce, Action, PlaybackState};

/// Dependency-injected store handle. Cloning shares the same state;
/// there is no process-wide singleton. Created at session start and
/// dropped with the session.
#[derive(Clone)]
pub struct PlaybackStore {
    state: Arc<Mutex<PlaybackState>>,
}

impl PlaybackStore {
    pub fn new(initial: PlaybackState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    /// Applies one action atomically. The reducer runs synchronously
    /// under the lock, so no other task observes a partial update.
    pub async fn dispatch(&self, action: Action) {
        let mut state = self.state.lock().await;
        *state = reduce(&state, action);
    }

    pub async fn snapshot(&self) -> PlaybackState {
        self.state.lock().await.clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.is_playing
    }

    pub async fn current_song(&self) -> Option<super::types::Song> {
        self.state.lock().await.current_song.clone()
    }

    pub async fn volume(&self) -> f64 {
        self.state.lock().await.volume
    }

    pub async fn duration_secs(&self) -> f64 {
        self.state.lock().await.duration_secs
    }
}

impl Default for PlaybackStore {
    fn default() -> Self {
        Self::new(PlaybackState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_mutates_shared_snapshot() {
        let store = PlaybackStore::default();
        let alias = store.clone();

        store.dispatch(Action::SetDuration(200.0)).await;
        alias.dispatch(Action::SetProgress(60.0)).await;
        store.dispatch(Action::SetPlaying(true)).await;

        let snap = alias.snapshot().await;
        assert!(snap.is_playing);
        assert_eq!(snap.progress_secs, 60.0);
        assert_eq!(snap.duration_secs, 200.0);
    }

    #[tokio::test]
    async fn snapshots_are_detached_copies() {
        let store = PlaybackStore::default();
        let before = store.snapshot().await;
        store.dispatch(Action::SetPlaying(true)).await;
        assert!(!before.is_playing);
        assert!(store.is_playing().await);
    }
}
