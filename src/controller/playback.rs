//! Playback control methods: the command paths shared by local input,
//! OS media controls and inbound room events, plus the skip/retry
//! policy and the admin gate.

use std::time::Duration;

use anyhow::Result;

use crate::driver::is_no_supported_source;
use crate::model::{Action, AppContext, Role, Song};
use crate::transport::RoomEvent;

use super::RoomController;

/// Whether a load attempt actually started playback or lost the race
/// against a newer song.
enum StartOutcome {
    Started,
    Superseded,
}

impl RoomController {
    /// Loads and starts a new song. On an unplayable source this feeds
    /// the bounded retry policy; any other failure is logged and left
    /// for the user to retry.
    pub async fn play(&self, song: Song) {
        let epoch = self.bump_epoch();
        tracing::info!(song_id = %song.id, song = %song.name, epoch, "Playing song");

        if let Err(e) = self.driver.clear_all().await {
            tracing::warn!(error = %e, "Failed to clear previous media sources");
        }
        self.store.dispatch(Action::SetSong(Some(song.clone()))).await;

        let started = self.load_and_start(&song, epoch).await;
        if !self.epoch_is_current(epoch) {
            // A newer play() superseded this one while we were loading;
            // neither its success nor its failure applies anymore.
            tracing::debug!(song_id = %song.id, epoch, "Discarding stale play result");
            return;
        }

        match started {
            Ok(StartOutcome::Superseded) => {
                tracing::debug!(song_id = %song.id, epoch, "Load superseded by a newer song");
            }
            Ok(StartOutcome::Started) => {
                self.retry.lock().await.reset();
                self.drift.lock().await.reset();

                if let Ok(Some(duration)) = self.driver.audio_duration_secs().await {
                    self.store.dispatch(Action::SetDuration(duration)).await;
                }
                self.driver.start_videos().await;
                self.store.dispatch(Action::SetPlaying(true)).await;
                self.start_sync_tasks(epoch).await;
            }
            Err(e) => self.handle_load_failure(&song, e).await,
        }
    }

    /// Each await point here can outlive the song it was started for,
    /// so the epoch is re-checked before every engine side effect: a
    /// stale locator must never reach the engine.
    async fn load_and_start(&self, song: &Song, epoch: u64) -> Result<StartOutcome> {
        let locator = self.resolver.resolve(song).await?;
        if !self.epoch_is_current(epoch) {
            return Ok(StartOutcome::Superseded);
        }
        self.driver.load_audio(&locator).await?;
        if !self.epoch_is_current(epoch) {
            return Ok(StartOutcome::Superseded);
        }
        self.driver.play_audio().await?;
        Ok(StartOutcome::Started)
    }

    /// Skip/retry policy for songs whose source cannot be played.
    async fn handle_load_failure(&self, song: &Song, error: anyhow::Error) {
        self.store.dispatch(Action::SetPlaying(false)).await;

        if !is_no_supported_source(&error) {
            tracing::error!(song_id = %song.id, error = %e_chain(&error), "Error playing audio");
            return;
        }

        let failures = self.retry.lock().await.record_failure();
        tracing::warn!(song_id = %song.id, failures, "Song source is unplayable");

        if failures >= crate::model::RetryBudget::MAX_FAILURES {
            // Stop auto-advancing so an all-unplayable queue cannot
            // fast-skip forever.
            let message = match self.session.context() {
                AppContext::Desktop => "Open the song in your browser and try again",
                AppContext::Web => "Maximum skip limit reached. Install the desktop client.",
            };
            self.session.error(message).await;
        } else {
            self.transport.emit(RoomEvent::SongEnded);
            self.session.warn("Song not available, skipping").await;
        }
    }

    /// Stops audio and tells the room we went quiet.
    pub async fn pause(&self) {
        if let Err(e) = self.driver.pause_audio().await {
            tracing::warn!(error = %e, "Pause failed");
        }
        self.driver.pause_videos().await;
        self.transport.emit(RoomEvent::Status(false));
        self.store.dispatch(Action::SetPlaying(false)).await;
    }

    /// Restarts the already-loaded song. Resume failures never enter
    /// the skip policy; the user can simply try again.
    pub async fn resume(&self) {
        if self.store.current_song().await.is_none() {
            return;
        }
        match self.driver.play_audio().await {
            Ok(()) => {
                self.transport.emit(RoomEvent::Status(true));
                self.store.dispatch(Action::SetPlaying(true)).await;
            }
            Err(e) => {
                tracing::error!(error = %e_chain(&e), "Error resuming audio");
            }
        }
    }

    pub async fn toggle_play_pause(&self) {
        let snapshot = self.store.snapshot().await;
        if snapshot.is_playing {
            self.pause().await;
        } else if snapshot.current_song.is_some() {
            self.resume().await;
        }
    }

    /// Admin-gated absolute seek; broadcasts the new position.
    pub async fn seek(&self, position_secs: f64) {
        if !self.ensure_admin().await {
            return;
        }
        match self.apply_seek(position_secs).await {
            Ok(()) => self.transport.emit(RoomEvent::Seek(position_secs)),
            Err(e) => tracing::error!(error = %e_chain(&e), "Seek failed"),
        }
    }

    /// Moves every playhead and folds the jump into the engaged-time
    /// accumulator. Shared by the local command and inbound room seeks.
    pub(crate) async fn apply_seek(&self, position_secs: f64) -> Result<()> {
        let position_secs = position_secs.max(0.0);
        let from = self.driver.audio_position_secs().await.unwrap_or(0.0);

        self.driver
            .seek_all(Duration::from_secs_f64(position_secs))
            .await?;
        self.drift.lock().await.apply_seek(from, position_secs);
        self.store.dispatch(Action::SetProgress(position_secs)).await;
        Ok(())
    }

    /// Requests the room queue to advance. Pauses local audio first so
    /// the outgoing song never overlaps the incoming one.
    pub async fn play_next(&self) {
        if let Err(e) = self.driver.pause_audio().await {
            tracing::warn!(error = %e, "Pause before next failed");
        }
        self.transport.emit(RoomEvent::PlayNext);
    }

    pub async fn play_prev(&self) {
        if let Err(e) = self.driver.pause_audio().await {
            tracing::warn!(error = %e, "Pause before prev failed");
        }
        self.transport.emit(RoomEvent::PlayPrev);
    }

    pub async fn mute(&self) {
        if let Err(e) = self.driver.set_muted(true).await {
            tracing::warn!(error = %e, "Mute failed");
        }
        self.store.dispatch(Action::SetMuted(true)).await;
    }

    pub async fn unmute(&self) {
        if let Err(e) = self.driver.set_muted(false).await {
            tracing::warn!(error = %e, "Unmute failed");
        }
        self.store.dispatch(Action::SetMuted(false)).await;
    }

    /// Applies a volume fraction; persists it when `save` is set
    /// (explicit user change, as opposed to a transient fade).
    pub async fn set_volume(&self, volume: f64, save: bool) {
        let volume = volume.clamp(0.0, 1.0);
        if let Err(e) = self.driver.set_volume(volume).await {
            tracing::warn!(error = %e, "Volume change failed");
        }
        self.store.dispatch(Action::SetVolume(volume)).await;
        if save {
            if let Err(e) = self.session.save_volume(volume).await {
                tracing::warn!(error = %e, "Failed to persist volume");
            }
        }
    }

    pub async fn set_background(&self, enabled: bool) {
        self.store.dispatch(Action::SetBackground(enabled)).await;
        if let Err(e) = self.session.save_background(enabled).await {
            tracing::warn!(error = %e, "Failed to persist background preference");
        }
    }

    /// Authorization gate for position mutations. Re-evaluated on
    /// every attempt; the room can change our role at any time.
    pub(crate) async fn ensure_admin(&self) -> bool {
        if self.session.role().await == Role::Admin {
            return true;
        }
        self.session.warn("Only admin can seek").await;
        false
    }

    /// Consumes the audio engine's normalized events and mirrors them
    /// into the store, keeping engine and state in agreement even when
    /// a transition was not initiated by a command. Spawned per song:
    /// the subscription is created at song start, so an end event the
    /// previous song left buffered is never replayed against the new
    /// one, and the task stops once its epoch goes stale.
    pub(crate) fn spawn_media_event_listener(&self, epoch: u64) -> tokio::task::JoinHandle<()> {
        let mut events = self.driver.subscribe_audio();
        let controller = self.clone();

        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if controller.session.should_quit() || !controller.epoch_is_current(epoch) {
                    tracing::debug!(epoch, "Media event listener shutting down");
                    break;
                }

                match event {
                    crate::driver::MediaEvent::Play => {
                        controller.driver.start_videos().await;
                        controller.store.dispatch(Action::SetPlaying(true)).await;
                    }
                    crate::driver::MediaEvent::Pause => {
                        controller.driver.pause_videos().await;
                        controller.store.dispatch(Action::SetPlaying(false)).await;
                    }
                    crate::driver::MediaEvent::CanPlay => {
                        if let Ok(Some(duration)) = controller.driver.audio_duration_secs().await {
                            controller.store.dispatch(Action::SetDuration(duration)).await;
                        }
                    }
                    crate::driver::MediaEvent::Ended => {
                        tracing::debug!("Song ended naturally");
                        controller.store.dispatch(Action::SetPlaying(false)).await;
                        controller.transport.emit(RoomEvent::SongEnded);
                    }
                    crate::driver::MediaEvent::TimeUpdate(position_secs) => {
                        controller
                            .store
                            .dispatch(Action::SetProgress(position_secs))
                            .await;
                    }
                }
            }
        })
    }
}

/// Formats the whole error chain for the log.
fn e_chain(error: &anyhow::Error) -> String {
    format!("{error:#}")
}
