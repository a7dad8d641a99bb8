//! Progress synchronizer: two periodic tasks tied to the current song.
//!
//! The broadcast tick shares our position with the room and accounts
//! engaged listening time for the analytics threshold. The visual
//! sampler keeps the displayed progress fresh and re-aligns the video
//! playheads to the audio clock. Both tasks carry the song epoch they
//! were started for and stop the moment it goes stale.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::model::Action;
use crate::transport::RoomEvent;

use super::RoomController;

/// Cadence of position broadcasts and engaged-time accounting.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(3);
/// Cadence of the displayed-progress/video-resync sampler.
pub const SAMPLER_INTERVAL: Duration = Duration::from_millis(250);
/// Fraction of the song that must be actively listened to before the
/// one-shot "listening" analytics event fires.
pub const LISTENING_FRACTION: f64 = 0.3;

impl RoomController {
    /// (Re)starts the per-song tasks for the given song epoch, aborting
    /// the previous song's tasks.
    pub(crate) async fn start_sync_tasks(&self, epoch: u64) {
        let broadcast = self.spawn_broadcast_tick(epoch);
        let sampler = self.spawn_visual_sampler(epoch);
        let media_events = self.spawn_media_event_listener(epoch);
        self.replace_sync_tasks(vec![broadcast, sampler, media_events])
            .await;
    }

    fn spawn_broadcast_tick(&self, epoch: u64) -> tokio::task::JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BROADCAST_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately once; skip that tick so the
            // first accounting happens a full interval in.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if controller.session.should_quit() || !controller.epoch_is_current(epoch) {
                    break;
                }
                let paused = controller.driver.audio_paused().await.unwrap_or(true);
                if paused {
                    continue;
                }
                let position = match controller.driver.audio_position_secs().await {
                    Ok(position) => position,
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not read audio position");
                        continue;
                    }
                };

                if controller.session.admin_online() {
                    controller.transport.emit(RoomEvent::Progress(position));
                }

                let mut drift = controller.drift.lock().await;
                drift.last_broadcast_secs = position;
                if drift.listening_reported {
                    continue;
                }
                let duration = controller.store.duration_secs().await;
                if duration > 0.0 && drift.engaged_secs >= duration * LISTENING_FRACTION {
                    tracing::info!(
                        engaged_secs = drift.engaged_secs,
                        duration,
                        "Listening threshold reached, reporting analytics"
                    );
                    controller.transport.emit(RoomEvent::listening());
                    drift.listening_reported = true;
                    continue;
                }
                // Inaudible playback does not count as listening.
                if controller.store.volume().await == 0.0 {
                    continue;
                }
                drift.engaged_secs += BROADCAST_INTERVAL.as_secs_f64();
            }
        })
    }

    fn spawn_visual_sampler(&self, epoch: u64) -> tokio::task::JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SAMPLER_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if controller.session.should_quit() || !controller.epoch_is_current(epoch) {
                    break;
                }
                if controller.driver.audio_paused().await.unwrap_or(true) {
                    continue;
                }
                match controller.driver.audio_position_secs().await {
                    Ok(position) => {
                        controller.store.dispatch(Action::SetProgress(position)).await;
                        controller.drift.lock().await.last_sampled_secs = position;
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "Sampler could not read audio position");
                        continue;
                    }
                }
                if let Err(e) = controller.driver.resync_videos().await {
                    tracing::trace!(error = %e, "Video resync failed");
                }
            }
        })
    }
}
