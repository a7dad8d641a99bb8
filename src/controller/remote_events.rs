//! Inbound room event listener.
//!
//! Remote notifications are applied through the exact same internal
//! paths as locally originated commands, so a remote seek and a local
//! seek are indistinguishable to the state machine.

use crate::model::Action;
use crate::transport::RoomEvent;

use super::RoomController;

impl RoomController {
    pub fn start_remote_event_listener(&self) {
        let mut events = self.transport.subscribe();
        let controller = self.clone();
        tracing::info!("Starting room event listener");

        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if controller.session.should_quit() {
                    tracing::debug!("Room event listener shutting down");
                    break;
                }

                match event {
                    RoomEvent::Seek(position_secs) => {
                        // Already admin-authorized by the room server.
                        tracing::debug!(position_secs, "Remote seek");
                        if let Err(e) = controller.apply_seek(position_secs).await {
                            tracing::warn!(error = %e, "Remote seek failed");
                        }
                    }
                    RoomEvent::Status(playing) => {
                        tracing::debug!(playing, "Remote status change");
                        controller.apply_remote_status(playing).await;
                    }
                    RoomEvent::SongChanged(song) => {
                        tracing::info!(song_id = %song.id, "Room moved to another song");
                        controller.play(song).await;
                    }
                    other => {
                        tracing::trace!(?other, "Ignoring room event");
                    }
                }
            }
        });
    }

    /// Mirrors a remote play/pause flip locally without echoing a
    /// status event back at the room.
    async fn apply_remote_status(&self, playing: bool) {
        if playing {
            if self.store.current_song().await.is_none() {
                return;
            }
            match self.driver.play_audio().await {
                Ok(()) => self.store.dispatch(Action::SetPlaying(true)).await,
                Err(e) => tracing::warn!(error = %e, "Remote resume failed"),
            }
        } else {
            if let Err(e) = self.driver.pause_audio().await {
                tracing::warn!(error = %e, "Remote pause failed");
            }
            self.driver.pause_videos().await;
            self.store.dispatch(Action::SetPlaying(false)).await;
        }
    }
}
