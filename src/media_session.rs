//! OS media-control bridge.
//!
//! Registers this client with the host's system media-control surface
//! (MPRIS, SMTC, Now Playing) through souvlaki and surfaces the
//! hardware-key events for the controller to route. Metadata updates
//! flow the other way on song change and play/pause flips.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use anyhow::Result;
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig,
};

use crate::model::PlaybackState;

#[derive(Debug, Clone)]
pub enum MediaKeyEvent {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    SeekForward,
    SeekBackward,
    SetPosition(Duration),
}

pub struct MediaSessionBridge {
    controls: MediaControls,
    receiver: Receiver<MediaKeyEvent>,
    /// Snapshot behind the last successful OS-surface push; unchanged
    /// snapshots are not re-sent.
    last_pushed: Option<PlaybackState>,
}

/// True when `next` differs from the snapshot already on the OS surface.
fn snapshot_changed(last_pushed: Option<&PlaybackState>, next: &PlaybackState) -> bool {
    last_pushed != Some(next)
}

impl MediaSessionBridge {
    pub fn new() -> Result<Self> {
        let config = PlatformConfig {
            dbus_name: "vibe_client",
            display_name: "Vibe",
            hwnd: None,
        };

        let mut controls = MediaControls::new(config)
            .map_err(|e| anyhow::anyhow!("failed to initialize media controls: {e:?}"))?;

        let (sender, receiver) = mpsc::channel::<MediaKeyEvent>();
        Self::attach_handler(&mut controls, sender)?;

        Ok(Self {
            controls,
            receiver,
            last_pushed: None,
        })
    }

    fn attach_handler(controls: &mut MediaControls, sender: Sender<MediaKeyEvent>) -> Result<()> {
        controls
            .attach(move |event: MediaControlEvent| {
                let media_event = match event {
                    MediaControlEvent::Play => Some(MediaKeyEvent::Play),
                    MediaControlEvent::Pause => Some(MediaKeyEvent::Pause),
                    MediaControlEvent::Toggle => Some(MediaKeyEvent::Toggle),
                    MediaControlEvent::Next => Some(MediaKeyEvent::Next),
                    MediaControlEvent::Previous => Some(MediaKeyEvent::Previous),
                    MediaControlEvent::Seek(souvlaki::SeekDirection::Forward) => {
                        Some(MediaKeyEvent::SeekForward)
                    }
                    MediaControlEvent::Seek(souvlaki::SeekDirection::Backward) => {
                        Some(MediaKeyEvent::SeekBackward)
                    }
                    MediaControlEvent::SetPosition(pos) => Some(MediaKeyEvent::SetPosition(pos.0)),
                    _ => None,
                };

                if let Some(event) = media_event {
                    let _ = sender.send(event);
                }
            })
            .map_err(|e| anyhow::anyhow!("failed to attach media controls: {e:?}"))
    }

    /// Drains pending hardware-key events without blocking.
    pub fn poll_events(&self) -> Vec<MediaKeyEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Pushes the current playback snapshot out to the OS surface.
    /// Called from the main loop every pass; only actual changes reach
    /// souvlaki.
    pub fn update_now_playing(&mut self, state: &PlaybackState) -> Result<()> {
        if !snapshot_changed(self.last_pushed.as_ref(), state) {
            return Ok(());
        }
        self.push(state)?;
        self.last_pushed = Some(state.clone());
        Ok(())
    }

    fn push(&mut self, state: &PlaybackState) -> Result<()> {
        match &state.current_song {
            Some(song) => {
                let duration = if state.duration_secs > 0.0 {
                    Some(Duration::from_secs_f64(state.duration_secs))
                } else {
                    None
                };
                self.controls
                    .set_metadata(MediaMetadata {
                        title: Some(&song.name),
                        artist: Some(song.primary_artist()),
                        cover_url: Some(song.artwork_url()),
                        duration,
                        ..Default::default()
                    })
                    .map_err(|e| anyhow::anyhow!("failed to update media metadata: {e:?}"))?;

                let progress = Some(MediaPosition(Duration::from_secs_f64(
                    state.progress_secs.max(0.0),
                )));
                let playback = if state.is_playing {
                    MediaPlayback::Playing { progress }
                } else {
                    MediaPlayback::Paused { progress }
                };
                self.controls
                    .set_playback(playback)
                    .map_err(|e| anyhow::anyhow!("failed to update playback state: {e:?}"))
            }
            None => self
                .controls
                .set_playback(MediaPlayback::Stopped)
                .map_err(|e| anyhow::anyhow!("failed to clear playback state: {e:?}")),
        }
    }
}
