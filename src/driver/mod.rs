//! Local media driver: one primary audio output plus optional
//! synchronized video outputs (foreground overlay and background),
//! all behind a common engine trait so the controller never touches a
//! concrete media backend.
//!
//! - `sim`: clock-simulated engine (video playheads, tests)
//! - `rodio`: local audio engine over a rodio sink

mod rodio;
mod sim;

pub use rodio::RodioEngine;
pub use sim::SimEngine;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

/// Audio/video playheads are re-aligned once they diverge past this.
/// Below it they are left alone so we do not thrash the video with a
/// seek on every sample.
pub const DRIFT_TOLERANCE_SECS: f64 = 2.5;

/// Native media-engine events, normalized across engine implementations.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    /// Media is loaded far enough to start.
    CanPlay,
    /// Natural end of the loaded media.
    Ended,
    TimeUpdate(f64),
}

/// Failure classes the skip/retry policy needs to tell apart.
#[derive(Debug, Clone)]
pub enum MediaError {
    /// The engine cannot play the given source at all. The only error
    /// class that counts against the retry budget.
    NoSupportedSource(String),
    /// Anything else the engine reports (device lost, decode hiccup).
    Engine(String),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::NoSupportedSource(e) => {
                write!(f, "Failed to load because no supported source was found: {}", e)
            }
            MediaError::Engine(e) => write!(f, "Media engine error: {}", e),
        }
    }
}

impl std::error::Error for MediaError {}

/// True when the error chain bottoms out in an unplayable source.
pub fn is_no_supported_source(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<MediaError>(),
        Some(MediaError::NoSupportedSource(_))
    )
}

/// One underlying media output. Implementations must be cheap to poll:
/// `position_secs` is read several times per second by the samplers.
pub trait MediaEngine: Send + Sync {
    /// Loads a resolved media locator, replacing any current source.
    fn load(&self, locator: &str) -> BoxFuture<'_, Result<()>>;
    /// Drops the current source and resets the clock.
    fn clear(&self) -> BoxFuture<'_, Result<()>>;
    fn play(&self) -> BoxFuture<'_, Result<()>>;
    fn pause(&self) -> BoxFuture<'_, Result<()>>;
    fn seek(&self, position: Duration) -> BoxFuture<'_, Result<()>>;
    fn set_volume(&self, volume: f64) -> BoxFuture<'_, Result<()>>;
    fn set_muted(&self, muted: bool) -> BoxFuture<'_, Result<()>>;
    fn position_secs(&self) -> BoxFuture<'_, Result<f64>>;
    fn duration_secs(&self) -> BoxFuture<'_, Result<Option<f64>>>;
    fn is_paused(&self) -> BoxFuture<'_, Result<bool>>;
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;
}

/// Coordinates the audio output with the optional video outputs so
/// they start, stop and seek together.
#[derive(Clone)]
pub struct MediaDriver {
    audio: Arc<dyn MediaEngine>,
    video: Option<Arc<dyn MediaEngine>>,
    background: Option<Arc<dyn MediaEngine>>,
}

impl MediaDriver {
    pub fn new(
        audio: Arc<dyn MediaEngine>,
        video: Option<Arc<dyn MediaEngine>>,
        background: Option<Arc<dyn MediaEngine>>,
    ) -> Self {
        Self {
            audio,
            video,
            background,
        }
    }

    pub fn audio_only(audio: Arc<dyn MediaEngine>) -> Self {
        Self::new(audio, None, None)
    }

    fn videos(&self) -> impl Iterator<Item = &Arc<dyn MediaEngine>> {
        self.video.iter().chain(self.background.iter())
    }

    /// Clears every output's source before a new song is loaded.
    pub async fn clear_all(&self) -> Result<()> {
        for video in self.videos() {
            video.clear().await?;
        }
        self.audio.clear().await
    }

    pub async fn load_audio(&self, locator: &str) -> Result<()> {
        self.audio.load(locator).await
    }

    pub async fn play_audio(&self) -> Result<()> {
        self.audio.play().await
    }

    pub async fn pause_audio(&self) -> Result<()> {
        self.audio.pause().await
    }

    /// Starts the video outputs alongside already-running audio.
    /// Best-effort: a video that refuses to start is logged, not fatal.
    pub async fn start_videos(&self) {
        for video in self.videos() {
            if let Err(e) = video.play().await {
                tracing::warn!(error = %e, "Video output failed to start");
            }
        }
    }

    pub async fn pause_videos(&self) {
        for video in self.videos() {
            if let Err(e) = video.pause().await {
                tracing::warn!(error = %e, "Video output failed to pause");
            }
        }
    }

    /// Moves every playhead to the same absolute position.
    pub async fn seek_all(&self, position: Duration) -> Result<()> {
        for video in self.videos() {
            video.seek(position).await?;
        }
        self.audio.seek(position).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.audio.set_volume(volume).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.audio.set_muted(muted).await
    }

    pub async fn audio_position_secs(&self) -> Result<f64> {
        self.audio.position_secs().await
    }

    pub async fn audio_duration_secs(&self) -> Result<Option<f64>> {
        self.audio.duration_secs().await
    }

    pub async fn audio_paused(&self) -> Result<bool> {
        self.audio.is_paused().await
    }

    pub fn subscribe_audio(&self) -> broadcast::Receiver<MediaEvent> {
        self.audio.subscribe()
    }

    /// Re-aligns each video playhead to the audio clock when its drift
    /// exceeds [`DRIFT_TOLERANCE_SECS`]. Returns how many video seeks
    /// were issued.
    pub async fn resync_videos(&self) -> Result<u32> {
        let audio_pos = self.audio.position_secs().await?;
        let mut corrected = 0;
        for video in self.videos() {
            // An idle output (nothing loaded, or stopped) has no
            // playhead worth correcting.
            if video.is_paused().await.unwrap_or(true) {
                continue;
            }
            let video_pos = video.position_secs().await?;
            let drift = (video_pos - audio_pos).abs();
            if drift > DRIFT_TOLERANCE_SECS {
                tracing::debug!(drift, audio_pos, "Video drifted, re-aligning to audio clock");
                video.seek(Duration::from_secs_f64(audio_pos.max(0.0))).await?;
                corrected += 1;
            }
        }
        Ok(corrected)
    }
}
