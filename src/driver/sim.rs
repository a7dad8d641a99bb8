//! Clock-simulated media engine.
//!
//! Tracks a playhead against wall time without producing any output.
//! Used for the video surfaces (an external renderer paints them; this
//! client only owns their clocks) and for tests, where load failures
//! can be injected.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use super::{MediaEngine, MediaError, MediaEvent};

#[derive(Default)]
struct SimState {
    loaded: Option<String>,
    paused: bool,
    /// Playhead at the moment the clock last started or was adjusted.
    base_secs: f64,
    started_at: Option<Instant>,
    duration_secs: Option<f64>,
    /// Duration every subsequently loaded source reports.
    duration_preset: Option<f64>,
    volume: f64,
    muted: bool,
    fail_next_load: Option<MediaError>,
    fail_next_play: Option<MediaError>,
}

impl SimState {
    fn position(&self) -> f64 {
        let pos = match self.started_at {
            Some(started_at) if !self.paused => self.base_secs + started_at.elapsed().as_secs_f64(),
            _ => self.base_secs,
        };
        match self.duration_secs {
            Some(duration) => pos.min(duration),
            None => pos,
        }
    }

    fn freeze_clock(&mut self) {
        self.base_secs = self.position();
        self.started_at = None;
    }
}

pub struct SimEngine {
    state: Mutex<SimState>,
    events: broadcast::Sender<MediaEvent>,
}

impl SimEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(SimState {
                paused: true,
                volume: 1.0,
                ..Default::default()
            }),
            events,
        }
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    /// Pins the playhead to an absolute position (test/clock helper).
    pub fn set_clock(&self, secs: f64) {
        let mut state = self.state.lock().unwrap();
        state.base_secs = secs;
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Advances the playhead without waiting on wall time.
    pub fn advance_clock(&self, secs: f64) {
        let mut state = self.state.lock().unwrap();
        state.freeze_clock();
        state.base_secs += secs;
        if !state.paused {
            state.started_at = Some(Instant::now());
        }
    }

    /// Sets the duration of the current source and of every source
    /// loaded afterwards, so a `clear`/`load` cycle does not lose it.
    pub fn set_media_duration(&self, secs: f64) {
        let mut state = self.state.lock().unwrap();
        state.duration_secs = Some(secs);
        state.duration_preset = Some(secs);
    }

    /// Makes the next `load` fail with the given error.
    pub fn fail_next_load(&self, error: MediaError) {
        self.state.lock().unwrap().fail_next_load = Some(error);
    }

    /// Makes the next `play` fail with the given error.
    pub fn fail_next_play(&self, error: MediaError) {
        self.state.lock().unwrap().fail_next_play = Some(error);
    }

    /// Simulates the media running out, as a native `ended` event would.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(duration) = state.duration_secs {
                state.base_secs = duration;
            }
            state.started_at = None;
            state.paused = true;
        }
        self.emit(MediaEvent::Ended);
    }

    pub fn loaded_locator(&self) -> Option<String> {
        self.state.lock().unwrap().loaded.clone()
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().unwrap().volume
    }

    pub fn muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for SimEngine {
    fn load(&self, locator: &str) -> BoxFuture<'_, Result<()>> {
        let locator = locator.to_string();
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(error) = state.fail_next_load.take() {
                    return Err(anyhow::Error::new(error));
                }
                state.loaded = Some(locator);
                state.base_secs = 0.0;
                state.started_at = None;
                state.paused = true;
                state.duration_secs = state.duration_preset;
            }
            self.emit(MediaEvent::CanPlay);
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.loaded = None;
            state.base_secs = 0.0;
            state.started_at = None;
            state.duration_secs = None;
            state.paused = true;
            Ok(())
        })
    }

    fn play(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(error) = state.fail_next_play.take() {
                    return Err(anyhow::Error::new(error));
                }
                if state.loaded.is_none() {
                    return Err(anyhow::Error::new(MediaError::NoSupportedSource(
                        "no source attached".to_string(),
                    )));
                }
                state.paused = false;
                state.started_at = Some(Instant::now());
            }
            self.emit(MediaEvent::Play);
            Ok(())
        })
    }

    fn pause(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                state.freeze_clock();
                state.paused = true;
            }
            self.emit(MediaEvent::Pause);
            Ok(())
        })
    }

    fn seek(&self, position: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.base_secs = position.as_secs_f64();
            if !state.paused {
                state.started_at = Some(Instant::now());
            }
            Ok(())
        })
    }

    fn set_volume(&self, volume: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().volume = volume.clamp(0.0, 1.0);
            Ok(())
        })
    }

    fn set_muted(&self, muted: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().muted = muted;
            Ok(())
        })
    }

    fn position_secs(&self) -> BoxFuture<'_, Result<f64>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().position()) })
    }

    fn duration_secs(&self) -> BoxFuture<'_, Result<Option<f64>>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().duration_secs) })
    }

    fn is_paused(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().paused) })
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_without_source_is_unplayable() {
        let engine = SimEngine::new();
        let err = engine.play().await.unwrap_err();
        assert!(super::super::is_no_supported_source(&err));
    }

    #[tokio::test]
    async fn clock_advances_only_while_playing() {
        let engine = SimEngine::new();
        engine.load("file://a").await.unwrap();
        engine.play().await.unwrap();
        engine.advance_clock(7.0);
        assert!(engine.position_secs().await.unwrap() >= 7.0);

        engine.pause().await.unwrap();
        let frozen = engine.position_secs().await.unwrap();
        engine.advance_clock(0.0);
        assert_eq!(engine.position_secs().await.unwrap(), frozen);
    }

    #[tokio::test]
    async fn position_saturates_at_duration() {
        let engine = SimEngine::new();
        engine.load("file://a").await.unwrap();
        engine.set_media_duration(10.0);
        engine.play().await.unwrap();
        engine.advance_clock(25.0);
        assert_eq!(engine.position_secs().await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn finish_emits_ended() {
        let engine = SimEngine::new();
        let mut events = engine.subscribe();
        engine.load("file://a").await.unwrap();
        engine.set_media_duration(3.0);
        engine.play().await.unwrap();
        // drain load/play events
        while let Ok(event) = events.try_recv() {
            assert_ne!(event, MediaEvent::Ended);
        }
        engine.finish();
        assert_eq!(events.try_recv().unwrap(), MediaEvent::Ended);
        assert!(engine.is_paused().await.unwrap());
    }
}
