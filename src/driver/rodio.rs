//! Local audio engine over a rodio sink.
//!
//! rodio's `OutputStream` is not `Send`, so a dedicated worker thread
//! owns the stream and sink; the async trait methods talk to it over a
//! command channel. The worker also watches for the sink draining and
//! turns that into a normalized `Ended` event.

use std::fs::File;
use std::io::BufReader;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::Duration;

use ::rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::{broadcast, oneshot};

use super::{MediaEngine, MediaError, MediaEvent};

const WORKER_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, Default)]
struct EngineStatus {
    position_secs: f64,
    duration_secs: Option<f64>,
    paused: bool,
}

enum Cmd {
    Load(String, oneshot::Sender<Result<(), MediaError>>),
    Clear,
    Play(oneshot::Sender<Result<(), MediaError>>),
    Pause,
    Seek(Duration),
    SetVolume(f64),
    SetMuted(bool),
    Query(oneshot::Sender<EngineStatus>),
    Shutdown,
}

pub struct RodioEngine {
    commands: Mutex<mpsc::Sender<Cmd>>,
    events: broadcast::Sender<MediaEvent>,
}

impl RodioEngine {
    pub fn new() -> Result<Self> {
        let (commands, rx) = mpsc::channel();
        let (events, _) = broadcast::channel(64);
        let worker_events = events.clone();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        std::thread::Builder::new()
            .name("rodio-engine".to_string())
            .spawn(move || worker_loop(rx, worker_events, ready_tx))?;

        // Surface an unusable audio device at construction time.
        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("audio worker exited during startup"))?
            .map_err(|e| anyhow::anyhow!("audio output unavailable: {e}"))?;

        Ok(Self {
            commands: Mutex::new(commands),
            events,
        })
    }

    fn send(&self, cmd: Cmd) -> Result<()> {
        let commands = self
            .commands
            .lock()
            .map_err(|_| anyhow::anyhow!("audio command channel poisoned"))?;
        commands
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("audio worker is gone"))
    }

    async fn query(&self) -> Result<EngineStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Cmd::Query(tx))?;
        Ok(rx.await?)
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        if let Ok(commands) = self.commands.lock() {
            let _ = commands.send(Cmd::Shutdown);
        }
    }
}

impl MediaEngine for RodioEngine {
    fn load(&self, locator: &str) -> BoxFuture<'_, Result<()>> {
        let locator = locator.to_string();
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            self.send(Cmd::Load(locator, tx))?;
            rx.await?.map_err(anyhow::Error::new)
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.send(Cmd::Clear) })
    }

    fn play(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            self.send(Cmd::Play(tx))?;
            rx.await?.map_err(anyhow::Error::new)
        })
    }

    fn pause(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.send(Cmd::Pause) })
    }

    fn seek(&self, position: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.send(Cmd::Seek(position)) })
    }

    fn set_volume(&self, volume: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.send(Cmd::SetVolume(volume)) })
    }

    fn set_muted(&self, muted: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.send(Cmd::SetMuted(muted)) })
    }

    fn position_secs(&self) -> BoxFuture<'_, Result<f64>> {
        Box::pin(async move { Ok(self.query().await?.position_secs) })
    }

    fn duration_secs(&self) -> BoxFuture<'_, Result<Option<f64>>> {
        Box::pin(async move { Ok(self.query().await?.duration_secs) })
    }

    fn is_paused(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.query().await?.paused) })
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

struct Worker {
    // Keeps the audio device open for the sink's lifetime.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    duration: Option<Duration>,
    volume: f64,
    muted: bool,
    events: broadcast::Sender<MediaEvent>,
}

impl Worker {
    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume as f32
        }
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    fn load(&mut self, locator: &str) -> Result<(), MediaError> {
        self.drop_sink();

        let path = locator.strip_prefix("file://").unwrap_or(locator);
        let file = File::open(path)
            .map_err(|e| MediaError::NoSupportedSource(format!("{path}: {e}")))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| MediaError::NoSupportedSource(format!("{path}: {e}")))?;
        self.duration = source.total_duration();

        let sink = Sink::try_new(&self.handle).map_err(|e| MediaError::Engine(e.to_string()))?;
        sink.set_volume(self.effective_volume());
        sink.append(source);
        sink.pause();
        self.sink = Some(sink);

        self.emit(MediaEvent::CanPlay);
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        match &self.sink {
            Some(sink) if !sink.empty() => {
                sink.play();
                self.emit(MediaEvent::Play);
                Ok(())
            }
            _ => Err(MediaError::NoSupportedSource(
                "no source attached".to_string(),
            )),
        }
    }

    fn drop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.duration = None;
    }

    fn status(&self) -> EngineStatus {
        match &self.sink {
            Some(sink) => EngineStatus {
                position_secs: sink.get_pos().as_secs_f64(),
                duration_secs: self.duration.map(|d| d.as_secs_f64()),
                paused: sink.is_paused() || sink.empty(),
            },
            None => EngineStatus {
                paused: true,
                ..Default::default()
            },
        }
    }

    /// A playing sink that ran dry means the track ended naturally.
    fn poll_ended(&mut self) {
        let ended = self
            .sink
            .as_ref()
            .is_some_and(|s| s.empty() && !s.is_paused());
        if ended {
            self.drop_sink();
            self.emit(MediaEvent::Ended);
        }
    }

    fn handle(&mut self, cmd: Cmd) -> bool {
        match cmd {
            Cmd::Load(locator, reply) => {
                let _ = reply.send(self.load(&locator));
            }
            Cmd::Clear => self.drop_sink(),
            Cmd::Play(reply) => {
                let _ = reply.send(self.play());
            }
            Cmd::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                    self.emit(MediaEvent::Pause);
                }
            }
            Cmd::Seek(position) => {
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.try_seek(position) {
                        tracing::warn!(error = %e, "Audio seek failed");
                    }
                }
            }
            Cmd::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
                if let Some(sink) = &self.sink {
                    sink.set_volume(self.effective_volume());
                }
            }
            Cmd::SetMuted(muted) => {
                self.muted = muted;
                if let Some(sink) = &self.sink {
                    sink.set_volume(self.effective_volume());
                }
            }
            Cmd::Query(reply) => {
                let _ = reply.send(self.status());
            }
            Cmd::Shutdown => return false,
        }
        true
    }
}

fn worker_loop(
    rx: mpsc::Receiver<Cmd>,
    events: broadcast::Sender<MediaEvent>,
    ready: mpsc::Sender<Result<(), String>>,
) {
    let (stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut worker = Worker {
        _stream: stream,
        handle,
        sink: None,
        duration: None,
        volume: 1.0,
        muted: false,
        events,
    };

    loop {
        match rx.recv_timeout(WORKER_POLL) {
            Ok(cmd) => {
                if !worker.handle(cmd) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => worker.poll_ended(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
