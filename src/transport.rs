//! Room transport boundary: the named-event contract this client
//! speaks with the room server, and an in-process channel-backed
//! implementation used for wiring and tests.
//!
//! Connection management (reconnects, queuing while offline) belongs
//! to the transport layer itself; this client only requires that
//! `emit` never blocks or fails the playback session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::model::Song;

/// Analytics ping payload. Currently only "listening", emitted once
/// per song past the engaged-time threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub at: DateTime<Utc>,
}

/// Room-wide named events, both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomEvent {
    /// Playing/paused flag of this listener.
    Status(bool),
    /// Periodic playhead position in seconds.
    Progress(f64),
    Analytics(AnalyticsPayload),
    /// Absolute position change, admin-originated.
    Seek(f64),
    /// Natural end, or a skip requested by the retry policy.
    SongEnded,
    PlayNext,
    PlayPrev,
    /// Inbound: the room moved to another track.
    SongChanged(Song),
}

impl RoomEvent {
    pub fn listening() -> Self {
        RoomEvent::Analytics(AnalyticsPayload {
            kind: "listening".to_string(),
            at: Utc::now(),
        })
    }
}

/// Bidirectional event channel to the room. Outbound sends are
/// best-effort; inbound events arrive on the subscription.
pub trait RoomTransport: Send + Sync {
    fn emit(&self, event: RoomEvent);
    fn subscribe(&self) -> broadcast::Receiver<RoomEvent>;
    fn is_connected(&self) -> bool;
}

/// In-process transport over tokio channels. The room-server side of
/// the pair is the `UnboundedReceiver` handed back by [`ChannelTransport::pair`].
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<RoomEvent>,
    inbound: broadcast::Sender<RoomEvent>,
    connected: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<RoomEvent>) {
        let (outbound, server_rx) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(128);
        let transport = Arc::new(Self {
            outbound,
            inbound,
            connected: Arc::new(AtomicBool::new(true)),
        });
        (transport, server_rx)
    }

    /// Delivers a server-originated event to this client.
    pub fn inject(&self, event: RoomEvent) {
        let _ = self.inbound.send(event);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl RoomTransport for ChannelTransport {
    fn emit(&self, event: RoomEvent) {
        if !self.is_connected() {
            tracing::debug!(?event, "Transport disconnected, dropping outbound event");
            return;
        }
        if self.outbound.send(event).is_err() {
            tracing::debug!("Room server side of the transport is gone");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inbound.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_room_contract() {
        let json = serde_json::to_value(RoomEvent::SongEnded).unwrap();
        assert_eq!(json["event"], "songEnded");

        let json = serde_json::to_value(RoomEvent::PlayNext).unwrap();
        assert_eq!(json["event"], "playNext");

        let json = serde_json::to_value(RoomEvent::Status(false)).unwrap();
        assert_eq!(json["event"], "status");
        assert_eq!(json["data"], false);

        let json = serde_json::to_value(RoomEvent::listening()).unwrap();
        assert_eq!(json["event"], "analytics");
        assert_eq!(json["data"]["type"], "listening");
    }

    #[tokio::test]
    async fn disconnected_emit_is_a_noop() {
        let (transport, mut server) = ChannelTransport::pair();
        transport.set_connected(false);
        transport.emit(RoomEvent::SongEnded);
        assert!(server.try_recv().is_err());

        transport.set_connected(true);
        transport.emit(RoomEvent::Progress(12.5));
        assert_eq!(server.try_recv().unwrap(), RoomEvent::Progress(12.5));
    }

    #[tokio::test]
    async fn injected_events_reach_subscribers() {
        let (transport, _server) = ChannelTransport::pair();
        let mut rx = transport.subscribe();
        transport.inject(RoomEvent::Seek(42.0));
        assert_eq!(rx.recv().await.unwrap(), RoomEvent::Seek(42.0));
    }
}
