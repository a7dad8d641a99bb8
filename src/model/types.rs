//! Shared value types for the room model

use serde::{Deserialize, Serialize};

/// Artwork shown when a song arrives without any image variants.
pub const PLACEHOLDER_ARTWORK: &str = "/cache.jpg";

/// Caller role within a room. Only the admin may mutate shared
/// playback position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Listener,
}

/// Host environment the client runs in. Only affects the wording of the
/// terminal skip-limit message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppContext {
    Desktop,
    Web,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// One artwork rendition. Variants are ordered ascending by quality,
/// so the last entry is the best one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub quality: String,
    pub url: String,
}

/// One playable source rendition. `url` is opaque until the resolver
/// has turned it into a media locator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceVariant {
    pub url: String,
    pub source: String,
}

/// A track as supplied by the room. Read-only to this client; replaced
/// wholesale on song change, never mutated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub images: Vec<ImageVariant>,
    #[serde(default)]
    pub sources: Vec<SourceVariant>,
    #[serde(default)]
    pub video: Option<bool>,
    #[serde(default)]
    pub added_by: Option<String>,
}

impl Song {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }

    /// Highest-quality artwork URL, falling back to the placeholder for
    /// malformed songs that carry no image variants.
    pub fn artwork_url(&self) -> &str {
        self.images
            .last()
            .map(|i| i.url.as_str())
            .unwrap_or(PLACEHOLDER_ARTWORK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song_json() -> &'static str {
        r#"{
            "id": "sng-1",
            "name": "Test Song",
            "artists": [{"name": "Someone"}],
            "images": [
                {"quality": "50x50", "url": "http://img/low"},
                {"quality": "500x500", "url": "http://img/high"}
            ],
            "sources": [{"url": "opaque://x", "source": "youtube"}]
        }"#
    }

    #[test]
    fn deserializes_room_song() {
        let song: Song = serde_json::from_str(song_json()).unwrap();
        assert_eq!(song.id, "sng-1");
        assert_eq!(song.primary_artist(), "Someone");
        assert_eq!(song.artwork_url(), "http://img/high");
    }

    #[test]
    fn malformed_song_falls_back_to_placeholder_artwork() {
        let song: Song = serde_json::from_str(r#"{"id": "x", "name": "bare"}"#).unwrap();
        assert!(song.sources.is_empty());
        assert_eq!(song.artwork_url(), PLACEHOLDER_ARTWORK);
        assert_eq!(song.primary_artist(), "");
    }
}
