//! Source resolution boundary.
//!
//! An external resolver/decryptor turns a song's opaque source URL into
//! a directly playable locator. Any failure here is indistinguishable
//! from a media-load failure, so it is reported as an unplayable-source
//! error and feeds the skip/retry policy.

use anyhow::Result;
use futures::future::BoxFuture;

use crate::driver::MediaError;
use crate::model::Song;

pub trait SourceResolver: Send + Sync {
    /// Yields a playable media locator for the song.
    fn resolve(&self, song: &Song) -> BoxFuture<'_, Result<String>>;
}

/// Passthrough resolver: picks a source variant and hands its URL out
/// unchanged. Prefers an explicit "youtube" source; otherwise takes the
/// last variant, which carries the highest quality.
pub struct DirectResolver;

impl DirectResolver {
    fn choose(song: &Song) -> Result<String> {
        let variant = song
            .sources
            .iter()
            .find(|s| s.source == "youtube")
            .or_else(|| song.sources.last());
        match variant {
            Some(variant) => Ok(variant.url.clone()),
            None => Err(anyhow::Error::new(MediaError::NoSupportedSource(format!(
                "song {} has no source variants",
                song.id
            )))),
        }
    }
}

impl SourceResolver for DirectResolver {
    fn resolve(&self, song: &Song) -> BoxFuture<'_, Result<String>> {
        let chosen = Self::choose(song);
        Box::pin(async move { chosen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::is_no_supported_source;
    use crate::model::SourceVariant;

    fn song_with_sources(sources: Vec<SourceVariant>) -> Song {
        Song {
            id: "s".to_string(),
            name: "s".to_string(),
            artists: vec![],
            images: vec![],
            sources,
            video: None,
            added_by: None,
        }
    }

    #[tokio::test]
    async fn prefers_youtube_variant() {
        let song = song_with_sources(vec![
            SourceVariant {
                url: "u1".into(),
                source: "youtube".into(),
            },
            SourceVariant {
                url: "u2".into(),
                source: "cdn".into(),
            },
        ]);
        assert_eq!(DirectResolver.resolve(&song).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn falls_back_to_highest_quality_variant() {
        let song = song_with_sources(vec![
            SourceVariant {
                url: "low".into(),
                source: "cdn".into(),
            },
            SourceVariant {
                url: "high".into(),
                source: "cdn".into(),
            },
        ]);
        assert_eq!(DirectResolver.resolve(&song).await.unwrap(), "high");
    }

    #[tokio::test]
    async fn missing_sources_count_as_unplayable() {
        let song = song_with_sources(vec![]);
        let err = DirectResolver.resolve(&song).await.unwrap_err();
        assert!(is_no_supported_source(&err));
    }
}
