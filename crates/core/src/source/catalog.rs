use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{SourceAdapter, TrackHandle, TrackSource};
use crate::{Result, XsrcError};

static YOUTUBE_URL: OnceLock<Regex> = OnceLock::new();
static APPLE_URL: OnceLock<Regex> = OnceLock::new();

fn youtube_url() -> &'static Regex {
    YOUTUBE_URL.get_or_init(|| {
        Regex::new(concat!(
            r"^https?://(?:",
            r"(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})",
            r"|youtu\.be/([A-Za-z0-9_-]{11})",
            r"|(?:www\.)?youtube\.com/(?:embed|shorts)/([A-Za-z0-9_-]{11})",
            r")"
        ))
        .expect("youtube url pattern is valid")
    })
}

fn apple_url() -> &'static Regex {
    APPLE_URL.get_or_init(|| {
        Regex::new(concat!(
            r"^https?://music\.apple\.com/[a-z]{2}/(?:",
            r"album/[^/?#]+/\d+\?(?:[^#]*&)?i=(\d+)",
            r"|song/[^/?#]+/(\d+)",
            r")"
        ))
        .expect("apple music url pattern is valid")
    })
}

/// Track metadata as returned by a catalogue lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
}

/// Metadata lookup for sources that expose nothing beyond an embeddable
/// player and a catalogue.
pub trait CatalogApi: Send + Sync {
    fn track(&self, source_id: &str) -> Result<CatalogTrack>;
}

/// Adapter for YouTube and Apple Music: playback and seeking only, no
/// analysis and no PCM.
#[derive(Clone)]
pub struct CatalogAdapter {
    kind: TrackSource,
    api: Option<Arc<dyn CatalogApi>>,
}

impl CatalogAdapter {
    pub fn youtube(api: Option<Arc<dyn CatalogApi>>) -> Self {
        Self {
            kind: TrackSource::Youtube,
            api,
        }
    }

    pub fn apple(api: Option<Arc<dyn CatalogApi>>) -> Self {
        Self {
            kind: TrackSource::Apple,
            api,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self.kind {
            TrackSource::Apple => apple_url(),
            _ => youtube_url(),
        }
    }
}

impl std::fmt::Debug for CatalogAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogAdapter")
            .field("kind", &self.kind)
            .field("configured", &self.api.is_some())
            .finish()
    }
}

impl SourceAdapter for CatalogAdapter {
    fn kind(&self) -> TrackSource {
        self.kind
    }

    fn parse_url(&self, url: &str) -> Option<String> {
        let captures = self.pattern().captures(url.trim())?;
        captures
            .iter()
            .skip(1)
            .flatten()
            .next()
            .map(|id| id.as_str().to_string())
    }

    fn fetch_metadata(&self, source_id: &str) -> Result<TrackHandle> {
        let api = self.api.as_deref().ok_or_else(|| XsrcError::Authentication {
            kind: self.kind,
            reason: "catalogue client not configured".to_string(),
        })?;
        let track = api.track(source_id)?;

        Ok(
            TrackHandle::new(self.kind, source_id, track.title, track.artist, track.duration_ms)
                .with_isrc(track.isrc)
                .with_album(track.album)
                .with_artwork_url(track.artwork_url),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneTrack;

    impl CatalogApi for OneTrack {
        fn track(&self, source_id: &str) -> Result<CatalogTrack> {
            match source_id {
                "dQw4w9WgXcQ" => Ok(CatalogTrack {
                    title: "Video".to_string(),
                    artist: "Channel".to_string(),
                    duration_ms: 212_000,
                    ..Default::default()
                }),
                other => Err(XsrcError::NotFound {
                    kind: TrackSource::Youtube,
                    id: other.to_string(),
                }),
            }
        }
    }

    #[test]
    fn parses_youtube_urls() {
        let adapter = CatalogAdapter::youtube(None);
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ&feature=share",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
        ] {
            assert_eq!(adapter.parse_url(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
        assert_eq!(adapter.parse_url("https://open.spotify.com/track/abc"), None);
    }

    #[test]
    fn parses_apple_music_urls() {
        let adapter = CatalogAdapter::apple(None);
        assert_eq!(
            adapter
                .parse_url("https://music.apple.com/us/album/some-album/1440857781?i=1440857786")
                .as_deref(),
            Some("1440857786")
        );
        assert_eq!(
            adapter
                .parse_url("https://music.apple.com/gb/song/some-song/1440857786")
                .as_deref(),
            Some("1440857786")
        );
        assert_eq!(
            adapter.parse_url("https://music.apple.com/us/album/some-album/1440857781"),
            None
        );
    }

    #[test]
    fn fetches_metadata_through_catalogue() {
        let adapter = CatalogAdapter::youtube(Some(Arc::new(OneTrack)));
        let handle = adapter.fetch_metadata("dQw4w9WgXcQ").unwrap();
        assert_eq!(handle.id(), "youtube:dQw4w9WgXcQ");
        assert_eq!(handle.duration_ms(), 212_000);

        assert!(matches!(
            adapter.fetch_metadata("missing").unwrap_err(),
            XsrcError::NotFound { .. }
        ));
        assert!(adapter.analysis_provider().is_none());
        assert!(adapter.pcm_provider().is_none());
    }

    #[test]
    fn unconfigured_catalogue_fails_authentication() {
        let adapter = CatalogAdapter::apple(None);
        assert!(matches!(
            adapter.fetch_metadata("1").unwrap_err(),
            XsrcError::Authentication { .. }
        ));
    }
}
