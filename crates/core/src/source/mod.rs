//! Track sources and the capability contract callers branch on.
//!
//! Every source kind declares a fixed [`SourceCapabilities`] set. Optional
//! behaviour (official analysis, raw PCM) is exposed as `Option` accessors on
//! [`SourceAdapter`] so callers check for it up front instead of catching an
//! unsupported-operation failure.

mod catalog;
mod local;
mod registry;
mod spotify;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Analysis, PcmBuffer, Result};

pub use catalog::{CatalogAdapter, CatalogApi, CatalogTrack};
pub use local::LocalFileAdapter;
pub use registry::{AnalysisOrigin, ResolvedTrack, SourceRegistry};
pub use spotify::{
    analysis_from_payloads, SpotifyAdapter, SpotifyAlbum, SpotifyApi, SpotifyArtist,
    SpotifyAudioAnalysis, SpotifyAudioFeatures, SpotifyExternalIds, SpotifyImage, SpotifySection,
    SpotifyTimeInterval, SpotifyTrack,
};

/// Closed set of supported source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Spotify,
    Youtube,
    Apple,
    Local,
}

impl TrackSource {
    pub const ALL: [TrackSource; 4] = [
        TrackSource::Spotify,
        TrackSource::Youtube,
        TrackSource::Apple,
        TrackSource::Local,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackSource::Spotify => "spotify",
            TrackSource::Youtube => "youtube",
            TrackSource::Apple => "apple",
            TrackSource::Local => "local",
        }
    }

    /// Static capability lookup. Never changes at runtime.
    pub const fn capabilities(self) -> SourceCapabilities {
        match self {
            TrackSource::Spotify => SourceCapabilities {
                playback: true,
                pcm: false,
                official_analysis: true,
                allow_audio_export: false,
                allow_seeking: true,
            },
            TrackSource::Youtube | TrackSource::Apple => SourceCapabilities {
                playback: true,
                pcm: false,
                official_analysis: false,
                allow_audio_export: false,
                allow_seeking: true,
            },
            TrackSource::Local => SourceCapabilities {
                playback: true,
                pcm: true,
                official_analysis: false,
                allow_audio_export: true,
                allow_seeking: true,
            },
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCapabilities {
    /// The source can be played back natively.
    pub playback: bool,
    /// Raw audio access is permitted.
    pub pcm: bool,
    /// The source publishes beat-level analysis.
    pub official_analysis: bool,
    pub allow_audio_export: bool,
    pub allow_seeking: bool,
}

/// Identity and display metadata for a resolved track. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackHandle {
    id: String,
    source: TrackSource,
    source_id: String,
    title: String,
    artist: String,
    duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artwork_url: Option<String>,
}

impl TrackHandle {
    /// Builds a handle whose internal id is `<source>:<source_id>`.
    pub fn new(
        source: TrackSource,
        source_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: format!("{source}:{source_id}"),
            source,
            source_id,
            title: title.into(),
            artist: artist.into(),
            duration_ms,
            isrc: None,
            album: None,
            artwork_url: None,
        }
    }

    pub fn with_isrc(mut self, isrc: Option<String>) -> Self {
        self.isrc = isrc;
        self
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album = album;
        self
    }

    pub fn with_artwork_url(mut self, artwork_url: Option<String>) -> Self {
        self.artwork_url = artwork_url;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn isrc(&self) -> Option<&str> {
        self.isrc.as_deref()
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }
}

/// Official analysis retrieval for sources that publish it.
pub trait AnalysisProvider: Send + Sync {
    fn fetch_analysis(&self, source_id: &str) -> Result<Analysis>;
}

/// Raw audio retrieval for sources that permit it.
pub trait PcmProvider: Send + Sync {
    fn read_pcm(&self, source_id: &str) -> Result<PcmBuffer>;
}

/// Per-source integration: URL recognition, metadata, and optional
/// analysis/PCM access. Playback embedding is handled outside this crate.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> TrackSource;

    fn capabilities(&self) -> SourceCapabilities {
        self.kind().capabilities()
    }

    /// Returns the source-native id when the URL belongs to this source.
    fn parse_url(&self, url: &str) -> Option<String>;

    fn fetch_metadata(&self, source_id: &str) -> Result<TrackHandle>;

    fn analysis_provider(&self) -> Option<&dyn AnalysisProvider> {
        None
    }

    fn pcm_provider(&self) -> Option<&dyn PcmProvider> {
        None
    }
}
