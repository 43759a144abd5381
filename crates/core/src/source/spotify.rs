use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{AnalysisProvider, SourceAdapter, TrackHandle, TrackSource};
use crate::{
    analysis::{Analysis, Bar, Beat, Section},
    Result, XsrcError,
};

/// A beat within this distance of a bar start is marked as a downbeat.
const DOWNBEAT_TOLERANCE: f64 = 0.05;

/// Window used by the bar-less downbeat heuristic.
const MODULO_DOWNBEAT_WINDOW: f64 = 0.1;

static TRACK_URL: OnceLock<Regex> = OnceLock::new();

fn track_url() -> &'static Regex {
    TRACK_URL.get_or_init(|| {
        Regex::new(r"^(?:https?://(?:open\.)?spotify\.com/(?:intl-[a-z]+/)?track/|spotify:track:)([A-Za-z0-9]+)")
            .expect("spotify track pattern is valid")
    })
}

/// Web API transport. Implementations own authentication and HTTP; the
/// adapter only maps their payloads.
pub trait SpotifyApi: Send + Sync {
    fn track(&self, id: &str) -> Result<SpotifyTrack>;
    fn audio_features(&self, id: &str) -> Result<SpotifyAudioFeatures>;
    fn audio_analysis(&self, id: &str) -> Result<SpotifyAudioAnalysis>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub duration_ms: u64,
    #[serde(default)]
    pub external_ids: Option<SpotifyExternalIds>,
    #[serde(default)]
    pub album: Option<SpotifyAlbum>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyExternalIds {
    #[serde(default)]
    pub isrc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyAudioFeatures {
    pub tempo: Option<f64>,
    pub key: Option<f64>,
    pub energy: Option<f64>,
    pub loudness: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
    pub instrumentalness: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyTimeInterval {
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifySection {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyAudioAnalysis {
    #[serde(default)]
    pub beats: Vec<SpotifyTimeInterval>,
    #[serde(default)]
    pub bars: Vec<SpotifyTimeInterval>,
    #[serde(default)]
    pub sections: Vec<SpotifySection>,
}

impl SpotifyTrack {
    fn into_handle(self, source_id: &str) -> TrackHandle {
        let artist = self
            .artists
            .into_iter()
            .next()
            .map(|artist| artist.name)
            .unwrap_or_else(|| "Unknown Artist".to_string());
        let isrc = self.external_ids.and_then(|ids| ids.isrc);
        let (album, artwork) = match self.album {
            Some(album) => {
                let artwork = album.images.into_iter().next().map(|image| image.url);
                (Some(album.name), artwork)
            }
            None => (None, None),
        };

        TrackHandle::new(TrackSource::Spotify, source_id, self.name, artist, self.duration_ms)
            .with_isrc(isrc)
            .with_album(album)
            .with_artwork_url(artwork)
    }
}

/// Merges the audio-features and audio-analysis payloads into one
/// [`Analysis`].
///
/// Downbeats are the beats that line up with a bar start. Payloads without
/// bars fall back to a 4/4 modulo test against the reported tempo.
pub fn analysis_from_payloads(
    features: SpotifyAudioFeatures,
    payload: SpotifyAudioAnalysis,
) -> Analysis {
    let tempo = features.tempo.filter(|tempo| *tempo > 0.0);
    let bar_starts: Vec<f64> = payload.bars.iter().map(|bar| bar.start).collect();

    let beats = payload
        .beats
        .iter()
        .map(|beat| Beat {
            time: beat.start,
            is_downbeat: if bar_starts.is_empty() {
                modulo_downbeat(beat.start, tempo)
            } else {
                near_any(&bar_starts, beat.start, DOWNBEAT_TOLERANCE)
            },
        })
        .collect();

    Analysis {
        tempo,
        beats,
        bars: bar_starts.into_iter().map(Bar::new).collect(),
        sections: payload
            .sections
            .into_iter()
            .map(|section| Section {
                start: section.start,
                duration: section.duration,
                label: section.name,
            })
            .collect(),
        key: features.key,
        energy: features.energy,
        loudness: features.loudness,
        valence: features.valence,
        danceability: features.danceability,
        instrumentalness: features.instrumentalness,
    }
}

fn modulo_downbeat(time: f64, tempo: Option<f64>) -> bool {
    match tempo {
        Some(tempo) => time.rem_euclid(60.0 / tempo * 4.0) < MODULO_DOWNBEAT_WINDOW,
        None => false,
    }
}

/// `sorted` must be ascending.
fn near_any(sorted: &[f64], time: f64, tolerance: f64) -> bool {
    let index = sorted.partition_point(|start| *start < time);
    let after = sorted.get(index).map(|start| start - time);
    let before = index
        .checked_sub(1)
        .and_then(|prev| sorted.get(prev))
        .map(|start| time - start);
    [after, before]
        .into_iter()
        .flatten()
        .any(|distance| distance <= tolerance)
}

/// Adapter for Spotify tracks. Publishes official analysis but no PCM.
#[derive(Clone, Default)]
pub struct SpotifyAdapter {
    api: Option<Arc<dyn SpotifyApi>>,
}

impl SpotifyAdapter {
    pub fn new(api: Arc<dyn SpotifyApi>) -> Self {
        Self { api: Some(api) }
    }

    /// Adapter without credentials. URL parsing still works; every remote
    /// call fails with an authentication error.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    fn api(&self) -> Result<&dyn SpotifyApi> {
        self.api
            .as_deref()
            .ok_or_else(|| XsrcError::Authentication {
                kind: TrackSource::Spotify,
                reason: "credentials not configured".to_string(),
            })
    }
}

impl std::fmt::Debug for SpotifyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyAdapter")
            .field("configured", &self.api.is_some())
            .finish()
    }
}

impl SourceAdapter for SpotifyAdapter {
    fn kind(&self) -> TrackSource {
        TrackSource::Spotify
    }

    fn parse_url(&self, url: &str) -> Option<String> {
        track_url()
            .captures(url.trim())
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
    }

    fn fetch_metadata(&self, source_id: &str) -> Result<TrackHandle> {
        let track = self.api()?.track(source_id)?;
        Ok(track.into_handle(source_id))
    }

    fn analysis_provider(&self) -> Option<&dyn AnalysisProvider> {
        Some(self)
    }
}

impl AnalysisProvider for SpotifyAdapter {
    fn fetch_analysis(&self, source_id: &str) -> Result<Analysis> {
        let api = self.api()?;
        let features = api.audio_features(source_id)?;
        let payload = api.audio_analysis(source_id)?;
        let analysis = analysis_from_payloads(features, payload);
        analysis.validate()?;
        tracing::debug!(
            source_id,
            beats = analysis.beats.len(),
            sections = analysis.sections.len(),
            "fetched spotify analysis"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: f64) -> SpotifyTimeInterval {
        SpotifyTimeInterval {
            start,
            duration: 0.5,
            confidence: 0.9,
        }
    }

    struct FixtureApi;

    impl SpotifyApi for FixtureApi {
        fn track(&self, id: &str) -> Result<SpotifyTrack> {
            if id != "4uLU6hMCjMI75M1A2tKUQC" {
                return Err(XsrcError::NotFound {
                    kind: TrackSource::Spotify,
                    id: id.to_string(),
                });
            }
            Ok(serde_json::from_str(
                r#"{
                    "name": "Never Gonna Give You Up",
                    "artists": [{"name": "Rick Astley"}],
                    "duration_ms": 213573,
                    "external_ids": {"isrc": "GBARL9300135"},
                    "album": {"name": "Whenever You Need Somebody", "images": [{"url": "https://i.scdn.co/image/cover"}]}
                }"#,
            )?)
        }

        fn audio_features(&self, _id: &str) -> Result<SpotifyAudioFeatures> {
            Ok(SpotifyAudioFeatures {
                tempo: Some(120.0),
                energy: Some(0.9),
                ..Default::default()
            })
        }

        fn audio_analysis(&self, _id: &str) -> Result<SpotifyAudioAnalysis> {
            Ok(SpotifyAudioAnalysis {
                beats: (0..8).map(|i| interval(i as f64 * 0.5 + 0.01)).collect(),
                bars: vec![interval(0.0), interval(2.0)],
                sections: vec![SpotifySection {
                    start: 0.0,
                    duration: 4.0,
                    name: None,
                }],
            })
        }
    }

    #[test]
    fn parses_track_urls() {
        let adapter = SpotifyAdapter::unconfigured();
        assert_eq!(
            adapter.parse_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            adapter.parse_url("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            adapter.parse_url("https://open.spotify.com/album/1ATL5GLyefJaxhQzSPVrLX"),
            None
        );
        assert_eq!(adapter.parse_url("https://youtu.be/dQw4w9WgXcQ"), None);
    }

    #[test]
    fn missing_credentials_is_an_authentication_error() {
        let adapter = SpotifyAdapter::unconfigured();
        let err = adapter.fetch_metadata("abc").unwrap_err();
        assert!(matches!(err, XsrcError::Authentication { .. }));

        let err = adapter.fetch_analysis("abc").unwrap_err();
        assert!(matches!(err, XsrcError::Authentication { .. }));
    }

    #[test]
    fn maps_track_payload_to_handle() {
        let adapter = SpotifyAdapter::new(Arc::new(FixtureApi));
        let handle = adapter.fetch_metadata("4uLU6hMCjMI75M1A2tKUQC").unwrap();

        assert_eq!(handle.id(), "spotify:4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(handle.artist(), "Rick Astley");
        assert_eq!(handle.duration_ms(), 213_573);
        assert_eq!(handle.isrc(), Some("GBARL9300135"));
        assert_eq!(handle.artwork_url(), Some("https://i.scdn.co/image/cover"));

        let err = adapter.fetch_metadata("missing").unwrap_err();
        assert!(matches!(err, XsrcError::NotFound { .. }));
    }

    #[test]
    fn downbeats_follow_bar_starts() {
        let adapter = SpotifyAdapter::new(Arc::new(FixtureApi));
        let analysis = adapter.fetch_analysis("4uLU6hMCjMI75M1A2tKUQC").unwrap();

        let downbeats: Vec<usize> = analysis
            .beats
            .iter()
            .enumerate()
            .filter(|(_, beat)| beat.is_downbeat)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(downbeats, vec![0, 4]);
        assert_eq!(analysis.tempo, Some(120.0));
        assert_eq!(analysis.energy, Some(0.9));
        assert_eq!(analysis.bars.len(), 2);
    }

    #[test]
    fn barless_payload_uses_tempo_modulo() {
        let features = SpotifyAudioFeatures {
            tempo: Some(120.0),
            ..Default::default()
        };
        let payload = SpotifyAudioAnalysis {
            beats: (0..5).map(|i| interval(i as f64 * 0.5)).collect(),
            ..Default::default()
        };

        let analysis = analysis_from_payloads(features, payload);
        let flags: Vec<bool> = analysis.beats.iter().map(|beat| beat.is_downbeat).collect();
        assert_eq!(flags, vec![true, false, false, false, true]);
    }

    #[test]
    fn zero_tempo_is_treated_as_unknown() {
        let features = SpotifyAudioFeatures {
            tempo: Some(0.0),
            ..Default::default()
        };
        let analysis = analysis_from_payloads(features, SpotifyAudioAnalysis::default());
        assert!(analysis.tempo.is_none());
    }
}
