use serde::{Deserialize, Serialize};

use super::{
    CatalogAdapter, LocalFileAdapter, SourceAdapter, SpotifyAdapter, TrackHandle, TrackSource,
};
use crate::{analysis::estimate_from_pcm, config::EstimationConfig, Analysis, Result, XsrcError};

/// Where the analysis of a resolved track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisOrigin {
    /// Published by the source.
    Official,
    /// Synthesised locally from PCM.
    Estimated,
    /// Nothing available; the beat engine runs on its default tempo.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    pub track: TrackHandle,
    pub analysis: Analysis,
    pub origin: AnalysisOrigin,
}

/// Ordered set of adapters; the first one that recognises a URL wins.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter and no remote credentials.
    /// Local files resolve fully; remote sources parse but fail to fetch.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SpotifyAdapter::unconfigured());
        registry.register(CatalogAdapter::youtube(None));
        registry.register(CatalogAdapter::apple(None));
        registry.register(LocalFileAdapter::new());
        registry
    }

    /// Adds an adapter, replacing any previously registered one of the same
    /// kind.
    pub fn register(&mut self, adapter: impl SourceAdapter + 'static) {
        let kind = adapter.kind();
        self.adapters.retain(|existing| existing.kind() != kind);
        self.adapters.push(Box::new(adapter));
    }

    pub fn adapter(&self, kind: TrackSource) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.kind() == kind)
            .map(|adapter| adapter.as_ref())
    }

    /// Finds the adapter that recognises `url` along with the source id.
    pub fn parse(&self, url: &str) -> Option<(&dyn SourceAdapter, String)> {
        self.adapters.iter().find_map(|adapter| {
            adapter
                .parse_url(url)
                .map(|source_id| (adapter.as_ref(), source_id))
        })
    }

    /// Resolves a URL to metadata plus the best analysis the source allows:
    /// official data when published, a PCM estimate when raw audio is
    /// permitted, otherwise an empty analysis.
    pub fn resolve(&self, url: &str, estimation: &EstimationConfig) -> Result<ResolvedTrack> {
        let (adapter, source_id) = self
            .parse(url)
            .ok_or_else(|| XsrcError::UnrecognisedUrl(url.to_string()))?;
        let kind = adapter.kind();
        let capabilities = adapter.capabilities();
        tracing::debug!(%kind, %source_id, ?capabilities, "resolving track");

        let track = adapter.fetch_metadata(&source_id)?;

        let (analysis, origin) = if capabilities.official_analysis {
            let provider = adapter.analysis_provider().ok_or(XsrcError::Unsupported {
                kind,
                operation: "official analysis",
            })?;
            (provider.fetch_analysis(&source_id)?, AnalysisOrigin::Official)
        } else if capabilities.pcm {
            let provider = adapter.pcm_provider().ok_or(XsrcError::Unsupported {
                kind,
                operation: "pcm access",
            })?;
            let pcm = provider.read_pcm(&source_id)?;
            (estimate_from_pcm(&pcm, estimation), AnalysisOrigin::Estimated)
        } else {
            (Analysis::default(), AnalysisOrigin::Unavailable)
        };

        tracing::info!(
            id = track.id(),
            title = track.title(),
            ?origin,
            tempo = ?analysis.tempo,
            "resolved track"
        );

        Ok(ResolvedTrack {
            track,
            analysis,
            origin,
        })
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<TrackSource> = self.adapters.iter().map(|adapter| adapter.kind()).collect();
        f.debug_struct("SourceRegistry").field("adapters", &kinds).finish()
    }
}
