//! Core library for the x-src beat synchronisation engine.
//!
//! Sources resolve a URL to a [`TrackHandle`] and, where the source allows
//! it, an [`Analysis`]. The [`BeatBus`] is seeded with that analysis and
//! answers "where in the beat/bar/section structure is time T" for render
//! loops and clip editors. Everything here runs offline; no module reads
//! audio devices or talks to a network on its own.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod source;
pub mod timeline;
pub mod timing;

pub use analysis::{estimate_from_pcm, Analysis, Bar, Beat, PcmBuffer, Section};
pub use config::{AppConfig, EstimationConfig, PlaybackConfig};
pub use engine::{BeatBus, BeatSnapshot, SharedBeatBus};
pub use error::{Result, XsrcError};
pub use mapping::{MappingDescriptor, MappingMatrix, MusicUniforms, ParameterUpdate};
pub use source::{
    AnalysisOrigin, AnalysisProvider, LocalFileAdapter, PcmProvider, ResolvedTrack, SourceAdapter,
    SourceCapabilities, SourceRegistry, TrackHandle, TrackSource,
};
pub use timeline::{ClipRange, FrameClock};
