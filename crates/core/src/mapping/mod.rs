use serde::{Deserialize, Serialize};

use crate::BeatSnapshot;

/// Feature names a [`MappingDescriptor`] can route from.
pub const FEATURES: [&str; 6] = ["time", "bpm", "beatPhase", "barPhase", "sectionIndex", "energy"];

/// Per-frame uniform block handed to the rendering pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicUniforms {
    pub time: f32,
    pub bpm: f32,
    pub beat_phase: f32,
    pub bar_phase: f32,
    pub section_index: f32,
    pub energy: f32,
}

impl MusicUniforms {
    /// Builds the block from a snapshot plus an energy level tracked
    /// outside the engine.
    pub fn from_snapshot(snapshot: &BeatSnapshot, energy: f32) -> Self {
        Self {
            time: snapshot.current_time as f32,
            bpm: snapshot.bpm as f32,
            beat_phase: snapshot.beat_phase as f32,
            bar_phase: snapshot.bar_phase as f32,
            section_index: snapshot.section_index as f32,
            energy,
        }
    }

    /// Packed in declaration order for upload.
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.time,
            self.bpm,
            self.beat_phase,
            self.bar_phase,
            self.section_index,
            self.energy,
        ]
    }

    pub fn feature(&self, name: &str) -> Option<f32> {
        FEATURES
            .iter()
            .position(|feature| *feature == name)
            .map(|index| self.as_array()[index])
    }
}

/// Describes how a feature should be routed to a render parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDescriptor {
    pub source: String,
    pub target: String,
    pub gain: f32,
}

impl MappingDescriptor {
    pub fn new(source: impl Into<String>, target: impl Into<String>, gain: f32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            gain,
        }
    }
}

/// Runtime mapping matrix populated with [`ParameterUpdate`] values after each
/// snapshot is evaluated.
#[derive(Debug, Default, Clone)]
pub struct MappingMatrix {
    routes: Vec<MappingDescriptor>,
    updates: Vec<ParameterUpdate>,
}

impl MappingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `beatPhase` to `pulse`, `barPhase` to `sweep` and `energy` to
    /// `intensity`, all at unit gain.
    pub fn with_default_routes() -> Self {
        let mut matrix = Self::new();
        matrix.add_route(MappingDescriptor::new("beatPhase", "pulse", 1.0));
        matrix.add_route(MappingDescriptor::new("barPhase", "sweep", 1.0));
        matrix.add_route(MappingDescriptor::new("energy", "intensity", 1.0));
        matrix
    }

    pub fn add_route(&mut self, route: MappingDescriptor) {
        if !FEATURES.contains(&route.source.as_str()) {
            tracing::warn!(source = %route.source, "mapping route has unknown source feature");
        }
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[MappingDescriptor] {
        &self.routes
    }

    pub fn updates(&self) -> &[ParameterUpdate] {
        &self.updates
    }

    /// Recomputes the updates for one frame. Routes naming an unknown
    /// feature are skipped.
    pub fn apply_from_uniforms(&mut self, uniforms: &MusicUniforms) {
        self.updates.clear();
        for route in &self.routes {
            if let Some(value) = uniforms.feature(&route.source) {
                self.updates.push(ParameterUpdate {
                    target: route.target.clone(),
                    value: value * route.gain,
                });
            }
        }
    }
}

/// Concrete value routed to a render or scene parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: String,
    pub value: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BeatSnapshot {
        BeatSnapshot {
            beat_index: 3,
            beat_phase: 0.25,
            bar_index: 0,
            bar_phase: 0.75,
            section_index: 2,
            current_time: 1.625,
            bpm: 120.0,
        }
    }

    #[test]
    fn packs_uniforms_in_order() {
        let uniforms = MusicUniforms::from_snapshot(&snapshot(), 0.5);
        assert_eq!(uniforms.as_array(), [1.625, 120.0, 0.25, 0.75, 2.0, 0.5]);
        assert_eq!(uniforms.feature("sectionIndex"), Some(2.0));
        assert_eq!(uniforms.feature("loudness"), None);
    }

    #[test]
    fn routes_apply_gain() {
        let mut matrix = MappingMatrix::with_default_routes();
        matrix.add_route(MappingDescriptor::new("bpm", "speed", 0.01));
        matrix.add_route(MappingDescriptor::new("missing", "nothing", 1.0));

        matrix.apply_from_uniforms(&MusicUniforms::from_snapshot(&snapshot(), 0.8));

        let updates = matrix.updates();
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0].target, "pulse");
        assert_eq!(updates[0].value, 0.25);
        assert_eq!(updates[2].value, 0.8);
        assert!((updates[3].value - 1.2).abs() < 1e-6);
    }

    #[test]
    fn each_frame_replaces_previous_updates() {
        let mut matrix = MappingMatrix::with_default_routes();
        matrix.apply_from_uniforms(&MusicUniforms::from_snapshot(&snapshot(), 0.8));
        matrix.apply_from_uniforms(&MusicUniforms::from_snapshot(&snapshot(), 0.2));

        assert_eq!(matrix.updates().len(), matrix.routes().len());
        assert_eq!(matrix.updates()[2].value, 0.2);
    }
}
