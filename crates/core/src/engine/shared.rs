use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{BeatBus, BeatSnapshot};
use crate::{Analysis, Result, XsrcError};

/// Shared, thread-safe view over one [`BeatBus`].
///
/// The whole engine state sits behind a single lock, so a reader never sees
/// a new analysis paired with the previous track's tempo.
#[derive(Clone, Default)]
pub struct SharedBeatBus {
    shared: Arc<RwLock<BeatBus>>,
}

impl SharedBeatBus {
    pub fn new(bus: BeatBus) -> Self {
        Self {
            shared: Arc::new(RwLock::new(bus)),
        }
    }

    pub fn set_analysis(&self, analysis: impl Into<Arc<Analysis>>) -> Result<()> {
        self.write()?.set_analysis(analysis)
    }

    pub fn set_current_time(&self, time: f64) -> Result<()> {
        self.write()?.set_current_time(time);
        Ok(())
    }

    pub fn set_playing(&self, playing: bool) -> Result<()> {
        self.write()?.set_playing(playing);
        Ok(())
    }

    /// Stores the transport time and evaluates it under one lock; the usual
    /// per-frame call of a render loop.
    pub fn advance(&self, time: f64) -> Result<BeatSnapshot> {
        let mut bus = self.write()?;
        bus.set_current_time(time);
        Ok(bus.at(time))
    }

    pub fn at(&self, time: f64) -> Result<BeatSnapshot> {
        Ok(self.read()?.at(time))
    }

    pub fn current(&self) -> Result<BeatSnapshot> {
        Ok(self.read()?.current())
    }

    pub fn tempo(&self) -> Result<f64> {
        Ok(self.read()?.tempo())
    }

    pub fn is_playing(&self) -> Result<bool> {
        Ok(self.read()?.is_playing())
    }

    pub fn quantize_to_next_downbeat(&self, time: f64) -> Result<f64> {
        Ok(self.read()?.quantize_to_next_downbeat(time))
    }

    pub fn get_next_downbeat(&self, time: f64) -> Result<f64> {
        Ok(self.read()?.get_next_downbeat(time))
    }

    /// Copy of the engine state at this instant.
    pub fn snapshot_state(&self) -> Result<BeatBus> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BeatBus>> {
        self.shared
            .read()
            .map_err(|_| XsrcError::msg("beat bus has been poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BeatBus>> {
        self.shared
            .write()
            .map_err(|_| XsrcError::msg("beat bus has been poisoned"))
    }
}

impl std::fmt::Debug for SharedBeatBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBeatBus").finish()
    }
}
