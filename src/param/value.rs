//! Live runtime cells for parameters.
//!
//! Each parameter is split in two: [`ParamCell`] is the cross-thread half
//! (a single atomically exchanged scalar plus the mode index), shared
//! between the control surface and the audio thread through an `Arc`;
//! [`Parameter`] is the audio-thread-owned half (block cache, smoother,
//! modulation application). The audio thread never sees a torn value
//! because the live value is one `f32` bit-cast through an `AtomicU32`,
//! and everything multi-field is owned exclusively by the audio thread
//! between block boundaries.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::dsp::smooth::Smoother;
use crate::param::config::{ModApply, ParamConfig, ParamId};

/// Lock-free `f32` cell, stored as raw bits in an `AtomicU32`.
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// The shared half of a parameter: normalized value and active mode.
///
/// Writes come from UI/host threads; reads from the audio thread. Both are
/// single-word atomics, so neither side can block or tear the other.
pub struct ParamCell {
    config: Arc<ParamConfig>,
    normalized: AtomicF32,
    mode: AtomicUsize,
}

impl ParamCell {
    pub fn new(config: Arc<ParamConfig>) -> Self {
        let normalized = config.default_normalized(0).clamp(0.0, 1.0);
        Self {
            config,
            normalized: AtomicF32::new(normalized),
            mode: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &Arc<ParamConfig> {
        &self.config
    }

    pub fn id(&self) -> ParamId {
        self.config.id
    }

    /// Control-rate write. Clamps into [0, 1] and returns the stored value.
    pub fn set_normalized(&self, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            self.normalized.load()
        };
        self.normalized.store(value);
        value
    }

    pub fn normalized(&self) -> f32 {
        self.normalized.load()
    }

    /// Switch the active interaction mode. Latched by the audio thread at
    /// the next block boundary.
    pub fn set_mode(&self, index: usize) {
        let index = index.min(self.config.modes.len() - 1);
        self.mode.store(index, Ordering::Relaxed);
    }

    pub fn mode(&self) -> usize {
        self.mode.load(Ordering::Relaxed)
    }

    /// Current denormalized (display) value through the active mode.
    pub fn denormalized(&self) -> f32 {
        self.config.mode(self.mode()).range.denormalize(self.normalized())
    }
}

/// The audio-thread half of a parameter.
pub struct Parameter {
    cell: Arc<ParamCell>,
    mode: usize,
    apply: ModApply,
    /// Normalized value latched at the last block boundary.
    cached: f32,
    smoother: Smoother,
    /// Last processor-facing output value (modulation applied).
    last_output: f32,
    sample_rate: f32,
}

impl Parameter {
    pub fn new(cell: Arc<ParamCell>, sample_rate: f32) -> Self {
        let mode = cell.mode();
        let cached = cell.normalized();
        let (smoothing, apply, last_output) = {
            let mode_config = cell.config().mode(mode);
            (
                mode_config.smoothing,
                mode_config.apply,
                mode_config.range.denormalize(cached),
            )
        };
        let mut smoother = Smoother::new(smoothing, sample_rate);
        smoother.snap_to(cached);

        Self {
            cell,
            mode,
            apply,
            cached,
            smoother,
            last_output,
            sample_rate,
        }
    }

    pub fn cell(&self) -> &Arc<ParamCell> {
        &self.cell
    }

    pub fn id(&self) -> ParamId {
        self.cell.id()
    }

    /// Latch the live normalized value and mode for this block and retarget
    /// the smoother. Audio thread only, once per block before any
    /// per-sample work.
    pub fn update_cache(&mut self) {
        let mode = self.cell.mode();
        if mode != self.mode {
            self.rebuild_mode(mode);
        }
        self.cached = self.cell.normalized();

        // Ramp toward the grid-aligned position so stepped ranges settle
        // exactly on their quantization grid.
        let range = &self.cell.config().mode(self.mode).range;
        let target = range.normalize(range.denormalize(self.cached));
        self.smoother.set_target(target);
    }

    fn rebuild_mode(&mut self, mode: usize) {
        // The numeric domain changed; ramping across domains is meaningless.
        self.mode = mode;
        let mode_config = self.cell.config().mode(mode);
        self.apply = mode_config.apply;
        self.smoother = Smoother::new(mode_config.smoothing, self.sample_rate);
        self.smoother.snap_to(self.cell.normalized());
    }

    /// The normalized value latched for the current block.
    pub fn cached(&self) -> f32 {
        self.cached
    }

    /// The latched value mapped through the active mode's range.
    pub fn denormalized(&self) -> f32 {
        self.cell.config().mode(self.mode).range.denormalize(self.cached)
    }

    /// Last processor-facing value written this block.
    pub fn modulated(&self) -> f32 {
        self.last_output
    }

    /// Reset smoothing state after a sample-rate change or stream restart.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.smoother.set_sample_rate(sample_rate);
        self.cached = self.cell.normalized();
        self.smoother.snap_to(self.cached);
    }

    /// Advance the base-value ramp one sample, fold in the summed
    /// modulation for this sample, and return the clamped processor value.
    #[inline]
    pub fn process_sample(&mut self, modulation: f32) -> f32 {
        let base = self.smoother.next();
        let range = &self.cell.config().mode(self.mode).range;

        let value = match self.apply {
            ModApply::Normalized => range.denormalize_raw((base + modulation).clamp(0.0, 1.0)),
            ModApply::Denormalized => {
                range.clamp(range.denormalize_raw(base) + modulation * range.span())
            }
        };
        self.last_output = value;
        value
    }
}
