//! Macro knobs as modulation sources.

use std::sync::Arc;

use crate::dsp::smooth::onepole_coeff;
use crate::modulation::{BlockCtx, Modulator, ModulatorKind};
use crate::param::value::AtomicF32;
use crate::preset::ModulatorState;

/// Fixed smoothing constant for knob gestures.
const MACRO_SMOOTH_MS: f32 = 15.0;

/// Control-surface handle for a macro's level.
///
/// Writes are a single atomic scalar; the audio thread latches the level at
/// each block boundary and ramps toward it.
#[derive(Clone)]
pub struct MacroHandle(Arc<AtomicF32>);

impl MacroHandle {
    /// Set the macro level, clamped into [0, 1].
    pub fn set(&self, level: f32) {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            return;
        };
        self.0.store(level);
    }

    pub fn get(&self) -> f32 {
        self.0.load()
    }
}

/// A user-controlled scalar source, one-pole smoothed so knob drags and
/// host automation steps never land as discontinuities.
pub struct MacroModulator {
    level_cell: Arc<AtomicF32>,
    target: f32,
    current: f32,
    coeff: f32,
}

impl MacroModulator {
    pub fn new() -> Self {
        Self::with_level(0.0)
    }

    pub fn with_level(level: f32) -> Self {
        let level = level.clamp(0.0, 1.0);
        Self {
            level_cell: Arc::new(AtomicF32::new(level)),
            target: level,
            current: level,
            coeff: 0.0,
        }
    }

    pub fn handle(&self) -> MacroHandle {
        MacroHandle(Arc::clone(&self.level_cell))
    }
}

impl Default for MacroModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Modulator for MacroModulator {
    fn kind(&self) -> ModulatorKind {
        ModulatorKind::Macro
    }

    fn bipolar(&self) -> bool {
        false
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = onepole_coeff(MACRO_SMOOTH_MS * 1e-3, sample_rate.max(1.0));
        // Land on the knob position; there is no meaningful ramp to resume
        self.target = self.level_cell.load();
        self.current = self.target;
    }

    fn prepare_block(&mut self, ctx: &BlockCtx) {
        self.coeff = onepole_coeff(MACRO_SMOOTH_MS * 1e-3, ctx.sample_rate.max(1.0));
        self.target = self.level_cell.load();
    }

    fn advance_sample(&mut self) {
        self.current = self.target + (self.current - self.target) * self.coeff;
    }

    fn value(&self) -> f32 {
        self.current
    }

    fn write_state(&self, state: &mut ModulatorState) {
        state.kind = ModulatorKind::Macro;
        state.bipolar = false;
        state.level = self.level_cell.load();
    }

    fn read_state(&mut self, state: &ModulatorState) {
        let level = state.level.clamp(0.0, 1.0);
        self.level_cell.store(level);
    }
}
