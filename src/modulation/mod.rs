//! Modulation sources and routing.
//!
//! Modulators wrap the low-level shape and smoothing primitives with the
//! per-block protocol the engine drives: latch control-rate settings once
//! per block, then advance sample-by-sample. The `matrix` module routes
//! modulator outputs onto parameter targets.

/// Gate-driven ADSR modulator.
pub mod envelope;
/// Free-running and tempo-synced low frequency oscillator.
pub mod lfo;
/// Control-surface macro knob as a modulation source.
pub mod macros;
/// Source-to-target routing with per-connection smoothing.
pub mod matrix;
/// Hot-swap wrapper applying modulator replacements at block boundaries.
pub mod multi;

use crate::preset::ModulatorState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Context passed to modulators at each block boundary.
///
/// Carries the information modulators latch in `prepare_block`:
/// - sample_rate: audio sample rate (e.g. 48000.0)
/// - tempo_bpm: host tempo for synced rates
/// - playing: host transport state
/// - position_samples: sample-accurate transport position, when the host
///   provides one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockCtx {
    pub sample_rate: f32,
    pub tempo_bpm: f64,
    pub playing: bool,
    pub position_samples: Option<u64>,
}

impl BlockCtx {
    pub fn new(sample_rate: f32, tempo_bpm: f64) -> Self {
        Self {
            sample_rate,
            tempo_bpm,
            playing: false,
            position_samples: None,
        }
    }

    /// Attach host transport state (playback flag and, when available, the
    /// sample-accurate position).
    pub fn with_transport(mut self, playing: bool, position_samples: Option<u64>) -> Self {
        self.playing = playing;
        self.position_samples = position_samples;
        self
    }
}

/// Discriminates modulator variants in state documents and change events.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulatorKind {
    Lfo,
    Envelope,
    Macro,
}

/// A per-sample modulation signal source.
///
/// Lifecycle: construct, `set_sample_rate`, then per block exactly one
/// `prepare_block` followed by `value`/`advance_sample` pairs: consumers
/// read the current sample with `value`, then step with `advance_sample`.
/// Advancing must not touch shared mutable state; everything control-rate
/// is latched in `prepare_block`.
pub trait Modulator: Send {
    fn kind(&self) -> ModulatorKind;

    /// Whether `value` spans [-1, 1] (bipolar) or [0, 1] (unipolar).
    fn bipolar(&self) -> bool;

    /// Reconfigure for a sample rate, resetting internal phase/stage state.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Latch control-rate settings for the coming block.
    fn prepare_block(&mut self, ctx: &BlockCtx);

    /// Step to the next sample.
    fn advance_sample(&mut self);

    /// Output for the current sample. Does not advance.
    fn value(&self) -> f32;

    /// Record this modulator's settings into a state document.
    fn write_state(&self, state: &mut ModulatorState);

    /// Adopt the settings a state document carries for this variant.
    fn read_state(&mut self, state: &ModulatorState);
}

/// Construct the modulator variant a state document describes and adopt
/// its settings. Used by preset restore; allocates, so control threads
/// only.
pub fn from_state(state: &ModulatorState) -> Box<dyn Modulator> {
    let mut modulator: Box<dyn Modulator> = match state.kind {
        ModulatorKind::Lfo => Box::new(lfo::LfoModulator::with_rate(state.shape, state.rate)),
        ModulatorKind::Envelope => Box::new(envelope::EnvelopeModulator::new()),
        ModulatorKind::Macro => Box::new(macros::MacroModulator::new()),
    };
    modulator.read_state(state);
    modulator
}

/// Allow boxed modulators to be used as modulators (for dynamic dispatch).
impl Modulator for Box<dyn Modulator> {
    fn kind(&self) -> ModulatorKind {
        (**self).kind()
    }

    fn bipolar(&self) -> bool {
        (**self).bipolar()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        (**self).set_sample_rate(sample_rate)
    }

    fn prepare_block(&mut self, ctx: &BlockCtx) {
        (**self).prepare_block(ctx)
    }

    fn advance_sample(&mut self) {
        (**self).advance_sample()
    }

    fn value(&self) -> f32 {
        (**self).value()
    }

    fn write_state(&self, state: &mut ModulatorState) {
        (**self).write_state(state)
    }

    fn read_state(&mut self, state: &ModulatorState) {
        (**self).read_state(state)
    }
}
