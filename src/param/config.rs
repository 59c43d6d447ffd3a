//! Immutable parameter descriptions.

use crate::dsp::smooth::SmoothingKind;
use crate::param::range::ParamRange;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable parameter identifier.
///
/// Once assigned, an id must never change for a given parameter: hosts
/// record it in automation lanes and presets refer to it across sessions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

/// Space in which summed modulation is applied to the base value before
/// clamping to the target's domain.
///
/// Declared explicitly per mode rather than inferred from the range kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModApply {
    /// Modulation offsets the normalized base; the sum is clamped to
    /// [0, 1] and then mapped through the range.
    #[default]
    Normalized,
    /// Modulation offsets the denormalized base, scaled by the range span;
    /// the sum is clamped to [min, max].
    Denormalized,
}

/// One interaction mode of a parameter, e.g. "free" milliseconds versus a
/// tempo-synced division on the same delay-time knob.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModeConfig {
    pub name: String,
    /// Unit label for display ("dB", "%", "Hz", "note").
    pub unit: String,
    pub range: ParamRange,
    pub smoothing: SmoothingKind,
    pub apply: ModApply,
}

impl ModeConfig {
    pub fn new(name: impl Into<String>, range: ParamRange) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            range,
            smoothing: SmoothingKind::default(),
            apply: ModApply::default(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingKind) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_apply(mut self, apply: ModApply) -> Self {
        self.apply = apply;
        self
    }
}

/// Immutable description of one parameter. Owned behind an `Arc` by the
/// runtime cell for the processor's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamConfig {
    pub id: ParamId,
    pub name: String,
    /// Default value, denormalized in the first mode's domain.
    pub default: f32,
    /// One or more modes; index 0 is the initial mode.
    pub modes: Vec<ModeConfig>,
}

impl ParamConfig {
    pub fn new(id: ParamId, name: impl Into<String>, default: f32, mode: ModeConfig) -> Self {
        Self {
            id,
            name: name.into(),
            default,
            modes: vec![mode],
        }
    }

    pub fn with_mode(mut self, mode: ModeConfig) -> Self {
        self.modes.push(mode);
        self
    }

    /// Mode by index, clamped so a stale index can never panic the audio
    /// thread.
    pub fn mode(&self, index: usize) -> &ModeConfig {
        let index = index.min(self.modes.len() - 1);
        &self.modes[index]
    }

    /// The default value in normalized form for a given mode.
    pub fn default_normalized(&self, mode_index: usize) -> f32 {
        self.mode(mode_index).range.normalize(self.default)
    }
}
