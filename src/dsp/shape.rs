//! LFO waveform shapes evaluated from a normalized phase.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Control-Rate Waveforms
======================

A modulation source sweeps a parameter by evaluating a periodic waveform at
sub-audio rates. Phase is kept normalized in [0.0, 1.0) so the same shape
math works at any rate and sample rate:

  phase 0.00   start of cycle
  phase 0.25   quarter cycle
  phase 0.50   half cycle
  phase 1.00   wraps back to 0.0

All shapes produce BIPOLAR output in [-1.0, +1.0]. Whether a modulator
presents bipolar or unipolar values to the matrix is decided above this
layer with the conversions below:

    unipolar = (bipolar + 1.0) * 0.5

    bipolar   unipolar
    -1.0      0.0
     0.0      0.5
    +1.0      1.0

Sample & hold is intentionally absent: it needs a noise source, which lives
outside this crate.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    /// Smooth, natural sweep. The most common choice.
    #[default]
    Sine,
    /// Linear motion with constant rate of change.
    Triangle,
    /// Gradual rise, instant reset. Rhythmic one-directional sweeps.
    SawUp,
    /// Gradual fall, instant reset.
    SawDown,
    /// Instant switching between the two extremes.
    Square,
}

impl LfoShape {
    /// Evaluate the shape at a normalized phase in [0.0, 1.0).
    ///
    /// Output is bipolar in [-1.0, +1.0]. Phase values outside the unit
    /// interval are wrapped, so callers may pass an unwrapped accumulator.
    pub fn sample(self, phase: f32) -> f32 {
        let phase = phase.rem_euclid(1.0);
        match self {
            LfoShape::Sine => (phase * core::f32::consts::TAU).sin(),
            LfoShape::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            LfoShape::SawUp => 2.0 * phase - 1.0,
            LfoShape::SawDown => 1.0 - 2.0 * phase,
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Convert bipolar signal (-1.0 to +1.0) to unipolar (0.0 to 1.0).
///
/// Useful when a connection expects positive-only modulation.
#[inline]
pub fn bipolar_to_unipolar(bipolar: f32) -> f32 {
    (bipolar + 1.0) * 0.5
}

/// Convert unipolar signal (0.0 to 1.0) to bipolar (-1.0 to +1.0).
#[inline]
pub fn unipolar_to_bipolar(unipolar: f32) -> f32 {
    (unipolar * 2.0) - 1.0
}
