//! Numeric domains for parameters: normalization, skew, stepping, and
//! tempo-sync division lookup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Normalization
=============

Hosts and UIs exchange parameter values in normalized form (0.0 to 1.0);
processors want domain values (dB, Hz, note divisions). A range owns the
mapping in both directions:

    denormalize(n) = min + (max - min) * n^skew
    normalize(v)   = ((v - min) / (max - min))^(1/skew)

skew = 1.0 is linear. skew > 1.0 concentrates resolution near `min`,
skew < 1.0 near `max`. Decibel ranges are linear in normalized space
(skew forced to 1.0), so the midpoint of {-60, +12} is -24 dB.

Tempo-synced ranges are discrete: the continuous control indexes a table
of musical divisions (whole note down to thirty-second), with dotted and
triplet flavors as separate range kinds. Going the other way, an arbitrary
time value picks the division nearest by absolute time distance, never by
index distance.

Out-of-domain input is clamped at both ends. Nothing here rejects a value.
*/

/// Musical division as an exact fraction of a whole note.
///
/// Operations preserve exact ratios, so a dotted eighth is 3/16 and a
/// quarter triplet is 1/6 with no floating point drift.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    pub numerator: u32,
    pub denominator: u32,
}

impl Division {
    pub const WHOLE: Division = Division::new(1, 1);
    pub const HALF: Division = Division::new(1, 2);
    pub const QUARTER: Division = Division::new(1, 4);
    pub const EIGHTH: Division = Division::new(1, 8);
    pub const SIXTEENTH: Division = Division::new(1, 16);
    pub const THIRTY_SECOND: Division = Division::new(1, 32);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Apply a dot: multiply duration by 3/2.
    pub const fn dotted(self) -> Self {
        Division {
            numerator: self.numerator * 3,
            denominator: self.denominator * 2,
        }
    }

    /// Triplet: three notes in the time of two (multiply by 2/3).
    pub const fn triplet(self) -> Self {
        Division {
            numerator: self.numerator * 2,
            denominator: self.denominator * 3,
        }
    }

    /// Fraction of a whole note as a float.
    pub fn whole_notes(&self) -> f32 {
        self.numerator as f32 / self.denominator as f32
    }

    /// Duration in seconds at a tempo. A whole note spans four beats.
    pub fn seconds(&self, tempo_bpm: f64) -> f64 {
        self.whole_notes() as f64 * 240.0 / tempo_bpm
    }
}

/// Dotted/triplet flavor applied uniformly to the division table.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlavor {
    Straight,
    Dotted,
    Triplet,
}

const SYNC_BASE: [Division; 6] = [
    Division::WHOLE,
    Division::HALF,
    Division::QUARTER,
    Division::EIGHTH,
    Division::SIXTEENTH,
    Division::THIRTY_SECOND,
];

impl SyncFlavor {
    /// Number of divisions a sync range can address.
    pub const fn table_len() -> usize {
        SYNC_BASE.len()
    }

    /// Division at `index`, 0 = whole note, last = thirty-second.
    pub fn division(self, index: usize) -> Division {
        let base = SYNC_BASE[index.min(SYNC_BASE.len() - 1)];
        match self {
            SyncFlavor::Straight => base,
            SyncFlavor::Dotted => base.dotted(),
            SyncFlavor::Triplet => base.triplet(),
        }
    }
}

/// Classifies how a range interprets its numeric domain.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Linear,
    /// Domain value is decibels, linear in normalized space.
    Decibel,
    /// Linear 0..100 display convention.
    Percent,
    /// Two-state switch, snapped to 0 or 1.
    Toggle,
    /// Discrete musical divisions; domain value is a whole-note fraction.
    Sync(SyncFlavor),
}

/// Why a range definition was rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDefect {
    NonFiniteBound,
    InvertedBounds,
    NegativeStep,
    NonPositiveSkew,
}

impl core::fmt::Display for RangeDefect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RangeDefect::NonFiniteBound => write!(f, "range bound is not finite"),
            RangeDefect::InvertedBounds => write!(f, "range min exceeds max"),
            RangeDefect::NegativeStep => write!(f, "range step is negative"),
            RangeDefect::NonPositiveSkew => write!(f, "range skew must be positive"),
        }
    }
}

/// Numeric domain of a single parameter mode. Pure and stateless given its
/// configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    /// Quantization grid relative to `min`; 0.0 means continuous.
    pub step: f32,
    /// Power-curve exponent; 1.0 is linear. Ignored by `Decibel` ranges.
    pub skew: f32,
    pub kind: RangeKind,
}

impl ParamRange {
    pub fn linear(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            step: 0.0,
            skew: 1.0,
            kind: RangeKind::Linear,
        }
    }

    pub fn db(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            step: 0.0,
            skew: 1.0,
            kind: RangeKind::Decibel,
        }
    }

    pub fn percent() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            step: 0.0,
            skew: 1.0,
            kind: RangeKind::Percent,
        }
    }

    pub fn toggle() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            step: 1.0,
            skew: 1.0,
            kind: RangeKind::Toggle,
        }
    }

    /// Range over the musical division table for one flavor. The domain
    /// value is the division's whole-note fraction.
    pub fn sync(flavor: SyncFlavor) -> Self {
        let len = SyncFlavor::table_len();
        Self {
            min: flavor.division(len - 1).whole_notes(),
            max: flavor.division(0).whole_notes(),
            step: 0.0,
            skew: 1.0,
            kind: RangeKind::Sync(flavor),
        }
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn with_skew(mut self, skew: f32) -> Self {
        self.skew = skew;
        self
    }

    pub fn validate(&self) -> Result<(), RangeDefect> {
        if !(self.min.is_finite() && self.max.is_finite() && self.step.is_finite()) {
            return Err(RangeDefect::NonFiniteBound);
        }
        if self.min > self.max {
            return Err(RangeDefect::InvertedBounds);
        }
        if self.step < 0.0 {
            return Err(RangeDefect::NegativeStep);
        }
        if !(self.skew.is_finite() && self.skew > 0.0) {
            return Err(RangeDefect::NonPositiveSkew);
        }
        Ok(())
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Clamp a domain value into [min, max].
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    fn effective_skew(&self) -> f32 {
        match self.kind {
            // Decibel ranges are linear in normalized space by contract.
            RangeKind::Decibel => 1.0,
            _ => self.skew,
        }
    }

    /// Map a domain value to [0, 1]. Out-of-domain input is clamped.
    pub fn normalize(&self, value: f32) -> f32 {
        if let RangeKind::Sync(flavor) = self.kind {
            let (index, _) = nearest_division(flavor, value);
            let last = (SyncFlavor::table_len() - 1) as f32;
            // Index 0 is the longest division; normalized 1.0 is the shortest.
            let linear = 1.0 - index as f32 / last;
            return linear.powf(1.0 / self.effective_skew());
        }

        if self.span() <= 0.0 {
            return 0.0;
        }
        let linear = (self.clamp(value) - self.min) / self.span();
        linear.powf(1.0 / self.effective_skew())
    }

    /// Map a normalized value to the domain. Out-of-range input is clamped
    /// to [0, 1]; the result is quantized by `snap`.
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.snap(self.denormalize_raw(normalized))
    }

    /// Like `denormalize` but without step quantization. Audio-rate ramps
    /// use this so smoothing is not re-stepped on every sample; the ramp
    /// target itself is grid-aligned at the block boundary.
    pub fn denormalize_raw(&self, normalized: f32) -> f32 {
        let normalized = normalized.clamp(0.0, 1.0);
        if let RangeKind::Sync(flavor) = self.kind {
            let last = SyncFlavor::table_len() - 1;
            let curved = normalized.powf(self.effective_skew());
            let index = last - (curved * last as f32).round() as usize;
            return flavor.division(index).whole_notes();
        }

        let curved = normalized.powf(self.effective_skew());
        self.min + self.span() * curved
    }

    /// Quantize a domain value to the range's grid. Idempotent; clamps first.
    pub fn snap(&self, value: f32) -> f32 {
        let value = self.clamp(value);
        match self.kind {
            RangeKind::Sync(flavor) => {
                let (_, division) = nearest_division(flavor, value);
                division.whole_notes()
            }
            _ => {
                if self.step > 0.0 {
                    let steps = ((value - self.min) / self.step).round();
                    self.clamp(self.min + steps * self.step)
                } else {
                    value
                }
            }
        }
    }

    /// The range's natural resting value: 0 dB for decibel ranges (clamped
    /// into the domain), a quarter note for sync ranges, `min` otherwise.
    pub fn default_value(&self) -> f32 {
        match self.kind {
            RangeKind::Decibel => self.clamp(0.0),
            RangeKind::Sync(flavor) => flavor.division(2).whole_notes(),
            _ => self.min,
        }
    }
}

/// Nearest table entry by absolute time distance. Ties keep the longer
/// division (the earlier table entry).
fn nearest_division(flavor: SyncFlavor, whole_notes: f32) -> (usize, Division) {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for index in 0..SyncFlavor::table_len() {
        let division = flavor.division(index);
        let distance = (division.whole_notes() - whole_notes).abs();
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    (best, flavor.division(best))
}
