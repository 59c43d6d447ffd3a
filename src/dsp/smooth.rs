//! Smoothing primitives for control signals.

use crate::MIN_TIME;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Parameter Smoothing
===================

A control value that jumps between blocks produces an audible step (a click
or "zipper" artifact) in whatever the parameter feeds. Smoothers turn each
jump into a short per-sample ramp.

Two policies are provided:

LINEAR
    Constant-slope ramp that reaches the target in a fixed time, then
    stops. Predictable arrival, ideal for values that must land exactly
    (gain staging, crossfades).

    increment = (target - current) / (time_seconds * sample_rate)

ONE-POLE
    Exponential approach: each sample moves a fixed fraction of the
    remaining distance. Never quite arrives, but sounds natural for
    continuous gestures (filter sweeps, macro knobs).

    coeff   = exp(-1 / (time_seconds * sample_rate))
    current = target + (current - target) * coeff

The attack/release follower is a one-pole with two time constants, picked
per sample by the direction of travel. It shapes each modulation
connection's contribution independently, and doubles as the macro knob
smoother.
*/

/// Smoothing policy declared per parameter mode.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingKind {
    /// Constant-slope ramp reaching the target in `time_ms`.
    Linear { time_ms: f32 },
    /// Exponential approach with time constant `time_ms`.
    OnePole { time_ms: f32 },
}

impl Default for SmoothingKind {
    fn default() -> Self {
        SmoothingKind::Linear { time_ms: 20.0 }
    }
}

/// One-pole coefficient for a time constant in seconds.
#[inline]
pub(crate) fn onepole_coeff(time_seconds: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_seconds.max(MIN_TIME) * sample_rate)).exp()
}

/// A smoother configured from a [`SmoothingKind`].
///
/// Operates on whatever domain the caller chooses; the parameter engine
/// runs it in normalized space.
#[derive(Debug, Clone)]
pub struct Smoother {
    kind: SmoothingKind,
    current: f32,
    target: f32,
    // Linear bookkeeping
    step: f32,
    remaining: u32,
    // One-pole bookkeeping
    coeff: f32,
    sample_rate: f32,
}

impl Smoother {
    pub fn new(kind: SmoothingKind, sample_rate: f32) -> Self {
        let mut smoother = Self {
            kind,
            current: 0.0,
            target: 0.0,
            step: 0.0,
            remaining: 0,
            coeff: 0.0,
            sample_rate,
        };
        smoother.set_sample_rate(sample_rate);
        smoother
    }

    /// Reconfigure for a new sample rate. Ramp-in-flight state is dropped;
    /// the smoother lands on its target immediately.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        if let SmoothingKind::OnePole { time_ms } = self.kind {
            self.coeff = onepole_coeff(time_ms * 1e-3, self.sample_rate);
        }
        self.snap_to(self.target);
    }

    /// Jump to `value` with no ramp. Used at construction and after
    /// transport/sample-rate discontinuities where ramping would smear state
    /// that never sounded.
    pub fn snap_to(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Begin ramping toward `target` from the current position.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target && self.remaining == 0 && self.current == target {
            return;
        }
        self.target = target;
        if let SmoothingKind::Linear { time_ms } = self.kind {
            let samples = (time_ms * 1e-3 * self.sample_rate).round().max(1.0) as u32;
            self.step = (target - self.current) / samples as f32;
            self.remaining = samples;
        }
    }

    /// Advance one sample and return the new current value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.kind {
            SmoothingKind::Linear { .. } => {
                if self.remaining > 0 {
                    self.current += self.step;
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.current = self.target;
                    }
                }
            }
            SmoothingKind::OnePole { .. } => {
                self.current = self.target + (self.current - self.target) * self.coeff;
            }
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// One-pole follower with independent attack and release time constants.
///
/// Rising input is tracked with the attack coefficient, falling input with
/// the release coefficient. A zero time constant tracks instantly.
#[derive(Debug, Clone)]
pub struct AttackRelease {
    value: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl AttackRelease {
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        let mut follower = Self {
            value: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        };
        follower.set_times(attack_ms, release_ms, sample_rate);
        follower
    }

    pub fn set_times(&mut self, attack_ms: f32, release_ms: f32, sample_rate: f32) {
        let sample_rate = sample_rate.max(1.0);
        self.attack_coeff = if attack_ms <= 0.0 {
            0.0
        } else {
            onepole_coeff(attack_ms * 1e-3, sample_rate)
        };
        self.release_coeff = if release_ms <= 0.0 {
            0.0
        } else {
            onepole_coeff(release_ms * 1e-3, sample_rate)
        };
    }

    /// Advance one sample toward `target` and return the new value.
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        let coeff = if target > self.value {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.value = target + (self.value - target) * coeff;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn linear_reaches_target_in_declared_time() {
        let mut s = Smoother::new(SmoothingKind::Linear { time_ms: 10.0 }, SAMPLE_RATE);
        s.snap_to(0.0);
        s.set_target(1.0);

        // 10ms at 1kHz = 10 samples
        let mut last = 0.0;
        for _ in 0..10 {
            last = s.next();
        }
        assert!((last - 1.0).abs() < 1e-6, "expected arrival, got {}", last);

        // Holds after arrival
        assert!((s.next() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn linear_ramp_is_monotonic() {
        let mut s = Smoother::new(SmoothingKind::Linear { time_ms: 20.0 }, SAMPLE_RATE);
        s.snap_to(1.0);
        s.set_target(0.25);

        let mut previous = s.current();
        for _ in 0..20 {
            let v = s.next();
            assert!(v <= previous + 1e-6, "ramp reversed: {} -> {}", previous, v);
            previous = v;
        }
        assert!((previous - 0.25).abs() < 1e-6);
    }

    #[test]
    fn onepole_converges_without_overshoot() {
        let mut s = Smoother::new(SmoothingKind::OnePole { time_ms: 5.0 }, SAMPLE_RATE);
        s.snap_to(0.0);
        s.set_target(1.0);

        let mut v = 0.0;
        for _ in 0..100 {
            v = s.next();
            assert!(v <= 1.0);
        }
        // 100 samples = 20 time constants; effectively converged
        assert!(v > 0.999, "one-pole failed to converge: {}", v);
    }

    #[test]
    fn retarget_mid_ramp_starts_from_current() {
        let mut s = Smoother::new(SmoothingKind::Linear { time_ms: 10.0 }, SAMPLE_RATE);
        s.snap_to(0.0);
        s.set_target(1.0);
        for _ in 0..5 {
            s.next();
        }
        let mid = s.current();
        assert!(mid > 0.4 && mid < 0.6);

        s.set_target(0.0);
        let v = s.next();
        assert!(v < mid, "new ramp should fall from the midpoint");
    }

    #[test]
    fn attack_release_uses_independent_time_constants() {
        let mut ar = AttackRelease::new(2.0, 50.0, SAMPLE_RATE);

        // Fast attack: close to target within a few milliseconds
        for _ in 0..10 {
            ar.process(1.0);
        }
        let peak = ar.value();
        assert!(peak > 0.95, "attack too slow: {}", peak);

        // Slow release: barely moved after the same number of samples
        for _ in 0..10 {
            ar.process(0.0);
        }
        assert!(ar.value() > 0.7, "release too fast: {}", ar.value());
    }

    #[test]
    fn zero_times_track_instantly() {
        let mut ar = AttackRelease::new(0.0, 0.0, SAMPLE_RATE);
        assert!((ar.process(0.8) - 0.8).abs() < 1e-6);
        assert!((ar.process(-0.3) + 0.3).abs() < 1e-6);
    }
}
