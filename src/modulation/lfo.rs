//! Low frequency oscillator modulation source.

use crate::dsp::shape::{bipolar_to_unipolar, LfoShape};
use crate::modulation::{BlockCtx, Modulator, ModulatorKind};
use crate::param::range::Division;
use crate::preset::ModulatorState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the LFO's cycle time is determined.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LfoRate {
    /// Free-running frequency in Hz.
    Hertz(f32),
    /// One cycle per musical division, following the host tempo.
    Synced(Division),
}

impl Default for LfoRate {
    fn default() -> Self {
        LfoRate::Hertz(1.0)
    }
}

impl LfoRate {
    /// Resolve to Hz for the block. Synced rates track the context tempo.
    fn resolve(self, ctx: &BlockCtx) -> f32 {
        match self {
            LfoRate::Hertz(hz) => hz.max(0.0),
            LfoRate::Synced(division) => {
                let seconds = division.seconds(ctx.tempo_bpm.max(1.0));
                (1.0 / seconds) as f32
            }
        }
    }
}

/// Phase-accumulator LFO with transport-aware resynchronization.
///
/// When the host transport resumes from a paused state and reports a
/// sample-accurate position, the phase is re-derived from that position and
/// rounded to the nearest quarter-cycle offset, so synced wobbles land back
/// on the groove instead of drifting. Without a reported position the
/// resync is skipped and the phase continues uninterrupted.
pub struct LfoModulator {
    shape: LfoShape,
    rate: LfoRate,
    bipolar: bool,
    phase: f32,
    phase_inc: f32,
    rate_hz: f32,
    sample_rate: f32,
    was_playing: bool,
}

impl LfoModulator {
    pub fn new(shape: LfoShape, rate_hz: f32) -> Self {
        Self::with_rate(shape, LfoRate::Hertz(rate_hz))
    }

    /// Tempo-synced LFO completing one cycle per `division`.
    pub fn synced(shape: LfoShape, division: Division) -> Self {
        Self::with_rate(shape, LfoRate::Synced(division))
    }

    pub fn with_rate(shape: LfoShape, rate: LfoRate) -> Self {
        Self {
            shape,
            rate,
            bipolar: true,
            phase: 0.0,
            phase_inc: 0.0,
            rate_hz: 0.0,
            sample_rate: 0.0,
            was_playing: false,
        }
    }

    /// Present values in [0, 1] instead of [-1, 1].
    pub fn unipolar(mut self) -> Self {
        self.bipolar = false;
        self
    }

    pub fn shape(&self) -> LfoShape {
        self.shape
    }

    pub fn rate(&self) -> LfoRate {
        self.rate
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    fn resync_to_transport(&mut self, ctx: &BlockCtx) {
        let Some(position) = ctx.position_samples else {
            // No sample-accurate position: keep the running phase rather
            // than introduce a jump.
            return;
        };
        if self.rate_hz <= 0.0 {
            return;
        }
        let samples_per_cycle = ctx.sample_rate as f64 / self.rate_hz as f64;
        if samples_per_cycle <= 0.0 {
            return;
        }
        let raw = (position as f64 % samples_per_cycle) / samples_per_cycle;
        // Quantize to the nearest quarter-cycle offset
        self.phase = (((raw * 4.0).round() / 4.0) % 1.0) as f32;
    }
}

impl Modulator for LfoModulator {
    fn kind(&self) -> ModulatorKind {
        ModulatorKind::Lfo
    }

    fn bipolar(&self) -> bool {
        self.bipolar
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.phase = 0.0;
    }

    fn prepare_block(&mut self, ctx: &BlockCtx) {
        self.sample_rate = ctx.sample_rate;
        self.rate_hz = self.rate.resolve(ctx);
        self.phase_inc = if ctx.sample_rate > 0.0 {
            self.rate_hz / ctx.sample_rate
        } else {
            0.0
        };

        if ctx.playing && !self.was_playing {
            self.resync_to_transport(ctx);
        }
        self.was_playing = ctx.playing;
    }

    fn advance_sample(&mut self) {
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
    }

    fn value(&self) -> f32 {
        let bipolar = self.shape.sample(self.phase);
        if self.bipolar {
            bipolar
        } else {
            bipolar_to_unipolar(bipolar)
        }
    }

    fn write_state(&self, state: &mut ModulatorState) {
        state.kind = ModulatorKind::Lfo;
        state.bipolar = self.bipolar;
        state.shape = self.shape;
        state.rate = self.rate;
    }

    fn read_state(&mut self, state: &ModulatorState) {
        self.bipolar = state.bipolar;
        self.shape = state.shape;
        self.rate = state.rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn lfo_output_stays_in_range() {
        let mut lfo = LfoModulator::new(LfoShape::Sine, 5.0);
        lfo.set_sample_rate(SAMPLE_RATE);
        lfo.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        for _ in 0..1024 {
            let value = lfo.value();
            assert!((-1.0..=1.0).contains(&value), "out of range: {}", value);
            lfo.advance_sample();
        }
    }

    #[test]
    fn unipolar_lfo_never_goes_negative() {
        let mut lfo = LfoModulator::new(LfoShape::Sine, 5.0).unipolar();
        lfo.set_sample_rate(SAMPLE_RATE);
        lfo.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        for _ in 0..1024 {
            let value = lfo.value();
            assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
            lfo.advance_sample();
        }
    }

    #[test]
    fn synced_rate_follows_tempo() {
        let mut lfo = LfoModulator::synced(LfoShape::SawUp, Division::QUARTER);
        lfo.set_sample_rate(SAMPLE_RATE);

        // Quarter note at 120 BPM is 0.5s: one full cycle in 500 samples
        lfo.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        let start = lfo.value();
        for _ in 0..500 {
            lfo.advance_sample();
        }
        assert!(
            (lfo.value() - start).abs() < 1e-3,
            "expected a whole cycle: {} -> {}",
            start,
            lfo.value()
        );
    }

    #[test]
    fn transport_resume_resyncs_to_quarter_cycle() {
        let mut lfo = LfoModulator::new(LfoShape::Sine, 2.0);
        lfo.set_sample_rate(SAMPLE_RATE);

        // Run free for a while, transport paused
        lfo.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        for _ in 0..333 {
            lfo.advance_sample();
        }

        // 2 Hz at 1 kHz: 500 samples per cycle; position 125 is phase 0.25
        let ctx = BlockCtx::new(SAMPLE_RATE, 120.0).with_transport(true, Some(125));
        lfo.prepare_block(&ctx);

        assert!((lfo.phase() - 0.25).abs() < 1e-6);
        // Sample 0 reads the value at phase 0.25, not phase 0
        assert!((lfo.value() - LfoShape::Sine.sample(0.25)).abs() < 1e-6);
    }

    #[test]
    fn resync_without_position_is_skipped() {
        let mut lfo = LfoModulator::new(LfoShape::Sine, 2.0);
        lfo.set_sample_rate(SAMPLE_RATE);
        lfo.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        for _ in 0..100 {
            lfo.advance_sample();
        }
        let phase_before = lfo.phase();

        let ctx = BlockCtx::new(SAMPLE_RATE, 120.0).with_transport(true, None);
        lfo.prepare_block(&ctx);
        assert_eq!(lfo.phase(), phase_before, "no position means no phase jump");
    }

    #[test]
    fn resync_only_fires_on_pause_to_play_transition() {
        let mut lfo = LfoModulator::new(LfoShape::Sine, 2.0);
        lfo.set_sample_rate(SAMPLE_RATE);

        let playing = BlockCtx::new(SAMPLE_RATE, 120.0).with_transport(true, Some(125));
        lfo.prepare_block(&playing);
        assert!((lfo.phase() - 0.25).abs() < 1e-6);

        // Still playing: later blocks must not snap the phase again
        for _ in 0..10 {
            lfo.advance_sample();
        }
        let phase_before = lfo.phase();
        let later = BlockCtx::new(SAMPLE_RATE, 120.0).with_transport(true, Some(999));
        lfo.prepare_block(&later);
        assert_eq!(lfo.phase(), phase_before);
    }

    #[test]
    fn state_roundtrip_preserves_settings() {
        let lfo = LfoModulator::synced(LfoShape::Triangle, Division::EIGHTH).unipolar();
        let mut state = ModulatorState::default();
        lfo.write_state(&mut state);

        let mut restored = LfoModulator::new(LfoShape::Sine, 1.0);
        restored.read_state(&state);
        assert_eq!(restored.shape(), LfoShape::Triangle);
        assert_eq!(restored.rate(), LfoRate::Synced(Division::EIGHTH));
        assert!(!restored.bipolar());
    }
}
