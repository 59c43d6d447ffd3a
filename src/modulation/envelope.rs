//! Gate-driven ADSR envelope as a modulation source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::modulation::{BlockCtx, Modulator, ModulatorKind};
use crate::preset::ModulatorState;
use crate::MIN_TIME;

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,    // Gate low, envelope inactive, level = 0
    Attack,  // Gate just went high, ramping up to 1.0
    Decay,   // Reached peak, ramping down to sustain level
    Sustain, // Holding at sustain level while gate is high
    Release, // Gate went low, ramping down to 0
}

/// Control-surface handle for the envelope's gate flag.
///
/// A single atomic bool: the writing thread flips it at any time, the audio
/// thread latches it once per block in `prepare_block`.
#[derive(Clone)]
pub struct GateHandle(Arc<AtomicBool>);

impl GateHandle {
    pub fn set(&self, high: bool) {
        self.0.store(high, Ordering::Relaxed);
    }

    pub fn is_high(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Linear ADSR envelope producing a unipolar control signal.
///
/// Gate transitions are latched at block boundaries. A rising gate starts
/// the attack from the current level rather than zero, so retriggering a
/// half-released envelope cannot click the modulated parameter.
pub struct EnvelopeModulator {
    attack_ms: f32,
    decay_ms: f32,
    sustain: f32,
    release_ms: f32,

    gate: Arc<AtomicBool>,
    gate_latched: bool,

    stage: EnvelopeStage,
    level: f32,
    attack_inc: f32,
    decay_dec: f32,

    // Release interpolates from a snapshot so it lands exactly on zero
    release_start: f32,
    release_total: u32,
    release_elapsed: u32,

    sample_rate: f32,
}

impl EnvelopeModulator {
    pub fn new() -> Self {
        Self::adsr(10.0, 100.0, 0.7, 300.0)
    }

    pub fn adsr(attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) -> Self {
        Self {
            attack_ms: attack_ms.max(0.0),
            decay_ms: decay_ms.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release_ms: release_ms.max(0.0),
            gate: Arc::new(AtomicBool::new(false)),
            gate_latched: false,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            attack_inc: 0.0,
            decay_dec: 0.0,
            release_start: 0.0,
            release_total: 1,
            release_elapsed: 0,
            sample_rate: 0.0,
        }
    }

    pub fn handle(&self) -> GateHandle {
        GateHandle(Arc::clone(&self.gate))
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    fn seconds(ms: f32) -> f32 {
        (ms * 1e-3).max(MIN_TIME)
    }

    fn begin_release(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.release_start = self.level;
        self.release_total = (Self::seconds(self.release_ms) * self.sample_rate)
            .round()
            .max(1.0) as u32;
        self.release_elapsed = 0;
        self.stage = EnvelopeStage::Release;
    }
}

impl Default for EnvelopeModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Modulator for EnvelopeModulator {
    fn kind(&self) -> ModulatorKind {
        ModulatorKind::Envelope
    }

    fn bipolar(&self) -> bool {
        false
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_elapsed = 0;
        // Force a held gate to retrigger cleanly after the reset
        self.gate_latched = false;
    }

    fn prepare_block(&mut self, ctx: &BlockCtx) {
        self.sample_rate = ctx.sample_rate;
        self.attack_inc = 1.0 / (Self::seconds(self.attack_ms) * self.sample_rate);

        let gate = self.gate.load(Ordering::Relaxed);
        if gate && !self.gate_latched {
            // Attack continues from the current level, never a reset to zero
            self.stage = EnvelopeStage::Attack;
            self.release_elapsed = 0;
        } else if !gate && self.gate_latched {
            self.begin_release();
        }
        self.gate_latched = gate;
    }

    fn advance_sample(&mut self) {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                self.level += self.attack_inc;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.decay_dec = (1.0 - self.sustain)
                        / (Self::seconds(self.decay_ms) * self.sample_rate);
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                self.level -= self.decay_dec;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.sustain;
            }

            EnvelopeStage::Release => {
                let progress = self.release_elapsed as f32 / self.release_total as f32;
                self.level = (self.release_start * (1.0 - progress)).max(0.0);
                self.release_elapsed = self.release_elapsed.saturating_add(1);

                if self.release_elapsed >= self.release_total {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
    }

    fn value(&self) -> f32 {
        self.level
    }

    fn write_state(&self, state: &mut ModulatorState) {
        state.kind = ModulatorKind::Envelope;
        state.bipolar = false;
        state.attack_ms = self.attack_ms;
        state.decay_ms = self.decay_ms;
        state.sustain = self.sustain;
        state.release_ms = self.release_ms;
    }

    fn read_state(&mut self, state: &ModulatorState) {
        self.attack_ms = state.attack_ms.max(0.0);
        self.decay_ms = state.decay_ms.max(0.0);
        self.sustain = state.sustain.clamp(0.0, 1.0);
        self.release_ms = state.release_ms.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn run(env: &mut EnvelopeModulator, samples: usize) {
        for _ in 0..samples {
            env.advance_sample();
        }
    }

    #[test]
    fn attack_reaches_full_level() {
        let mut env = EnvelopeModulator::adsr(10.0, 100.0, 0.7, 200.0);
        env.set_sample_rate(SAMPLE_RATE);
        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        run(&mut env, 11);
        assert!(env.level() > 0.99, "expected attack to reach full level");
        assert!(env.stage() != EnvelopeStage::Attack);
    }

    #[test]
    fn sustain_holds_target_level() {
        let sustain = 0.6;
        let mut env = EnvelopeModulator::adsr(10.0, 50.0, sustain, 200.0);
        env.set_sample_rate(SAMPLE_RATE);
        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        run(&mut env, 70);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - sustain).abs() < 0.05);
    }

    #[test]
    fn release_falls_back_to_idle() {
        let mut env = EnvelopeModulator::adsr(10.0, 50.0, 0.5, 30.0);
        env.set_sample_rate(SAMPLE_RATE);
        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 20);

        env.handle().set(false);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 32);

        assert!(env.level() <= 0.001, "release should fall back to zero");
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn gate_changes_mid_block_wait_for_the_boundary() {
        let mut env = EnvelopeModulator::adsr(10.0, 50.0, 0.5, 30.0);
        env.set_sample_rate(SAMPLE_RATE);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        env.handle().set(true); // mid-block
        run(&mut env, 16);
        assert_eq!(env.stage(), EnvelopeStage::Idle, "gate latches at boundary");

        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 4);
        assert_eq!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn retrigger_resumes_from_current_level() {
        let mut env = EnvelopeModulator::adsr(10.0, 50.0, 0.8, 100.0);
        env.set_sample_rate(SAMPLE_RATE);
        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 30);

        env.handle().set(false);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 20);
        let mid_release = env.level();
        assert!(mid_release > 0.1 && mid_release < 0.9);

        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        env.advance_sample();
        assert!(
            env.level() >= mid_release,
            "retrigger must not drop to zero: {} -> {}",
            mid_release,
            env.level()
        );
    }

    #[test]
    fn sample_rate_change_resets_the_state_machine() {
        let mut env = EnvelopeModulator::new();
        env.set_sample_rate(SAMPLE_RATE);
        env.handle().set(true);
        env.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        run(&mut env, 50);
        assert!(env.level() > 0.0);

        env.set_sample_rate(48_000.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }
}
