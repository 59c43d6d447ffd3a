//! Hot-swappable modulator wrapper.

use crate::modulation::{BlockCtx, Modulator, ModulatorKind};
use crate::preset::ModulatorState;

/// Two-slot wrapper that defers modulator replacement to a block boundary.
///
/// `set_modulator` only stages the replacement; the swap happens in
/// `prepare_block`, so a mid-block swap cannot change the signal until the
/// next block starts. On commit, the outgoing modulator's settings are
/// written into a carried state document and read back into the
/// replacement, so depth/shape settings survive a type change and
/// downstream matrix connections stay valid.
pub struct MultiModulator {
    current: Box<dyn Modulator>,
    pending: Option<Box<dyn Modulator>>,
    carried: ModulatorState,
    sample_rate: f32,
}

impl MultiModulator {
    pub fn new(modulator: Box<dyn Modulator>) -> Self {
        let mut carried = ModulatorState::default();
        modulator.write_state(&mut carried);
        Self {
            current: modulator,
            pending: None,
            carried,
            sample_rate: 0.0,
        }
    }

    /// Stage a replacement. Applied at the start of the next block.
    pub fn set_modulator(&mut self, modulator: Box<dyn Modulator>) {
        self.pending = Some(modulator);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a staged replacement, carrying the previous modulator's state
    /// over. Audio thread only, at a block boundary.
    pub fn commit_pending(&mut self) {
        if let Some(mut next) = self.pending.take() {
            self.current.write_state(&mut self.carried);
            next.read_state(&self.carried);
            next.set_sample_rate(self.sample_rate);
            self.current = next;
        }
    }

    /// The carried state document, merged across swaps.
    pub fn carried_state(&self) -> &ModulatorState {
        &self.carried
    }
}

impl Modulator for MultiModulator {
    fn kind(&self) -> ModulatorKind {
        self.current.kind()
    }

    fn bipolar(&self) -> bool {
        self.current.bipolar()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.current.set_sample_rate(sample_rate);
    }

    fn prepare_block(&mut self, ctx: &BlockCtx) {
        self.sample_rate = ctx.sample_rate;
        self.commit_pending();
        self.current.prepare_block(ctx);
    }

    fn advance_sample(&mut self) {
        self.current.advance_sample();
    }

    fn value(&self) -> f32 {
        self.current.value()
    }

    fn write_state(&self, state: &mut ModulatorState) {
        self.current.write_state(state);
    }

    fn read_state(&mut self, state: &ModulatorState) {
        self.carried = *state;
        self.current.read_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::shape::LfoShape;
    use crate::modulation::lfo::LfoModulator;
    use crate::modulation::macros::MacroModulator;

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn swap_waits_for_the_block_boundary() {
        // A square LFO pinned at phase 0 outputs +1; a fresh macro outputs 0
        let mut multi = MultiModulator::new(Box::new(LfoModulator::new(LfoShape::Square, 0.0)));
        multi.set_sample_rate(SAMPLE_RATE);
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        assert_eq!(multi.value(), 1.0);

        multi.set_modulator(Box::new(MacroModulator::new()));
        for _ in 0..32 {
            multi.advance_sample();
            assert_eq!(multi.value(), 1.0, "swap must not apply mid-block");
        }
        assert!(multi.has_pending());

        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        assert!(!multi.has_pending());
        assert_eq!(multi.kind(), ModulatorKind::Macro);
        assert_eq!(multi.value(), 0.0);
    }

    #[test]
    fn swap_carries_state_onto_the_replacement() {
        let mut multi = MultiModulator::new(Box::new(
            LfoModulator::new(LfoShape::Triangle, 3.0).unipolar(),
        ));
        multi.set_sample_rate(SAMPLE_RATE);
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        // Swap to a different LFO; shape/rate/polarity carry over
        multi.set_modulator(Box::new(LfoModulator::new(LfoShape::Sine, 99.0)));
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        let mut state = ModulatorState::default();
        multi.write_state(&mut state);
        assert_eq!(state.shape, LfoShape::Triangle);
        assert!(!state.bipolar);
    }

    #[test]
    fn carried_state_merges_across_kind_changes() {
        let mut multi = MultiModulator::new(Box::new(MacroModulator::with_level(0.6)));
        multi.set_sample_rate(SAMPLE_RATE);
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));

        // Macro -> LFO -> Macro: the level survives the detour because the
        // carried document only overwrites fields each variant owns
        multi.set_modulator(Box::new(LfoModulator::new(LfoShape::Sine, 2.0)));
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        assert_eq!(multi.kind(), ModulatorKind::Lfo);

        multi.set_modulator(Box::new(MacroModulator::new()));
        multi.prepare_block(&BlockCtx::new(SAMPLE_RATE, 120.0));
        assert_eq!(multi.kind(), ModulatorKind::Macro);

        let mut state = ModulatorState::default();
        multi.write_state(&mut state);
        assert!((state.level - 0.6).abs() < 1e-6, "level lost: {}", state.level);
    }
}
