//! The modulation matrix: active source→target routings.

use crate::dsp::shape::bipolar_to_unipolar;
use crate::dsp::smooth::AttackRelease;
use crate::param::config::ParamId;
use crate::preset::ConnectionSpec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Connection slots are preallocated so the audio thread never grows the
/// matrix mid-stream.
pub const MAX_CONNECTIONS: usize = 64;

/// Stable identifier of a modulation source slot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

/*
Per-Connection Shaping
======================

Every connection contributes `depth * shaped(source)` to its target, where
shaping reconciles the connection's polarity with the source's:

  connection bipolar            use the source's signed output as-is
  connection unipolar, source bipolar    offset into [0, 1]
  connection unipolar, source unipolar   already [0, 1], pass through

Each contribution then runs through that connection's own attack/release
follower BEFORE the per-target summation. Two modulators riding the same
target with different time constants therefore converge to their depths
independently; smoothing the summed result instead would couple them.
*/

struct Connection {
    spec: ConnectionSpec,
    follower: AttackRelease,
    source_slot: usize,
    target_slot: usize,
}

/// Active connections, resolved to slot indices for per-sample evaluation.
pub struct ModMatrix {
    connections: Vec<Connection>,
    sample_rate: f32,
}

impl ModMatrix {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            connections: Vec::with_capacity(MAX_CONNECTIONS),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, source: SourceId, target: ParamId) -> bool {
        self.connections
            .iter()
            .any(|c| c.spec.source == source && c.spec.target == target)
    }

    /// Depth of an existing connection, if present.
    pub fn depth(&self, source: SourceId, target: ParamId) -> Option<f32> {
        self.connections
            .iter()
            .find(|c| c.spec.source == source && c.spec.target == target)
            .map(|c| c.spec.depth)
    }

    /// Install a connection. A duplicate (source, target) pair or a full
    /// matrix is a no-op returning `false`; existing entries must be
    /// removed explicitly first.
    pub fn add_connection(
        &mut self,
        spec: ConnectionSpec,
        source_slot: usize,
        target_slot: usize,
    ) -> bool {
        if self.connections.len() >= MAX_CONNECTIONS {
            return false;
        }
        if self.contains(spec.source, spec.target) {
            return false;
        }
        let follower = AttackRelease::new(spec.attack_ms, spec.release_ms, self.sample_rate);
        self.connections.push(Connection {
            spec,
            follower,
            source_slot,
            target_slot,
        });
        true
    }

    pub fn remove_connection(&mut self, source: SourceId, target: ParamId) -> bool {
        let position = self
            .connections
            .iter()
            .position(|c| c.spec.source == source && c.spec.target == target);
        match position {
            Some(index) => {
                self.connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Reconfigure follower coefficients after a sample-rate change. The
    /// followers restart from zero, matching the overall stream reset.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for connection in &mut self.connections {
            connection.follower.set_times(
                connection.spec.attack_ms,
                connection.spec.release_ms,
                sample_rate,
            );
            connection.follower.reset();
        }
    }

    /// Evaluate one sample: shape each source value, smooth each
    /// contribution independently, and sum into `acc` per target slot.
    ///
    /// `acc` must be zeroed by the caller; slots outside the provided
    /// slices are skipped rather than risking a panic on the audio thread.
    #[inline]
    pub fn accumulate(&mut self, source_values: &[f32], source_bipolar: &[bool], acc: &mut [f32]) {
        for connection in &mut self.connections {
            let Some(&raw) = source_values.get(connection.source_slot) else {
                continue;
            };
            let shaped = if connection.spec.bipolar {
                raw
            } else if source_bipolar
                .get(connection.source_slot)
                .copied()
                .unwrap_or(false)
            {
                bipolar_to_unipolar(raw)
            } else {
                raw
            };

            let contribution = connection.follower.process(shaped * connection.spec.depth);
            if let Some(slot) = acc.get_mut(connection.target_slot) {
                *slot += contribution;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn spec(source: u32, target: u32, depth: f32) -> ConnectionSpec {
        ConnectionSpec::new(SourceId(source), ParamId(target), depth)
    }

    #[test]
    fn duplicate_connection_is_a_no_op() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        assert!(matrix.add_connection(spec(1, 10, 0.5), 0, 0));
        assert_eq!(matrix.len(), 1);

        // Same pair with a different depth: rejected, original preserved
        assert!(!matrix.add_connection(spec(1, 10, 0.9), 0, 0));
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.depth(SourceId(1), ParamId(10)), Some(0.5));
    }

    #[test]
    fn remove_then_re_add_succeeds() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        assert!(matrix.add_connection(spec(1, 10, 0.5), 0, 0));
        assert!(matrix.remove_connection(SourceId(1), ParamId(10)));
        assert!(!matrix.remove_connection(SourceId(1), ParamId(10)));
        assert!(matrix.add_connection(spec(1, 10, 0.9), 0, 0));
        assert_eq!(matrix.depth(SourceId(1), ParamId(10)), Some(0.9));
    }

    #[test]
    fn capacity_overflow_is_rejected() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        for index in 0..MAX_CONNECTIONS as u32 {
            assert!(matrix.add_connection(spec(index, 0, 0.1), 0, 0));
        }
        assert!(!matrix.add_connection(spec(9_999, 1, 0.1), 0, 1));
        assert_eq!(matrix.len(), MAX_CONNECTIONS);
    }

    #[test]
    fn contributions_sum_additively_per_target() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        // Instant followers so the sum is immediate
        assert!(matrix.add_connection(spec(0, 10, 0.5), 0, 0));
        assert!(matrix.add_connection(spec(1, 10, 0.3), 1, 0));

        let mut acc = [0.0];
        matrix.accumulate(&[1.0, 0.5], &[true, false], &mut acc);

        // 1.0 * 0.5 + 0.5 * 0.3 = 0.65
        assert!((acc[0] - 0.65).abs() < 1e-6, "got {}", acc[0]);
    }

    #[test]
    fn unipolar_connection_offsets_bipolar_sources() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        assert!(matrix.add_connection(spec(0, 10, 1.0).unipolar(), 0, 0));

        // Bipolar source at its trough maps to 0, not -1
        let mut acc = [0.0];
        matrix.accumulate(&[-1.0], &[true], &mut acc);
        assert!(acc[0].abs() < 1e-6, "got {}", acc[0]);

        let mut acc = [0.0];
        matrix.accumulate(&[1.0], &[true], &mut acc);
        assert!((acc[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn followers_smooth_each_contribution_independently() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        // Connection A: instant. Connection B: slow 100ms attack.
        assert!(matrix.add_connection(spec(0, 10, 0.5), 0, 0));
        assert!(matrix.add_connection(spec(1, 10, 0.5).with_times(100.0, 100.0), 1, 0));

        // One sample in: A contributes fully, B has barely moved
        let mut acc = [0.0];
        matrix.accumulate(&[1.0, 1.0], &[false, false], &mut acc);
        assert!(
            acc[0] > 0.5 && acc[0] < 0.52,
            "A instant, B slow; got {}",
            acc[0]
        );

        // Hold the inputs: the sum converges toward both depths
        let mut last = 0.0;
        for _ in 0..2_000 {
            let mut acc = [0.0];
            matrix.accumulate(&[1.0, 1.0], &[false, false], &mut acc);
            last = acc[0];
        }
        assert!((last - 1.0).abs() < 1e-3, "sum should reach 1.0: {}", last);
    }

    #[test]
    fn stale_slots_are_skipped_not_panicked() {
        let mut matrix = ModMatrix::new(SAMPLE_RATE);
        assert!(matrix.add_connection(spec(0, 10, 1.0), 7, 9));

        let mut acc = [0.0];
        matrix.accumulate(&[1.0], &[true], &mut acc);
        assert_eq!(acc[0], 0.0);
    }
}
