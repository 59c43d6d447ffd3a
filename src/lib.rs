pub mod dsp;
pub mod engine; // Per-block synchronization and ProcessState handoff
pub mod modulation;
pub mod notify; // Observer registries for control-surface feedback
pub mod param;
pub mod preset; // Declarative definitions and state documents

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
