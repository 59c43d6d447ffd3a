//! Low-level control-signal primitives used by the parameter engine.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside per-parameter and per-connection state. They stay
//! focused on the signal math so the engine layer can handle orchestration
//! and cross-thread synchronization.

/// LFO waveform shapes and bipolar/unipolar conversions.
pub mod shape;
/// Linear, one-pole, and attack/release smoothers.
pub mod smooth;

pub use smooth::SmoothingKind;
