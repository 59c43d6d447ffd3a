//! Per-block synchronization between the control surface and the audio
//! thread.
//!
//! `controller` owns the block protocol (drain edits, latch, prepare,
//! advance, hand off); `state` is the immutable per-block snapshot DSP code
//! consumes.

/// ParamController, ControlHandle, and the staged edit queue.
pub mod controller;
/// The per-block ProcessState snapshot.
pub mod state;

pub use controller::{
    ControlHandle, Edit, EditReceiver, EditSender, NoEdits, ParamController, MAX_MOD_SOURCES,
};
pub use state::ProcessState;
