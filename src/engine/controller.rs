//! Block-rate synchronization between the control surface and the audio
//! thread.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::state::ProcessState;
use crate::modulation::matrix::{ModMatrix, SourceId, MAX_CONNECTIONS};
use crate::modulation::multi::MultiModulator;
use crate::modulation::{BlockCtx, Modulator};
use crate::notify::{
    ListenerId, Listeners, MatrixChange, MatrixEdit, ParamChange, SourceChange,
};
use crate::param::config::{ParamConfig, ParamId};
use crate::param::value::{ParamCell, Parameter};
use crate::preset::{
    ConnectionSpec, ModulatorState, ParamValueState, PresetState, SourceState,
};
use crate::MAX_BLOCK_SIZE;

/// Modulator slots are preallocated so adds never reallocate on the audio
/// thread.
pub const MAX_MOD_SOURCES: usize = 32;

/*
The Block Protocol
==================

Everything the audio thread observes changes only at block boundaries.
`process_block` runs, in order:

  1. drain staged edits     matrix changes, modulator adds/swaps/updates
  2. latch parameters       one atomic read per parameter, retarget ramps
  3. prepare modulators     commit pending swaps, latch control-rate
                            settings (LFO rate, envelope times, gates)
  4. per-sample loop        read every modulator, shape and smooth every
                            connection, write every parameter buffer,
                            then advance every modulator
  5. hand off               the ProcessState borrow for this block

DSP code consuming the state can therefore never observe a modulator or
parameter update mid-block. A zero-length block or a sample-rate change
re-prepares every modulator and smoother (internal phase and stage state
reset) before any audio resumes; the stream degrades to re-preparation,
never to an error on the audio thread.
*/

/// A staged structural edit, applied by the audio thread at a block
/// boundary.
pub enum Edit {
    AddSource {
        id: SourceId,
        modulator: Box<dyn Modulator>,
    },
    SwapSource {
        id: SourceId,
        modulator: Box<dyn Modulator>,
    },
    UpdateSource {
        id: SourceId,
        state: ModulatorState,
    },
    AddConnection(ConnectionSpec),
    RemoveConnection {
        source: SourceId,
        target: ParamId,
    },
}

/// Audio-thread side of the edit queue.
pub trait EditReceiver: Send {
    fn pop(&mut self) -> Option<Edit>;
}

/// Control-surface side of the edit queue. `push` hands the edit back when
/// the queue is full so the caller can report the drop.
pub trait EditSender: Send {
    fn push(&mut self, edit: Edit) -> Result<(), Edit>;
}

#[cfg(feature = "rtrb")]
impl EditReceiver for rtrb::Consumer<Edit> {
    fn pop(&mut self) -> Option<Edit> {
        rtrb::Consumer::pop(self).ok()
    }
}

#[cfg(feature = "rtrb")]
impl EditSender for rtrb::Producer<Edit> {
    fn push(&mut self, edit: Edit) -> Result<(), Edit> {
        rtrb::Producer::push(self, edit).map_err(|rtrb::PushError::Full(edit)| edit)
    }
}

/// Receiver for controllers driven without an edit queue (offline
/// rendering, tests).
pub struct NoEdits;

impl EditReceiver for NoEdits {
    fn pop(&mut self) -> Option<Edit> {
        None
    }
}

struct ModSlot {
    id: SourceId,
    modulator: MultiModulator,
}

/// Aggregates all parameters, modulator slots, and the matrix for one
/// processing unit. Lives on the audio thread.
pub struct ParamController<R: EditReceiver> {
    cells: Vec<Arc<ParamCell>>,
    params: Vec<Parameter>,
    index: HashMap<ParamId, usize>,
    slots: Vec<ModSlot>,
    matrix: ModMatrix,
    state: ProcessState,
    edits: R,
    // Per-sample scratch, preallocated to slot/param counts
    source_values: Vec<f32>,
    source_bipolar: Vec<bool>,
    acc: Vec<f32>,
    sample_rate: f32,
}

impl<R: EditReceiver> ParamController<R> {
    pub fn new(configs: Vec<ParamConfig>, sample_rate: f32, edits: R) -> Self {
        let cells: Vec<Arc<ParamCell>> = configs
            .into_iter()
            .map(|config| Arc::new(ParamCell::new(Arc::new(config))))
            .collect();
        let params: Vec<Parameter> = cells
            .iter()
            .map(|cell| Parameter::new(Arc::clone(cell), sample_rate))
            .collect();
        let index = cells
            .iter()
            .enumerate()
            .map(|(slot, cell)| (cell.id(), slot))
            .collect();
        let param_count = params.len();

        Self {
            cells,
            params,
            index,
            slots: Vec::with_capacity(MAX_MOD_SOURCES),
            matrix: ModMatrix::new(sample_rate),
            state: ProcessState::new(param_count),
            edits,
            source_values: Vec::with_capacity(MAX_MOD_SOURCES),
            source_bipolar: Vec::with_capacity(MAX_MOD_SOURCES),
            acc: vec![0.0; param_count],
            sample_rate,
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn index_of(&self, id: ParamId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn slot_of(&self, id: SourceId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    pub fn connection_count(&self) -> usize {
        self.matrix.len()
    }

    /// The shared cells, for wiring a [`ControlHandle`].
    pub fn cells(&self) -> &[Arc<ParamCell>] {
        &self.cells
    }

    /// The latched (block-cached) parameter, for control-rate DSP reads.
    pub fn param(&self, id: ParamId) -> Option<&Parameter> {
        self.index_of(id).map(|slot| &self.params[slot])
    }

    /// Advance one block and hand off the snapshot for it.
    ///
    /// `len` is clamped to [`MAX_BLOCK_SIZE`]. A zero-length block, or a
    /// context carrying a new sample rate, re-prepares every modulator and
    /// smoother before anything advances.
    pub fn process_block(&mut self, ctx: &BlockCtx, len: usize) -> &ProcessState {
        let len = len.min(MAX_BLOCK_SIZE);
        if ctx.sample_rate != self.sample_rate {
            self.reprepare(ctx.sample_rate);
        }
        if len == 0 {
            let sample_rate = self.sample_rate;
            self.reprepare(sample_rate);
            self.state.begin_block(0);
            return &self.state;
        }

        self.drain_edits();

        for param in &mut self.params {
            param.update_cache();
        }
        for slot in &mut self.slots {
            slot.modulator.prepare_block(ctx);
        }
        // Polarity can change with a committed swap; latch it per block
        for (index, slot) in self.slots.iter().enumerate() {
            self.source_bipolar[index] = slot.modulator.bipolar();
        }

        self.state.begin_block(len);
        let Self {
            params,
            slots,
            matrix,
            state,
            source_values,
            source_bipolar,
            acc,
            ..
        } = self;

        for sample in 0..len {
            for (index, slot) in slots.iter().enumerate() {
                source_values[index] = slot.modulator.value();
            }
            for slot in acc.iter_mut() {
                *slot = 0.0;
            }
            matrix.accumulate(source_values, source_bipolar, acc);

            for (index, param) in params.iter_mut().enumerate() {
                state.write(index, sample, param.process_sample(acc[index]));
            }
            for slot in slots.iter_mut() {
                slot.modulator.advance_sample();
            }
        }

        &self.state
    }

    /// The snapshot from the most recent block.
    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    fn reprepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for param in &mut self.params {
            param.prepare(sample_rate);
        }
        for slot in &mut self.slots {
            slot.modulator.set_sample_rate(sample_rate);
        }
        self.matrix.set_sample_rate(sample_rate);
    }

    fn drain_edits(&mut self) {
        while let Some(edit) = self.edits.pop() {
            self.apply_edit(edit);
        }
    }

    fn apply_edit(&mut self, edit: Edit) {
        match edit {
            Edit::AddSource { id, modulator } => {
                if self.slots.len() >= MAX_MOD_SOURCES || self.slot_of(id).is_some() {
                    return;
                }
                let mut multi = MultiModulator::new(modulator);
                multi.set_sample_rate(self.sample_rate);
                // Pushes stay within the preallocated capacities
                self.slots.push(ModSlot { id, modulator: multi });
                self.source_values.push(0.0);
                self.source_bipolar.push(false);
            }
            Edit::SwapSource { id, modulator } => {
                if let Some(slot) = self.slot_of(id) {
                    self.slots[slot].modulator.set_modulator(modulator);
                }
            }
            Edit::UpdateSource { id, state } => {
                if let Some(slot) = self.slot_of(id) {
                    self.slots[slot].modulator.read_state(&state);
                }
            }
            Edit::AddConnection(spec) => {
                let (Some(source_slot), Some(target_slot)) =
                    (self.slot_of(spec.source), self.index_of(spec.target))
                else {
                    return;
                };
                self.matrix.add_connection(spec, source_slot, target_slot);
            }
            Edit::RemoveConnection { source, target } => {
                self.matrix.remove_connection(source, target);
            }
        }
    }
}

#[cfg(feature = "rtrb")]
impl ParamController<rtrb::Consumer<Edit>> {
    /// Construct a controller and its control handle joined by an `rtrb`
    /// SPSC edit queue of the given capacity.
    pub fn with_edit_queue(
        configs: Vec<ParamConfig>,
        sample_rate: f32,
        capacity: usize,
    ) -> (Self, ControlHandle<rtrb::Producer<Edit>>) {
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        let controller = ParamController::new(configs, sample_rate, consumer);
        let handle = ControlHandle::new(&controller, producer);
        (controller, handle)
    }
}

/// The non-real-time API: parameter writes, structural edits, listeners,
/// and preset state.
///
/// The handle keeps a shadow copy of the matrix and modulator settings (it
/// originates every edit), so presets export without touching audio-thread
/// state, and duplicate connections are reported before they are ever
/// staged. The matrix itself re-checks at apply time and remains
/// authoritative.
pub struct ControlHandle<S: EditSender> {
    cells: Vec<Arc<ParamCell>>,
    index: HashMap<ParamId, usize>,
    sender: S,
    connections: Vec<ConnectionSpec>,
    sources: Vec<SourceState>,
    param_listeners: Listeners<ParamChange>,
    source_listeners: Listeners<SourceChange>,
    matrix_listeners: Listeners<MatrixChange>,
}

impl<S: EditSender> ControlHandle<S> {
    pub fn new<R: EditReceiver>(controller: &ParamController<R>, sender: S) -> Self {
        Self {
            cells: controller.cells.to_vec(),
            index: controller.index.clone(),
            sender,
            connections: Vec::new(),
            sources: Vec::new(),
            param_listeners: Listeners::new(),
            source_listeners: Listeners::new(),
            matrix_listeners: Listeners::new(),
        }
    }

    fn cell(&self, id: ParamId) -> Option<&Arc<ParamCell>> {
        self.index.get(&id).map(|&slot| &self.cells[slot])
    }

    /// Write a parameter's normalized value. Returns `false` for an
    /// unknown id.
    pub fn set_normalized(&mut self, id: ParamId, value: f32) -> bool {
        let Some(cell) = self.cell(id) else {
            return false;
        };
        let normalized = cell.set_normalized(value);
        self.param_listeners.notify(&ParamChange { id, normalized });
        true
    }

    pub fn normalized(&self, id: ParamId) -> Option<f32> {
        self.cell(id).map(|cell| cell.normalized())
    }

    pub fn denormalized(&self, id: ParamId) -> Option<f32> {
        self.cell(id).map(|cell| cell.denormalized())
    }

    /// Switch a parameter's interaction mode (latched next block).
    pub fn set_mode(&mut self, id: ParamId, mode: usize) -> bool {
        let Some(cell) = self.cell(id) else {
            return false;
        };
        cell.set_mode(mode);
        let normalized = cell.normalized();
        self.param_listeners.notify(&ParamChange { id, normalized });
        true
    }

    fn send(&mut self, edit: Edit, what: &str) -> bool {
        match self.sender.push(edit) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("edit queue full; dropped {what}");
                false
            }
        }
    }

    /// Install a new modulator slot. The modulator's settings are recorded
    /// in the shadow before the box is staged.
    pub fn add_source(&mut self, id: SourceId, modulator: Box<dyn Modulator>) -> bool {
        if self.sources.iter().any(|source| source.id == id) {
            log::warn!("source {} already exists; ignoring add", id.0);
            return false;
        }
        if self.sources.len() >= MAX_MOD_SOURCES {
            log::warn!("modulator slots exhausted; ignoring add of source {}", id.0);
            return false;
        }
        let kind = modulator.kind();
        let mut state = ModulatorState::default();
        modulator.write_state(&mut state);

        if !self.send(Edit::AddSource { id, modulator }, "add_source") {
            return false;
        }
        self.sources.push(SourceState { id, state });
        self.source_listeners.notify(&SourceChange { id, kind });
        log::debug!("added modulation source {} ({:?})", id.0, kind);
        true
    }

    /// Stage a modulator replacement for an existing slot. Applied at the
    /// next block boundary; the outgoing modulator's settings carry over.
    pub fn swap_source(&mut self, id: SourceId, modulator: Box<dyn Modulator>) -> bool {
        let Some(entry) = self.sources.iter_mut().position(|source| source.id == id) else {
            log::warn!("source {} unknown; ignoring swap", id.0);
            return false;
        };
        let kind = modulator.kind();
        if !self.send(Edit::SwapSource { id, modulator }, "swap_source") {
            return false;
        }
        self.sources[entry].state.kind = kind;
        self.source_listeners.notify(&SourceChange { id, kind });
        log::debug!("staged swap of source {} to {:?}", id.0, kind);
        true
    }

    /// Replace a slot's settings from a state document.
    pub fn update_source(&mut self, id: SourceId, state: ModulatorState) -> bool {
        let Some(entry) = self.sources.iter_mut().position(|source| source.id == id) else {
            return false;
        };
        if !self.send(Edit::UpdateSource { id, state }, "update_source") {
            return false;
        }
        self.sources[entry].state = state;
        let kind = state.kind;
        self.source_listeners.notify(&SourceChange { id, kind });
        true
    }

    /// Route a source onto a parameter. Duplicate (source, target) pairs
    /// and capacity overflows are rejected no-ops.
    pub fn add_connection(&mut self, spec: ConnectionSpec) -> bool {
        if self
            .connections
            .iter()
            .any(|existing| existing.source == spec.source && existing.target == spec.target)
        {
            log::warn!(
                "connection {} -> {} already exists; remove it first",
                spec.source.0,
                spec.target.0
            );
            return false;
        }
        if self.connections.len() >= MAX_CONNECTIONS {
            log::warn!("matrix full; ignoring connection");
            return false;
        }
        if !self.index.contains_key(&spec.target) {
            log::warn!("connection targets unknown parameter {}", spec.target.0);
            return false;
        }
        if !self.send(Edit::AddConnection(spec), "add_connection") {
            return false;
        }
        self.connections.push(spec);
        self.matrix_listeners.notify(&MatrixChange {
            source: spec.source,
            target: spec.target,
            edit: MatrixEdit::Added,
        });
        true
    }

    pub fn remove_connection(&mut self, source: SourceId, target: ParamId) -> bool {
        let Some(position) = self
            .connections
            .iter()
            .position(|spec| spec.source == source && spec.target == target)
        else {
            return false;
        };
        if !self.send(Edit::RemoveConnection { source, target }, "remove_connection") {
            return false;
        }
        self.connections.remove(position);
        self.matrix_listeners.notify(&MatrixChange {
            source,
            target,
            edit: MatrixEdit::Removed,
        });
        true
    }

    /// The shadow view of the live matrix.
    pub fn connections(&self) -> &[ConnectionSpec] {
        &self.connections
    }

    /// The shadow view of the modulator slots.
    pub fn sources(&self) -> &[SourceState] {
        &self.sources
    }

    /// Capture parameter values, modulator settings, and the matrix.
    pub fn export_preset(&self) -> PresetState {
        PresetState {
            params: self
                .cells
                .iter()
                .map(|cell| ParamValueState {
                    id: cell.id(),
                    normalized: cell.normalized(),
                })
                .collect(),
            sources: self.sources.clone(),
            matrix: crate::preset::MatrixState {
                entries: self.connections.clone(),
            },
        }
    }

    /// Restore a captured preset: parameter values, modulator slots
    /// (created or updated as needed), and the full matrix.
    pub fn apply_preset(&mut self, preset: &PresetState) {
        for value in &preset.params {
            self.set_normalized(value.id, value.normalized);
        }

        for source in &preset.sources {
            let existing_kind = self
                .sources
                .iter()
                .find(|entry| entry.id == source.id)
                .map(|entry| entry.state.kind);
            match existing_kind {
                None => {
                    self.add_source(source.id, crate::modulation::from_state(&source.state));
                    self.update_source(source.id, source.state);
                }
                Some(kind) if kind != source.state.kind => {
                    self.swap_source(source.id, crate::modulation::from_state(&source.state));
                    self.update_source(source.id, source.state);
                }
                Some(_) => {
                    self.update_source(source.id, source.state);
                }
            }
        }

        // Rebuild the matrix from scratch so removed routes do not linger
        for spec in self.connections.clone() {
            self.remove_connection(spec.source, spec.target);
        }
        for spec in &preset.matrix.entries {
            self.add_connection(*spec);
        }
    }

    pub fn on_param_change(&mut self, listener: Box<dyn Fn(&ParamChange) + Send>) -> ListenerId {
        self.param_listeners.add(listener)
    }

    pub fn remove_param_listener(&mut self, id: ListenerId) -> bool {
        self.param_listeners.remove(id)
    }

    pub fn on_source_change(&mut self, listener: Box<dyn Fn(&SourceChange) + Send>) -> ListenerId {
        self.source_listeners.add(listener)
    }

    pub fn remove_source_listener(&mut self, id: ListenerId) -> bool {
        self.source_listeners.remove(id)
    }

    pub fn on_matrix_change(&mut self, listener: Box<dyn Fn(&MatrixChange) + Send>) -> ListenerId {
        self.matrix_listeners.add(listener)
    }

    pub fn remove_matrix_listener(&mut self, id: ListenerId) -> bool {
        self.matrix_listeners.remove(id)
    }
}
