//! Observer registries for control-surface feedback.
//!
//! Listener delivery is synchronous and fire-and-forget: callbacks run on
//! whichever thread performed the write and must not block. Nothing here is
//! touched by the audio thread.

use crate::modulation::matrix::SourceId;
use crate::modulation::ModulatorKind;
use crate::param::config::ParamId;

/// Handle returned by `add`, used to remove a listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// A registry of callbacks for one event type.
pub struct Listeners<E> {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn Fn(&E) + Send>)>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Box<dyn Fn(&E) + Send>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver an event to every registered listener, in registration order.
    pub fn notify(&self, event: &E) {
        for (_, listener) in &self.entries {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A parameter's normalized value changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub id: ParamId,
    pub normalized: f32,
}

/// A modulator slot was added, swapped, or had its settings updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChange {
    pub id: SourceId,
    pub kind: ModulatorKind,
}

/// What happened to a matrix connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixEdit {
    Added,
    Removed,
}

/// A modulation-matrix connection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixChange {
    pub source: SourceId,
    pub target: ParamId,
    pub edit: MatrixEdit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn listeners_fire_in_registration_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut listeners: Listeners<ParamChange> = Listeners::new();

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            listeners.add(Box::new(move |_| log.lock().unwrap().push(tag)));
        }

        listeners.notify(&ParamChange {
            id: ParamId(1),
            normalized: 0.5,
        });
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut listeners: Listeners<ParamChange> = Listeners::new();

        let counter = Arc::clone(&hits);
        let id = listeners.add(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        let event = ParamChange {
            id: ParamId(1),
            normalized: 0.0,
        };
        listeners.notify(&event);
        assert!(listeners.remove(id));
        listeners.notify(&event);

        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(!listeners.remove(id), "double remove should report false");
    }
}
