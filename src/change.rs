use crate::layout::{FieldType, RecordType};
use crate::record::Record;
use crate::value::FieldValue;

// ─── Change ─────────────────────────────────────────────────────────────────

/// One observable unit of mutation, carrying enough state to invert itself.
///
/// `InsertRecord` and `RemoveRecord` own a copy of the record as it stood
/// at the moment of the operation (after name uniquing and renumbering), so
/// undo and redo replay byte-identical content.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Sentinel occupying position 0 of every fresh change list.
    None,
    InsertRecord { record: Record },
    RemoveRecord { record: Record },
    /// Plain splice indices: redo removes at `from` and reinserts at `to`,
    /// undo removes at `to` and reinserts at `from`.
    MoveRecord {
        rtype: RecordType,
        from: usize,
        to: usize,
    },
    EditField {
        rtype: RecordType,
        record: usize,
        ftype: FieldType,
        field: usize,
        old: FieldValue,
        new: FieldValue,
    },
}

// ─── Listener ───────────────────────────────────────────────────────────────

/// Single registered observer; delivery is synchronous, within the mutating
/// call that produced the change.
pub trait ChangeListener {
    fn on_change(&mut self, change: &Change);
}

// ─── ChangeLog ──────────────────────────────────────────────────────────────

/// Strictly linear undo/redo history. Position 0 is the sentinel; a fresh
/// mutation after an undo truncates the redo tail before appending.
pub struct ChangeLog {
    changes: Vec<Change>,
    index: usize,
    listener: Option<Box<dyn ChangeListener>>,
}

impl std::fmt::Debug for ChangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeLog")
            .field("changes", &self.changes)
            .field("index", &self.index)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        ChangeLog::new()
    }
}

impl ChangeLog {
    pub fn new() -> Self {
        ChangeLog {
            changes: vec![Change::None],
            index: 0,
            listener: None,
        }
    }

    /// Discard all history and reinstate the sentinel.
    pub fn reset(&mut self) {
        self.changes = vec![Change::None];
        self.index = 0;
    }

    pub fn set_listener(&mut self, listener: Box<dyn ChangeListener>) {
        self.listener = Some(listener);
    }

    pub fn publish(&mut self, change: &Change) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_change(change);
        }
    }

    /// Append a completed change; the current position becomes the new end.
    pub fn record(&mut self, change: Change) {
        self.changes.truncate(self.index + 1);
        self.changes.push(change);
        self.index = self.changes.len() - 1;
        let change = self.changes[self.index].clone();
        self.publish(&change);
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.changes.len()
    }

    /// Step back, returning a copy of the change to invert. No-op at the
    /// sentinel.
    pub fn step_back(&mut self) -> Option<Change> {
        if !self.can_undo() {
            return None;
        }
        let change = self.changes[self.index].clone();
        self.index -= 1;
        Some(change)
    }

    /// Step forward, returning a copy of the change to reapply.
    pub fn step_forward(&mut self) -> Option<Change> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.changes[self.index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_at_sentinel_is_noop() {
        let mut log = ChangeLog::new();
        assert!(log.step_back().is_none());
        assert!(log.step_forward().is_none());
    }

    #[test]
    fn record_truncates_redo_tail() {
        let mut log = ChangeLog::new();
        log.record(Change::MoveRecord {
            rtype: RecordType::new("A"),
            from: 0,
            to: 1,
        });
        log.record(Change::MoveRecord {
            rtype: RecordType::new("A"),
            from: 1,
            to: 0,
        });
        assert!(log.step_back().is_some());
        assert!(log.can_redo());

        log.record(Change::MoveRecord {
            rtype: RecordType::new("B"),
            from: 0,
            to: 0,
        });
        assert!(!log.can_redo());
        assert_eq!(log.changes.len(), 3);
    }
}
