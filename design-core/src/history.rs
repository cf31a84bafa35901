//! Bounded, linear undo/redo timeline of canvas snapshots.
//!
//! Saving after an undo discards the redo branch. When the timeline is full
//! the oldest state is evicted and the cursor stays on the newest one.

use std::collections::VecDeque;

use crate::snapshot::CanvasState;

/// Default number of retained states.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Undo/redo timeline.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    states: VecDeque<CanvasState>,
    /// Index of the current state; `None` iff `states` is empty.
    cursor: Option<usize>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    /// Create an empty timeline holding at most `capacity` states.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            states: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            cursor: None,
            capacity,
        }
    }

    /// Record a new state as the current one.
    pub fn save_state(&mut self, state: CanvasState) {
        if self.capacity == 0 {
            return;
        }

        match self.cursor {
            Some(cursor) => self.states.truncate(cursor + 1),
            None => self.states.clear(),
        }

        self.states.push_back(state);
        if self.states.len() > self.capacity {
            if let Some(evicted) = self.states.pop_front() {
                tracing::trace!("History full, evicted snapshot {}", evicted.version);
            }
        }
        self.cursor = Some(self.states.len() - 1);
    }

    /// Step back one state, returning the state to restore.
    pub fn undo(&mut self) -> Option<&CanvasState> {
        let cursor = self.cursor.filter(|&c| c > 0)? - 1;
        self.cursor = Some(cursor);
        self.states.get(cursor)
    }

    /// Step forward one state, returning the state to restore.
    pub fn redo(&mut self) -> Option<&CanvasState> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.states.len())? + 1;
        self.cursor = Some(cursor);
        self.states.get(cursor)
    }

    /// Whether [`undo`](Self::undo) would return a state.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    /// Whether [`redo`](Self::redo) would return a state.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.states.len())
    }

    /// Drop every state.
    pub fn clear(&mut self) {
        self.states.clear();
        self.cursor = None;
    }

    /// State under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&CanvasState> {
        self.cursor.and_then(|c| self.states.get(c))
    }

    /// Retained states, oldest first.
    pub fn states(&self) -> impl Iterator<Item = &CanvasState> {
        self.states.iter()
    }

    /// Number of retained states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Maximum number of retained states.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the current state.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }
}
