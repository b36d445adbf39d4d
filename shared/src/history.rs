//! Append-only per-frame histories.
//!
//! Every per-frame record in the simulator (true signal, analyzer error signal,
//! controller setpoint and output) lives in a [`History`]. Entries are indexed
//! by frame number starting at 1, and the only mutation is [`History::push`].
//! Readers that hold a slice from [`History::as_slice`] see a consistent prefix.

use thiserror::Error;

/// Errors raised when querying a history.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    #[error("index {index} is out of range, history holds entries 1..={len}")]
    OutOfRange { index: usize, len: usize },
}

/// Append-only sequence indexed from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    entries: Vec<T>,
}

impl<T> History<T> {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create an empty history with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an entry and return its 1-based index.
    pub fn push(&mut self, value: T) -> usize {
        self.entries.push(value);
        self.entries.len()
    }

    /// Entry recorded at the 1-based `index`.
    ///
    /// # Errors
    /// [`HistoryError::OutOfRange`] for `index == 0` or `index > len()`.
    pub fn get(&self, index: usize) -> Result<&T, HistoryError> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or(HistoryError::OutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Most recent entry, if any.
    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Published prefix of the history, oldest first.
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}

impl<T: Copy> History<T> {
    /// Copy of the entry at the 1-based `index`.
    pub fn value(&self, index: usize) -> Result<T, HistoryError> {
        self.get(index).copied()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a History<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
