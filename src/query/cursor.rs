//! Backward navigation over a forward-only cursor API.
//!
//! The backend hands out opaque "next" tokens only, so every forward step
//! records the cursor it left; stepping back pops it.

use crate::error::{AppError, Result};
use crate::models::Cursor;
use tracing::debug;

/// Stack of previously visited cursors; `None` is the first page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorHistory {
    stack: Vec<Option<Cursor>>,
}

impl CursorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` and return `next` as the cursor to navigate to
    pub fn advance(&mut self, current: Option<Cursor>, next: Cursor) -> Cursor {
        debug!(from = ?current, to = %next, depth = self.stack.len() + 1, "Cursor advanced");
        self.stack.push(current);
        next
    }

    /// Pop the cursor that was active before the last `advance`
    pub fn retreat(&mut self) -> Result<Option<Cursor>> {
        let previous = self.stack.pop().ok_or(AppError::NoHistory)?;
        debug!(to = ?previous, depth = self.stack.len(), "Cursor retreated");
        Ok(previous)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn can_go_back(&self) -> bool {
        !self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retreat_on_empty_history() {
        let mut history = CursorHistory::new();
        assert!(matches!(history.retreat(), Err(AppError::NoHistory)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_advance_then_retreat_restores_previous_cursor() {
        let mut history = CursorHistory::new();

        let c1 = history.advance(None, Cursor::new("c1"));
        let c2 = history.advance(Some(c1.clone()), Cursor::new("c2"));
        assert_eq!(c2, Cursor::new("c2"));
        assert_eq!(history.len(), 2);

        assert_eq!(history.retreat().unwrap(), Some(c1));
        assert_eq!(history.retreat().unwrap(), None);
        assert!(!history.can_go_back());
    }

    #[test]
    fn test_length_tracks_forward_steps() {
        let mut history = CursorHistory::new();
        let mut current = None;
        for i in 0..5 {
            let next = history.advance(current.take(), Cursor::new(format!("c{}", i)));
            current = Some(next);
        }
        assert_eq!(history.len(), 5);

        history.reset();
        assert_eq!(history.len(), 0);
    }
}
