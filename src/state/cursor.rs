//! Current position in the file sequence.

use crate::sequence::{FileSequence, FileSummary};

/// Outcome of moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// Row outside the current selection; nothing changed
    OutOfRange,
    /// Row resolved to the file that was already current
    SameFile,
    /// Row resolved to a different file
    NewFile,
}

impl MoveResult {
    /// True unless the row was out of range.
    pub fn succeeded(self) -> bool {
        self != MoveResult::OutOfRange
    }

    /// True if a different file is now current.
    pub fn is_new_file(self) -> bool {
        self == MoveResult::NewFile
    }
}

/// Tracks the current row and a snapshot of the file at that row.
///
/// The sequence can change underneath the cursor, so out-of-range moves are
/// reported rather than treated as bugs.
#[derive(Debug, Clone, Default)]
pub struct SequenceCursor {
    row: Option<usize>,
    current: Option<FileSummary>,
}

impl SequenceCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `row`.
    pub fn move_to<S: FileSequence + ?Sized>(&mut self, sequence: &S, row: usize) -> MoveResult {
        let Some(file) = sequence.get(row) else {
            log::debug!("Row {} out of range (selection has {})", row, sequence.len());
            return MoveResult::OutOfRange;
        };

        let is_new_file = self.current.as_ref().map(|current| current.id) != Some(file.id);
        self.row = Some(row);
        self.current = Some(file);

        if is_new_file {
            MoveResult::NewFile
        } else {
            MoveResult::SameFile
        }
    }

    /// Forget the current position.
    pub fn reset(&mut self) {
        self.row = None;
        self.current = None;
    }

    /// Current row, if any.
    pub fn row(&self) -> Option<usize> {
        self.row
    }

    /// File at the current row, as of the last move.
    pub fn current(&self) -> Option<&FileSummary> {
        self.current.as_ref()
    }
}
