//! Three-fold repetition tracking over normalized positions.
//!
//! A normalized position keeps board, side to move and castling rights only;
//! en-passant square and both clocks are dropped.

use shakmaty::Chess;

use super::moves::fen_of;

/// First three FEN fields of `fen`
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// One normalized position per ply, the starting position included.
#[derive(Debug, Clone, Default)]
pub struct RepetitionTracker {
    positions: Vec<String>,
}

impl RepetitionTracker {
    pub fn new(initial: &Chess) -> Self {
        Self {
            positions: vec![normalize_fen(&fen_of(initial))],
        }
    }

    pub fn reset(&mut self, initial: &Chess) {
        self.positions.clear();
        self.positions.push(normalize_fen(&fen_of(initial)));
    }

    pub fn push(&mut self, position: &Chess) {
        self.positions.push(normalize_fen(&fen_of(position)));
    }

    /// Drops the newest entry. The starting position is never removed.
    pub fn pop(&mut self) -> Option<String> {
        if self.positions.len() > 1 {
            self.positions.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[String] {
        &self.positions
    }

    /// How often `key` (already normalized) occurs in the full history
    pub fn occurrences(&self, key: &str) -> usize {
        self.positions.iter().filter(|p| p.as_str() == key).count()
    }

    /// Occurrences of the current position, recomputed on every call
    pub fn current_count(&self) -> usize {
        match self.positions.last() {
            Some(current) => self.occurrences(current),
            None => 0,
        }
    }

    pub fn is_threefold(&self) -> bool {
        self.current_count() >= 3
    }
}
