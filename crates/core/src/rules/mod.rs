//! Rules oracle: legality, board bookkeeping and repetition history.
//!
//! Wraps a shakmaty position. Legality itself is shakmaty's; this layer adds
//! the move records the rest of the crate consumes, undo, and the canonical
//! three-fold repetition tracker.

mod moves;
mod oracle;
mod repetition;
mod types;

pub use moves::{describe_move, fen_of, parse_promotion, parse_square, uci_target};
pub use oracle::RulesOracle;
pub(crate) use oracle::parse_position;
pub use repetition::{normalize_fen, RepetitionTracker};
pub use types::*;

/// FEN of the standard starting position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
