//! Cached game state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::rules::{BoardSnapshot, ChessMove, EndReason, GameResult, GameStatus};
use crate::serde_chess;

/// Canonical game state, recomputed from the rules oracle after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub fen: String,
    pub initial_fen: String,
    pub pgn: String,
    pub moves: Vec<ChessMove>,
    #[serde(with = "serde_chess::color")]
    pub current_player: Color,
    pub status: GameStatus,
    pub result: GameResult,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub board: BoardSnapshot,
}

impl GameState {
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn is_over(&self) -> bool {
        self.status.is_terminal()
    }
}
