//! History entries and per-move analysis

use serde::{Deserialize, Serialize};

use crate::rules::ChessMove;

/// Quality of a move judged by centipawn loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    /// >= 300 centipawn loss
    Blunder,
    /// >= 100 centipawn loss
    Mistake,
    /// >= 50 centipawn loss
    Inaccuracy,
}

impl MoveQuality {
    pub fn from_cp_loss(cp_loss: i32) -> Option<Self> {
        match cp_loss {
            l if l >= 300 => Some(MoveQuality::Blunder),
            l if l >= 100 => Some(MoveQuality::Mistake),
            l if l >= 50 => Some(MoveQuality::Inaccuracy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveQuality::Blunder => "blunder",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Inaccuracy => "inaccuracy",
        }
    }
}

/// Engine verdict attached to a played move
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAnalysis {
    /// Centipawns, white's point of view
    pub evaluation: Option<i32>,
    pub best_move: Option<String>,
    pub cp_loss: Option<i32>,
    pub is_blunder: bool,
    pub is_mistake: bool,
    pub is_inaccuracy: bool,
    pub is_brilliant: bool,
}

impl MoveAnalysis {
    pub fn from_cp_loss(cp_loss: i32) -> Self {
        let quality = MoveQuality::from_cp_loss(cp_loss);
        Self {
            cp_loss: Some(cp_loss),
            is_blunder: quality == Some(MoveQuality::Blunder),
            is_mistake: quality == Some(MoveQuality::Mistake),
            is_inaccuracy: quality == Some(MoveQuality::Inaccuracy),
            ..Self::default()
        }
    }

    pub fn quality(&self) -> Option<MoveQuality> {
        if self.is_blunder {
            Some(MoveQuality::Blunder)
        } else if self.is_mistake {
            Some(MoveQuality::Mistake)
        } else if self.is_inaccuracy {
            Some(MoveQuality::Inaccuracy)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveHistoryEntry {
    #[serde(rename = "move")]
    pub mv: ChessMove,
    /// Position the move was played from
    pub fen_before: String,
    #[serde(default)]
    pub analysis: Option<MoveAnalysis>,
    #[serde(default)]
    pub time_spent_ms: Option<u64>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl MoveHistoryEntry {
    pub fn new(mv: ChessMove, fen_before: impl Into<String>) -> Self {
        Self {
            mv,
            fen_before: fen_before.into(),
            analysis: None,
            time_spent_ms: None,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOptions {
    /// Oldest entries are dropped past this many; 0 keeps everything
    pub max_entries: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self { max_entries: 500 }
    }
}

/// Plain form of the whole log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub history: Vec<MoveHistoryEntry>,
    pub current_index: isize,
    pub options: HistoryOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatistics {
    pub total_moves: usize,
    pub white_moves: usize,
    pub black_moves: usize,
    pub captures: usize,
    pub checks: usize,
    pub castles: usize,
    pub promotions: usize,
    pub blunders: usize,
    pub mistakes: usize,
    pub inaccuracies: usize,
    pub brilliant: usize,
    /// Mean over entries that recorded a time
    pub average_time_ms: Option<f64>,
}
