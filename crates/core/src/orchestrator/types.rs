//! Request, result and report types of the orchestrator API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use super::metrics::PhaseTimings;
use crate::endgame::EndgameAnalysis;
use crate::history::HistorySnapshot;
use crate::rules::ChessMove;
use crate::serde_chess;
use crate::state::Checkpoint;

/// A move as a UI submits it, squares in algebraic form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: Option<String>,
    /// Skip the dry-run validation phase
    #[serde(default)]
    pub skip_validation: bool,
}

impl MoveRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
            skip_validation: false,
        }
    }

    pub fn with_promotion(mut self, promotion: impl Into<String>) -> Self {
        self.promotion = Some(promotion.into());
        self
    }

    /// Splits an engine move such as `e7e8q`
    pub fn from_uci(uci: &str) -> Option<Self> {
        if !uci.is_ascii() || !(4..=5).contains(&uci.len()) {
            return None;
        }
        let mut request = Self::new(&uci[0..2], &uci[2..4]);
        if uci.len() == 5 {
            request = request.with_promotion(&uci[4..5]);
        }
        Some(request)
    }
}

/// Outcome of a move attempt. Rejections are results, not errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub success: bool,
    #[serde(rename = "move")]
    pub mv: Option<ChessMove>,
    pub notation: Option<String>,
    pub error: Option<String>,
    pub endgame: Option<EndgameAnalysis>,
    pub timings: PhaseTimings,
}

impl MoveResult {
    pub(crate) fn rejected(reason: impl Into<String>, timings: PhaseTimings) -> Self {
        Self {
            success: false,
            mv: None,
            notation: None,
            error: Some(reason.into()),
            endgame: None,
            timings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    HumanVsHuman,
    HumanVsAi {
        #[serde(with = "serde_chess::color")]
        ai_color: Color,
    },
    AiVsAi,
}

impl GameMode {
    /// Whether the engine plays `color` in this mode
    pub fn ai_plays(&self, color: Color) -> bool {
        match self {
            GameMode::HumanVsHuman => false,
            GameMode::HumanVsAi { ai_color } => *ai_color == color,
            GameMode::AiVsAi => true,
        }
    }
}

/// Comparison of the rules oracle against the cached state and the history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synchronized: bool,
    pub oracle_fen: String,
    pub state_fen: String,
    pub oracle_moves: usize,
    pub state_moves: usize,
    pub history_moves: usize,
    pub discrepancies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Constructed,
    Initialized,
    Destroyed,
}

/// Backup taken when a transaction opens
#[derive(Debug, Clone)]
pub(crate) struct TransactionBackup {
    pub fen: String,
    pub timestamp: DateTime<Utc>,
    pub checkpoint: Checkpoint,
    pub history: HistorySnapshot,
}
