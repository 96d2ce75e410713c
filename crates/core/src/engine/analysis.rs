//! Types for representing engine analysis results

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use super::protocol::Score;
use crate::rules::ChessMove;

/// Evaluation-bar value for any forced mate
pub const MATE_SENTINEL: i32 = 999_999;

/// Represents a position evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Evaluation {
    /// Centipawn score as reported by the engine
    Centipawns(i32),
    /// Forced mate (positive = white mates, negative = black mates)
    Mate(i32),
    /// The given side is already checkmated (`score mate 0`)
    #[serde(with = "crate::serde_chess::color")]
    Mated(Color),
}

impl Evaluation {
    /// Maps a raw engine score given with `turn` to move.
    ///
    /// Mate distances are flipped to white's point of view; centipawns are kept as reported.
    pub fn from_score(score: Score, turn: Color) -> Self {
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(cp),
            Score::Mate(0) => Evaluation::Mated(turn),
            Score::Mate(n) => match turn {
                Color::White => Evaluation::Mate(n),
                Color::Black => Evaluation::Mate(-n),
            },
        }
    }

    /// Single number for sorting and evaluation bars; mates become ±999999.
    pub fn value(&self) -> i32 {
        match self {
            Evaluation::Centipawns(cp) => *cp,
            Evaluation::Mate(n) if *n >= 0 => MATE_SENTINEL,
            Evaluation::Mate(_) => -MATE_SENTINEL,
            Evaluation::Mated(Color::White) => -MATE_SENTINEL,
            Evaluation::Mated(Color::Black) => MATE_SENTINEL,
        }
    }

    pub fn mate_in(&self) -> Option<i32> {
        match self {
            Evaluation::Mate(n) => Some(*n),
            Evaluation::Mated(_) => Some(0),
            Evaluation::Centipawns(_) => None,
        }
    }

    /// Returns true if the position is winning for white
    pub fn is_white_winning(&self) -> bool {
        match self {
            Evaluation::Centipawns(cp) => *cp > 100,
            Evaluation::Mate(moves) => *moves > 0,
            Evaluation::Mated(color) => *color == Color::Black,
        }
    }

    /// Returns true if the position is winning for black
    pub fn is_black_winning(&self) -> bool {
        match self {
            Evaluation::Centipawns(cp) => *cp < -100,
            Evaluation::Mate(moves) => *moves < 0,
            Evaluation::Mated(color) => *color == Color::White,
        }
    }

    /// Converts evaluation to pawns, mates clamp to ±100
    pub fn as_score(&self) -> f32 {
        match self {
            Evaluation::Centipawns(cp) => *cp as f32 / 100.0,
            Evaluation::Mate(moves) if *moves > 0 => 100.0,
            Evaluation::Mate(_) => -100.0,
            Evaluation::Mated(Color::White) => -100.0,
            Evaluation::Mated(Color::Black) => 100.0,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => {
                let score = *cp as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            Evaluation::Mate(moves) => write!(f, "M{}", moves),
            Evaluation::Mated(Color::White) => write!(f, "0-1"),
            Evaluation::Mated(Color::Black) => write!(f, "1-0"),
        }
    }
}

/// A candidate move from live analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingMove {
    #[serde(rename = "move")]
    pub mv: ChessMove,
    /// Sentinel-mapped evaluation used for ranking
    pub evaluation: i32,
    pub mate_in: Option<i32>,
    pub depth: u32,
    pub pv: Vec<ChessMove>,
}

/// Complete analysis of a position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Best move in UCI notation, e.g. `e2e4`
    pub best_move: String,
    pub ponder: Option<String>,
    pub evaluation: Evaluation,
    /// Analysis depth reached
    pub depth: u32,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
    /// Time spent analyzing (milliseconds)
    pub time_ms: u64,
    /// Nodes searched
    pub nodes: u64,
    /// Candidate ranking at the moment the search ended
    pub thinking_moves: Vec<ThinkingMove>,
}

impl AnalysisResult {
    /// Returns a brief summary of the analysis
    pub fn summary(&self) -> String {
        format!(
            "Eval: {} | Best: {} | Depth: {} | PV: {}",
            self.evaluation,
            self.best_move,
            self.depth,
            self.pv.iter().take(5).cloned().collect::<Vec<_>>().join(" ")
        )
    }
}
