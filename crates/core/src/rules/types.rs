//! Move records, game status and move errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::{CastlingSide, Color, File, Role, Square};
use thiserror::Error;

use crate::serde_chess;

/// Overall state of play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Playing,
    Check,
    Checkmate,
    Stalemate,
    Draw,
    Resigned,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Playing => "playing",
            GameStatus::Check => "check",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Stalemate => "stalemate",
            GameStatus::Draw => "draw",
            GameStatus::Resigned => "resigned",
        }
    }

    /// True once no further moves may be played
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameStatus::Checkmate | GameStatus::Stalemate | GameStatus::Draw | GameStatus::Resigned
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Ongoing,
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Ongoing => "ongoing",
            GameResult::WhiteWins => "white_wins",
            GameResult::BlackWins => "black_wins",
            GameResult::Draw => "draw",
        }
    }

    /// PGN result token
    pub fn pgn_token(&self) -> &'static str {
        match self {
            GameResult::Ongoing => "*",
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            _ => None,
        }
    }
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    FiftyMoveRule,
    Resignation,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Checkmate => "checkmate",
            EndReason::Stalemate => "stalemate",
            EndReason::ThreefoldRepetition => "threefold_repetition",
            EndReason::InsufficientMaterial => "insufficient_material",
            EndReason::FiftyMoveRule => "fifty_move_rule",
            EndReason::Resignation => "resignation",
        }
    }
}

/// Special-move tag carried by every move record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Normal,
    Castle,
    EnPassant,
    Promotion,
}

/// Which part of the origin square SAN needs to tell rival pieces apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disambiguation {
    #[default]
    None,
    File,
    Rank,
    Square,
}

/// A played move. Produced by the rules oracle, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessMove {
    #[serde(with = "serde_chess::square")]
    pub from: Square,
    #[serde(with = "serde_chess::square")]
    pub to: Square,
    #[serde(with = "serde_chess::role")]
    pub piece: Role,
    #[serde(with = "serde_chess::color")]
    pub color: Color,
    #[serde(with = "serde_chess::opt_role", default)]
    pub captured: Option<Role>,
    #[serde(with = "serde_chess::opt_role", default)]
    pub promotion: Option<Role>,
    pub kind: MoveKind,
    #[serde(default)]
    pub disambiguation: Disambiguation,
    #[serde(default)]
    pub is_check: bool,
    #[serde(default)]
    pub is_checkmate: bool,
    /// Standard algebraic notation
    pub san: String,
    /// Long-form engine notation, e.g. `e1g1`
    pub uci: String,
    pub timestamp: DateTime<Utc>,
    /// Position after the move
    pub fen_after: String,
}

impl ChessMove {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_castle(&self) -> bool {
        self.kind == MoveKind::Castle
    }

    pub fn is_en_passant(&self) -> bool {
        self.kind == MoveKind::EnPassant
    }

    pub fn castling_side(&self) -> Option<CastlingSide> {
        if !self.is_castle() {
            return None;
        }
        Some(if self.to.file() == File::G {
            CastlingSide::KingSide
        } else {
            CastlingSide::QueenSide
        })
    }
}

/// A piece as shown on a board snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPiece {
    #[serde(with = "serde_chess::role")]
    pub role: Role,
    #[serde(with = "serde_chess::color")]
    pub color: Color,
}

/// 8x8 board, rank 8 first, file a first within each rank
pub type BoardSnapshot = Vec<Vec<Option<BoardPiece>>>;

/// Successful move plus the status it produced
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub mv: ChessMove,
    pub status: GameStatus,
}

/// Rejections from the move API. Returned, never panicked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("No piece on {0}")]
    NoPieceOnSquare(Square),

    #[error("Wrong turn: {0:?} is not to move")]
    WrongTurn(Color),

    #[error("Cannot capture own piece on {0}")]
    CannotCaptureOwnPiece(Square),

    #[error("Illegal move {from}{to}")]
    Illegal { from: Square, to: Square },
}

impl MoveError {
    /// Stable identifier used in failure results and events
    pub fn code(&self) -> &'static str {
        match self {
            MoveError::NoPieceOnSquare(_) => "noPieceOnSquare",
            MoveError::WrongTurn(_) => "wrongTurn",
            MoveError::CannotCaptureOwnPiece(_) => "cannotCaptureOwnPiece",
            MoveError::Illegal { .. } => "illegal",
        }
    }
}
