//! Endgame analysis results

use serde::{Deserialize, Serialize};
use shakmaty::Role;

use crate::rules::{EndReason, GameResult, GameStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndgameType {
    KqVsK,
    KrVsK,
    KbVsK,
    KnVsK,
    KpVsK,
    PawnEndgame,
    QueenEndgame,
    RookEndgame,
    MinorPieceEndgame,
    TablebasePosition,
    ComplexEndgame,
}

impl EndgameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndgameType::KqVsK => "kq_vs_k",
            EndgameType::KrVsK => "kr_vs_k",
            EndgameType::KbVsK => "kb_vs_k",
            EndgameType::KnVsK => "kn_vs_k",
            EndgameType::KpVsK => "kp_vs_k",
            EndgameType::PawnEndgame => "pawn_endgame",
            EndgameType::QueenEndgame => "queen_endgame",
            EndgameType::RookEndgame => "rook_endgame",
            EndgameType::MinorPieceEndgame => "minor_piece_endgame",
            EndgameType::TablebasePosition => "tablebase_position",
            EndgameType::ComplexEndgame => "complex_endgame",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndgameType::KqVsK => "King and queen vs king",
            EndgameType::KrVsK => "King and rook vs king",
            EndgameType::KbVsK => "King and bishop vs king",
            EndgameType::KnVsK => "King and knight vs king",
            EndgameType::KpVsK => "King and pawn vs king",
            EndgameType::PawnEndgame => "Pawn endgame",
            EndgameType::QueenEndgame => "Queen endgame",
            EndgameType::RookEndgame => "Rook endgame",
            EndgameType::MinorPieceEndgame => "Minor piece endgame",
            EndgameType::TablebasePosition => "Tablebase position",
            EndgameType::ComplexEndgame => "Complex position",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    White,
    Black,
    Balanced,
}

/// Non-king pieces of one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCount {
    pub pawns: u32,
    pub knights: u32,
    pub bishops: u32,
    pub rooks: u32,
    pub queens: u32,
}

impl MaterialCount {
    pub fn add(&mut self, role: Role) {
        match role {
            Role::Pawn => self.pawns += 1,
            Role::Knight => self.knights += 1,
            Role::Bishop => self.bishops += 1,
            Role::Rook => self.rooks += 1,
            Role::Queen => self.queens += 1,
            Role::King => {}
        }
    }

    /// P=1, N=B=3, R=5, Q=9
    pub fn points(&self) -> u32 {
        self.pawns + 3 * (self.knights + self.bishops) + 5 * self.rooks + 9 * self.queens
    }

    pub fn pieces(&self) -> u32 {
        self.pawns + self.minors() + self.rooks + self.queens
    }

    pub fn minors(&self) -> u32 {
        self.knights + self.bishops
    }

    pub fn is_bare(&self) -> bool {
        self.pieces() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialBalance {
    pub white: MaterialCount,
    pub black: MaterialCount,
    pub total_white: u32,
    pub total_black: u32,
    pub advantage: Advantage,
}

impl MaterialBalance {
    pub fn difference(&self) -> i32 {
        self.total_white as i32 - self.total_black as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndgameAnalysis {
    pub status: GameStatus,
    pub result: GameResult,
    pub endgame_type: EndgameType,
    pub material_balance: MaterialBalance,
    pub is_insufficient_material: bool,
    pub draw_reason: Option<EndReason>,
    pub is_check: bool,
    /// Kings included
    pub total_pieces: u32,
    pub repetition_count: usize,
    pub description: String,
}

impl EndgameAnalysis {
    pub fn is_game_over(&self) -> bool {
        self.status.is_terminal()
    }
}
