//! Pure endgame analysis of a position snapshot

use shakmaty::{Chess, Color, Position, Role, Square};

use super::types::*;
use crate::rules::{EndReason, GameResult, GameStatus, RulesOracle};
use crate::serde_chess::color_name;

fn is_dark(square: Square) -> bool {
    (square.file() as u32 + square.rank() as u32) % 2 == 0
}

pub fn material_balance(position: &Chess) -> MaterialBalance {
    let board = position.board();
    let mut white = MaterialCount::default();
    let mut black = MaterialCount::default();
    for square in Square::ALL {
        if let Some(piece) = board.piece_at(square) {
            match piece.color {
                Color::White => white.add(piece.role),
                Color::Black => black.add(piece.role),
            }
        }
    }

    let (total_white, total_black) = (white.points(), black.points());
    let advantage = if total_white > total_black {
        Advantage::White
    } else if total_black > total_white {
        Advantage::Black
    } else {
        Advantage::Balanced
    };
    MaterialBalance {
        white,
        black,
        total_white,
        total_black,
        advantage,
    }
}

/// K vs K, a single minor piece, or bishops only on both sides all on one square colour.
/// Any pawn rules it out.
pub fn is_insufficient_material(position: &Chess) -> bool {
    let balance = material_balance(position);
    let (white, black) = (balance.white, balance.black);

    if white.pawns + black.pawns > 0 || white.rooks + black.rooks > 0 || white.queens + black.queens > 0 {
        return false;
    }

    let minors = white.minors() + black.minors();
    if minors <= 1 {
        return true;
    }

    if white.knights + black.knights > 0 || white.bishops == 0 || black.bishops == 0 {
        return false;
    }

    let board = position.board();
    let mut colours = Square::ALL
        .into_iter()
        .filter(|sq| board.piece_at(*sq).is_some_and(|p| p.role == Role::Bishop))
        .map(is_dark);
    match colours.next() {
        Some(first) => colours.all(|dark| dark == first),
        None => false,
    }
}

/// The only non-king role `side` holds, if it holds exactly one kind
fn single_role(side: &MaterialCount) -> Option<(Role, u32)> {
    let kinds = [
        (Role::Pawn, side.pawns),
        (Role::Knight, side.knights),
        (Role::Bishop, side.bishops),
        (Role::Rook, side.rooks),
        (Role::Queen, side.queens),
    ];
    let mut present = kinds.into_iter().filter(|(_, n)| *n > 0);
    let first = present.next()?;
    present.next().is_none().then_some(first)
}

pub fn classify_endgame(balance: &MaterialBalance) -> EndgameType {
    let (white, black) = (&balance.white, &balance.black);

    let lone = if black.is_bare() {
        single_role(white)
    } else if white.is_bare() {
        single_role(black)
    } else {
        None
    };
    match lone {
        Some((Role::Queen, 1)) => return EndgameType::KqVsK,
        Some((Role::Rook, 1)) => return EndgameType::KrVsK,
        Some((Role::Bishop, _)) => return EndgameType::KbVsK,
        Some((Role::Knight, _)) => return EndgameType::KnVsK,
        Some((Role::Pawn, _)) => return EndgameType::KpVsK,
        _ => {}
    }

    let pawns = white.pawns + black.pawns;
    let queens = white.queens + black.queens;
    let rooks = white.rooks + black.rooks;
    let minors = white.minors() + black.minors();
    let total = 2 + white.pieces() + black.pieces();

    if pawns > 0 && queens + rooks + minors == 0 {
        EndgameType::PawnEndgame
    } else if total >= 20 {
        EndgameType::ComplexEndgame
    } else if queens > 0 {
        EndgameType::QueenEndgame
    } else if rooks > 0 {
        EndgameType::RookEndgame
    } else if minors > 0 {
        EndgameType::MinorPieceEndgame
    } else if total <= 7 {
        EndgameType::TablebasePosition
    } else {
        EndgameType::ComplexEndgame
    }
}

fn capitalized(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

fn describe(
    status: GameStatus,
    turn: Color,
    draw_reason: Option<EndReason>,
    endgame_type: EndgameType,
    balance: &MaterialBalance,
) -> String {
    match status {
        GameStatus::Checkmate => format!("{} wins by checkmate", capitalized(turn.other())),
        GameStatus::Stalemate => "Draw by stalemate".to_string(),
        GameStatus::Draw => match draw_reason {
            Some(reason) => format!("Draw by {}", reason.as_str().replace('_', " ")),
            None => "Drawn position".to_string(),
        },
        GameStatus::Check => format!("{} is in check", capitalized(turn)),
        GameStatus::Resigned => format!("{} resigned", capitalized(turn)),
        GameStatus::Playing => {
            let diff = balance.difference();
            let material = match balance.advantage {
                Advantage::Balanced => "material is balanced".to_string(),
                Advantage::White => format!("{} is up {} points", color_name(Color::White), diff),
                Advantage::Black => format!("{} is up {} points", color_name(Color::Black), -diff),
            };
            format!("{}, {}", endgame_type.label(), material)
        }
    }
}

/// Analyzes `position`. `repetition_count` is how often the current
/// position has occurred, as tracked by the rules oracle.
pub fn analyze_position(position: &Chess, repetition_count: usize) -> EndgameAnalysis {
    let balance = material_balance(position);
    let endgame_type = classify_endgame(&balance);
    let insufficient = is_insufficient_material(position);
    let threefold = repetition_count >= 3;
    let fifty_moves = position.halfmoves() >= 100;

    let draw_reason = if threefold {
        Some(EndReason::ThreefoldRepetition)
    } else if insufficient {
        Some(EndReason::InsufficientMaterial)
    } else if fifty_moves {
        Some(EndReason::FiftyMoveRule)
    } else {
        None
    };

    let status = if position.is_checkmate() {
        GameStatus::Checkmate
    } else if position.is_stalemate() {
        GameStatus::Stalemate
    } else if draw_reason.is_some() {
        GameStatus::Draw
    } else if position.is_check() {
        GameStatus::Check
    } else {
        GameStatus::Playing
    };

    let turn = position.turn();
    let result = match status {
        GameStatus::Checkmate => GameResult::win_for(turn.other()),
        GameStatus::Stalemate | GameStatus::Draw => GameResult::Draw,
        _ => GameResult::Ongoing,
    };

    EndgameAnalysis {
        status,
        result,
        endgame_type,
        is_insufficient_material: insufficient,
        draw_reason: if status == GameStatus::Draw { draw_reason } else { None },
        is_check: position.is_check(),
        total_pieces: 2 + balance.white.pieces() + balance.black.pieces(),
        repetition_count,
        description: describe(status, turn, draw_reason, endgame_type, &balance),
        material_balance: balance,
    }
}

/// Analysis of the oracle's current position using its repetition history
pub fn analyze_oracle(oracle: &RulesOracle) -> EndgameAnalysis {
    analyze_position(oracle.position(), oracle.repetition_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_position;

    fn pos(fen: &str) -> Chess {
        parse_position(fen).unwrap()
    }

    #[test]
    fn test_starting_position() {
        let analysis = analyze_position(&Chess::default(), 1);
        assert_eq!(analysis.status, GameStatus::Playing);
        assert_eq!(analysis.endgame_type, EndgameType::ComplexEndgame);
        assert_eq!(analysis.material_balance.advantage, Advantage::Balanced);
        assert_eq!(analysis.material_balance.total_white, 39);
        assert_eq!(analysis.material_balance.total_black, 39);
        assert_eq!(analysis.total_pieces, 32);
    }

    #[test]
    fn test_insufficient_material() {
        assert!(is_insufficient_material(&pos("8/8/8/4k3/8/8/8/4K3 w - - 0 1")));
        assert!(is_insufficient_material(&pos("8/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
        // c1 and f8 are both dark
        assert!(is_insufficient_material(&pos("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
        // c8 is light
        assert!(!is_insufficient_material(&pos("2b5/8/8/4k3/8/8/8/2B1K3 w - - 0 1")));
        assert!(!is_insufficient_material(&pos("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1")));
    }

    #[test]
    fn test_insufficient_is_a_draw() {
        let analysis = analyze_position(&pos("8/8/8/4k3/8/8/8/2B1K3 w - - 0 1"), 1);
        assert_eq!(analysis.status, GameStatus::Draw);
        assert_eq!(analysis.result, GameResult::Draw);
        assert_eq!(analysis.draw_reason, Some(EndReason::InsufficientMaterial));
        assert_eq!(analysis.endgame_type, EndgameType::KbVsK);
        assert_eq!(analysis.description, "Draw by insufficient material");
    }

    #[test]
    fn test_archetypes() {
        let classify = |fen: &str| classify_endgame(&material_balance(&pos(fen)));
        assert_eq!(classify("8/8/8/4k3/8/8/8/3QK3 w - - 0 1"), EndgameType::KqVsK);
        assert_eq!(classify("8/8/8/4k3/8/8/8/R3K3 w - - 0 1"), EndgameType::KrVsK);
        assert_eq!(classify("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1"), EndgameType::KpVsK);
        assert_eq!(classify("8/8/8/4k3/8/8/8/1N2K1N1 w - - 0 1"), EndgameType::KnVsK);
        assert_eq!(classify("8/4p3/8/4k3/8/8/4P3/4K3 w - - 0 1"), EndgameType::PawnEndgame);
        assert_eq!(classify("8/5pk1/8/8/8/8/5PK1/R6r w - - 0 1"), EndgameType::RookEndgame);
        assert_eq!(classify("3q4/5pk1/8/8/8/8/5PK1/R7 w - - 0 1"), EndgameType::QueenEndgame);
        assert_eq!(classify("8/5pk1/8/3n4/8/8/5PK1/2B5 w - - 0 1"), EndgameType::MinorPieceEndgame);
        assert_eq!(classify("8/8/8/4k3/8/8/8/4K3 w - - 0 1"), EndgameType::TablebasePosition);
    }

    #[test]
    fn test_material_advantage() {
        let analysis = analyze_position(&pos("8/8/8/4k3/8/8/8/3QK3 w - - 0 1"), 1);
        assert_eq!(analysis.material_balance.advantage, Advantage::White);
        assert_eq!(analysis.material_balance.difference(), 9);
        assert_eq!(analysis.description, "King and queen vs king, white is up 9 points");
    }

    #[test]
    fn test_threefold_from_count() {
        let analysis = analyze_position(&Chess::default(), 3);
        assert_eq!(analysis.status, GameStatus::Draw);
        assert_eq!(analysis.draw_reason, Some(EndReason::ThreefoldRepetition));
    }

    #[test]
    fn test_fools_mate() {
        let mut oracle = RulesOracle::new();
        for san in ["f3", "e5", "g4", "Qh4#"] {
            oracle.make_san_move(san).unwrap();
        }
        let analysis = analyze_oracle(&oracle);
        assert_eq!(analysis.status, GameStatus::Checkmate);
        assert_eq!(analysis.result, GameResult::BlackWins);
        assert!(analysis.description.contains("checkmate"));
        assert!(analysis.is_game_over());
    }
}
