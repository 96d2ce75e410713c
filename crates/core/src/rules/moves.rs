//! Conversions between shakmaty moves and move records

use chrono::Utc;
use shakmaty::{fen::Fen, CastlingMode, Chess, EnPassantMode, File, Move, Position, Role, Square};

use super::types::{ChessMove, Disambiguation, MoveError, MoveKind};
use crate::error::{Error, Result};
use crate::notation;

/// FEN of a position, en-passant square only when a capture is possible
pub fn fen_of(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Destination as the user sees it: castling lands the king on g/c.
pub fn uci_target(mv: &Move) -> Square {
    match mv {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() { File::G } else { File::C };
            Square::from_coords(file, king.rank())
        }
        other => other.to(),
    }
}

pub fn parse_square(raw: &str) -> Result<Square> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidSquare(raw.to_string()))
}

/// Accepts `q`, `Q`, `queen`, ... ; kings and pawns are not promotion targets.
pub fn parse_promotion(raw: &str) -> Result<Role> {
    let lowered = raw.trim().to_ascii_lowercase();
    let role = match lowered.as_str() {
        "q" | "queen" => Role::Queen,
        "r" | "rook" => Role::Rook,
        "b" | "bishop" => Role::Bishop,
        "n" | "knight" => Role::Knight,
        _ => return Err(Error::InvalidRequest(format!("invalid promotion piece '{raw}'"))),
    };
    Ok(role)
}

fn disambiguation_for(position: &Chess, mv: &Move) -> Disambiguation {
    let role = mv.role();
    if matches!(role, Role::Pawn | Role::King) || mv.is_castle() {
        return Disambiguation::None;
    }
    let Some(from) = mv.from() else {
        return Disambiguation::None;
    };
    let to = mv.to();

    let rivals: Vec<Square> = position
        .legal_moves()
        .iter()
        .filter(|other| other.role() == role && other.to() == to && !other.is_castle())
        .filter_map(|other| other.from())
        .filter(|sq| *sq != from)
        .collect();

    if rivals.is_empty() {
        Disambiguation::None
    } else if !rivals.iter().any(|sq| sq.file() == from.file()) {
        Disambiguation::File
    } else if !rivals.iter().any(|sq| sq.rank() == from.rank()) {
        Disambiguation::Rank
    } else {
        Disambiguation::Square
    }
}

/// Plays `mv` on a copy of `position` and describes it.
///
/// Returns the move record and the position after the move.
pub fn describe_move(position: &Chess, mv: Move) -> std::result::Result<(ChessMove, Chess), MoveError> {
    let to = uci_target(&mv);
    let from = mv.from().ok_or(MoveError::Illegal { from: to, to })?;
    let kind = match &mv {
        Move::Castle { .. } => MoveKind::Castle,
        Move::EnPassant { .. } => MoveKind::EnPassant,
        Move::Normal { promotion: Some(_), .. } => MoveKind::Promotion,
        _ => MoveKind::Normal,
    };
    let disambiguation = disambiguation_for(position, &mv);
    let piece = mv.role();
    let captured = mv.capture();
    let promotion = mv.promotion();
    let uci = mv.to_uci(CastlingMode::Standard).to_string();
    let color = position.turn();

    let after = position
        .clone()
        .play(mv)
        .map_err(|_| MoveError::Illegal { from, to })?;

    let mut record = ChessMove {
        from,
        to,
        piece,
        color,
        captured,
        promotion,
        kind,
        disambiguation,
        is_check: after.is_check(),
        is_checkmate: after.is_checkmate(),
        san: String::new(),
        uci,
        timestamp: Utc::now(),
        fen_after: fen_of(&after),
    };
    record.san = notation::standard_san(&record);

    Ok((record, after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::uci::UciMove;

    fn play_uci(position: &Chess, uci: &str) -> (ChessMove, Chess) {
        let parsed: UciMove = uci.parse().unwrap();
        let mv = parsed.to_move(position).unwrap();
        describe_move(position, mv).unwrap()
    }

    #[test]
    fn test_castle_target_is_king_destination() {
        let fen: Fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let position: Chess = fen.into_position(CastlingMode::Standard).unwrap();
        let (record, _) = play_uci(&position, "e1g1");
        assert_eq!(record.kind, MoveKind::Castle);
        assert_eq!(record.to, Square::G1);
        assert_eq!(record.san, "O-O");
    }

    #[test]
    fn test_knight_disambiguation_by_file() {
        let fen: Fen = "4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1".parse().unwrap();
        let position: Chess = fen.into_position(CastlingMode::Standard).unwrap();
        let (record, _) = play_uci(&position, "b1d2");
        assert_eq!(record.disambiguation, Disambiguation::File);
        assert_eq!(record.san, "Nbd2");
    }

    #[test]
    fn test_rook_disambiguation_by_rank() {
        let fen: Fen = "4k3/8/8/R7/8/8/8/R3K3 w - - 0 1".parse().unwrap();
        let position: Chess = fen.into_position(CastlingMode::Standard).unwrap();
        let (record, _) = play_uci(&position, "a1a3");
        assert_eq!(record.disambiguation, Disambiguation::Rank);
        assert_eq!(record.san, "R1a3");
    }

    #[test]
    fn test_parse_promotion() {
        assert_eq!(parse_promotion("Q").unwrap(), Role::Queen);
        assert_eq!(parse_promotion("knight").unwrap(), Role::Knight);
        assert!(parse_promotion("k").is_err());
    }
}
