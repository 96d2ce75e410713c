//! FEN syntax checks

use regex::Regex;
use std::sync::LazyLock;

use crate::rules::parse_position;

static RANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[rnbqkpRNBQKP1-8]+$").expect("valid regex"));
static CASTLING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-|K?Q?k?q?)$").expect("valid regex"));
static EP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-|[a-h][36])$").expect("valid regex"));

/// Outcome of a syntax check; `errors` is empty when `valid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Checks the textual shape of a FEN without building a position.
pub fn validate_fen_syntax(fen: &str) -> FenValidation {
    let mut errors = Vec::new();
    let fields: Vec<&str> = fen.split_whitespace().collect();

    if fields.len() != 6 {
        errors.push(format!("expected 6 fields, found {}", fields.len()));
    }

    if let Some(placement) = fields.first() {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            errors.push(format!("expected 8 ranks, found {}", ranks.len()));
        }
        for (i, rank) in ranks.iter().enumerate() {
            if !RANK_RE.is_match(rank) {
                errors.push(format!("rank {} has invalid characters: '{}'", 8 - i as i32, rank));
                continue;
            }
            let width: u32 = rank
                .chars()
                .map(|c| c.to_digit(10).unwrap_or(1))
                .sum();
            if width != 8 {
                errors.push(format!("rank {} covers {} files", 8 - i as i32, width));
            }
        }
    }

    if let Some(turn) = fields.get(1) {
        if *turn != "w" && *turn != "b" {
            errors.push(format!("side to move must be 'w' or 'b', found '{turn}'"));
        }
    }
    if let Some(castling) = fields.get(2) {
        if castling.is_empty() || !CASTLING_RE.is_match(castling) {
            errors.push(format!("invalid castling field '{castling}'"));
        }
    }
    if let Some(ep) = fields.get(3) {
        if !EP_RE.is_match(ep) {
            errors.push(format!("invalid en passant field '{ep}'"));
        }
    }
    for (idx, name) in [(4, "halfmove clock"), (5, "fullmove number")] {
        if let Some(raw) = fields.get(idx) {
            if raw.parse::<u32>().is_err() {
                errors.push(format!("{name} is not a number: '{raw}'"));
            }
        }
    }

    FenValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Syntax check plus a full position build (kings, side not to move not in check, ...)
pub fn is_valid_fen(fen: &str) -> bool {
    validate_fen_syntax(fen).valid && parse_position(fen).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::STARTING_FEN;

    #[test]
    fn test_starting_fen_is_valid() {
        let check = validate_fen_syntax(STARTING_FEN);
        assert!(check.valid, "{:?}", check.errors);
        assert!(is_valid_fen(STARTING_FEN));
    }

    #[test]
    fn test_field_count() {
        let check = validate_fen_syntax("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        assert!(!check.valid);
        assert!(check.errors[0].contains("6 fields"));
    }

    #[test]
    fn test_bad_rank() {
        let check = validate_fen_syntax("rnbqkbnr/ppppXppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert!(!check.valid);

        let short = validate_fen_syntax("rnbqkbnr/ppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert!(!short.valid);
    }

    #[test]
    fn test_syntax_ok_but_illegal_position() {
        // No black king
        let fen = "8/8/8/8/8/8/8/4K3 w - - 0 1";
        assert!(validate_fen_syntax(fen).valid);
        assert!(!is_valid_fen(fen));
    }

    #[test]
    fn test_bad_side_to_move() {
        let check = validate_fen_syntax("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1");
        assert!(!check.valid);
    }
}
