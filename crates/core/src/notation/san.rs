//! SAN / LAN rendering of move records

use serde::{Deserialize, Serialize};
use shakmaty::{CastlingSide, Role};

use crate::rules::{ChessMove, Disambiguation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotationFormat {
    #[default]
    San,
    Lan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotationOptions {
    pub format: NotationFormat,
    pub include_check: bool,
    pub include_capture: bool,
    pub disambiguate: bool,
}

impl Default for NotationOptions {
    fn default() -> Self {
        Self {
            format: NotationFormat::San,
            include_check: true,
            include_capture: true,
            disambiguate: true,
        }
    }
}

fn piece_letter(role: Role) -> Option<char> {
    match role {
        Role::Pawn => None,
        other => Some(other.upper_char()),
    }
}

/// Display notation for a move.
///
/// En-passant captures carry a trailing ` e.p.`, which PGN readers reject;
/// use [`standard_san`] for movetext.
pub fn generate_move_notation(mv: &ChessMove, options: &NotationOptions) -> String {
    render(mv, options, true)
}

/// Plain SAN as written into PGN movetext
pub fn standard_san(mv: &ChessMove) -> String {
    render(mv, &NotationOptions::default(), false)
}

fn render(mv: &ChessMove, options: &NotationOptions, en_passant_suffix: bool) -> String {
    match mv.castling_side() {
        Some(CastlingSide::KingSide) => return "O-O".to_string(),
        Some(CastlingSide::QueenSide) => return "O-O-O".to_string(),
        None => {}
    }

    let mut out = String::with_capacity(8);
    match options.format {
        NotationFormat::San => {
            if let Some(letter) = piece_letter(mv.piece) {
                out.push(letter);
                if options.disambiguate {
                    match mv.disambiguation {
                        Disambiguation::None => {}
                        Disambiguation::File => out.push(mv.from.file().char()),
                        Disambiguation::Rank => out.push(mv.from.rank().char()),
                        Disambiguation::Square => out.push_str(&mv.from.to_string()),
                    }
                }
            }
            if mv.is_capture() && options.include_capture {
                if mv.piece == Role::Pawn {
                    out.push(mv.from.file().char());
                }
                out.push('x');
            }
        }
        NotationFormat::Lan => {
            if let Some(letter) = piece_letter(mv.piece) {
                out.push(letter);
            }
            out.push_str(&mv.from.to_string());
            out.push(if mv.is_capture() { 'x' } else { '-' });
        }
    }
    out.push_str(&mv.to.to_string());

    if let Some(promotion) = mv.promotion {
        out.push('=');
        out.push(promotion.upper_char());
    }
    if en_passant_suffix && mv.is_en_passant() {
        out.push_str(" e.p.");
    }
    if options.include_check {
        if mv.is_checkmate {
            out.push('#');
        } else if mv.is_check {
            out.push('+');
        }
    }
    out
}
