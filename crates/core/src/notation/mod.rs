//! Move notation, PGN text and FEN syntax checks

mod fen;
mod pgn;
mod san;

pub use fen::{is_valid_fen, validate_fen_syntax, FenValidation};
pub use pgn::{
    generate_pgn, get_moves_from_pgn, parse_pgn_file, parse_pgn_string, PgnError, PgnGame, PgnHeaders,
    PgnOptions,
};
pub use san::{generate_move_notation, standard_san, NotationFormat, NotationOptions};
