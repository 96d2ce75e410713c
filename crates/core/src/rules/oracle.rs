//! The rules oracle: sole authority on legality and board bookkeeping

use shakmaty::{fen::Fen, san::San, CastlingMode, Chess, Color, File, Move, Position, Rank, Role, Square};
use tracing::debug;

use super::moves::{describe_move, fen_of, uci_target};
use super::repetition::RepetitionTracker;
use super::types::*;
use crate::error::{Error, Result};
use crate::notation::{self, PgnOptions};

/// Legality, make/undo, FEN/PGN import-export and repetition history.
#[derive(Debug, Clone)]
pub struct RulesOracle {
    position: Chess,
    initial_fen: String,
    /// Position before each played move, parallel to `moves`
    undo_stack: Vec<Chess>,
    moves: Vec<ChessMove>,
    repetition: RepetitionTracker,
}

impl Default for RulesOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesOracle {
    /// Oracle at the standard starting position
    pub fn new() -> Self {
        let position = Chess::default();
        Self {
            initial_fen: fen_of(&position),
            repetition: RepetitionTracker::new(&position),
            position,
            undo_stack: Vec::new(),
            moves: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut oracle = Self::new();
        oracle.load_fen(fen)?;
        Ok(oracle)
    }

    /// Replaces the whole game with the position in `fen`.
    ///
    /// On error the oracle is left untouched.
    pub fn load_fen(&mut self, fen: &str) -> Result<()> {
        let position = parse_position(fen)?;
        self.reset_to(position);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.reset_to(Chess::default());
    }

    fn reset_to(&mut self, position: Chess) {
        self.initial_fen = fen_of(&position);
        self.repetition.reset(&position);
        self.position = position;
        self.undo_stack.clear();
        self.moves.clear();
    }

    fn resolve(&self, from: Square, to: Square, promotion: Option<Role>) -> std::result::Result<Move, MoveError> {
        let board = self.position.board();
        let piece = board.piece_at(from).ok_or(MoveError::NoPieceOnSquare(from))?;
        if piece.color != self.position.turn() {
            return Err(MoveError::WrongTurn(piece.color));
        }
        if let Some(target) = board.piece_at(to) {
            if target.color == piece.color {
                return Err(MoveError::CannotCaptureOwnPiece(to));
            }
        }

        // Promotions default to a queen when the caller names no piece
        let wanted = promotion.unwrap_or(Role::Queen);
        self.position
            .legal_moves()
            .iter()
            .find(|mv| {
                mv.from() == Some(from)
                    && uci_target(mv) == to
                    && mv.promotion().map_or(true, |role| role == wanted)
            })
            .cloned()
            .ok_or(MoveError::Illegal { from, to })
    }

    fn commit(&mut self, mv: Move) -> std::result::Result<ChessMove, MoveError> {
        let (record, next) = describe_move(&self.position, mv)?;
        let previous = std::mem::replace(&mut self.position, next);
        self.undo_stack.push(previous);
        self.repetition.push(&self.position);
        self.moves.push(record.clone());
        Ok(record)
    }

    /// Plays a move. Failures leave the oracle untouched.
    pub fn make_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> std::result::Result<MoveOutcome, MoveError> {
        let mv = self.resolve(from, to, promotion)?;
        let record = self.commit(mv)?;
        debug!(san = %record.san, fen = %record.fen_after, "move played");
        Ok(MoveOutcome {
            mv: record,
            status: self.get_game_status(),
        })
    }

    /// Plays a move given in SAN, e.g. `Nf3` or `exd5`
    pub fn make_san_move(&mut self, san: &str) -> std::result::Result<MoveOutcome, MoveError> {
        let illegal = MoveError::Illegal {
            from: Square::A1,
            to: Square::A1,
        };
        let parsed: San = san.trim().parse().map_err(|_| illegal.clone())?;
        let mv = parsed.to_move(&self.position).map_err(|_| illegal)?;
        let record = self.commit(mv)?;
        Ok(MoveOutcome {
            mv: record,
            status: self.get_game_status(),
        })
    }

    /// Takes back the last move. Returns false when there is nothing to undo.
    pub fn undo_move(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.position = previous;
                self.moves.pop();
                self.repetition.pop();
                true
            }
            None => false,
        }
    }

    /// Dry run of `make_move`; never changes the oracle.
    pub fn validate_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> std::result::Result<ChessMove, MoveError> {
        let mv = self.resolve(from, to, promotion)?;
        describe_move(&self.position, mv).map(|(record, _)| record)
    }

    /// Destinations reachable from `square`, or every legal destination.
    pub fn get_valid_moves(&self, square: Option<Square>) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .position
            .legal_moves()
            .iter()
            .filter(|mv| square.map_or(true, |sq| mv.from() == Some(sq)))
            .map(uci_target)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Every legal move as a move record
    pub fn legal_moves(&self) -> Vec<ChessMove> {
        self.position
            .legal_moves()
            .iter()
            .filter_map(|mv| describe_move(&self.position, mv.clone()).ok())
            .map(|(record, _)| record)
            .collect()
    }

    fn is_library_draw(&self) -> bool {
        self.position.is_insufficient_material() || self.position.halfmoves() >= 100
    }

    /// checkmate > stalemate > draw > check > playing
    pub fn get_game_status(&self) -> GameStatus {
        if self.position.is_checkmate() {
            GameStatus::Checkmate
        } else if self.position.is_stalemate() {
            GameStatus::Stalemate
        } else if self.is_library_draw() || self.repetition.is_threefold() {
            GameStatus::Draw
        } else if self.position.is_check() {
            GameStatus::Check
        } else {
            GameStatus::Playing
        }
    }

    pub fn get_game_result(&self) -> GameResult {
        match self.get_game_status() {
            GameStatus::Checkmate => GameResult::win_for(self.position.turn().other()),
            GameStatus::Stalemate | GameStatus::Draw => GameResult::Draw,
            _ => GameResult::Ongoing,
        }
    }

    /// Three-fold is checked first, on its own, then the library draw rules.
    pub fn get_draw_reason(&self) -> Option<EndReason> {
        if self.repetition.is_threefold() {
            Some(EndReason::ThreefoldRepetition)
        } else if self.position.is_insufficient_material() {
            Some(EndReason::InsufficientMaterial)
        } else if self.position.halfmoves() >= 100 {
            Some(EndReason::FiftyMoveRule)
        } else {
            None
        }
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.get_game_status() {
            GameStatus::Checkmate => Some(EndReason::Checkmate),
            GameStatus::Stalemate => Some(EndReason::Stalemate),
            GameStatus::Draw => self.get_draw_reason(),
            _ => None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.get_game_status().is_terminal()
    }

    /// Square of `color`'s king (side to move by default)
    pub fn get_king_position(&self, color: Option<Color>) -> Option<Square> {
        let color = color.unwrap_or_else(|| self.position.turn());
        let board = self.position.board();
        Square::ALL.into_iter().find(|sq| {
            board
                .piece_at(*sq)
                .is_some_and(|piece| piece.role == Role::King && piece.color == color)
        })
    }

    pub fn get_piece(&self, square: Square) -> Option<BoardPiece> {
        self.position.board().piece_at(square).map(|piece| BoardPiece {
            role: piece.role,
            color: piece.color,
        })
    }

    pub fn get_board(&self) -> BoardSnapshot {
        Rank::ALL
            .iter()
            .rev()
            .map(|rank| {
                File::ALL
                    .iter()
                    .map(|file| self.get_piece(Square::from_coords(*file, *rank)))
                    .collect()
            })
            .collect()
    }

    pub fn get_fen(&self) -> String {
        fen_of(&self.position)
    }

    pub fn initial_fen(&self) -> &str {
        &self.initial_fen
    }

    pub fn get_turn(&self) -> Color {
        self.position.turn()
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn get_move_history(&self) -> &[ChessMove] {
        &self.moves
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn repetition(&self) -> &RepetitionTracker {
        &self.repetition
    }

    /// Occurrences of the current normalized position
    pub fn repetition_count(&self) -> usize {
        self.repetition.current_count()
    }

    pub fn get_pgn(&self, options: &PgnOptions) -> String {
        let mut options = options.clone();
        if options.result.is_none() {
            options.result = Some(self.get_game_result());
        }
        if options.starting_fen.is_none() && self.initial_fen != super::STARTING_FEN {
            options.starting_fen = Some(self.initial_fen.clone());
        }
        notation::generate_pgn(&self.moves, &options)
    }

    /// Replaces the game with the first game of `pgn`.
    ///
    /// On error the oracle is left untouched.
    pub fn load_pgn(&mut self, pgn: &str) -> Result<()> {
        let games = notation::parse_pgn_string(pgn).map_err(|e| Error::Pgn(e.to_string()))?;
        let game = games
            .into_iter()
            .next()
            .ok_or_else(|| Error::Pgn("no games found".into()))?;

        let mut replay = match &game.starting_fen {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for san in &game.moves {
            replay
                .make_san_move(san)
                .map_err(|_| Error::Pgn(format!("illegal move '{san}' in PGN")))?;
        }
        *self = replay;
        Ok(())
    }

    /// Replays `moves` from `initial_fen`; errors if any move does not fit.
    pub fn replay(initial_fen: &str, moves: &[ChessMove]) -> Result<Self> {
        let mut oracle = Self::from_fen(initial_fen)?;
        for mv in moves {
            oracle.make_move(mv.from, mv.to, mv.promotion)?;
        }
        Ok(oracle)
    }
}

pub(crate) fn parse_position(fen: &str) -> Result<Chess> {
    let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|e| Error::InvalidFen(e.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| Error::InvalidFen(e.to_string()))
}
