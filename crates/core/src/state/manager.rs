//! Owner of the rules oracle and the cached game state

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shakmaty::{Color, Role, Square};
use tracing::{debug, info, warn};

use super::types::GameState;
use crate::error::{Error, Result};
use crate::history::MoveHistoryEntry;
use crate::notation::{PgnHeaders, PgnOptions};
use crate::rules::{ChessMove, EndReason, GameResult, GameStatus, MoveError, MoveOutcome, RulesOracle};
use crate::storage::serializer::{self, DeserializeOptions, GameEnvelope, SerializeOptions};
use crate::storage::{save_key, KeyValueStore, SaveSummary, SAVE_PREFIX};

/// Everything needed to put the game back exactly as it was
#[derive(Debug, Clone)]
pub struct Checkpoint {
    oracle: RulesOracle,
    resigned: Option<Color>,
    end_time: Option<DateTime<Utc>>,
}

/// Holds the one rules oracle for its whole life and the state derived from it.
///
/// Every mutation goes through here and is followed by a recompute, so
/// `game_state()` is never older than the last successful mutation.
pub struct GameStateManager {
    oracle: RulesOracle,
    state: GameState,
    store: Box<dyn KeyValueStore>,
    /// Side that resigned, if any
    resigned: Option<Color>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    headers: PgnHeaders,
    serialize_options: SerializeOptions,
}

impl GameStateManager {
    pub fn new(oracle: RulesOracle, store: Box<dyn KeyValueStore>) -> Self {
        let start_time = Utc::now();
        let state = derive_state(&oracle, None, &PgnHeaders::default(), start_time, None);
        let mut manager = Self {
            oracle,
            state,
            store,
            resigned: None,
            start_time,
            end_time: None,
            headers: PgnHeaders::default(),
            serialize_options: SerializeOptions::default(),
        };
        manager.recompute_from_engine();
        manager
    }

    pub fn oracle(&self) -> &RulesOracle {
        &self.oracle
    }

    pub fn game_state(&self) -> &GameState {
        &self.state
    }

    pub fn set_headers(&mut self, headers: PgnHeaders) {
        self.headers = headers;
        self.recompute_from_engine();
    }

    /// Compresses saves written from now on
    pub fn set_compress_saves(&mut self, compress: bool) {
        self.serialize_options.compress = compress;
    }

    /// Rebuilds the cached state from the oracle
    pub fn recompute_from_engine(&mut self) -> &GameState {
        let terminal = self.resigned.is_some() || self.oracle.is_game_over();
        match (terminal, self.end_time) {
            (true, None) => self.end_time = Some(Utc::now()),
            (false, Some(_)) => self.end_time = None,
            _ => {}
        }
        self.state = derive_state(&self.oracle, self.resigned, &self.headers, self.start_time, self.end_time);
        &self.state
    }

    pub fn make_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> std::result::Result<MoveOutcome, MoveError> {
        let outcome = self.oracle.make_move(from, to, promotion)?;
        self.recompute_from_engine();
        Ok(outcome)
    }

    pub fn validate_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> std::result::Result<ChessMove, MoveError> {
        self.oracle.validate_move(from, to, promotion)
    }

    /// Takes back the last move and any resignation
    pub fn undo_move(&mut self) -> bool {
        if !self.oracle.undo_move() {
            return false;
        }
        self.resigned = None;
        self.recompute_from_engine();
        true
    }

    pub fn resign(&mut self, color: Color) {
        info!(color = ?color, "resignation");
        self.resigned = Some(color);
        self.recompute_from_engine();
    }

    pub fn resigned(&self) -> Option<Color> {
        self.resigned
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            oracle: self.oracle.clone(),
            resigned: self.resigned,
            end_time: self.end_time,
        }
    }

    pub fn restore_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.oracle = checkpoint.oracle;
        self.resigned = checkpoint.resigned;
        self.end_time = checkpoint.end_time;
        self.recompute_from_engine();
    }

    /// Undoes moves until `ply` remain. False if fewer than `ply` were played.
    pub fn rewind_to(&mut self, ply: usize) -> bool {
        if ply > self.oracle.move_count() {
            return false;
        }
        while self.oracle.move_count() > ply {
            self.oracle.undo_move();
        }
        self.resigned = None;
        self.recompute_from_engine();
        true
    }

    /// Replays `moves` from `initial_fen`. On error nothing changes.
    pub fn restore_game(&mut self, initial_fen: &str, moves: &[ChessMove]) -> Result<()> {
        let oracle = RulesOracle::replay(initial_fen, moves)?;
        self.replace_oracle(oracle);
        Ok(())
    }

    fn replace_oracle(&mut self, oracle: RulesOracle) {
        self.oracle = oracle;
        self.resigned = None;
        self.start_time = Utc::now();
        self.end_time = None;
        self.recompute_from_engine();
    }

    pub fn new_game(&mut self) {
        self.replace_oracle(RulesOracle::new());
        debug!("new game");
    }

    pub fn load_fen(&mut self, fen: &str) -> Result<()> {
        let oracle = RulesOracle::from_fen(fen)?;
        self.replace_oracle(oracle);
        Ok(())
    }

    pub fn load_pgn(&mut self, pgn: &str) -> Result<()> {
        let mut oracle = RulesOracle::new();
        oracle.load_pgn(pgn)?;
        self.replace_oracle(oracle);
        Ok(())
    }

    pub fn envelope(
        &self,
        history: Option<(&[MoveHistoryEntry], isize)>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> GameEnvelope {
        let mut envelope = GameEnvelope::new(self.state.clone());
        if let Some((entries, index)) = history {
            envelope = envelope.with_history(entries.to_vec(), index);
        }
        if let Some(metadata) = metadata {
            envelope = envelope.with_metadata(metadata);
        }
        envelope
    }

    pub fn save_game(
        &mut self,
        slot: &str,
        history: Option<(&[MoveHistoryEntry], isize)>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<()> {
        let envelope = self.envelope(history, metadata);
        let text = serializer::serialize_game(&envelope, self.serialize_options)?;
        self.store.set(&save_key(slot), &text)?;
        debug!(slot, moves = self.state.moves.len(), "game saved");
        Ok(())
    }

    fn read_save(&self, slot: &str) -> Result<Option<GameEnvelope>> {
        let Some(text) = self.store.get(&save_key(slot))? else {
            return Ok(None);
        };
        let outcome = serializer::deserialize_game(&text, DeserializeOptions::default());
        for warning in &outcome.warnings {
            warn!(slot, warning = %warning, "save file warning");
        }
        match outcome.value {
            Some(envelope) => Ok(Some(envelope)),
            None => Err(Error::Serialization(outcome.errors.join("; "))),
        }
    }

    /// Restores the game in `slot`. `Ok(None)` when the slot is empty.
    pub fn load_game(&mut self, slot: &str) -> Result<Option<GameEnvelope>> {
        let Some(envelope) = self.read_save(slot)? else {
            return Ok(None);
        };
        let saved = &envelope.game_state;
        let mut oracle = RulesOracle::replay(&saved.initial_fen, &saved.moves)?;
        if oracle.get_fen() != saved.fen {
            warn!(slot, "saved moves do not reach the saved position, loading position only");
            oracle = RulesOracle::from_fen(&saved.fen)?;
        }
        self.replace_oracle(oracle);
        self.start_time = saved.start_time;
        if saved.status == GameStatus::Resigned {
            if let Some(winner) = saved.result.winner() {
                self.resigned = Some(winner.other());
            }
        }
        self.recompute_from_engine();
        info!(slot, moves = self.state.moves.len(), "game loaded");
        Ok(Some(envelope))
    }

    pub fn list_saves(&self) -> Result<Vec<SaveSummary>> {
        let mut saves = Vec::new();
        for key in self.store.keys(SAVE_PREFIX)? {
            let slot = key.trim_start_matches(SAVE_PREFIX).to_string();
            match self.read_save(&slot) {
                Ok(Some(envelope)) => saves.push(SaveSummary {
                    saved_at: DateTime::from_timestamp_millis(envelope.timestamp),
                    move_count: envelope.game_state.moves.len(),
                    result: envelope.game_state.result,
                    fen: envelope.game_state.fen,
                    slot,
                }),
                Ok(None) => {}
                Err(e) => warn!(slot, error = %e, "skipping unreadable save"),
            }
        }
        Ok(saves)
    }

    pub fn delete_save(&mut self, slot: &str) -> Result<bool> {
        self.store.remove(&save_key(slot))
    }
}

fn derive_state(
    oracle: &RulesOracle,
    resigned: Option<Color>,
    headers: &PgnHeaders,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
) -> GameState {
    let (status, result, end_reason) = match resigned {
        Some(loser) => (
            GameStatus::Resigned,
            GameResult::win_for(loser.other()),
            Some(EndReason::Resignation),
        ),
        None => (oracle.get_game_status(), oracle.get_game_result(), oracle.end_reason()),
    };
    let pgn = oracle.get_pgn(&PgnOptions {
        headers: headers.clone(),
        result: Some(result),
        ..PgnOptions::default()
    });

    GameState {
        fen: oracle.get_fen(),
        initial_fen: oracle.initial_fen().to_string(),
        pgn,
        moves: oracle.get_move_history().to_vec(),
        current_player: oracle.get_turn(),
        status,
        result,
        end_reason,
        start_time,
        end_time,
        board: oracle.get_board(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::STARTING_FEN;
    use crate::storage::MemoryStore;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn manager() -> GameStateManager {
        GameStateManager::new(RulesOracle::new(), Box::new(MemoryStore::new()))
    }

    fn play(manager: &mut GameStateManager, moves: &[(&str, &str)]) {
        for (from, to) in moves {
            manager.make_move(sq(from), sq(to), None).unwrap();
        }
    }

    #[test]
    fn test_state_follows_oracle() {
        let mut manager = manager();
        assert_eq!(manager.game_state().fen, STARTING_FEN);
        play(&mut manager, &[("e2", "e4")]);

        let state = manager.game_state();
        assert_eq!(state.moves.len(), 1);
        assert_eq!(state.current_player, Color::Black);
        assert_eq!(state.fen, manager.oracle().get_fen());
        assert!(state.pgn.contains("1. e4"));
        assert_eq!(state.board[4][4].map(|p| p.role), Some(Role::Pawn));
    }

    #[test]
    fn test_resign_and_undo() {
        let mut manager = manager();
        play(&mut manager, &[("e2", "e4")]);
        manager.resign(Color::Black);

        let state = manager.game_state();
        assert_eq!(state.status, GameStatus::Resigned);
        assert_eq!(state.result, GameResult::WhiteWins);
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
        assert!(state.end_time.is_some());
        assert!(state.pgn.trim_end().ends_with("1-0"));

        assert!(manager.undo_move());
        assert_eq!(manager.game_state().status, GameStatus::Playing);
        assert!(manager.game_state().end_time.is_none());
        assert!(!manager.undo_move());
    }

    #[test]
    fn test_checkpoint_and_rewind() {
        let mut manager = manager();
        play(&mut manager, &[("e2", "e4"), ("e7", "e5"), ("g1", "f3")]);
        let checkpoint = manager.checkpoint();

        assert!(manager.rewind_to(1));
        assert_eq!(manager.game_state().moves.len(), 1);
        assert!(!manager.rewind_to(5));

        manager.restore_checkpoint(checkpoint);
        assert_eq!(manager.game_state().moves.len(), 3);
        assert_eq!(manager.game_state().moves[2].san, "Nf3");
    }

    #[test]
    fn test_restore_game_rejects_bad_moves() {
        let mut manager = manager();
        play(&mut manager, &[("d2", "d4")]);
        let moves = manager.game_state().moves.clone();

        let mut other = self::manager();
        other.restore_game(STARTING_FEN, &moves).unwrap();
        assert_eq!(other.game_state().fen, manager.game_state().fen);

        let fen_after_e4 = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        assert!(other.restore_game(fen_after_e4, &moves).is_err());
        assert_eq!(other.game_state().moves.len(), 1);
    }

    #[test]
    fn test_save_load_list_delete() {
        let mut manager = manager();
        play(&mut manager, &[("e2", "e4"), ("e7", "e5")]);
        manager.set_compress_saves(true);
        manager.save_game("first", None, None).unwrap();
        manager.resign(Color::White);
        manager.save_game("second", None, None).unwrap();

        manager.new_game();
        assert!(manager.game_state().moves.is_empty());
        assert!(manager.load_game("missing").unwrap().is_none());

        manager.load_game("first").unwrap().unwrap();
        assert_eq!(manager.game_state().moves.len(), 2);
        assert_eq!(manager.game_state().status, GameStatus::Playing);

        manager.load_game("second").unwrap();
        assert_eq!(manager.game_state().status, GameStatus::Resigned);
        assert_eq!(manager.resigned(), Some(Color::White));

        let saves = manager.list_saves().unwrap();
        let slots: Vec<&str> = saves.iter().map(|s| s.slot.as_str()).collect();
        assert_eq!(slots, ["first", "second"]);
        assert_eq!(saves[1].result, GameResult::BlackWins);

        assert!(manager.delete_save("first").unwrap());
        assert_eq!(manager.list_saves().unwrap().len(), 1);
    }

    #[test]
    fn test_load_fen_and_pgn() {
        let mut manager = manager();
        assert!(manager.load_fen("not a fen").is_err());
        manager.load_fen("8/8/8/4k3/8/8/8/4K2R w K - 0 1").unwrap();
        assert_eq!(manager.game_state().initial_fen, "8/8/8/4k3/8/8/8/4K2R w K - 0 1");

        manager.load_pgn("1. e4 e5 2. Nf3 *").unwrap();
        assert_eq!(manager.game_state().moves.len(), 3);
    }
}
