//! The orchestrator: one facade over the rules oracle, game state, move
//! history, notation, endgame detection and the engine bridge.
//!
//! Every mutation runs through a fixed sequence of phases and ends with a
//! recompute of the cached game state from the rules oracle. Each phase is
//! timed and announced on the event bus. Unexpected failures are tagged with
//! an integration error kind, logged to a bounded recovery history and then
//! returned to the caller; move rejections are ordinary results.

mod errors;
mod events;
mod metrics;
mod types;

pub use errors::{classify, IntegrationError, IntegrationErrorKind, RecoveryStrategy};
pub use events::{EventBus, EventKind, Listener, ListenerHandle, OrchestratorEvent, RecordedEvent};
pub use metrics::{ComponentHealth, HealthStatus, PerformanceMetrics, PhaseTimings};
pub use types::{GameMode, Lifecycle, MoveRequest, MoveResult, SyncReport};

use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;
use shakmaty::{Color, Role, Square};
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::endgame::{analyze_oracle, EndgameAnalysis, EndgameType};
use crate::engine::{AnalysisResult, EngineBridge, EngineError, GoParams, ThinkingMove};
use crate::error::{Error, Result};
use crate::history::{MoveHistoryEntry, MoveHistoryManager, ReplayOptions};
use crate::notation::{generate_move_notation, validate_fen_syntax, NotationFormat, NotationOptions};
use crate::rules::{parse_promotion, parse_square, RulesOracle};
use crate::state::{GameState, GameStateManager};
use crate::storage::{KeyValueStore, MemoryStore, SaveSummary, SqliteStore, AUTOSAVE_SLOT};
use metrics::Stopwatch;
use types::TransactionBackup;

const COMPONENT: &str = "orchestrator";

pub struct Orchestrator {
    config: OrchestratorConfig,
    lifecycle: Lifecycle,
    state: GameStateManager,
    history: MoveHistoryManager,
    engine: Option<EngineBridge>,
    events: EventBus,
    mode: GameMode,
    transaction: Option<TransactionBackup>,
    metrics: PerformanceMetrics,
    recovery_log: VecDeque<IntegrationError>,
}

impl Orchestrator {
    /// Orchestrator with saves in SQLite when `storage_path` is set, in memory otherwise
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let store: Box<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Box::new(SqliteStore::open(path)?),
            None => Box::new(MemoryStore::new()),
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: OrchestratorConfig, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            state: GameStateManager::new(RulesOracle::new(), store),
            history: MoveHistoryManager::new(config.history_options()),
            events: EventBus::new(config.event_buffer_size),
            recovery_log: VecDeque::with_capacity(config.recovery_history_size),
            engine: None,
            mode: GameMode::default(),
            transaction: None,
            metrics: PerformanceMetrics::default(),
            lifecycle: Lifecycle::Constructed,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn ensure_operating(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Constructed => Err(Error::NotInitialized),
            Lifecycle::Destroyed => Err(Error::Destroyed),
        }
    }

    /// Brings the orchestrator into service.
    ///
    /// With `enable_ai` the engine is started too; if it cannot be, the
    /// failure is recorded and play continues without AI.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Destroyed => return Err(Error::Destroyed),
            Lifecycle::Initialized => return Ok(()),
            Lifecycle::Constructed => {}
        }
        let timer = Stopwatch::start();

        if self.config.enable_ai && self.engine.is_none() {
            if let Err(e) = self.start_engine().await {
                warn!(error = %e, "engine unavailable, continuing without AI");
            }
        }

        self.lifecycle = Lifecycle::Initialized;
        self.sync();
        let fen = self.state.game_state().fen.clone();
        self.emit(OrchestratorEvent::GameInitialized { fen });
        self.emit_state_changed();
        self.measure("initialize", timer.elapsed_ms());
        info!(ai = self.engine.is_some(), "orchestrator initialized");
        Ok(())
    }

    /// Shuts the engine down and drops all listeners. Every later call fails.
    pub async fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.history.stop_replay();
        if let Some(mut engine) = self.engine.take() {
            engine.shutdown().await;
        }
        self.events.clear();
        self.transaction = None;
        self.lifecycle = Lifecycle::Destroyed;
        info!("orchestrator destroyed");
    }

    // ---- moves ----

    /// Attempts a move. Rejections come back as a failed [`MoveResult`].
    pub async fn make_move(&mut self, request: MoveRequest) -> Result<MoveResult> {
        self.ensure_operating()?;
        let applied = self.apply_move(request);
        let result = self.guarded("make_move", applied)?;

        if result.success && self.config.auto_save {
            if let Err(e) = self.save_game(AUTOSAVE_SLOT) {
                warn!(error = %e, "autosave failed");
            }
        }
        Ok(result)
    }

    fn apply_move(&mut self, request: MoveRequest) -> Result<MoveResult> {
        let total = Stopwatch::start();
        let mut phase = Stopwatch::start();
        let mut timings = PhaseTimings::default();

        debug!(from = %request.from, to = %request.to, "move attempted");
        self.emit(OrchestratorEvent::MoveAttempted {
            from: request.from.clone(),
            to: request.to.clone(),
            promotion: request.promotion.clone(),
        });

        let (from, to, promotion) = match parse_request(&request) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(self.reject(&request, e.to_string(), timings, &total)),
        };

        // A move made while the history cursor is behind the tip starts a new branch
        let checkpoint = match self.branch_point() {
            Some(ply) => {
                let checkpoint = self.state.checkpoint();
                debug!(ply, "branching from an earlier position");
                self.state.rewind_to(ply);
                Some(checkpoint)
            }
            None => None,
        };

        if self.state.game_state().is_over() {
            if let Some(checkpoint) = checkpoint {
                self.state.restore_checkpoint(checkpoint);
            }
            return Ok(self.reject(&request, "Game is over", timings, &total));
        }

        if !(request.skip_validation || self.config.skip_validation) {
            if let Err(e) = self.state.validate_move(from, to, promotion) {
                timings.validation_ms = phase.lap();
                if let Some(checkpoint) = checkpoint {
                    self.state.restore_checkpoint(checkpoint);
                }
                return Ok(self.reject(&request, e.to_string(), timings, &total));
            }
        }
        timings.validation_ms = phase.lap();

        let fen_before = self.state.oracle().get_fen();
        let outcome = match self.state.make_move(from, to, promotion) {
            Ok(outcome) => outcome,
            Err(e) => {
                timings.execution_ms = phase.lap();
                if let Some(checkpoint) = checkpoint {
                    self.state.restore_checkpoint(checkpoint);
                }
                return Ok(self.reject(&request, e.to_string(), timings, &total));
            }
        };
        timings.execution_ms = phase.lap();

        self.history.add_move(outcome.mv.clone(), fen_before, None, None, Vec::new());
        timings.history_ms = phase.lap();

        self.sync();
        timings.sync_ms = phase.lap();

        let san = generate_move_notation(&outcome.mv, &NotationOptions::default());
        let lan = generate_move_notation(
            &outcome.mv,
            &NotationOptions {
                format: NotationFormat::Lan,
                ..NotationOptions::default()
            },
        );
        timings.notation_ms = phase.lap();

        let analysis = analyze_oracle(self.state.oracle());
        timings.endgame_ms = phase.lap();

        self.emit(OrchestratorEvent::NotationGenerated { san: san.clone(), lan });
        self.emit_history_updated();
        if analysis.is_game_over() || analysis.endgame_type != EndgameType::ComplexEndgame {
            self.emit(OrchestratorEvent::EndgameDetected {
                analysis: analysis.clone(),
            });
        }
        self.emit_state_changed();
        self.emit_game_ended();

        timings.total_ms = total.elapsed_ms();
        self.metrics.record_move(timings);
        self.measure("make_move", timings.total_ms);
        self.emit(OrchestratorEvent::MoveCompleted {
            mv: outcome.mv.clone(),
            notation: san.clone(),
            timings,
        });
        debug!(san = %san, total_ms = timings.total_ms, "move completed");

        Ok(MoveResult {
            success: true,
            mv: Some(outcome.mv),
            notation: Some(san),
            error: None,
            endgame: Some(analysis),
            timings,
        })
    }

    fn reject(
        &mut self,
        request: &MoveRequest,
        reason: impl Into<String>,
        mut timings: PhaseTimings,
        total: &Stopwatch,
    ) -> MoveResult {
        let reason = reason.into();
        info!(from = %request.from, to = %request.to, reason = %reason, "move rejected");
        self.metrics.failed_moves += 1;
        self.emit(OrchestratorEvent::MoveFailed {
            from: request.from.clone(),
            to: request.to.clone(),
            reason: reason.clone(),
        });
        timings.total_ms = total.elapsed_ms();
        MoveResult::rejected(reason, timings)
    }

    /// Ply the oracle must rewind to when the history cursor is not at the tip
    fn branch_point(&self) -> Option<usize> {
        if self.history.is_at_end() {
            return None;
        }
        let ahead = self.history.get_total_moves() as isize - 1 - self.history.current_index();
        self.state.oracle().move_count().checked_sub(ahead as usize)
    }

    /// Takes back the last move. False when there is nothing to undo.
    pub async fn undo_move(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        if self.state.oracle().move_count() == 0 {
            if self.history.is_empty() {
                debug!("nothing to undo");
                return Ok(false);
            }
            let err = Error::Sync("move history has entries the rules oracle does not".into());
            return Err(self.handle_error(err, "undo_move"));
        }
        self.state.undo_move();
        self.history.undo();
        if self.history.is_empty() && self.state.oracle().move_count() > 0 {
            // Capped log ran out before the oracle did
            self.rebuild_history();
        }
        self.sync();
        self.emit_history_updated();
        self.emit_state_changed();
        debug!(moves = self.history.get_total_moves(), "move undone");
        Ok(true)
    }

    /// Resigns for `color`, or for the side to move. False if the game is already over.
    pub async fn resign_game(&mut self, color: Option<Color>) -> Result<bool> {
        self.ensure_operating()?;
        if self.state.game_state().is_over() {
            return Ok(false);
        }
        let color = color.unwrap_or(self.state.game_state().current_player);
        self.state.resign(color);
        self.emit_game_ended();
        self.emit_state_changed();
        Ok(true)
    }

    // ---- synchronization ----

    fn sync(&mut self) {
        self.state.recompute_from_engine();
    }

    /// Recomputes the cached state from the rules oracle
    pub fn force_synchronization(&mut self) -> Result<GameState> {
        self.ensure_operating()?;
        self.sync();
        Ok(self.state.game_state().clone())
    }

    /// Reports drift between the oracle, the cached state and the history log.
    /// Nothing is repaired here.
    pub fn validate_component_synchronization(&mut self) -> Result<SyncReport> {
        self.ensure_operating()?;
        let report = self.sync_report();
        self.metrics.sync_checks += 1;
        if !report.synchronized {
            self.metrics.sync_failures += 1;
            warn!(discrepancies = ?report.discrepancies, "components out of sync");
        }
        Ok(report)
    }

    fn sync_report(&self) -> SyncReport {
        let oracle = self.state.oracle();
        let cached = self.state.game_state();
        let oracle_fen = oracle.get_fen();
        let oracle_moves = oracle.move_count();
        let history_moves = self.history.get_total_moves();
        let mut discrepancies = Vec::new();

        if oracle_fen != cached.fen {
            discrepancies.push(format!("fen: oracle '{}' vs state '{}'", oracle_fen, cached.fen));
        }
        if oracle_moves != cached.moves.len() {
            discrepancies.push(format!(
                "move count: oracle {} vs state {}",
                oracle_moves,
                cached.moves.len()
            ));
        }

        let cap = self.history.options().max_entries;
        if cap == 0 || oracle_moves <= cap {
            if history_moves != oracle_moves {
                discrepancies.push(format!(
                    "move count: oracle {} vs history {}",
                    oracle_moves, history_moves
                ));
            }
        } else if history_moves > cap {
            discrepancies.push(format!("history holds {history_moves} entries, cap is {cap}"));
        }
        if let Some(last) = self.history.get_history().last() {
            if last.mv.fen_after != oracle_fen {
                discrepancies.push("history tip does not reach the oracle position".to_string());
            }
        }

        SyncReport {
            synchronized: discrepancies.is_empty(),
            state_fen: cached.fen.clone(),
            oracle_fen,
            oracle_moves,
            state_moves: cached.moves.len(),
            history_moves,
            discrepancies,
        }
    }

    // ---- transactions ----

    /// Opens a transaction. An already open one keeps its original backup.
    pub fn enable_transaction_mode(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        if self.transaction.is_some() {
            return Ok(false);
        }
        let backup = TransactionBackup {
            fen: self.state.game_state().fen.clone(),
            timestamp: Utc::now(),
            checkpoint: self.state.checkpoint(),
            history: self.history.to_snapshot(),
        };
        debug!(fen = %backup.fen, "transaction opened");
        self.transaction = Some(backup);
        Ok(true)
    }

    pub fn is_transaction_active(&self) -> bool {
        self.transaction.is_some()
    }

    /// Keeps everything done since the transaction opened
    pub fn commit_transaction(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        Ok(self.transaction.take().is_some())
    }

    /// Puts the game and history back as they were when the transaction opened
    pub fn rollback_transaction(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        let Some(backup) = self.transaction.take() else {
            return Ok(false);
        };
        self.state.restore_checkpoint(backup.checkpoint);
        let restored = self.history.restore(backup.history);
        self.guarded("rollback_transaction", restored)?;
        self.sync();
        info!(fen = %backup.fen, opened_at = %backup.timestamp, "transaction rolled back");
        self.emit_history_updated();
        self.emit_state_changed();
        Ok(true)
    }

    // ---- engine ----

    pub fn set_game_mode(&mut self, mode: GameMode) {
        debug!(mode = ?mode, "game mode set");
        self.mode = mode;
    }

    pub fn game_mode(&self) -> GameMode {
        self.mode
    }

    /// Spawns the configured engine binary and runs the handshake
    pub async fn start_engine(&mut self) -> Result<()> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(Error::Destroyed);
        }
        let spawned = EngineBridge::spawn(&self.config.engine_path, self.config.bridge_config());
        let bridge = self.guarded("start_engine", spawned.map_err(Error::from))?;
        self.attach_engine(bridge).await
    }

    /// Uses `bridge` as the engine, running its handshake first
    pub async fn attach_engine(&mut self, bridge: EngineBridge) -> Result<()> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(Error::Destroyed);
        }
        let ready = bridge.initialize().await;
        self.guarded("start_engine", ready.map_err(Error::from))?;
        if let Some(mut old) = self.engine.replace(bridge) {
            old.shutdown().await;
        }
        info!(path = %self.config.engine_path, "engine attached");
        Ok(())
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    fn go_params(&self, depth: Option<u32>) -> GoParams {
        match (depth, self.config.ai_move_time_ms) {
            (Some(depth), _) => GoParams::Depth(depth),
            (None, Some(ms)) => GoParams::MoveTime(ms),
            (None, None) => GoParams::Depth(self.config.ai_depth),
        }
    }

    /// Plays the engine's move if the engine owns the side to move.
    ///
    /// Returns `Ok(None)` without asking the engine otherwise.
    pub async fn trigger_ai_move(&mut self) -> Result<Option<MoveResult>> {
        self.ensure_operating()?;
        let turn = self.state.game_state().current_player;
        if !self.mode.ai_plays(turn) {
            info!(turn = ?turn, mode = ?self.mode, "not the engine's turn");
            return Ok(None);
        }
        if self.state.game_state().is_over() {
            return Ok(None);
        }

        let fen = self.state.game_state().fen.clone();
        let params = self.go_params(None);
        let Some(engine) = self.engine.as_ref() else {
            return Err(self.handle_error(Error::EngineUnavailable, "trigger_ai_move"));
        };
        let searched = engine.get_best_move(&fen, params).await;
        let best = self.guarded("trigger_ai_move", searched.map_err(Error::from))?;

        let Some(request) = MoveRequest::from_uci(&best.mv) else {
            let err = Error::Engine(EngineError::InvalidMove(best.mv));
            return Err(self.handle_error(err, "trigger_ai_move"));
        };
        debug!(uci = %best.mv, "engine move");
        self.make_move(request).await.map(Some)
    }

    /// Searches the current position with the engine
    pub async fn analyze_with_engine(&mut self, depth: Option<u32>) -> Result<AnalysisResult> {
        self.ensure_operating()?;
        let fen = self.state.game_state().fen.clone();
        let params = self.go_params(depth);
        let Some(engine) = self.engine.as_ref() else {
            return Err(self.handle_error(Error::EngineUnavailable, "analyze_with_engine"));
        };
        let analyzed = engine.analyze(&fen, params).await;
        let result = self.guarded("analyze_with_engine", analyzed.map_err(Error::from))?;
        debug!(summary = %result.summary(), "engine analysis");
        Ok(result)
    }

    /// Live candidate ranking of the running search
    pub fn get_ai_thinking_moves(&self) -> Vec<ThinkingMove> {
        self.engine.as_ref().map(EngineBridge::thinking_moves).unwrap_or_default()
    }

    pub fn stop_ai_thinking(&self) -> bool {
        self.engine.as_ref().is_some_and(EngineBridge::stop)
    }

    // ---- game ----

    pub async fn new_game(&mut self) -> Result<GameState> {
        self.ensure_operating()?;
        self.state.new_game();
        self.history.clear();
        self.transaction = None;
        if let Some(engine) = self.engine.as_ref().filter(|e| e.is_ready()) {
            if let Err(e) = engine.new_game().await {
                warn!(error = %e, "engine did not acknowledge new game");
            }
        }
        self.announce_new_position();
        Ok(self.state.game_state().clone())
    }

    pub fn load_fen(&mut self, fen: &str) -> Result<GameState> {
        self.ensure_operating()?;
        let check = validate_fen_syntax(fen);
        if !check.valid {
            return Err(self.handle_error(Error::InvalidFen(check.errors.join("; ")), "load_fen"));
        }
        let loaded = self.state.load_fen(fen);
        self.guarded("load_fen", loaded)?;
        self.history.clear();
        self.announce_new_position();
        Ok(self.state.game_state().clone())
    }

    pub fn load_pgn(&mut self, pgn: &str) -> Result<GameState> {
        self.ensure_operating()?;
        let loaded = self.state.load_pgn(pgn);
        self.guarded("load_pgn", loaded)?;
        self.rebuild_history();
        self.announce_new_position();
        Ok(self.state.game_state().clone())
    }

    fn announce_new_position(&mut self) {
        let fen = self.state.game_state().fen.clone();
        self.emit(OrchestratorEvent::GameInitialized { fen });
        self.emit_history_updated();
        self.emit_state_changed();
    }

    /// Refills the history log from the oracle's moves
    fn rebuild_history(&mut self) {
        let oracle = self.state.oracle();
        let mut fen_before = oracle.initial_fen().to_string();
        let mut entries = Vec::with_capacity(oracle.move_count());
        for mv in oracle.get_move_history() {
            entries.push(MoveHistoryEntry::new(mv.clone(), fen_before));
            fen_before = mv.fen_after.clone();
        }
        self.history.load_moves(entries);
    }

    pub fn get_game_state(&self) -> Result<GameState> {
        self.ensure_operating()?;
        Ok(self.state.game_state().clone())
    }

    pub fn get_pgn(&self) -> Result<String> {
        self.ensure_operating()?;
        Ok(self.state.game_state().pgn.clone())
    }

    /// Endgame and draw-rule analysis of the current position
    pub fn analyze_position(&self) -> Result<EndgameAnalysis> {
        self.ensure_operating()?;
        Ok(analyze_oracle(self.state.oracle()))
    }

    pub fn history(&self) -> &MoveHistoryManager {
        &self.history
    }

    // ---- navigation and replay ----

    pub fn go_to_move(&mut self, index: isize) -> Result<bool> {
        self.ensure_operating()?;
        let moved = self.history.go_to_move(index);
        if moved {
            self.emit_history_updated();
        }
        Ok(moved)
    }

    pub fn go_forward(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        let moved = self.history.go_forward();
        if moved {
            self.emit_history_updated();
        }
        Ok(moved)
    }

    pub fn go_backward(&mut self) -> Result<bool> {
        self.ensure_operating()?;
        let moved = self.history.go_backward();
        if moved {
            self.emit_history_updated();
        }
        Ok(moved)
    }

    pub fn go_to_start(&mut self) -> Result<()> {
        self.ensure_operating()?;
        self.history.go_to_start();
        self.emit_history_updated();
        Ok(())
    }

    pub fn go_to_end(&mut self) -> Result<()> {
        self.ensure_operating()?;
        self.history.go_to_end();
        self.emit_history_updated();
        Ok(())
    }

    /// Position at the history cursor; the game position itself stays at the tip
    pub fn position_at_cursor(&self) -> Result<String> {
        self.ensure_operating()?;
        Ok(self
            .history
            .fen_at_cursor()
            .map(str::to_string)
            .unwrap_or_else(|| self.state.oracle().initial_fen().to_string()))
    }

    pub fn start_replay(&mut self, options: ReplayOptions) -> Result<()> {
        self.ensure_operating()?;
        self.history.start_replay(options);
        self.emit_history_updated();
        Ok(())
    }

    /// Advances the replay by one move now
    pub fn replay_step(&mut self) -> Result<Option<isize>> {
        self.ensure_operating()?;
        let step = self.history.replay_step();
        if step.is_some() {
            self.emit_history_updated();
        }
        Ok(step)
    }

    /// Waits for the next autoplay tick and applies it
    pub async fn next_replay_step(&mut self) -> Result<Option<isize>> {
        self.ensure_operating()?;
        let step = self.history.next_replay_step().await;
        if step.is_some() {
            self.emit_history_updated();
        }
        Ok(step)
    }

    pub fn stop_replay(&mut self) -> Result<()> {
        self.ensure_operating()?;
        self.history.stop_replay();
        Ok(())
    }

    // ---- persistence ----

    /// Saves the game and its history under `slot`
    pub fn save_game(&mut self, slot: &str) -> Result<()> {
        self.ensure_operating()?;
        let mut metadata = BTreeMap::new();
        if let Ok(mode) = serde_json::to_string(&self.mode) {
            metadata.insert("mode".to_string(), mode);
        }
        let saved = self.state.save_game(
            slot,
            Some((self.history.get_history(), self.history.current_index())),
            Some(metadata),
        );
        self.guarded("save_game", saved)?;
        self.emit(OrchestratorEvent::StateSaved { slot: slot.to_string() });
        Ok(())
    }

    /// Restores the game saved under `slot`. False when the slot is empty.
    pub fn load_game(&mut self, slot: &str) -> Result<bool> {
        self.ensure_operating()?;
        let loaded = self.state.load_game(slot);
        let Some(envelope) = self.guarded("load_game", loaded)? else {
            return Ok(false);
        };

        let fen = self.state.game_state().fen.clone();
        match envelope.history {
            Some(entries) if entries.last().map(|e| e.mv.fen_after.as_str()) == Some(fen.as_str()) => {
                self.history.load_moves(entries);
                if let Some(index) = envelope.history_index {
                    self.history.go_to_move(index);
                }
            }
            _ => self.rebuild_history(),
        }
        if let Some(mode) = envelope
            .metadata
            .as_ref()
            .and_then(|m| m.get("mode"))
            .and_then(|raw| serde_json::from_str(raw).ok())
        {
            self.mode = mode;
        }
        self.transaction = None;

        self.emit(OrchestratorEvent::StateLoaded { slot: slot.to_string() });
        self.emit_history_updated();
        self.emit_state_changed();
        Ok(true)
    }

    pub fn list_saves(&mut self) -> Result<Vec<SaveSummary>> {
        self.ensure_operating()?;
        let saves = self.state.list_saves();
        self.guarded("list_saves", saves)
    }

    pub fn delete_save(&mut self, slot: &str) -> Result<bool> {
        self.ensure_operating()?;
        let deleted = self.state.delete_save(slot);
        self.guarded("delete_save", deleted)
    }

    // ---- events ----

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, Box::new(listener))
    }

    /// Subscribes after replaying up to `replay` buffered events of `kind`
    pub fn subscribe_with_replay<F>(&mut self, kind: EventKind, listener: F, replay: usize) -> ListenerHandle
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_with_replay(kind, Box::new(listener), replay)
    }

    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    pub fn event_history(&self, kind: Option<EventKind>) -> Vec<RecordedEvent> {
        self.events.history(kind)
    }

    fn emit(&mut self, event: OrchestratorEvent) {
        let kind = event.kind();
        let failures = self.events.emit(event);
        self.metrics.events_emitted += 1;
        if failures > 0 {
            self.metrics.listener_failures += failures as u64;
            // error:occurred listeners that panic are only counted
            if kind != EventKind::ErrorOccurred {
                self.record(IntegrationError::new(
                    IntegrationErrorKind::EventPropagation,
                    "events",
                    kind.as_str(),
                    format!("{failures} listener(s) panicked"),
                ));
            }
        }
    }

    fn emit_state_changed(&mut self) {
        let state = self.state.game_state();
        let event = OrchestratorEvent::GameStateChanged {
            fen: state.fen.clone(),
            status: state.status,
            move_count: state.move_count(),
        };
        self.emit(event);
    }

    fn emit_history_updated(&mut self) {
        self.emit(OrchestratorEvent::HistoryUpdated {
            total_moves: self.history.get_total_moves(),
            current_index: self.history.current_index(),
        });
    }

    fn emit_game_ended(&mut self) {
        let state = self.state.game_state();
        if state.is_over() {
            let event = OrchestratorEvent::GameEnded {
                result: state.result,
                reason: state.end_reason,
            };
            info!(result = state.result.as_str(), "game ended");
            self.emit(event);
        }
    }

    fn measure(&mut self, operation: &str, duration_ms: f64) {
        self.emit(OrchestratorEvent::PerformanceMeasured {
            operation: operation.to_string(),
            duration_ms,
        });
        if duration_ms > self.config.slow_operation_ms as f64 {
            self.metrics.slow_operations += 1;
            self.record(IntegrationError::new(
                IntegrationErrorKind::PerformanceViolation,
                COMPONENT,
                operation,
                format!("took {duration_ms:.1}ms, limit {}ms", self.config.slow_operation_ms),
            ));
        }
    }

    // ---- errors and health ----

    /// Tags `error`, records it and hands it back for the caller to return
    pub fn handle_error(&mut self, error: Error, operation: &str) -> Error {
        self.record(IntegrationError::from_error(&error, COMPONENT, operation));
        error
    }

    fn guarded<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.handle_error(e, operation))
    }

    fn record(&mut self, tagged: IntegrationError) {
        if tagged.kind == IntegrationErrorKind::PerformanceViolation {
            warn!(operation = %tagged.operation, message = %tagged.message, "slow operation");
        } else {
            error!(
                kind = %tagged.kind,
                component = %tagged.component,
                operation = %tagged.operation,
                message = %tagged.message,
                "integration error"
            );
        }
        self.metrics.errors += 1;
        if self.config.recovery_history_size > 0 {
            if self.recovery_log.len() >= self.config.recovery_history_size {
                self.recovery_log.pop_front();
            }
            self.recovery_log.push_back(tagged.clone());
        }
        self.emit(OrchestratorEvent::ErrorOccurred { error: tagged });
    }

    /// Tagged errors, oldest first
    pub fn recovery_history(&self) -> Vec<IntegrationError> {
        self.recovery_log.iter().cloned().collect()
    }

    pub fn get_performance_metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn check_component_health(&self) -> Vec<ComponentHealth> {
        let mut report = vec![ComponentHealth::healthy("rules")];

        let sync = self.sync_report();
        report.push(if sync.synchronized {
            ComponentHealth::healthy("state")
        } else {
            ComponentHealth::with("state", HealthStatus::Degraded, sync.discrepancies.join("; "))
        });

        report.push(if self.history.is_replaying() {
            ComponentHealth::with("history", HealthStatus::Healthy, "replaying")
        } else {
            ComponentHealth::healthy("history")
        });

        report.push(match &self.engine {
            Some(engine) if engine.is_ready() => ComponentHealth::healthy("engine"),
            Some(engine) => ComponentHealth::with(
                "engine",
                HealthStatus::Degraded,
                format!("status {:?}", engine.status()),
            ),
            None if self.config.enable_ai => {
                ComponentHealth::with("engine", HealthStatus::Unavailable, "engine failed to start")
            }
            None => ComponentHealth::with("engine", HealthStatus::Unavailable, "AI disabled"),
        });

        report.push(if self.metrics.listener_failures > 0 {
            ComponentHealth::with(
                "events",
                HealthStatus::Degraded,
                format!("{} listener failures", self.metrics.listener_failures),
            )
        } else {
            ComponentHealth::healthy("events")
        });

        report.push(match self.state.list_saves() {
            Ok(_) => ComponentHealth::healthy("storage"),
            Err(e) => ComponentHealth::with("storage", HealthStatus::Unavailable, e.to_string()),
        });
        report
    }

    /// Runs the recovery strategy for `kind`, backing off between attempts.
    ///
    /// `Ok(false)` when the kind has no strategy.
    pub async fn attempt_recovery(&mut self, kind: IntegrationErrorKind) -> Result<bool> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(Error::Destroyed);
        }
        let Some(strategy) = kind.recovery_strategy() else {
            return Ok(false);
        };

        for attempt in 0..strategy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(strategy.delay(attempt - 1)).await;
            }
            info!(kind = %kind, attempt = attempt + 1, "attempting recovery");
            if self.recover_once(kind).await {
                info!(kind = %kind, "recovered");
                return Ok(true);
            }
        }

        let mut failed = IntegrationError::new(
            IntegrationErrorKind::RecoveryFailure,
            COMPONENT,
            "attempt_recovery",
            format!("{kind} not recovered"),
        );
        failed.retry_attempts = strategy.max_attempts;
        let message = failed.message.clone();
        self.record(failed);
        Err(Error::Recovery(message))
    }

    async fn recover_once(&mut self, kind: IntegrationErrorKind) -> bool {
        match kind {
            IntegrationErrorKind::ComponentInitialization => {
                if self.lifecycle == Lifecycle::Constructed {
                    return self.initialize().await.is_ok();
                }
                let engine_ready = self.engine.as_ref().is_some_and(EngineBridge::is_ready);
                if self.config.enable_ai && !engine_ready {
                    return self.start_engine().await.is_ok();
                }
                true
            }
            _ => {
                self.sync();
                if !self.sync_report().synchronized {
                    self.rebuild_history();
                }
                self.sync_report().synchronized
            }
        }
    }
}

fn parse_request(request: &MoveRequest) -> Result<(Square, Square, Option<Role>)> {
    let from = parse_square(&request.from)?;
    let to = parse_square(&request.to)?;
    let promotion = request.promotion.as_deref().map(parse_promotion).transpose()?;
    Ok((from, to, promotion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{channel_pair, BridgeConfig, EngineEndpoint, WorkerEvent};
    use crate::rules::{GameResult, GameStatus, STARTING_FEN};
    use std::sync::{Arc, Mutex};

    async fn ready() -> Orchestrator {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        orchestrator.initialize().await.unwrap();
        orchestrator
    }

    async fn play(orchestrator: &mut Orchestrator, moves: &[(&str, &str)]) {
        for (from, to) in moves {
            let result = orchestrator.make_move(MoveRequest::new(*from, *to)).await.unwrap();
            assert!(result.success, "{from}{to}: {:?}", result.error);
        }
    }

    fn kinds(orchestrator: &Orchestrator) -> Vec<EventKind> {
        orchestrator
            .event_history(None)
            .iter()
            .map(|r| r.event.kind())
            .collect()
    }

    /// Scripted engine that always answers with `reply` to `go`
    fn fake_engine(reply: &'static str) -> EngineBridge {
        let (channels, endpoint) = channel_pair();
        let EngineEndpoint {
            commands: mut inbound,
            events,
        } = endpoint;
        tokio::spawn(async move {
            while let Some(cmd) = inbound.recv().await {
                let lines: Vec<String> = match cmd.split_whitespace().next() {
                    Some("uci") => vec!["id name Fake".into(), "uciok".into()],
                    Some("isready") => vec!["readyok".into()],
                    Some("go") => vec![
                        format!("info depth 8 score cp 31 pv {reply}"),
                        format!("bestmove {reply}"),
                    ],
                    _ => Vec::new(),
                };
                for line in lines {
                    if events.send(WorkerEvent::Line(line)).is_err() {
                        return;
                    }
                }
            }
        });
        EngineBridge::new(channels, BridgeConfig::default())
    }

    #[tokio::test]
    async fn test_lifecycle_guards() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        assert!(matches!(
            orchestrator.make_move(MoveRequest::new("e2", "e4")).await,
            Err(Error::NotInitialized)
        ));

        orchestrator.initialize().await.unwrap();
        assert_eq!(orchestrator.lifecycle(), Lifecycle::Initialized);
        assert!(orchestrator.get_game_state().is_ok());

        orchestrator.destroy().await;
        assert!(matches!(orchestrator.get_pgn(), Err(Error::Destroyed)));
        assert!(matches!(orchestrator.initialize().await, Err(Error::Destroyed)));
    }

    #[tokio::test]
    async fn test_move_event_sequence() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4")]).await;

        let events = kinds(&orchestrator);
        let attempted = events.iter().position(|k| *k == EventKind::MoveAttempted).unwrap();
        let completed = events.iter().position(|k| *k == EventKind::MoveCompleted).unwrap();
        assert!(attempted < completed);
        for kind in [
            EventKind::NotationGenerated,
            EventKind::HistoryUpdated,
            EventKind::GameStateChanged,
        ] {
            assert!(events[attempted..completed].contains(&kind), "{kind} missing");
        }
        assert!(!events.contains(&EventKind::EndgameDetected));
        assert_eq!(orchestrator.get_performance_metrics().total_moves, 1);
    }

    #[tokio::test]
    async fn test_rejected_move_is_a_result() {
        let mut orchestrator = ready().await;
        let result = orchestrator.make_move(MoveRequest::new("e2", "e5")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Illegal"));

        let result = orchestrator.make_move(MoveRequest::new("z9", "e4")).await.unwrap();
        assert!(!result.success);

        let failed = orchestrator.event_history(Some(EventKind::MoveFailed));
        assert_eq!(failed.len(), 2);
        assert_eq!(orchestrator.get_game_state().unwrap().fen, STARTING_FEN);
        assert!(orchestrator.recovery_history().is_empty());
    }

    #[tokio::test]
    async fn test_make_then_undo_stays_in_sync() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4")]).await;
        assert!(orchestrator.undo_move().await.unwrap());

        assert_eq!(orchestrator.history().get_total_moves(), 0);
        assert_eq!(orchestrator.get_game_state().unwrap().fen, STARTING_FEN);
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
        assert!(!orchestrator.undo_move().await.unwrap());
    }

    #[tokio::test]
    async fn test_undo_past_capped_history() {
        let config = OrchestratorConfig {
            max_history_entries: 2,
            ..OrchestratorConfig::default()
        };
        let mut orchestrator = Orchestrator::new(config).unwrap();
        orchestrator.initialize().await.unwrap();
        play(&mut orchestrator, &[("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6")]).await;
        assert_eq!(orchestrator.history().get_total_moves(), 2);

        for _ in 0..3 {
            assert!(orchestrator.undo_move().await.unwrap());
            assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
        }
        assert_eq!(orchestrator.get_game_state().unwrap().moves.len(), 1);
        assert_eq!(orchestrator.history().get_total_moves(), 1);
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);

        assert!(orchestrator.undo_move().await.unwrap());
        assert_eq!(orchestrator.get_game_state().unwrap().fen, STARTING_FEN);
        assert!(!orchestrator.undo_move().await.unwrap());
    }

    #[tokio::test]
    async fn test_resign_defaults_to_side_to_move() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4")]).await;
        assert!(orchestrator.resign_game(None).await.unwrap());

        let state = orchestrator.get_game_state().unwrap();
        assert_eq!(state.status, GameStatus::Resigned);
        assert_eq!(state.result, GameResult::WhiteWins);
        assert_eq!(orchestrator.event_history(Some(EventKind::GameEnded)).len(), 1);

        assert!(!orchestrator.resign_game(Some(Color::White)).await.unwrap());
        let result = orchestrator.make_move(MoveRequest::new("e7", "e5")).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_checkmate_emits_endgame_and_end() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]).await;

        let analysis = orchestrator.analyze_position().unwrap();
        assert_eq!(analysis.status, GameStatus::Checkmate);
        assert_eq!(analysis.result, GameResult::BlackWins);
        assert_eq!(orchestrator.event_history(Some(EventKind::EndgameDetected)).len(), 1);
        assert_eq!(orchestrator.event_history(Some(EventKind::GameEnded)).len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_rollback_and_commit() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4")]).await;
        let before = orchestrator.get_game_state().unwrap().fen;

        assert!(orchestrator.enable_transaction_mode().unwrap());
        play(&mut orchestrator, &[("e7", "e5"), ("g1", "f3")]).await;
        assert!(!orchestrator.enable_transaction_mode().unwrap());
        assert!(orchestrator.rollback_transaction().unwrap());

        assert_eq!(orchestrator.get_game_state().unwrap().fen, before);
        assert_eq!(orchestrator.history().get_total_moves(), 1);
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
        assert!(!orchestrator.rollback_transaction().unwrap());

        orchestrator.enable_transaction_mode().unwrap();
        play(&mut orchestrator, &[("e7", "e5")]).await;
        assert!(orchestrator.commit_transaction().unwrap());
        assert_eq!(orchestrator.history().get_total_moves(), 2);
    }

    #[tokio::test]
    async fn test_branching_from_earlier_move() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4"), ("e7", "e5"), ("g1", "f3")]).await;

        assert!(orchestrator.go_to_move(0).unwrap());
        play(&mut orchestrator, &[("c7", "c5")]).await;

        assert_eq!(orchestrator.history().get_total_moves(), 2);
        let state = orchestrator.get_game_state().unwrap();
        assert_eq!(state.moves.last().unwrap().san, "c5");
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
    }

    #[tokio::test]
    async fn test_illegal_branch_move_restores_tip() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4"), ("e7", "e5")]).await;
        let tip = orchestrator.get_game_state().unwrap().fen;

        orchestrator.go_to_start().unwrap();
        let result = orchestrator.make_move(MoveRequest::new("e2", "e5")).await.unwrap();
        assert!(!result.success);
        assert_eq!(orchestrator.get_game_state().unwrap().fen, tip);
        assert_eq!(orchestrator.history().get_total_moves(), 2);
    }

    #[tokio::test]
    async fn test_sync_report_detects_drift() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4")]).await;
        orchestrator.history.clear();

        let report = orchestrator.validate_component_synchronization().unwrap();
        assert!(!report.synchronized);
        assert_eq!(report.history_moves, 0);
        assert_eq!(orchestrator.get_performance_metrics().sync_failures, 1);

        assert!(orchestrator
            .attempt_recovery(IntegrationErrorKind::StateSynchronization)
            .await
            .unwrap());
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let mut orchestrator = ready().await;
        orchestrator.set_game_mode(GameMode::HumanVsAi { ai_color: Color::Black });
        play(&mut orchestrator, &[("d2", "d4"), ("d7", "d5")]).await;
        orchestrator.save_game("slot1").unwrap();

        orchestrator.new_game().await.unwrap();
        orchestrator.set_game_mode(GameMode::HumanVsHuman);
        assert!(orchestrator.load_game("slot1").unwrap());
        assert!(!orchestrator.load_game("missing").unwrap());

        assert_eq!(orchestrator.get_game_state().unwrap().moves.len(), 2);
        assert_eq!(orchestrator.history().get_total_moves(), 2);
        assert_eq!(orchestrator.game_mode(), GameMode::HumanVsAi { ai_color: Color::Black });
        assert_eq!(orchestrator.list_saves().unwrap().len(), 1);
        assert_eq!(orchestrator.event_history(Some(EventKind::StateLoaded)).len(), 1);
    }

    #[tokio::test]
    async fn test_autosave() {
        let config = OrchestratorConfig {
            auto_save: true,
            ..OrchestratorConfig::default()
        };
        let mut orchestrator = Orchestrator::new(config).unwrap();
        orchestrator.initialize().await.unwrap();
        play(&mut orchestrator, &[("e2", "e4")]).await;

        let saves = orchestrator.list_saves().unwrap();
        assert_eq!(saves[0].slot, AUTOSAVE_SLOT);
        assert_eq!(saves[0].move_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_fen_is_tagged() {
        let mut orchestrator = ready().await;
        assert!(orchestrator.load_fen("not a fen").is_err());

        let log = orchestrator.recovery_history();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, IntegrationErrorKind::ApiValidation);
        assert_eq!(log[0].operation, "load_fen");
        assert_eq!(orchestrator.event_history(Some(EventKind::ErrorOccurred)).len(), 1);
    }

    #[tokio::test]
    async fn test_load_pgn_fills_history() {
        let mut orchestrator = ready().await;
        orchestrator.load_pgn("1. e4 e5 2. Nf3 Nc6 *").unwrap();
        assert_eq!(orchestrator.history().get_total_moves(), 4);
        assert!(orchestrator.validate_component_synchronization().unwrap().synchronized);
        assert!(orchestrator.get_pgn().unwrap().contains("2. Nf3 Nc6"));
    }

    #[tokio::test]
    async fn test_panicking_listener_is_recorded() {
        let mut orchestrator = ready().await;
        orchestrator.subscribe(EventKind::MoveAttempted, |_| panic!("bad listener"));
        play(&mut orchestrator, &[("e2", "e4")]).await;

        let log = orchestrator.recovery_history();
        assert_eq!(log[0].kind, IntegrationErrorKind::EventPropagation);
        assert_eq!(orchestrator.get_performance_metrics().listener_failures, 1);
    }

    #[tokio::test]
    async fn test_subscribe_and_replay() {
        let mut orchestrator = ready().await;
        play(&mut orchestrator, &[("e2", "e4"), ("e7", "e5")]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = orchestrator.subscribe_with_replay(
            EventKind::NotationGenerated,
            move |event| {
                if let OrchestratorEvent::NotationGenerated { san, .. } = event {
                    sink.lock().unwrap().push(san.clone());
                }
            },
            10,
        );
        play(&mut orchestrator, &[("g1", "f3")]).await;
        assert_eq!(*seen.lock().unwrap(), ["e4", "e5", "Nf3"]);

        assert!(orchestrator.unsubscribe(handle));
        play(&mut orchestrator, &[("b8", "c6")]).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ai_move_only_on_engine_turn() {
        let mut orchestrator = ready().await;
        orchestrator.attach_engine(fake_engine("e7e5")).await.unwrap();
        orchestrator.set_game_mode(GameMode::HumanVsAi { ai_color: Color::Black });

        assert!(orchestrator.trigger_ai_move().await.unwrap().is_none());
        play(&mut orchestrator, &[("e2", "e4")]).await;

        let result = orchestrator.trigger_ai_move().await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.notation.as_deref(), Some("e5"));
        assert_eq!(orchestrator.history().get_total_moves(), 2);
    }

    #[tokio::test]
    async fn test_ai_without_engine_is_an_error() {
        let mut orchestrator = ready().await;
        orchestrator.set_game_mode(GameMode::AiVsAi);
        assert!(matches!(
            orchestrator.trigger_ai_move().await,
            Err(Error::EngineUnavailable)
        ));
        assert_eq!(
            orchestrator.recovery_history()[0].kind,
            IntegrationErrorKind::ComponentInitialization
        );
        assert!(orchestrator.get_ai_thinking_moves().is_empty());
        assert!(!orchestrator.stop_ai_thinking());
    }

    #[tokio::test]
    async fn test_engine_analysis() {
        let mut orchestrator = ready().await;
        orchestrator.attach_engine(fake_engine("e2e4")).await.unwrap();
        let result = orchestrator.analyze_with_engine(Some(8)).await.unwrap();
        assert_eq!(result.best_move, "e2e4");
        assert_eq!(result.depth, 8);
    }

    #[tokio::test]
    async fn test_component_health() {
        let orchestrator = ready().await;
        let health = orchestrator.check_component_health();
        let engine = health.iter().find(|h| h.component == "engine").unwrap();
        assert_eq!(engine.status, HealthStatus::Unavailable);
        let state = health.iter().find(|h| h.component == "state").unwrap();
        assert_eq!(state.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_no_strategy_for_validation_errors() {
        let mut orchestrator = ready().await;
        assert!(!orchestrator
            .attempt_recovery(IntegrationErrorKind::ApiValidation)
            .await
            .unwrap());
    }
}
