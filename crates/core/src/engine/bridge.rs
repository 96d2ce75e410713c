//! Async UCI client with command correlation
//!
//! Commands go out over the outbound channel. A dispatcher task reads engine
//! lines and resolves the oldest pending command waiting for that kind of
//! reply. `info` lines never resolve anything; they feed the live ranking.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::analysis::{AnalysisResult, Evaluation, ThinkingMove};
use super::protocol::{parse_best_move, parse_info_line, BestMove, GoParams, InfoLine, UciCommand};
use super::stockfish::{EngineChannels, StockfishProcess, WorkerEvent};
use super::EngineError;
use crate::rules::{describe_move, parse_position, ChessMove};

/// Candidates kept in the thinking ranking
pub const MAX_THINKING_MOVES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Uninitialized,
    Ready,
    Thinking,
}

#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    /// Timeout for handshake and option commands
    pub command_timeout_ms: u64,
    /// Timeout for depth-limited searches; movetime searches get the move time on top of the command timeout
    pub search_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 5_000,
            search_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    UciOk,
    ReadyOk,
    BestMove,
}

struct Pending {
    expect: Expect,
    reply: oneshot::Sender<Result<String, EngineError>>,
    transcript: Vec<String>,
}

struct BridgeState {
    status: BridgeStatus,
    pending: HashMap<String, Pending>,
    /// Pending ids, oldest first
    order: VecDeque<String>,
    current_fen: Option<String>,
    thinking_moves: Vec<ThinkingMove>,
    last_info: Option<InfoLine>,
    /// Abandoned searches whose `bestmove` has not arrived yet
    stale_searches: usize,
}

impl BridgeState {
    fn new() -> Self {
        Self {
            status: BridgeStatus::Uninitialized,
            pending: HashMap::new(),
            order: VecDeque::new(),
            current_fen: None,
            thinking_moves: Vec::new(),
            last_info: None,
            stale_searches: 0,
        }
    }

    fn take_pending(&mut self, id: &str) -> Option<Pending> {
        self.order.retain(|pending_id| pending_id != id);
        self.pending.remove(id)
    }

    fn oldest_expecting(&self, expect: Expect) -> Option<String> {
        self.order
            .iter()
            .find(|id| self.pending.get(*id).is_some_and(|p| p.expect == expect))
            .cloned()
    }

    fn reject(&mut self, id: &str, err: EngineError) {
        if let Some(pending) = self.take_pending(id) {
            let _ = pending.reply.send(Err(err));
        }
    }

    fn reject_all(&mut self, err: EngineError) {
        self.order.clear();
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(err.clone()));
        }
    }

    fn handle_line(&mut self, line: &str) {
        if let Some(info) = parse_info_line(line) {
            self.apply_info(info);
            return;
        }

        if line.starts_with("bestmove") && self.stale_searches > 0 {
            self.stale_searches -= 1;
            debug!(line, "dropped reply of an abandoned search");
            return;
        }

        for pending in self.pending.values_mut() {
            pending.transcript.push(line.to_string());
        }

        let expect = if line == "uciok" {
            Some(Expect::UciOk)
        } else if line == "readyok" {
            Some(Expect::ReadyOk)
        } else if line.starts_with("bestmove") {
            Some(Expect::BestMove)
        } else {
            None
        };

        match expect {
            Some(expect) => match self.oldest_expecting(expect) {
                Some(id) => {
                    if let Some(pending) = self.take_pending(&id) {
                        debug!(id = %id, "command resolved");
                        let _ = pending.reply.send(Ok(pending.transcript.join("\n")));
                    }
                }
                None => debug!(line, "unsolicited engine reply"),
            },
            None if line.to_ascii_lowercase().contains("error") => {
                if let Some(id) = self.order.front().cloned() {
                    warn!(id = %id, line, "engine reported an error");
                    self.reject(&id, EngineError::Reported(line.to_string()));
                }
            }
            None => {}
        }
    }

    fn turn(&self) -> Color {
        match self.current_fen.as_deref().and_then(|f| f.split_whitespace().nth(1)) {
            Some("b") => Color::Black,
            _ => Color::White,
        }
    }

    fn apply_info(&mut self, info: InfoLine) {
        if info.score.is_none() && info.pv.is_empty() {
            return;
        }
        if let (Some(score), false) = (info.score, info.pv.is_empty()) {
            let evaluation = Evaluation::from_score(score, self.turn());
            if let Some(candidate) = self.thinking_move(&info, evaluation) {
                self.rank(candidate);
            }
        }
        self.last_info = Some(info);
    }

    fn thinking_move(&self, info: &InfoLine, evaluation: Evaluation) -> Option<ThinkingMove> {
        let fen = self.current_fen.as_deref()?;
        let mut position: Chess = parse_position(fen).ok()?;
        let mut line: Vec<ChessMove> = Vec::with_capacity(info.pv.len());
        for uci in &info.pv {
            let Some((record, next)) = play_uci(&position, uci) else {
                break;
            };
            line.push(record);
            position = next;
        }
        let first = line.first()?.clone();
        Some(ThinkingMove {
            mv: first,
            evaluation: evaluation.value(),
            mate_in: evaluation.mate_in(),
            depth: info.depth.unwrap_or(0),
            pv: line,
        })
    }

    fn rank(&mut self, candidate: ThinkingMove) {
        let key = (candidate.mv.from, candidate.mv.to);
        match self
            .thinking_moves
            .iter_mut()
            .find(|m| (m.mv.from, m.mv.to) == key)
        {
            Some(existing) => *existing = candidate,
            None => self.thinking_moves.push(candidate),
        }
        self.thinking_moves.sort_by(|a, b| b.evaluation.cmp(&a.evaluation));
        self.thinking_moves.truncate(MAX_THINKING_MOVES);
    }

    fn fail_all(&mut self, reason: &str) {
        if self.status != BridgeStatus::Uninitialized || !self.pending.is_empty() {
            error!(reason, pending = self.pending.len(), "engine failure, bridge disabled");
        }
        self.reject_all(EngineError::Crashed(reason.to_string()));
        self.stale_searches = 0;
        self.status = BridgeStatus::Uninitialized;
    }
}

fn play_uci(position: &Chess, uci: &str) -> Option<(ChessMove, Chess)> {
    let parsed = UciMove::from_ascii(uci.as_bytes()).ok()?;
    let mv = parsed.to_move(position).ok()?;
    describe_move(position, mv).ok()
}

fn lock(shared: &Mutex<BridgeState>) -> MutexGuard<'_, BridgeState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn dispatch(shared: Arc<Mutex<BridgeState>>, mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Line(line) => lock(&shared).handle_line(line.trim()),
            WorkerEvent::Crashed(reason) => lock(&shared).fail_all(&reason),
        }
    }
    lock(&shared).fail_all("engine channel closed");
}

/// Client side of one engine connection
pub struct EngineBridge {
    outbound: mpsc::UnboundedSender<String>,
    shared: Arc<Mutex<BridgeState>>,
    dispatcher: JoinHandle<()>,
    process: Option<StockfishProcess>,
    next_id: AtomicU64,
    config: BridgeConfig,
}

impl EngineBridge {
    /// Bridge over an existing channel pair. Must be called inside a tokio runtime.
    pub fn new(channels: EngineChannels, config: BridgeConfig) -> Self {
        let shared = Arc::new(Mutex::new(BridgeState::new()));
        let dispatcher = tokio::spawn(dispatch(Arc::clone(&shared), channels.events));
        Self {
            outbound: channels.commands,
            shared,
            dispatcher,
            process: None,
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Spawns the engine binary at `path` and connects to it
    pub fn spawn(path: &str, config: BridgeConfig) -> Result<Self, EngineError> {
        let (process, channels) = StockfishProcess::spawn(path)?;
        let mut bridge = Self::new(channels, config);
        bridge.process = Some(process);
        Ok(bridge)
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        lock(&self.shared)
    }

    fn command_id(&self, cmd: &UciCommand) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", cmd.id_prefix(), n)
    }

    /// Sends a command that expects no reply
    fn post(&self, cmd: UciCommand) -> Result<(), EngineError> {
        let id = self.command_id(&cmd);
        debug!(id = %id, cmd = %cmd, "command posted");
        self.outbound
            .send(cmd.to_string())
            .map_err(|_| EngineError::Crashed("engine channel closed".into()))
    }

    /// Sends a command and waits for its reply. `timeout_ms == 0` waits forever.
    async fn request(&self, cmd: UciCommand, expect: Expect, timeout_ms: u64) -> Result<String, EngineError> {
        let id = self.command_id(&cmd);
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state();
            state.pending.insert(
                id.clone(),
                Pending {
                    expect,
                    reply: tx,
                    transcript: Vec::new(),
                },
            );
            state.order.push_back(id.clone());
        }

        if self.outbound.send(cmd.to_string()).is_err() {
            self.state().take_pending(&id);
            return Err(EngineError::Crashed("engine channel closed".into()));
        }
        debug!(id = %id, cmd = %cmd, timeout_ms, "command sent");

        let reply = if timeout_ms == 0 {
            rx.await
        } else {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    let abandoned = self.state().take_pending(&id).is_some() && expect == Expect::BestMove;
                    if abandoned {
                        // The engine still owes a bestmove for this search
                        if let Err(e) = self.post(UciCommand::Stop) {
                            warn!(error = %e, "failed to send stop");
                        }
                        self.state().stale_searches += 1;
                    }
                    warn!(id = %id, timeout_ms, "engine command timed out");
                    return Err(EngineError::Timeout {
                        command: cmd.to_string(),
                        timeout_ms,
                    });
                }
            }
        };
        reply.unwrap_or(Err(EngineError::Terminated))
    }

    /// UCI handshake: `uci` then `isready`
    pub async fn initialize(&self) -> Result<(), EngineError> {
        if self.status() != BridgeStatus::Uninitialized {
            return Ok(());
        }
        let timeout = self.config.command_timeout_ms;
        self.request(UciCommand::Uci, Expect::UciOk, timeout).await?;
        self.request(UciCommand::IsReady, Expect::ReadyOk, timeout).await?;
        self.state().status = BridgeStatus::Ready;
        info!("engine ready");
        Ok(())
    }

    pub fn status(&self) -> BridgeStatus {
        self.state().status
    }

    pub fn is_ready(&self) -> bool {
        self.status() == BridgeStatus::Ready
    }

    pub fn is_thinking(&self) -> bool {
        self.status() == BridgeStatus::Thinking
    }

    /// FEN of the last searched position
    pub fn current_fen(&self) -> Option<String> {
        self.state().current_fen.clone()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        match self.status() {
            BridgeStatus::Uninitialized => Err(EngineError::NotReady),
            BridgeStatus::Thinking => Err(EngineError::AlreadyThinking),
            BridgeStatus::Ready => Ok(()),
        }
    }

    pub async fn set_option(&self, name: &str, value: &str) -> Result<(), EngineError> {
        self.ensure_ready()?;
        self.post(UciCommand::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        self.request(UciCommand::IsReady, Expect::ReadyOk, self.config.command_timeout_ms)
            .await
            .map(|_| ())
    }

    /// Stockfish skill level, clamped to 0..=20
    pub async fn set_skill_level(&self, level: u8) -> Result<(), EngineError> {
        self.set_option("Skill Level", &level.min(20).to_string()).await
    }

    pub async fn new_game(&self) -> Result<(), EngineError> {
        self.ensure_ready()?;
        self.post(UciCommand::UciNewGame)?;
        self.request(UciCommand::IsReady, Expect::ReadyOk, self.config.command_timeout_ms)
            .await
            .map(|_| ())
    }

    fn search_timeout(&self, params: GoParams) -> u64 {
        match params {
            GoParams::Infinite => 0,
            GoParams::MoveTime(ms) => ms + self.config.command_timeout_ms,
            GoParams::Depth(_) => self.config.search_timeout_ms,
        }
    }

    /// Searches `fen` and returns the engine's move.
    ///
    /// Only one search may run at a time; a second call while thinking is rejected.
    pub async fn get_best_move(&self, fen: &str, params: GoParams) -> Result<BestMove, EngineError> {
        {
            let mut state = self.state();
            match state.status {
                BridgeStatus::Uninitialized => return Err(EngineError::NotReady),
                BridgeStatus::Thinking => return Err(EngineError::AlreadyThinking),
                BridgeStatus::Ready => {}
            }
            state.status = BridgeStatus::Thinking;
            state.current_fen = Some(fen.to_string());
            state.thinking_moves.clear();
            state.last_info = None;
        }

        let response = match self.post(UciCommand::Position { fen: fen.to_string() }) {
            Ok(()) => {
                self.request(UciCommand::Go(params), Expect::BestMove, self.search_timeout(params))
                    .await
            }
            Err(e) => Err(e),
        };

        {
            let mut state = self.state();
            if state.status == BridgeStatus::Thinking {
                state.status = BridgeStatus::Ready;
            }
        }
        parse_best_move(&response?)
    }

    /// Full search result: best move plus the last reported score, depth and line
    pub async fn analyze(&self, fen: &str, params: GoParams) -> Result<AnalysisResult, EngineError> {
        let best = self.get_best_move(fen, params).await?;
        let state = self.state();
        let info = state.last_info.clone().unwrap_or_default();
        let evaluation = info
            .score
            .map(|score| Evaluation::from_score(score, state.turn()))
            .unwrap_or(Evaluation::Centipawns(0));
        let pv = if info.pv.is_empty() {
            vec![best.mv.clone()]
        } else {
            info.pv.clone()
        };
        Ok(AnalysisResult {
            best_move: best.mv,
            ponder: best.ponder,
            evaluation,
            depth: info.depth.unwrap_or(0),
            pv,
            time_ms: info.time_ms.unwrap_or(0),
            nodes: info.nodes.unwrap_or(0),
            thinking_moves: state.thinking_moves.clone(),
        })
    }

    /// Current candidate ranking, best first
    pub fn thinking_moves(&self) -> Vec<ThinkingMove> {
        self.state().thinking_moves.clone()
    }

    /// Best-effort cancel of the running search.
    ///
    /// Returns false when nothing was thinking.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        if state.status != BridgeStatus::Thinking {
            return false;
        }
        if let Err(e) = self.post(UciCommand::Stop) {
            warn!(error = %e, "failed to send stop");
        }
        state.status = BridgeStatus::Ready;
        let searches: Vec<String> = state.order.iter().filter(|id| id.starts_with("go")).cloned().collect();
        for id in searches {
            if state.pending.contains_key(&id) {
                state.stale_searches += 1;
            }
            state.reject(&id, EngineError::Stopped);
        }
        info!("search stopped");
        true
    }

    /// Drops all pending work; `initialize` must be called again.
    pub fn terminate(&self) {
        let mut state = self.state();
        state.reject_all(EngineError::Terminated);
        state.thinking_moves.clear();
        state.last_info = None;
        state.stale_searches = 0;
        state.status = BridgeStatus::Uninitialized;
        debug!("bridge terminated");
    }

    /// Terminates, asks the engine to quit and kills the process if there is one.
    pub async fn shutdown(&mut self) {
        self.terminate();
        let _ = self.post(UciCommand::Quit);
        if let Some(mut process) = self.process.take() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            process.kill().await;
        }
    }
}

impl Drop for EngineBridge {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::analysis::MATE_SENTINEL;
    use crate::engine::stockfish::{channel_pair, EngineEndpoint};
    use crate::rules::STARTING_FEN;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn line(s: &str) -> WorkerEvent {
        WorkerEvent::Line(s.to_string())
    }

    /// Scripted engine: replies to each command with the events `script` returns
    fn fake_engine<F>(mut endpoint: EngineEndpoint, script: F) -> JoinHandle<Vec<String>>
    where
        F: Fn(&str) -> Vec<WorkerEvent> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(cmd) = endpoint.commands.recv().await {
                for event in script(&cmd) {
                    let _ = endpoint.events.send(event);
                }
                received.push(cmd);
            }
            received
        })
    }

    fn handshake(cmd: &str) -> Vec<WorkerEvent> {
        match cmd {
            "uci" => vec![line("id name Fake"), line("uciok")],
            "isready" => vec![line("readyok")],
            _ => vec![],
        }
    }

    async fn ready_bridge<F>(script: F) -> EngineBridge
    where
        F: Fn(&str) -> Vec<WorkerEvent> + Send + 'static,
    {
        let (channels, endpoint) = channel_pair();
        fake_engine(endpoint, move |cmd| {
            let mut events = handshake(cmd);
            events.extend(script(cmd));
            events
        });
        let bridge = EngineBridge::new(channels, BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge
    }

    #[tokio::test]
    async fn test_handshake() {
        let bridge = ready_bridge(|_| vec![]).await;
        assert_eq!(bridge.status(), BridgeStatus::Ready);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_best_move_and_ranking() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                vec![
                    line("info depth 10 score cp 35 pv e2e4 e7e5"),
                    line("info depth 12 score cp 20 pv d2d4 d7d5"),
                    line("info depth 12 score cp 50 pv e2e4 c7c5"),
                    line("bestmove e2e4 ponder c7c5"),
                ]
            } else {
                vec![]
            }
        })
        .await;

        let best = bridge.get_best_move(STARTING_FEN, GoParams::Depth(12)).await.unwrap();
        assert_eq!(best.mv, "e2e4");
        assert_eq!(best.ponder.as_deref(), Some("c7c5"));
        assert_eq!(bridge.status(), BridgeStatus::Ready);

        let ranking = bridge.thinking_moves();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].mv.san, "e4");
        assert_eq!(ranking[0].evaluation, 50);
        assert_eq!(ranking[0].pv.len(), 2);
        assert_eq!(ranking[1].mv.san, "d4");
    }

    #[tokio::test]
    async fn test_ranking_keeps_top_five() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                let mut events: Vec<WorkerEvent> = ["a2a3", "b2b3", "c2c3", "d2d3", "e2e3", "f2f3", "g2g3"]
                    .iter()
                    .enumerate()
                    .map(|(i, mv)| line(&format!("info depth 5 score cp {} pv {}", i * 10, mv)))
                    .collect();
                events.push(line("bestmove g2g3"));
                events
            } else {
                vec![]
            }
        })
        .await;

        bridge.get_best_move(STARTING_FEN, GoParams::Depth(5)).await.unwrap();
        let evals: Vec<i32> = bridge.thinking_moves().iter().map(|m| m.evaluation).collect();
        assert_eq!(evals, [60, 50, 40, 30, 20]);
    }

    #[tokio::test]
    async fn test_mate_score_sign() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                vec![line("info depth 20 score mate 3 pv e7e5"), line("bestmove e7e5")]
            } else {
                vec![]
            }
        })
        .await;

        let analysis = bridge.analyze(AFTER_E4, GoParams::Depth(20)).await.unwrap();
        assert_eq!(analysis.evaluation, Evaluation::Mate(-3));
        assert_eq!(analysis.thinking_moves[0].evaluation, -MATE_SENTINEL);
        assert_eq!(analysis.thinking_moves[0].mate_in, Some(-3));
        assert_eq!(analysis.depth, 20);
    }

    #[tokio::test]
    async fn test_missing_best_move_is_an_error() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                vec![line("bestmove (none)")]
            } else {
                vec![]
            }
        })
        .await;
        let result = bridge.get_best_move(STARTING_FEN, GoParams::Depth(1)).await;
        assert!(matches!(result, Err(EngineError::NoBestMove(_))));
        assert_eq!(bridge.status(), BridgeStatus::Ready);
    }

    #[tokio::test]
    async fn test_error_line_rejects() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                vec![line("error: position is corrupt")]
            } else {
                vec![]
            }
        })
        .await;
        let result = bridge.get_best_move(STARTING_FEN, GoParams::Depth(1)).await;
        assert!(matches!(result, Err(EngineError::Reported(_))));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_pending() {
        let (channels, endpoint) = channel_pair();
        fake_engine(endpoint, |cmd| match cmd {
            "uci" => vec![line("uciok")],
            _ => vec![],
        });
        let bridge = EngineBridge::new(channels, BridgeConfig::default());

        let result = bridge.initialize().await;
        assert!(matches!(
            result,
            Err(EngineError::Timeout { timeout_ms: 5_000, .. })
        ));
        assert_eq!(bridge.pending_count(), 0);
        assert_eq!(bridge.status(), BridgeStatus::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_infinite_search_waits_until_stopped() {
        let bridge = ready_bridge(|cmd| {
            if cmd == "go infinite" {
                vec![line("info depth 30 score cp 12 pv g1f3")]
            } else {
                vec![]
            }
        })
        .await;

        let (search, stopped) = tokio::join!(bridge.get_best_move(STARTING_FEN, GoParams::Infinite), async {
            // Well past any command timeout
            tokio::time::sleep(Duration::from_secs(600)).await;
            bridge.stop()
        });
        assert!(stopped);
        assert!(matches!(search, Err(EngineError::Stopped)));
        assert_eq!(bridge.status(), BridgeStatus::Ready);
        assert_eq!(bridge.thinking_moves()[0].mv.san, "Nf3");
        assert!(!bridge.stop());
    }

    #[tokio::test]
    async fn test_stopped_search_reply_does_not_answer_next_search() {
        // The engine acknowledges `stop` late, after the next `go` is already out
        let bridge = ready_bridge(|cmd| {
            if cmd == "go depth 5" {
                vec![
                    line("bestmove g1f3"),
                    line("info depth 5 score cp 10 pv e7e5"),
                    line("bestmove e7e5"),
                ]
            } else {
                vec![]
            }
        })
        .await;

        let (first, ()) = tokio::join!(bridge.get_best_move(STARTING_FEN, GoParams::Infinite), async {
            tokio::task::yield_now().await;
            assert!(bridge.stop());
        });
        assert!(matches!(first, Err(EngineError::Stopped)));

        let second = bridge.get_best_move(AFTER_E4, GoParams::Depth(5)).await.unwrap();
        assert_eq!(second.mv, "e7e5");
        assert_eq!(bridge.status(), BridgeStatus::Ready);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_search_reply_is_dropped() {
        let (channels, endpoint) = channel_pair();
        fake_engine(endpoint, |cmd| match cmd {
            "go depth 30" => vec![],
            "go depth 4" => vec![line("bestmove d2d4"), line("bestmove e7e5")],
            other => handshake(other),
        });
        let config = BridgeConfig {
            search_timeout_ms: 1_000,
            ..BridgeConfig::default()
        };
        let bridge = EngineBridge::new(channels, config);
        bridge.initialize().await.unwrap();

        let first = bridge.get_best_move(STARTING_FEN, GoParams::Depth(30)).await;
        assert!(matches!(first, Err(EngineError::Timeout { .. })));

        let second = bridge.get_best_move(AFTER_E4, GoParams::Depth(4)).await.unwrap();
        assert_eq!(second.mv, "e7e5");
    }

    #[tokio::test]
    async fn test_second_search_rejected_while_thinking() {
        let bridge = ready_bridge(|_| vec![]).await;
        let (first, second) = tokio::join!(bridge.get_best_move(STARTING_FEN, GoParams::Infinite), async {
            let second = bridge.get_best_move(STARTING_FEN, GoParams::Depth(3)).await;
            bridge.stop();
            second
        });
        assert!(matches!(second, Err(EngineError::AlreadyThinking)));
        assert!(matches!(first, Err(EngineError::Stopped)));
    }

    #[tokio::test]
    async fn test_not_ready_before_initialize() {
        let (channels, endpoint) = channel_pair();
        fake_engine(endpoint, handshake);
        let bridge = EngineBridge::new(channels, BridgeConfig::default());
        let result = bridge.get_best_move(STARTING_FEN, GoParams::Depth(1)).await;
        assert!(matches!(result, Err(EngineError::NotReady)));
    }

    #[tokio::test]
    async fn test_crash_rejects_everything() {
        let bridge = ready_bridge(|cmd| {
            if cmd.starts_with("go") {
                vec![WorkerEvent::Crashed("segfault".into())]
            } else {
                vec![]
            }
        })
        .await;
        let result = bridge.get_best_move(STARTING_FEN, GoParams::Depth(8)).await;
        assert!(matches!(result, Err(EngineError::Crashed(_))));
        assert_eq!(bridge.status(), BridgeStatus::Uninitialized);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_terminate_rejects_pending() {
        let bridge = ready_bridge(|_| vec![]).await;
        let (search, ()) = tokio::join!(bridge.get_best_move(STARTING_FEN, GoParams::Infinite), async {
            bridge.terminate()
        });
        assert!(matches!(search, Err(EngineError::Terminated)));
        assert_eq!(bridge.status(), BridgeStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_set_option_round_trip() {
        let (channels, endpoint) = channel_pair();
        let engine = fake_engine(endpoint, handshake);
        let bridge = EngineBridge::new(channels, BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge.set_skill_level(30).await.unwrap();
        drop(bridge);

        let received = engine.await.unwrap();
        assert!(received.contains(&"setoption name Skill Level value 20".to_string()));
    }

    #[tokio::test]
    #[ignore] // Ignore by default - requires stockfish installed
    async fn test_analyze_starting_position() {
        let mut bridge = EngineBridge::spawn("stockfish", BridgeConfig::default()).unwrap();
        bridge.initialize().await.unwrap();
        let analysis = bridge.analyze(STARTING_FEN, GoParams::Depth(10)).await.unwrap();

        assert!(!analysis.best_move.is_empty());
        println!("{}", analysis.summary());
        bridge.shutdown().await;
    }
}
