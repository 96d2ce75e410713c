//! Chess orchestration core
//!
//! A rules oracle over shakmaty, notation and PGN, a move history log, an
//! endgame detector, a UCI engine bridge and the [`Orchestrator`] that keeps
//! them consistent behind one API.

pub mod config;
pub mod endgame;
pub mod engine;
pub mod error;
pub mod history;
pub mod notation;
pub mod orchestrator;
pub mod rules;
pub mod serde_chess;
pub mod state;
pub mod storage;

pub use config::OrchestratorConfig;
pub use endgame::{EndgameAnalysis, EndgameType};
pub use engine::{AnalysisResult, EngineBridge, EngineError, Evaluation, GoParams, ThinkingMove};
pub use error::{Error, Result};
pub use history::{MoveHistoryEntry, MoveHistoryManager};
pub use orchestrator::{
    EventKind, GameMode, IntegrationError, IntegrationErrorKind, MoveRequest, MoveResult, Orchestrator,
    OrchestratorEvent, SyncReport,
};
pub use rules::{ChessMove, EndReason, GameResult, GameStatus, MoveError, RulesOracle, STARTING_FEN};
pub use state::{GameState, GameStateManager};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
