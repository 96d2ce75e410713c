//! Engine protocol errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Failed to start engine: {0}")]
    Spawn(String),
    #[error("Engine not initialized")]
    NotReady,
    #[error("Engine is already thinking")]
    AlreadyThinking,
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("Engine reported an error: {0}")]
    Reported(String),
    #[error("Engine process failed: {0}")]
    Crashed(String),
    #[error("Search stopped")]
    Stopped,
    #[error("Engine terminated")]
    Terminated,
    #[error("No best move in engine response: {0}")]
    NoBestMove(String),
    #[error("Engine move '{0}' does not fit the position")]
    InvalidMove(String),
}
