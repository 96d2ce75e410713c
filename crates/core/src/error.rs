//! Error types for chess-orchestrator-core

use thiserror::Error;

use crate::engine::EngineError;
use crate::rules::MoveError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PGN parsing error: {0}")]
    Pgn(String),

    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Move rejected: {0}")]
    Move(#[from] MoveError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Engine is not available")]
    EngineUnavailable,

    #[error("State synchronization failed: {0}")]
    Sync(String),

    #[error("Recovery failed: {0}")]
    Recovery(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Orchestrator is not initialized")]
    NotInitialized,

    #[error("Orchestrator has been destroyed")]
    Destroyed,
}

pub type Result<T> = std::result::Result<T, Error>;
