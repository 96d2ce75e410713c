//! Chess engine integration
//!
//! Drives a UCI-compatible engine like Stockfish through an async channel pair.

pub mod analysis;
pub mod bridge;
mod error;
pub mod protocol;
pub mod stockfish;

// Re-export main types for convenience
pub use analysis::{AnalysisResult, Evaluation, ThinkingMove, MATE_SENTINEL};
pub use bridge::{BridgeConfig, BridgeStatus, EngineBridge};
pub use error::EngineError;
pub use protocol::{BestMove, GoParams, InfoLine, Score, UciCommand};
pub use stockfish::{channel_pair, EngineChannels, EngineEndpoint, StockfishProcess, WorkerEvent};
