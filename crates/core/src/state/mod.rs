//! Canonical game state and saved games

mod manager;
mod types;

pub use manager::{Checkpoint, GameStateManager};
pub use types::GameState;
