//! Move history log with navigation, branching and timed replay

mod manager;
mod replay;
mod types;

pub use manager::MoveHistoryManager;
pub use replay::{ReplayOptions, ScheduledTask};
pub use types::*;
