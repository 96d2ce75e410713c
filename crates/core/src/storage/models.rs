//! Stored records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::GameResult;

/// Key prefix of every saved game
pub const SAVE_PREFIX: &str = "chess.save.";
/// Slot written after each move when auto-save is on
pub const AUTOSAVE_SLOT: &str = "autosave";

pub fn save_key(slot: &str) -> String {
    format!("{SAVE_PREFIX}{slot}")
}

/// Row of the save list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub slot: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub move_count: usize,
    pub result: GameResult,
    pub fen: String,
}
