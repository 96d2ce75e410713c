//! Orchestrator configuration from defaults and environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::BridgeConfig;
use crate::history::HistoryOptions;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Start the engine bridge on initialize
    pub enable_ai: bool,

    /// Path to Stockfish binary
    pub engine_path: String,

    /// Search depth for AI moves
    pub ai_depth: u32,

    /// Fixed think time for AI moves; overrides depth when set
    pub ai_move_time_ms: Option<u64>,

    /// Timeout for engine handshake and option commands
    pub command_timeout_ms: u64,

    /// Skip pre-validation of move requests
    pub skip_validation: bool,

    /// Move history cap, 0 for unlimited
    pub max_history_entries: usize,

    /// Events kept for replay to late subscribers
    pub event_buffer_size: usize,

    /// Integration errors kept in the recovery log
    pub recovery_history_size: usize,

    /// Operations slower than this emit a performance warning
    pub slow_operation_ms: u64,

    /// SQLite file for saved games; in-memory when unset
    pub storage_path: Option<PathBuf>,

    /// Save to the autosave slot after every move
    pub auto_save: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_ai: false,
            engine_path: "stockfish".to_string(),
            ai_depth: 12,
            ai_move_time_ms: None,
            command_timeout_ms: 5_000,
            skip_validation: false,
            max_history_entries: 500,
            event_buffer_size: 100,
            recovery_history_size: 50,
            slow_operation_ms: 100,
            storage_path: None,
            auto_save: false,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with `CHESS_*` environment variables. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("CHESS_ENGINE_PATH") {
            config.engine_path = path;
        }
        if let Some(depth) = parse_var(&lookup, "CHESS_AI_DEPTH") {
            config.ai_depth = depth;
        }
        if let Some(ms) = parse_var(&lookup, "CHESS_AI_MOVETIME_MS") {
            config.ai_move_time_ms = Some(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CHESS_COMMAND_TIMEOUT_MS") {
            config.command_timeout_ms = ms;
        }
        if let Some(path) = lookup("CHESS_STORAGE_PATH").filter(|p| !p.is_empty()) {
            config.storage_path = Some(PathBuf::from(path));
        }
        if let Some(enabled) = parse_var(&lookup, "CHESS_ENABLE_AI") {
            config.enable_ai = enabled;
        }
        if let Some(max) = parse_var(&lookup, "CHESS_MAX_HISTORY") {
            config.max_history_entries = max;
        }
        config
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            command_timeout_ms: self.command_timeout_ms,
            ..BridgeConfig::default()
        }
    }

    pub fn history_options(&self) -> HistoryOptions {
        HistoryOptions {
            max_entries: self.max_history_entries,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
