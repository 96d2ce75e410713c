//! Save-file envelopes
//!
//! Stateless functions. Serialization only fails on encoder errors;
//! deserialization never fails past this boundary, it reports an outcome
//! with the errors and warnings it collected.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::history::MoveHistoryEntry;
use crate::notation::validate_fen_syntax;
use crate::state::GameState;

pub const FORMAT_VERSION: &str = "1.0.0";
/// Prefix marking base64 "compressed" payloads
pub const COMPRESSION_MARKER: &str = "CHESS_B64:";

/// One saved game
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnvelope {
    pub version: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub game_state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<MoveHistoryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_index: Option<isize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl GameEnvelope {
    pub fn new(game_state: GameState) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            game_state,
            history: None,
            history_index: None,
            metadata: None,
        }
    }

    pub fn with_history(mut self, entries: Vec<MoveHistoryEntry>, index: isize) -> Self {
        self.history = Some(entries);
        self.history_index = Some(index);
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Several saved games in one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCollection {
    pub version: String,
    pub timestamp: i64,
    pub games: Vec<GameEnvelope>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    pub compress: bool,
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DeserializeOptions {
    pub validate: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

#[derive(Debug, Clone)]
pub struct DeserializeOutcome<T> {
    pub value: Option<T>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl<T> DeserializeOutcome<T> {
    fn failed(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            value: None,
            errors,
            warnings,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }
}

pub fn is_compressed(text: &str) -> bool {
    text.starts_with(COMPRESSION_MARKER)
}

pub fn compress(text: &str) -> String {
    format!("{COMPRESSION_MARKER}{}", STANDARD.encode(text))
}

/// Undoes `compress`; plain text passes through.
pub fn decompress(text: &str) -> std::result::Result<String, String> {
    let Some(encoded) = text.strip_prefix(COMPRESSION_MARKER) else {
        return Ok(text.to_string());
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("payload is not UTF-8: {e}"))
}

fn encode<T: Serialize>(value: &T, options: SerializeOptions) -> Result<String> {
    let json = if options.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(if options.compress { compress(&json) } else { json })
}

pub fn serialize_game(envelope: &GameEnvelope, options: SerializeOptions) -> Result<String> {
    encode(envelope, options)
}

pub fn serialize_collection(games: Vec<GameEnvelope>, options: SerializeOptions) -> Result<String> {
    let collection = GameCollection {
        version: FORMAT_VERSION.to_string(),
        timestamp: Utc::now().timestamp_millis(),
        games,
    };
    encode(&collection, options)
}

fn check_version(root: &Value, warnings: &mut Vec<String>) {
    match root.get("version").and_then(Value::as_str) {
        Some(FORMAT_VERSION) => {}
        Some(other) => warnings.push(format!("version mismatch: expected {FORMAT_VERSION}, found {other}")),
        None => warnings.push("missing version".to_string()),
    }
}

fn validate_game_state(state: Option<&Value>, path: &str, errors: &mut Vec<String>) {
    let Some(state) = state.and_then(Value::as_object) else {
        errors.push(format!("{path}: gameState must be an object"));
        return;
    };
    match state.get("fen").and_then(Value::as_str) {
        Some(fen) => {
            let check = validate_fen_syntax(fen);
            errors.extend(check.errors.into_iter().map(|e| format!("{path}.fen: {e}")));
        }
        None => errors.push(format!("{path}.fen must be a string")),
    }
    if !state.get("moves").is_some_and(Value::is_array) {
        errors.push(format!("{path}.moves must be an array"));
    }
}

fn validate_envelope(root: &Value, path: &str, errors: &mut Vec<String>) {
    if !root.is_object() {
        errors.push(format!("{path}: expected an object"));
        return;
    }
    validate_game_state(root.get("gameState"), &format!("{path}.gameState"), errors);
    if let Some(history) = root.get("history") {
        if !history.is_array() && !history.is_null() {
            errors.push(format!("{path}.history must be an array"));
        }
    }
}

fn parse_root(text: &str, errors: &mut Vec<String>) -> Option<Value> {
    let json = match decompress(text) {
        Ok(json) => json,
        Err(e) => {
            errors.push(e);
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(root) => Some(root),
        Err(e) => {
            errors.push(format!("malformed JSON: {e}"));
            None
        }
    }
}

fn finish<T: DeserializeOwned>(root: Value, errors: Vec<String>, warnings: Vec<String>) -> DeserializeOutcome<T> {
    if !errors.is_empty() {
        return DeserializeOutcome::failed(errors, warnings);
    }
    match serde_json::from_value(root) {
        Ok(value) => DeserializeOutcome {
            value: Some(value),
            errors,
            warnings,
        },
        Err(e) => DeserializeOutcome::failed(vec![format!("invalid structure: {e}")], warnings),
    }
}

pub fn deserialize_game(text: &str, options: DeserializeOptions) -> DeserializeOutcome<GameEnvelope> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let Some(root) = parse_root(text, &mut errors) else {
        return DeserializeOutcome::failed(errors, warnings);
    };
    check_version(&root, &mut warnings);
    if options.validate {
        validate_envelope(&root, "$", &mut errors);
    }
    finish(root, errors, warnings)
}

pub fn deserialize_collection(text: &str, options: DeserializeOptions) -> DeserializeOutcome<Vec<GameEnvelope>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let Some(root) = parse_root(text, &mut errors) else {
        return DeserializeOutcome::failed(errors, warnings);
    };
    check_version(&root, &mut warnings);

    let Some(games) = root.get("games").and_then(Value::as_array) else {
        errors.push("games must be an array".to_string());
        return DeserializeOutcome::failed(errors, warnings);
    };
    if options.validate {
        for (i, game) in games.iter().enumerate() {
            validate_envelope(game, &format!("$.games[{i}]"), &mut errors);
        }
    }
    finish(Value::Array(games.clone()), errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesOracle;
    use crate::state::GameStateManager;
    use crate::storage::MemoryStore;

    fn sample_state() -> GameState {
        let mut oracle = RulesOracle::new();
        oracle.make_san_move("e4").unwrap();
        oracle.make_san_move("c5").unwrap();
        let manager = GameStateManager::new(oracle, Box::new(MemoryStore::new()));
        manager.game_state().clone()
    }

    #[test]
    fn test_round_trip_plain_and_compressed() {
        let envelope = GameEnvelope::new(sample_state());
        for compress in [false, true] {
            let text = serialize_game(&envelope, SerializeOptions { compress, pretty: false }).unwrap();
            assert_eq!(is_compressed(&text), compress);

            let outcome = deserialize_game(&text, DeserializeOptions::default());
            assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
            assert!(outcome.warnings.is_empty());
            let restored = outcome.value.unwrap();
            assert_eq!(restored.game_state.fen, envelope.game_state.fen);
            assert_eq!(restored.game_state.moves.len(), 2);
        }
    }

    #[test]
    fn test_version_mismatch_is_a_warning() {
        let mut envelope = GameEnvelope::new(sample_state());
        envelope.version = "0.9.0".into();
        let text = serialize_game(&envelope, SerializeOptions::default()).unwrap();
        let outcome = deserialize_game(&text, DeserializeOptions::default());
        assert!(outcome.is_ok());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_structural_errors_fail_closed() {
        let null_fen = r#"{"version":"1.0.0","timestamp":0,"gameState":{"fen":null,"moves":[]}}"#;
        let outcome = deserialize_game(null_fen, DeserializeOptions::default());
        assert!(outcome.value.is_none());
        assert!(outcome.errors.iter().any(|e| e.contains("fen")));

        let mut value = serde_json::to_value(GameEnvelope::new(sample_state())).unwrap();
        value["history"] = serde_json::json!({"not": "an array"});
        let outcome = deserialize_game(&value.to_string(), DeserializeOptions::default());
        assert!(outcome.value.is_none());
        assert!(outcome.errors.iter().any(|e| e.contains("history")));

        let outcome = deserialize_game("{ definitely not json", DeserializeOptions::default());
        assert!(outcome.value.is_none());
        assert!(outcome.errors[0].starts_with("malformed JSON"));

        let outcome = deserialize_game("CHESS_B64:%%%", DeserializeOptions::default());
        assert!(outcome.value.is_none());
    }

    #[test]
    fn test_collection() {
        let games = vec![GameEnvelope::new(sample_state()), GameEnvelope::new(sample_state())];
        let text = serialize_collection(games, SerializeOptions::default()).unwrap();
        let outcome = deserialize_collection(&text, DeserializeOptions::default());
        assert_eq!(outcome.value.unwrap().len(), 2);

        let missing = deserialize_collection(r#"{"version":"1.0.0","timestamp":0}"#, DeserializeOptions::default());
        assert!(missing.value.is_none());
        assert_eq!(missing.errors, ["games must be an array"]);
    }
}
