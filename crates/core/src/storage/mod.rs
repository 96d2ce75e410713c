//! Key-value persistence and the save-file format

mod db;
mod memory;
mod models;
pub mod serializer;

pub use db::SqliteStore;
pub use memory::MemoryStore;
pub use models::*;

use crate::error::Result;

/// Anything that can hold string values under string keys
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns false when the key did not exist
    fn remove(&mut self, key: &str) -> Result<bool>;
    /// Keys starting with `prefix`, sorted
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
