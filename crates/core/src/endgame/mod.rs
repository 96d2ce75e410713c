//! Endgame classification, material balance and draw-rule detection

mod detector;
mod types;

pub use detector::{analyze_oracle, analyze_position, classify_endgame, is_insufficient_material, material_balance};
pub use types::*;
