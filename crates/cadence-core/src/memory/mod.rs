//! Memory module - Core card types
//!
//! Implements the per-card scheduling record:
//! - Opaque card identifiers shared with the catalog
//! - Tagged learning phases (New, Learning, Review, Relearning)
//! - Stability/difficulty state with invariant checks

mod card;

pub use card::{CardId, CardMemoryState, LearningState, StateError};

use serde::{Deserialize, Serialize};

/// Counts of stored review records by learning phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: i64,
    pub learning: i64,
    pub review: i64,
    pub relearning: i64,
    pub due_now: i64,
}
