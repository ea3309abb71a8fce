//! Storage Module
//!
//! Persistence contracts for card memory states plus two adapters:
//! - `ReviewStore`: one memory state per card id, replaced on every review
//! - `CardCatalog`: answers whether a card exists at all
//! - `InMemoryStore`: lock-guarded maps for tests and embedders
//! - `SqliteStore`: rusqlite with WAL, versioned migrations and cascade deletes

mod memory;
mod migrations;
mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::memory::{CardId, CardMemoryState, StateError};

pub use memory::InMemoryStore;
pub use migrations::MIGRATIONS;
pub use sqlite::SqliteStore;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Stored record cannot be decoded into a card memory state
    #[error("Invalid stored state for card {card_id}: {source}")]
    InvalidState {
        card_id: CardId,
        #[source]
        source: StateError,
    },
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// CONTRACTS
// ============================================================================

/// Persists exactly one card memory state per card id
///
/// Each call must be atomic for its card id. Serializing read-modify-write
/// sequences is the caller's job.
pub trait ReviewStore: Send + Sync {
    /// Stored state, or `None` for a card that has never been reviewed
    fn get(&self, card_id: &CardId) -> Result<Option<CardMemoryState>>;

    /// Insert or fully replace the stored state
    fn upsert(&self, card_id: &CardId, state: &CardMemoryState) -> Result<()>;

    /// States with `due <= now`, earliest first
    fn due(&self, now: DateTime<Utc>, limit: usize, offset: usize) -> Result<Vec<CardMemoryState>>;
}

/// Answers whether a card id refers to an existing card
pub trait CardCatalog: Send + Sync {
    fn contains_card(&self, card_id: &CardId) -> Result<bool>;
}

impl<T: ReviewStore + ?Sized> ReviewStore for Arc<T> {
    fn get(&self, card_id: &CardId) -> Result<Option<CardMemoryState>> {
        (**self).get(card_id)
    }

    fn upsert(&self, card_id: &CardId, state: &CardMemoryState) -> Result<()> {
        (**self).upsert(card_id, state)
    }

    fn due(&self, now: DateTime<Utc>, limit: usize, offset: usize) -> Result<Vec<CardMemoryState>> {
        (**self).due(now, limit, offset)
    }
}

impl<T: CardCatalog + ?Sized> CardCatalog for Arc<T> {
    fn contains_card(&self, card_id: &CardId) -> Result<bool> {
        (**self).contains_card(card_id)
    }
}
