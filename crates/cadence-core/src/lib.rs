//! # Cadence Core
//!
//! Spaced-repetition scheduling engine for flashcards:
//!
//! - **FSRS-6**: 21-parameter memory model (stability, difficulty, power-law forgetting curve)
//! - **Learning State Machine**: New → Learning → Review, with Relearning after a lapse
//! - **Configurable Ladders**: learning/relearning step delays, retention target, interval cap
//! - **Seedable Fuzz**: optional interval spread, reproducible per (seed, card, review time)
//! - **Per-Card Serialization**: keyed locks around every read-modify-write
//! - **Storage Adapters**: in-memory and SQLite (WAL, versioned migrations, cascade deletes)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadence_core::prelude::*;
//!
//! // Open storage (uses default platform-specific location)
//! let store = Arc::new(SqliteStore::new(None)?);
//! let card = store.create_card(Some("spanish"))?;
//!
//! let engine = ReviewEngine::new(SchedulerConfig::from_env()?, Arc::clone(&store), store)?;
//!
//! // First review puts the card on the learning ladder
//! let state = engine.review_now(&card, Rating::Good)?;
//! println!("next due {}", state.due);
//!
//! // How likely is the card to be recalled right now?
//! let r = engine.retrievability(&card, chrono::Utc::now())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): compile SQLite from source via rusqlite

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod engine;
pub mod fsrs;
pub mod memory;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Card types
pub use memory::{CardId, CardMemoryState, LearningState, ReviewStats, StateError};

// FSRS-6 algorithm
pub use fsrs::{
    retrievability,
    retrievability_with_decay,
    FSRSScheduler,
    MemoryUpdate,
    PreviewResults,
    Rating,
    ReviewResult,
    SchedulingError,
    DEFAULT_DECAY,
    DEFAULT_RETENTION,
    FSRS6_WEIGHTS,
};

// Configuration
pub use config::{ConfigError, SchedulerConfig, MAX_INTERVAL_DAYS};

// Storage layer
pub use storage::{CardCatalog, InMemoryStore, ReviewStore, SqliteStore, StorageError};

// Orchestration
pub use engine::{ReviewEngine, ReviewError, ReviewRequest, Result};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// FSRS algorithm version (6 = 21 parameters)
pub const FSRS_VERSION: u8 = 6;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        CardCatalog, CardId, CardMemoryState, FSRSScheduler, InMemoryStore, LearningState,
        Rating, Result, ReviewEngine, ReviewError, ReviewRequest, ReviewStore, SchedulerConfig,
        SqliteStore, StorageError,
    };
}
