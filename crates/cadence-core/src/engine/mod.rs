//! Review Engine
//!
//! Orchestrates one review: per-card lock, load, catalog check, scheduling,
//! validation and write-back. Exactly one store read and one store write per
//! successful review.

mod locks;

pub use locks::KeyedLocks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigError, SchedulerConfig};
use crate::fsrs::{FSRSScheduler, PreviewResults, Rating, SchedulingError};
use crate::memory::{CardId, CardMemoryState, StateError};
use crate::storage::{CardCatalog, ReviewStore, StorageError};

// ============================================================================
// ERRORS
// ============================================================================

/// Review error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Rating outside 1..=4
    #[error("Invalid rating {0}: expected 1 (Again) to 4 (Easy)")]
    InvalidRating(i64),
    /// Stored state fails its invariants or cannot be decoded
    #[error("Invalid state for card {card_id}: {source}")]
    InvalidState {
        card_id: CardId,
        #[source]
        source: StateError,
    },
    /// Review time too close to the end of the representable calendar
    #[error("Due date out of range for card {card_id} reviewed at {now}")]
    DueOutOfRange { card_id: CardId, now: DateTime<Utc> },
    /// Card id unknown to the catalog
    #[error("Card not found: {0}")]
    CardNotFound(CardId),
    /// Store failure, propagated verbatim
    #[error("Store error: {0}")]
    Store(#[from] StorageError),
    /// Rejected configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Review result type
pub type Result<T> = std::result::Result<T, ReviewError>;

impl ReviewError {
    fn scheduling(card_id: &CardId, err: SchedulingError) -> Self {
        match err {
            SchedulingError::InvalidRating(value) => ReviewError::InvalidRating(value),
            SchedulingError::InvalidState(source) => ReviewError::InvalidState {
                card_id: card_id.clone(),
                source,
            },
            SchedulingError::DueOutOfRange(now) => ReviewError::DueOutOfRange {
                card_id: card_id.clone(),
                now,
            },
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// A review as submitted by a caller, rating not yet validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub card_id: CardId,
    pub rating: i64,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Review orchestration over a store and a catalog
///
/// `Send + Sync` whenever the store and catalog are; share it via `Arc`.
pub struct ReviewEngine<S, C> {
    scheduler: FSRSScheduler,
    store: S,
    catalog: C,
    locks: KeyedLocks<CardId>,
}

impl<S: ReviewStore, C: CardCatalog> ReviewEngine<S, C> {
    pub fn new(config: SchedulerConfig, store: S, catalog: C) -> Result<Self> {
        Ok(Self {
            scheduler: FSRSScheduler::new(config)?,
            store,
            catalog,
            locks: KeyedLocks::new(),
        })
    }

    pub fn scheduler(&self) -> &FSRSScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Apply one review at `now` and persist the resulting state
    pub fn review(
        &self,
        card_id: &CardId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<CardMemoryState> {
        self.locks.with_lock(card_id, || -> Result<CardMemoryState> {
            let previous = self.load_state(card_id, now)?;
            self.ensure_card(card_id)?;

            let result = self
                .scheduler
                .review(&previous, rating, now)
                .map_err(|e| ReviewError::scheduling(card_id, e))?;

            result
                .state
                .validate(self.scheduler.config().difficulty_bounds)
                .map_err(|source| ReviewError::InvalidState {
                    card_id: card_id.clone(),
                    source,
                })?;

            self.store.upsert(card_id, &result.state)?;

            info!(
                card_id = %card_id,
                rating = %rating,
                state = %result.state.state,
                due = %result.state.due,
                retrievability = result.retrievability,
                "Review recorded"
            );

            Ok(result.state)
        })
    }

    /// Review at the current wall-clock time
    pub fn review_now(&self, card_id: &CardId, rating: Rating) -> Result<CardMemoryState> {
        self.review(card_id, rating, Utc::now())
    }

    /// Validate a raw request, then review
    pub fn submit(&self, request: &ReviewRequest, now: DateTime<Utc>) -> Result<CardMemoryState> {
        let rating = Rating::try_from(request.rating)
            .map_err(|_| ReviewError::InvalidRating(request.rating))?;
        self.review(&request.card_id, rating, now)
    }

    /// Outcomes of all four ratings; nothing is written
    pub fn preview(&self, card_id: &CardId, now: DateTime<Utc>) -> Result<PreviewResults> {
        let previous = self.load_state(card_id, now)?;
        self.ensure_card(card_id)?;
        self.scheduler
            .preview_reviews(&previous, now)
            .map_err(|e| ReviewError::scheduling(card_id, e))
    }

    /// Probability of recalling the card at `now`; `None` before its first review
    pub fn retrievability(&self, card_id: &CardId, now: DateTime<Utc>) -> Result<Option<f64>> {
        let state = self.load_state(card_id, now)?;
        self.ensure_card(card_id)?;
        Ok(self.scheduler.retrievability(&state, now))
    }

    /// Stored states due at `now`, earliest first
    pub fn due_cards(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CardMemoryState>> {
        Ok(self.store.due(now, limit, offset)?)
    }

    // Stored state, the implicit New state, or a recovered New state
    fn load_state(&self, card_id: &CardId, now: DateTime<Utc>) -> Result<CardMemoryState> {
        let invalid = match self.store.get(card_id) {
            Ok(None) => return Ok(CardMemoryState::new(card_id.clone(), now)),
            Ok(Some(state)) => match state.validate(self.scheduler.config().difficulty_bounds) {
                Ok(()) => return Ok(state),
                Err(source) => source,
            },
            Err(StorageError::InvalidState { source, .. }) => source,
            Err(e) => return Err(e.into()),
        };

        if self.scheduler.config().recover_invalid_state {
            warn!(card_id = %card_id, error = %invalid, "Invalid stored state, treating card as new");
            Ok(CardMemoryState::new(card_id.clone(), now))
        } else {
            Err(ReviewError::InvalidState {
                card_id: card_id.clone(),
                source: invalid,
            })
        }
    }

    fn ensure_card(&self, card_id: &CardId) -> Result<()> {
        if self.catalog.contains_card(card_id)? {
            Ok(())
        } else {
            Err(ReviewError::CardNotFound(card_id.clone()))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
