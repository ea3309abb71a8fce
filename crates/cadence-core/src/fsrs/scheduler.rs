//! FSRS-6 state machine
//!
//! Turns a previous card state plus a rating into the next state and its due
//! timestamp. Pure: no storage access, and deterministic unless unseeded fuzz
//! is enabled.

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::algorithm::{
    clamp_difficulty, clamp_stability, fuzz_interval, initial_difficulty_with_weights,
    initial_stability_with_weights, next_difficulty_with_weights,
    next_forget_stability_with_weights, next_interval_with_decay,
    next_recall_stability_with_weights, retrievability_with_decay,
    same_day_stability_with_weights,
};
use crate::config::{ConfigError, SchedulerConfig};
use crate::memory::{CardId, CardMemoryState, LearningState, StateError};

// ============================================================================
// ERRORS
// ============================================================================

/// Scheduling error; every variant is a caller or data bug, never transient
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid rating {0}: expected 1 (Again) to 4 (Easy)")]
    InvalidRating(i64),
    #[error("invalid card state: {0}")]
    InvalidState(#[from] StateError),
    #[error("due date for a review at {0} is out of range")]
    DueOutOfRange(DateTime<Utc>),
}

// ============================================================================
// RATING
// ============================================================================

/// Self-reported recall quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rating {
    /// Forgot; a lapse when the card is in Review
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Numeric grade G used by the formulas
    pub(crate) fn grade(self) -> f64 {
        f64::from(self as u8)
    }

    /// Index into w0..w3
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<i64> for Rating {
    type Error = SchedulingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        i32::try_from(value)
            .ok()
            .and_then(Rating::from_i32)
            .ok_or(SchedulingError::InvalidRating(value))
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        };
        f.write_str(name)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// New memory parameters before a due date is attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUpdate {
    pub state: LearningState,
    pub stability: f64,
    pub difficulty: f64,
    /// Predicted recall probability at review time; `None` for new cards
    pub retrievability: Option<f64>,
}

/// Outcome of scheduling one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub state: CardMemoryState,
    /// Time until the card is due again
    #[serde(with = "duration_seconds")]
    pub interval: Duration,
    pub retrievability: Option<f64>,
    pub elapsed_days: f64,
}

/// Outcomes for every rating, without committing any of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResults {
    pub again: ReviewResult,
    pub hard: ReviewResult,
    pub good: ReviewResult,
    pub easy: ReviewResult,
}

impl PreviewResults {
    pub fn get(&self, rating: Rating) -> &ReviewResult {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// FSRS-6 scheduler over an explicit, validated configuration
#[derive(Debug, Clone)]
pub struct FSRSScheduler {
    config: SchedulerConfig,
}

impl Default for FSRSScheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }
}

impl FSRSScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current recall probability of a reviewed card; `None` before the first review
    pub fn retrievability(&self, state: &CardMemoryState, now: DateTime<Utc>) -> Option<f64> {
        if state.is_new() {
            return None;
        }
        Some(retrievability_with_decay(
            state.stability,
            state.elapsed_days(now),
            self.config.decay(),
        ))
    }

    /// Difficulty/stability update and phase transition
    pub fn next_memory(
        &self,
        previous: &CardMemoryState,
        rating: Rating,
        elapsed_days: f64,
    ) -> MemoryUpdate {
        let weights = &self.config.weights;
        let bounds = self.config.difficulty_bounds;
        let floor = self.config.stability_floor;
        let decay = self.config.decay();

        match previous.state {
            LearningState::New => MemoryUpdate {
                state: LearningState::Learning { step: 1 },
                stability: clamp_stability(initial_stability_with_weights(rating, weights), floor),
                difficulty: clamp_difficulty(
                    initial_difficulty_with_weights(rating, weights),
                    bounds,
                ),
                retrievability: None,
            },

            LearningState::Learning { step } | LearningState::Relearning { step } => {
                let difficulty =
                    next_difficulty_with_weights(previous.difficulty, rating, weights, bounds);

                // A lapse inside the ladder only restarts the ladder; any step
                // past the end graduates
                let (stability, step) = match rating {
                    Rating::Again => (previous.stability, 1),
                    _ => (
                        same_day_stability_with_weights(previous.stability, rating, weights),
                        step.saturating_add(1),
                    ),
                };

                let relearning = matches!(previous.state, LearningState::Relearning { .. });
                let ladder_len = if relearning {
                    self.config.relearning_steps.len()
                } else {
                    self.config.learning_steps.len()
                };

                let state = if step as usize > ladder_len {
                    LearningState::Review
                } else if relearning {
                    LearningState::Relearning { step }
                } else {
                    LearningState::Learning { step }
                };

                MemoryUpdate {
                    state,
                    stability: clamp_stability(stability, floor),
                    difficulty,
                    retrievability: Some(retrievability_with_decay(
                        previous.stability,
                        elapsed_days,
                        decay,
                    )),
                }
            }

            LearningState::Review => {
                let r = retrievability_with_decay(previous.stability, elapsed_days, decay);
                let difficulty =
                    next_difficulty_with_weights(previous.difficulty, rating, weights, bounds);

                let (state, stability) = match rating {
                    Rating::Again => (
                        LearningState::Relearning { step: 1 },
                        next_forget_stability_with_weights(
                            previous.difficulty,
                            previous.stability,
                            r,
                            weights,
                        ),
                    ),
                    _ if elapsed_days < 1.0 => (
                        LearningState::Review,
                        same_day_stability_with_weights(previous.stability, rating, weights),
                    ),
                    _ => (
                        LearningState::Review,
                        next_recall_stability_with_weights(
                            previous.difficulty,
                            previous.stability,
                            r,
                            rating,
                            weights,
                        ),
                    ),
                };

                MemoryUpdate {
                    state,
                    stability: clamp_stability(stability, floor),
                    difficulty,
                    retrievability: Some(r),
                }
            }
        }
    }

    /// Schedule one review at `now`
    pub fn review(
        &self,
        previous: &CardMemoryState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult, SchedulingError> {
        previous.validate(self.config.difficulty_bounds)?;

        let elapsed_days = previous.elapsed_days(now);
        let update = self.next_memory(previous, rating, elapsed_days);
        let interval = self.interval(&previous.card_id, update.state, update.stability, now);

        let state = CardMemoryState {
            card_id: previous.card_id.clone(),
            state: update.state,
            stability: update.stability,
            difficulty: update.difficulty,
            due: now
                .checked_add_signed(interval)
                .ok_or(SchedulingError::DueOutOfRange(now))?,
            last_review: Some(now),
        };

        debug!(
            card_id = %state.card_id,
            rating = %rating,
            from = %previous.state,
            to = %state.state,
            stability = state.stability,
            difficulty = state.difficulty,
            interval_minutes = interval.num_minutes(),
            "Scheduled review"
        );

        Ok(ReviewResult {
            state,
            interval,
            retrievability: update.retrievability,
            elapsed_days,
        })
    }

    /// Outcomes for all four ratings at `now`
    pub fn preview_reviews(
        &self,
        previous: &CardMemoryState,
        now: DateTime<Utc>,
    ) -> Result<PreviewResults, SchedulingError> {
        Ok(PreviewResults {
            again: self.review(previous, Rating::Again, now)?,
            hard: self.review(previous, Rating::Hard, now)?,
            good: self.review(previous, Rating::Good, now)?,
            easy: self.review(previous, Rating::Easy, now)?,
        })
    }

    /// Review interval in whole days, before fuzz
    pub fn review_interval_days(&self, stability: f64) -> u32 {
        let days = next_interval_with_decay(
            stability,
            self.config.retrievability_target,
            self.config.decay(),
        )
        .ceil();
        days.clamp(1.0, f64::from(self.config.maximum_interval)) as u32
    }

    fn interval(
        &self,
        card_id: &CardId,
        state: LearningState,
        stability: f64,
        now: DateTime<Utc>,
    ) -> Duration {
        match state {
            LearningState::Learning { step } => self.config.learning_step(step),
            LearningState::Relearning { step } => self.config.relearning_step(step),
            LearningState::Review => {
                let days = self.review_interval_days(stability);
                let days = if self.config.fuzz_enabled {
                    let mut rng = self.fuzz_rng(card_id, now);
                    fuzz_interval(days, self.config.maximum_interval, &mut rng)
                } else {
                    days
                };
                Duration::days(i64::from(days))
            }
            LearningState::New => Duration::zero(),
        }
    }

    // Seeded fuzz depends only on (seed, card, review time)
    fn fuzz_rng(&self, card_id: &CardId, now: DateTime<Utc>) -> StdRng {
        match self.config.fuzz_seed {
            Some(seed) => {
                let mut state = splitmix64(seed);
                for byte in card_id.as_str().bytes() {
                    state = splitmix64(state ^ u64::from(byte));
                }
                state = splitmix64(state ^ now.timestamp_millis() as u64);
                StdRng::seed_from_u64(state)
            }
            None => StdRng::from_entropy(),
        }
    }
}

/// SplitMix64 finalizer, stable across toolchains
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ============================================================================
// TESTS
// ============================================================================
