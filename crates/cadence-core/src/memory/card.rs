//! Card Memory State - the persisted scheduling record of one flashcard
//!
//! Each record carries:
//! - The learning phase as a tagged variant (ladder steps live inside the variant)
//! - FSRS-6 stability and difficulty
//! - Due and last-review timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fsrs::MIN_STABILITY;

// ============================================================================
// CARD IDENTIFIER
// ============================================================================

/// Opaque card identifier shared with the card catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh UUID v4 identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Catalogs with integer primary keys
impl From<i64> for CardId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// LEARNING STATE
// ============================================================================

/// Phase of a card in the scheduling state machine
///
/// `New → Learning → Review`, with `Review ⇄ Relearning` on lapse and recovery.
/// Ladder steps are 1-based and only exist in the two ladder phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LearningState {
    /// Never reviewed
    #[default]
    New,
    /// Climbing the initial learning ladder
    Learning { step: u32 },
    /// Graduated; scheduled by the forgetting curve
    Review,
    /// Climbing the relearning ladder after a lapse
    Relearning { step: u32 },
}

impl LearningState {
    /// Integer code used by persistent stores
    pub fn code(&self) -> i64 {
        match self {
            LearningState::New => 0,
            LearningState::Learning { .. } => 1,
            LearningState::Review => 2,
            LearningState::Relearning { .. } => 3,
        }
    }

    /// Ladder step, if the card is on a ladder
    pub fn step(&self) -> Option<u32> {
        match self {
            LearningState::Learning { step } | LearningState::Relearning { step } => Some(*step),
            LearningState::New | LearningState::Review => None,
        }
    }

    /// Whether the card is on the learning or relearning ladder
    pub fn is_ladder(&self) -> bool {
        self.step().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningState::New => "new",
            LearningState::Learning { .. } => "learning",
            LearningState::Review => "review",
            LearningState::Relearning { .. } => "relearning",
        }
    }

    /// Rebuild a state from its stored code and step column
    pub fn from_parts(code: i64, step: Option<i64>) -> Result<Self, StateError> {
        let ladder_step = |step: Option<i64>| -> Result<u32, StateError> {
            match step {
                Some(s) if s >= 1 => u32::try_from(s).map_err(|_| StateError::StepMismatch { code, step: Some(s) }),
                other => Err(StateError::StepMismatch { code, step: other }),
            }
        };

        match code {
            0 if step.is_none() => Ok(LearningState::New),
            1 => Ok(LearningState::Learning { step: ladder_step(step)? }),
            2 if step.is_none() => Ok(LearningState::Review),
            3 => Ok(LearningState::Relearning { step: ladder_step(step)? }),
            0 | 2 => Err(StateError::StepMismatch { code, step }),
            _ => Err(StateError::UnknownState(code)),
        }
    }
}

impl std::fmt::Display for LearningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step() {
            Some(step) => write!(f, "{}[{}]", self.as_str(), step),
            None => f.write_str(self.as_str()),
        }
    }
}

// ============================================================================
// INVARIANT VIOLATIONS
// ============================================================================

/// Why a card memory state is not acceptable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("unrecognized learning state code {0}")]
    UnknownState(i64),
    #[error("step {step:?} is not valid for learning state code {code}")]
    StepMismatch { code: i64, step: Option<i64> },
    #[error("ladder step must be at least 1")]
    ZeroStep,
    #[error("stability must be finite and positive, got {0}")]
    InvalidStability(f64),
    #[error("difficulty {value} outside bounds [{min}, {max}]")]
    DifficultyOutOfBounds { value: f64, min: f64, max: f64 },
    #[error("due {due} precedes last review {last_review}")]
    DueBeforeLastReview {
        due: DateTime<Utc>,
        last_review: DateTime<Utc>,
    },
    #[error("new card carries a last review timestamp")]
    NewWithLastReview,
    #[error("reviewed card has no last review timestamp")]
    MissingLastReview,
}

// ============================================================================
// CARD MEMORY STATE
// ============================================================================

/// Scheduling record of one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMemoryState {
    pub card_id: CardId,
    pub state: LearningState,
    /// Days until recall probability decays to 90%
    pub stability: f64,
    /// Intrinsic hardness, clamped to the configured bounds
    pub difficulty: f64,
    /// Next scheduled presentation
    pub due: DateTime<Utc>,
    /// Most recent review; `None` only before the first review
    pub last_review: Option<DateTime<Utc>>,
}

impl CardMemoryState {
    /// Implicit state of a card that has never been reviewed.
    ///
    /// Stability and difficulty are placeholders until the first review
    /// initializes them from the rating.
    pub fn new(card_id: CardId, now: DateTime<Utc>) -> Self {
        Self {
            card_id,
            state: LearningState::New,
            stability: MIN_STABILITY,
            difficulty: 5.0,
            due: now,
            last_review: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == LearningState::New
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    /// Fractional days since the last review, never negative
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        match self.last_review {
            Some(last) => ((now - last).num_milliseconds() as f64 / 86_400_000.0).max(0.0),
            None => 0.0,
        }
    }

    /// Check the record invariants against the given difficulty bounds
    pub fn validate(&self, difficulty_bounds: (f64, f64)) -> Result<(), StateError> {
        if !self.stability.is_finite() || self.stability <= 0.0 {
            return Err(StateError::InvalidStability(self.stability));
        }

        if self.state.step() == Some(0) {
            return Err(StateError::ZeroStep);
        }

        match (self.state, self.last_review) {
            // Placeholder difficulty on new cards is never persisted by the engine
            (LearningState::New, None) => Ok(()),
            (LearningState::New, Some(_)) => Err(StateError::NewWithLastReview),
            (_, None) => Err(StateError::MissingLastReview),
            (_, Some(last_review)) => {
                let (min, max) = difficulty_bounds;
                if !(min..=max).contains(&self.difficulty) {
                    return Err(StateError::DifficultyOutOfBounds {
                        value: self.difficulty,
                        min,
                        max,
                    });
                }
                if self.due < last_review {
                    return Err(StateError::DueBeforeLastReview {
                        due: self.due,
                        last_review,
                    });
                }
                Ok(())
            }
        }
    }
}
