//! FSRS-6 (Free Spaced Repetition Scheduler) Module
//!
//! Numeric memory model plus the learning state machine built on it.
//!
//! Reference: https://github.com/open-spaced-repetition/fsrs4anki
//!
//! ## Core Formulas:
//! - Retrievability: R = (1 + FACTOR * t / S)^(-w20) where FACTOR = 0.9^(-1/w20) - 1
//! - Interval: t = S/FACTOR * (R^(-1/w20) - 1)
//! - Difficulty: linear damping toward the upper bound, then mean reversion toward D0(Easy)
//! - Same-day reviews use the S^(-w19) short-term term

mod algorithm;
mod scheduler;

pub use algorithm::{
    clamp_difficulty,
    clamp_stability,
    fuzz_interval,
    initial_difficulty,
    initial_difficulty_with_weights,
    initial_stability,
    initial_stability_with_weights,
    next_difficulty,
    next_difficulty_with_weights,
    next_forget_stability,
    next_forget_stability_with_weights,
    next_interval,
    next_interval_with_decay,
    next_recall_stability,
    next_recall_stability_with_weights,
    // Core functions
    retrievability,
    retrievability_with_decay,
    same_day_stability,
    same_day_stability_with_weights,
    DEFAULT_DECAY,
    DEFAULT_RETENTION,
    // Constants
    FSRS6_WEIGHTS,
    MAX_DIFFICULTY,
    MAX_STABILITY,
    MIN_DIFFICULTY,
    MIN_STABILITY,
};

pub use scheduler::{
    FSRSScheduler, MemoryUpdate, PreviewResults, Rating, ReviewResult, SchedulingError,
};
