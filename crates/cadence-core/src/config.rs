//! Scheduler configuration
//!
//! An explicit value handed to the scheduler at construction. It can be built
//! from defaults, from `CADENCE_*` environment variables, or from JSON.
//!
//! | Variable                          | Default     |
//! |-----------------------------------|-------------|
//! | `CADENCE_RETRIEVABILITY_TARGET`   | `0.9`       |
//! | `CADENCE_LEARNING_STEPS`          | `1,10`      |
//! | `CADENCE_RELEARNING_STEPS`        | `10`        |
//! | `CADENCE_MAXIMUM_INTERVAL`        | `36500`     |
//! | `CADENCE_DIFFICULTY_MIN`          | `1.0`       |
//! | `CADENCE_DIFFICULTY_MAX`          | `10.0`      |
//! | `CADENCE_STABILITY_FLOOR`         | `0.001`     |
//! | `CADENCE_FUZZ`                    | `false`     |
//! | `CADENCE_FUZZ_SEED`               | unset       |
//! | `CADENCE_RECOVER_INVALID_STATE`   | `false`     |
//! | `CADENCE_WEIGHTS`                 | FSRS-6      |
//!
//! Step lists are comma-separated minutes; weights are 21 comma-separated floats.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::fsrs::{
    DEFAULT_RETENTION, FSRS6_WEIGHTS, MAX_DIFFICULTY, MAX_STABILITY, MIN_DIFFICULTY,
    MIN_STABILITY,
};

/// Longest review interval a configuration may allow, in days
pub const MAX_INTERVAL_DAYS: u32 = MAX_STABILITY as u32;

/// Configuration error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("retrievability target must be in (0, 1), got {0}")]
    RetrievabilityTarget(f64),
    #[error("{0} ladder must contain at least one step")]
    EmptyLadder(&'static str),
    #[error("{0} ladder steps must be longer than zero minutes")]
    ZeroLengthStep(&'static str),
    #[error("difficulty bounds must satisfy 0 < min < max, got ({min}, {max})")]
    DifficultyBounds { min: f64, max: f64 },
    #[error("stability floor must be finite, positive and below {max}, got {0}", max = MAX_STABILITY)]
    StabilityFloor(f64),
    #[error("maximum interval must be between 1 and {max} days, got {0}", max = MAX_INTERVAL_DAYS)]
    MaximumInterval(u32),
    #[error("invalid weights: {0}")]
    Weights(String),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only scheduling configuration, shared freely across reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// FSRS-6 coefficients w0..w20
    pub weights: [f64; 21],
    /// Review intervals keep predicted recall above this probability
    pub retrievability_target: f64,
    /// Learning ladder delays in minutes
    pub learning_steps: Vec<u32>,
    /// Relearning ladder delays in minutes
    pub relearning_steps: Vec<u32>,
    /// Longest review interval in days
    pub maximum_interval: u32,
    /// Difficulty clamp range (min, max)
    pub difficulty_bounds: (f64, f64),
    /// Lowest stability a lapse can produce
    pub stability_floor: f64,
    /// Add bounded jitter to review intervals
    pub fuzz_enabled: bool,
    /// Makes fuzz a pure function of (seed, card, review time)
    pub fuzz_seed: Option<u64>,
    /// Treat stored states that fail validation as New instead of failing
    pub recover_invalid_state: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            weights: FSRS6_WEIGHTS,
            retrievability_target: DEFAULT_RETENTION,
            learning_steps: vec![1, 10],
            relearning_steps: vec![10],
            maximum_interval: 36500,
            difficulty_bounds: (MIN_DIFFICULTY, MAX_DIFFICULTY),
            stability_floor: MIN_STABILITY,
            fuzz_enabled: false,
            fuzz_seed: None,
            recover_invalid_state: false,
        }
    }
}

impl SchedulerConfig {
    /// Load from `CADENCE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults. Values that fail to parse are logged and
    /// ignored; the assembled configuration must still pass [`Self::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(target) = parse_var(&lookup, "CADENCE_RETRIEVABILITY_TARGET") {
            config.retrievability_target = target;
        }
        if let Some(steps) = parse_list(&lookup, "CADENCE_LEARNING_STEPS") {
            config.learning_steps = steps;
        }
        if let Some(steps) = parse_list(&lookup, "CADENCE_RELEARNING_STEPS") {
            config.relearning_steps = steps;
        }
        if let Some(days) = parse_var(&lookup, "CADENCE_MAXIMUM_INTERVAL") {
            config.maximum_interval = days;
        }
        if let Some(min) = parse_var(&lookup, "CADENCE_DIFFICULTY_MIN") {
            config.difficulty_bounds.0 = min;
        }
        if let Some(max) = parse_var(&lookup, "CADENCE_DIFFICULTY_MAX") {
            config.difficulty_bounds.1 = max;
        }
        if let Some(floor) = parse_var(&lookup, "CADENCE_STABILITY_FLOOR") {
            config.stability_floor = floor;
        }
        if let Some(enabled) = parse_flag(&lookup, "CADENCE_FUZZ") {
            config.fuzz_enabled = enabled;
        }
        if let Some(seed) = parse_var(&lookup, "CADENCE_FUZZ_SEED") {
            config.fuzz_seed = Some(seed);
        }
        if let Some(recover) = parse_flag(&lookup, "CADENCE_RECOVER_INVALID_STATE") {
            config.recover_invalid_state = recover;
        }
        if let Some(weights) = parse_list::<f64, _>(&lookup, "CADENCE_WEIGHTS") {
            match <[f64; 21]>::try_from(weights.as_slice()) {
                Ok(weights) => config.weights = weights,
                Err(_) => tracing::warn!(
                    count = weights.len(),
                    "Ignoring CADENCE_WEIGHTS: expected 21 values"
                ),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let target = self.retrievability_target;
        if !(target > 0.0 && target < 1.0) {
            return Err(ConfigError::RetrievabilityTarget(target));
        }

        for (name, steps) in [
            ("learning", &self.learning_steps),
            ("relearning", &self.relearning_steps),
        ] {
            if steps.is_empty() {
                return Err(ConfigError::EmptyLadder(name));
            }
            if steps.contains(&0) {
                return Err(ConfigError::ZeroLengthStep(name));
            }
        }

        let (min, max) = self.difficulty_bounds;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min < max) {
            return Err(ConfigError::DifficultyBounds { min, max });
        }

        let floor = self.stability_floor;
        if !(floor.is_finite() && floor > 0.0 && floor < MAX_STABILITY) {
            return Err(ConfigError::StabilityFloor(self.stability_floor));
        }

        if !(1..=MAX_INTERVAL_DAYS).contains(&self.maximum_interval) {
            return Err(ConfigError::MaximumInterval(self.maximum_interval));
        }

        if let Some(i) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(ConfigError::Weights(format!("w{} is not finite", i)));
        }
        if self.weights[..4].iter().any(|&w| w <= 0.0) {
            return Err(ConfigError::Weights(
                "initial stabilities w0-w3 must be positive".to_string(),
            ));
        }
        if self.weights[20] <= 0.0 {
            return Err(ConfigError::Weights("decay w20 must be positive".to_string()));
        }

        Ok(())
    }

    /// Forgetting curve decay (w20)
    pub fn decay(&self) -> f64 {
        self.weights[20]
    }

    /// Delay for a 1-based learning ladder step
    pub fn learning_step(&self, step: u32) -> Duration {
        ladder_delay(&self.learning_steps, step)
    }

    /// Delay for a 1-based relearning ladder step
    pub fn relearning_step(&self, step: u32) -> Duration {
        ladder_delay(&self.relearning_steps, step)
    }
}

// Steps past the end reuse the last delay
fn ladder_delay(steps: &[u32], step: u32) -> Duration {
    let index = step.saturating_sub(1) as usize;
    let minutes = steps.get(index).or(steps.last()).copied().unwrap_or(0);
    Duration::minutes(i64::from(minutes))
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

fn parse_list<T, F>(lookup: &F, key: &str) -> Option<Vec<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let parsed: Result<Vec<T>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    match parsed {
        Ok(values) => Some(values),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration list");
            None
        }
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration flag");
            None
        }
    }
}
