//! FSRS-6 numeric model
//!
//! Pure functions only: the forgetting curve, initial parameters, and the
//! difficulty/stability update rules. All `*_with_weights` variants take the
//! 21-weight vector explicitly; the plain variants use [`FSRS6_WEIGHTS`].

use rand::Rng;

use super::Rating;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Published FSRS-6 default weights (w0..w20)
///
/// | Index   | Role                                            |
/// |---------|-------------------------------------------------|
/// | w0-w3   | Initial stability for Again/Hard/Good/Easy      |
/// | w4-w5   | Initial difficulty                              |
/// | w6-w7   | Difficulty delta and mean reversion             |
/// | w8-w10  | Stability growth on successful recall           |
/// | w11-w14 | Post-lapse stability                            |
/// | w15-w16 | Hard penalty / Easy bonus                       |
/// | w17-w19 | Short-term (same-day) stability                 |
/// | w20     | Forgetting curve decay                          |
pub const FSRS6_WEIGHTS: [f64; 21] = [
    0.212, 1.2931, 2.3065, 8.2956, 6.4133, 0.8334, 3.0194, 0.001, 1.8722, 0.1666, 0.796, 1.4835,
    0.0614, 0.2629, 1.6483, 0.6014, 1.8729, 0.5425, 0.0912, 0.0658, 0.1542,
];

/// Default target probability of recall at the due date
pub const DEFAULT_RETENTION: f64 = 0.9;

/// Default forgetting curve decay (w20)
pub const DEFAULT_DECAY: f64 = 0.1542;

pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Lowest stability any update may produce
pub const MIN_STABILITY: f64 = 0.001;

/// One hundred years
pub const MAX_STABILITY: f64 = 36500.0;

/// Reference retrievability that defines stability
const STABILITY_REFERENCE: f64 = 0.9;

/// Fuzz bands: (start day, end day, fraction of the band added to the jitter)
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

// ============================================================================
// FORGETTING CURVE
// ============================================================================

/// Curve scale such that R(S) = 0.9 for any decay
#[inline]
fn curve_factor(decay: f64) -> f64 {
    STABILITY_REFERENCE.powf(-1.0 / decay) - 1.0
}

/// Probability of recall after `elapsed_days` with the default decay
pub fn retrievability(stability: f64, elapsed_days: f64) -> f64 {
    retrievability_with_decay(stability, elapsed_days, DEFAULT_DECAY)
}

/// R = (1 + FACTOR * t / S)^(-decay)
///
/// Exactly 1.0 at `t <= 0`; strictly decreasing in `t` and strictly
/// increasing in `S` for any positive decay.
pub fn retrievability_with_decay(stability: f64, elapsed_days: f64, decay: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 1.0;
    }
    let stability = stability.max(MIN_STABILITY);
    (1.0 + curve_factor(decay) * elapsed_days / stability).powf(-decay)
}

/// Days until retrievability falls to `desired_retention`, unrounded
pub fn next_interval(stability: f64, desired_retention: f64) -> f64 {
    next_interval_with_decay(stability, desired_retention, DEFAULT_DECAY)
}

/// t = S / FACTOR * (R^(-1/decay) - 1)
pub fn next_interval_with_decay(stability: f64, desired_retention: f64, decay: f64) -> f64 {
    stability / curve_factor(decay) * (desired_retention.powf(-1.0 / decay) - 1.0)
}

// ============================================================================
// INITIAL PARAMETERS
// ============================================================================

pub fn initial_stability(rating: Rating) -> f64 {
    initial_stability_with_weights(rating, &FSRS6_WEIGHTS)
}

/// S0 = w[G-1]
pub fn initial_stability_with_weights(rating: Rating, weights: &[f64; 21]) -> f64 {
    weights[rating.index()].max(MIN_STABILITY)
}

/// Initial difficulty clamped to the default bounds
pub fn initial_difficulty(rating: Rating) -> f64 {
    clamp_difficulty(
        initial_difficulty_with_weights(rating, &FSRS6_WEIGHTS),
        (MIN_DIFFICULTY, MAX_DIFFICULTY),
    )
}

/// D0 = w4 - e^(w5 * (G - 1)) + 1, unclamped.
///
/// Mean reversion targets the unclamped Easy value, so clamping is left to callers.
pub fn initial_difficulty_with_weights(rating: Rating, weights: &[f64; 21]) -> f64 {
    weights[4] - (weights[5] * (rating.grade() - 1.0)).exp() + 1.0
}

#[inline]
pub fn clamp_difficulty(difficulty: f64, bounds: (f64, f64)) -> f64 {
    difficulty.max(bounds.0).min(bounds.1)
}

#[inline]
pub fn clamp_stability(stability: f64, floor: f64) -> f64 {
    stability.max(floor).min(MAX_STABILITY)
}

// ============================================================================
// UPDATE RULES
// ============================================================================

pub fn next_difficulty(difficulty: f64, rating: Rating) -> f64 {
    next_difficulty_with_weights(
        difficulty,
        rating,
        &FSRS6_WEIGHTS,
        (MIN_DIFFICULTY, MAX_DIFFICULTY),
    )
}

/// Linear-damped delta followed by mean reversion towards D0(Easy)
pub fn next_difficulty_with_weights(
    difficulty: f64,
    rating: Rating,
    weights: &[f64; 21],
    bounds: (f64, f64),
) -> f64 {
    let (min, max) = bounds;
    let delta = -weights[6] * (rating.grade() - 3.0);
    let damped = difficulty + delta * (max - difficulty) / (max - min);
    let target = initial_difficulty_with_weights(Rating::Easy, weights);
    let reverted = weights[7] * target + (1.0 - weights[7]) * damped;
    clamp_difficulty(reverted, bounds)
}

pub fn next_recall_stability(difficulty: f64, stability: f64, retrievability: f64, rating: Rating) -> f64 {
    next_recall_stability_with_weights(difficulty, stability, retrievability, rating, &FSRS6_WEIGHTS)
}

/// Stability after a successful review.
///
/// Growth is larger when recall was less likely, when the card is easier,
/// and for Easy ratings; Hard is penalized by w15.
pub fn next_recall_stability_with_weights(
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    rating: Rating,
    weights: &[f64; 21],
) -> f64 {
    let hard_penalty = if rating == Rating::Hard { weights[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { weights[16] } else { 1.0 };

    let growth = weights[8].exp()
        * (11.0 - difficulty).max(0.0)
        * stability.powf(-weights[9])
        * ((weights[10] * (1.0 - retrievability)).exp() - 1.0)
        * hard_penalty
        * easy_bonus;

    stability * (1.0 + growth)
}

pub fn next_forget_stability(difficulty: f64, stability: f64, retrievability: f64) -> f64 {
    next_forget_stability_with_weights(difficulty, stability, retrievability, &FSRS6_WEIGHTS)
}

/// Stability after a lapse; never above the pre-lapse value
pub fn next_forget_stability_with_weights(
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    weights: &[f64; 21],
) -> f64 {
    let long_term = weights[11]
        * difficulty.powf(-weights[12])
        * ((stability + 1.0).powf(weights[13]) - 1.0)
        * (weights[14] * (1.0 - retrievability)).exp();
    let short_term = stability / (weights[17] * weights[18]).exp();
    long_term.min(short_term)
}

pub fn same_day_stability(stability: f64, rating: Rating) -> f64 {
    same_day_stability_with_weights(stability, rating, &FSRS6_WEIGHTS)
}

/// Short-term stability: S * e^(w17 * (G - 3 + w18)) * S^(-w19).
///
/// Good and Easy never reduce stability.
pub fn same_day_stability_with_weights(stability: f64, rating: Rating, weights: &[f64; 21]) -> f64 {
    let mut increase =
        (weights[17] * (rating.grade() - 3.0 + weights[18])).exp() * stability.powf(-weights[19]);
    if matches!(rating, Rating::Good | Rating::Easy) {
        increase = increase.max(1.0);
    }
    stability * increase
}

// ============================================================================
// FUZZ
// ============================================================================

/// Spread a review interval (whole days) over a band that widens with length.
///
/// Intervals under 2.5 days are returned unchanged; fuzzed results stay
/// within `[2, maximum_interval]`.
pub fn fuzz_interval<R: Rng>(interval_days: u32, maximum_interval: u32, rng: &mut R) -> u32 {
    let interval = f64::from(interval_days);
    if interval < 2.5 {
        return interval_days;
    }

    let delta = FUZZ_RANGES
        .iter()
        .map(|&(start, end, factor)| factor * (interval.min(end) - start).max(0.0))
        .sum::<f64>()
        + 1.0;

    let max_ivl = ((interval + delta).round() as u32).min(maximum_interval);
    let min_ivl = ((interval - delta).round() as u32).max(2).min(max_ivl);

    rng.gen_range(min_ivl..=max_ivl)
}

// ============================================================================
// TESTS
// ============================================================================
