/// Rain-signal evaluation over a 24-hour forecast window.
///
/// Takes the hourly samples produced by the ingest layer, restricts them to
/// the next 24 hours, and applies a threshold policy to derive a single
/// boolean `rain_expected` signal plus diagnostic maxima.
///
/// # Clock injection
/// `window_24h` and `evaluate` accept a `now: NaiveDateTime` parameter
/// rather than reading the system clock, so evaluation is fully
/// deterministic in tests. Open-Meteo hourly timestamps are local
/// wall-clock time at the forecast location, so `now` must be local time
/// there as well.

use crate::model::ForecastSample;
use chrono::{Duration, NaiveDateTime};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How the probability and amount predicates combine into the rain signal.
///
/// The deployed variants of this service disagreed on the predicate; all
/// observed combinations are kept as explicit named policies rather than
/// silently unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainRule {
    /// prob >= threshold OR mm >= threshold. The default.
    ProbabilityOrAmount,
    /// prob >= threshold AND mm >= threshold. Strictest.
    ProbabilityAndAmount,
    /// prob >= threshold only; the mm threshold is ignored.
    ProbabilityOnly,
    /// prob >= threshold OR mm > 0. Any nonzero forecast precipitation
    /// counts, which makes the mm threshold irrelevant on the amount side.
    /// Likely a divergence from the threshold variants rather than a
    /// deliberate choice, but it shipped, so it stays selectable.
    ProbabilityOrAnyAmount,
}

/// Thresholds plus the rule that combines them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainPolicy {
    /// Alert when hourly precipitation probability reaches this percentage.
    pub probability_threshold_pct: u8,
    /// Alert when hourly precipitation reaches this many millimetres.
    pub amount_threshold_mm: f64,
    pub rule: RainRule,
}

impl Default for RainPolicy {
    fn default() -> Self {
        RainPolicy {
            probability_threshold_pct: 50,
            amount_threshold_mm: 0.3,
            rule: RainRule::ProbabilityOrAmount,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Result of evaluating a forecast window against a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rain_expected: bool,
    /// Highest hourly probability in the window, for diagnostics and the
    /// heavy-rain override in the alert layer.
    pub max_probability_pct: u8,
    /// Highest hourly precipitation in the window, in millimetres.
    pub max_precipitation_mm: f64,
    /// How many samples fell inside the window.
    pub sample_count: usize,
}

/// Restricts samples to those falling in `[now, now + 24h]`, inclusive on
/// both ends. Samples are assumed ordered; order is preserved.
pub fn window_24h(samples: &[ForecastSample], now: NaiveDateTime) -> Vec<ForecastSample> {
    let end = now + Duration::hours(24);
    samples
        .iter()
        .filter(|s| s.timestamp >= now && s.timestamp <= end)
        .cloned()
        .collect()
}

/// Evaluates the rain signal over the next 24 hours.
///
/// An empty window evaluates to no rain with zero maxima. The signal is
/// monotonic in both inputs: raising any sample's probability or amount
/// can only turn the signal on, never off.
pub fn evaluate(samples: &[ForecastSample], policy: &RainPolicy, now: NaiveDateTime) -> Evaluation {
    let window = window_24h(samples, now);

    let max_probability_pct = window
        .iter()
        .map(|s| s.precipitation_probability_pct)
        .max()
        .unwrap_or(0);
    let max_precipitation_mm = window
        .iter()
        .map(|s| s.precipitation_mm)
        .fold(0.0_f64, f64::max);

    let prob_hit = window
        .iter()
        .any(|s| s.precipitation_probability_pct >= policy.probability_threshold_pct);
    let amount_hit = window
        .iter()
        .any(|s| s.precipitation_mm >= policy.amount_threshold_mm);
    let any_amount_hit = window.iter().any(|s| s.precipitation_mm > 0.0);

    let rain_expected = match policy.rule {
        RainRule::ProbabilityOrAmount => prob_hit || amount_hit,
        RainRule::ProbabilityAndAmount => prob_hit && amount_hit,
        RainRule::ProbabilityOnly => prob_hit,
        RainRule::ProbabilityOrAnyAmount => prob_hit || any_amount_hit,
    };

    Evaluation {
        rain_expected,
        max_probability_pct,
        max_precipitation_mm,
        sample_count: window.len(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
