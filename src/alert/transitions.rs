/// Rain-state transitions and debounce.
///
/// Tracks the committed rain signal across runs and decides when a freshly
/// evaluated signal becomes a notification. The decision function is pure:
/// it takes the previous state and counter and returns the new ones, so the
/// caller (the run pipeline) owns all persistence.
///
/// Transition rules:
///   - First evaluation ever: commit the signal and always notify with the
///     current status, whatever it is.
///   - Signal unchanged: notify nothing.
///   - NO_RAIN → RAIN: without debounce, immediate. With debounce, the raw
///     signal must hold for `need` consecutive runs, unless the forecast
///     peak reaches `immediate_override_mm`, which bypasses the counter.
///   - RAIN → NO_RAIN: always immediate, no counter involved. Missing the
///     end of rain is harmless; missing its start repeatedly is annoying,
///     so only the entry edge is debounced.

use crate::analysis::rain::Evaluation;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Debounce settings for the NO_RAIN → RAIN edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceConfig {
    /// Consecutive raw detections required before committing RAIN.
    /// Must be at least 1; a value of 1 behaves like no debounce.
    pub need: u32,
    /// Forecast peak (max hourly mm) at or above which RAIN commits
    /// immediately, skipping the counter. `None` disables the override.
    pub immediate_override_mm: Option<f64>,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Why a notification fires, so the pipeline can phrase logs accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    /// First run ever; reporting the initial status.
    InitialStatus,
    /// Committed signal flipped NO_RAIN → RAIN.
    RainStarted,
    /// Committed signal flipped RAIN → NO_RAIN.
    RainEnded,
}

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// `Some` when subscribers should be notified this run.
    pub notify: Option<NotifyReason>,
    /// The committed signal to persist.
    pub new_state: bool,
    /// The consecutive-detection counter to persist.
    pub new_counter: u32,
}

/// Applies one evaluation to the stored state.
///
/// `prev_state` and `counter` come from [`PersistedState`]; the returned
/// `Decision` carries their replacements. Pass `debounce: None` for the
/// simple notify-on-every-change behavior.
///
/// [`PersistedState`]: crate::model::PersistedState
pub fn decide(
    prev_state: Option<bool>,
    counter: u32,
    eval: &Evaluation,
    debounce: Option<&DebounceConfig>,
) -> Decision {
    let raw = eval.rain_expected;
    let new_counter = if raw { counter.saturating_add(1) } else { 0 };

    let Some(prev) = prev_state else {
        // First run: commit whatever we see and announce it.
        return Decision {
            notify: Some(NotifyReason::InitialStatus),
            new_state: raw,
            new_counter,
        };
    };

    if prev == raw {
        return Decision { notify: None, new_state: prev, new_counter };
    }

    if !raw {
        // Exit edge is never debounced.
        return Decision {
            notify: Some(NotifyReason::RainEnded),
            new_state: false,
            new_counter,
        };
    }

    // Entry edge: NO_RAIN → RAIN.
    let commit = match debounce {
        None => true,
        Some(cfg) => {
            let heavy = cfg
                .immediate_override_mm
                .is_some_and(|mm| eval.max_precipitation_mm >= mm);
            heavy || new_counter >= cfg.need.max(1)
        }
    };

    if commit {
        Decision {
            notify: Some(NotifyReason::RainStarted),
            new_state: true,
            new_counter,
        }
    } else {
        Decision { notify: None, new_state: false, new_counter }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(rain: bool, max_mm: f64) -> Evaluation {
        Evaluation {
            rain_expected: rain,
            max_probability_pct: if rain { 80 } else { 5 },
            max_precipitation_mm: max_mm,
            sample_count: 24,
        }
    }

    fn debounce(need: u32, override_mm: Option<f64>) -> DebounceConfig {
        DebounceConfig { need, immediate_override_mm: override_mm }
    }

    // --- First run ----------------------------------------------------------

    #[test]
    fn test_first_run_always_notifies_initial_status() {
        for raw in [true, false] {
            let d = decide(None, 0, &eval(raw, 0.0), None);
            assert_eq!(d.notify, Some(NotifyReason::InitialStatus));
            assert_eq!(d.new_state, raw, "first run commits the raw signal as-is");
        }
    }

    #[test]
    fn test_first_run_with_debounce_still_notifies() {
        // Debounce gates transitions, not the initial announcement.
        let d = decide(None, 0, &eval(true, 0.5), Some(&debounce(3, None)));
        assert_eq!(d.notify, Some(NotifyReason::InitialStatus));
        assert!(d.new_state);
        assert_eq!(d.new_counter, 1);
    }

    // --- No change ----------------------------------------------------------

    #[test]
    fn test_unchanged_signal_stays_silent() {
        let d = decide(Some(false), 0, &eval(false, 0.0), None);
        assert_eq!(d.notify, None);
        assert!(!d.new_state);

        let d = decide(Some(true), 4, &eval(true, 1.0), None);
        assert_eq!(d.notify, None);
        assert!(d.new_state);
        assert_eq!(d.new_counter, 5, "counter keeps counting while rain persists");
    }

    // --- Simple variant -----------------------------------------------------

    #[test]
    fn test_without_debounce_entry_fires_on_first_detection() {
        let d = decide(Some(false), 0, &eval(true, 0.1), None);
        assert_eq!(d.notify, Some(NotifyReason::RainStarted));
        assert!(d.new_state);
    }

    // --- Debounced entry ----------------------------------------------------

    #[test]
    fn test_debounced_entry_needs_two_consecutive_detections() {
        let cfg = debounce(2, None);

        // Run 1: raw rain, counter 0 -> 1, below need. No commit, no notify.
        let d1 = decide(Some(false), 0, &eval(true, 0.5), Some(&cfg));
        assert_eq!(d1.notify, None);
        assert!(!d1.new_state, "state must stay NO_RAIN until the debounce clears");
        assert_eq!(d1.new_counter, 1);

        // Run 2: raw rain again, counter 1 -> 2 meets need. Commit + notify.
        let d2 = decide(Some(d1.new_state), d1.new_counter, &eval(true, 0.5), Some(&cfg));
        assert_eq!(d2.notify, Some(NotifyReason::RainStarted));
        assert!(d2.new_state);
        assert_eq!(d2.new_counter, 2);
    }

    #[test]
    fn test_single_detection_then_dry_run_resets_counter() {
        let cfg = debounce(2, None);

        let d1 = decide(Some(false), 0, &eval(true, 0.5), Some(&cfg));
        assert_eq!(d1.new_counter, 1);

        // A dry run wipes the streak and stays silent.
        let d2 = decide(Some(false), d1.new_counter, &eval(false, 0.0), Some(&cfg));
        assert_eq!(d2.notify, None);
        assert!(!d2.new_state);
        assert_eq!(d2.new_counter, 0, "a no-detection run must reset the counter");
    }

    #[test]
    fn test_heavy_rain_override_skips_the_counter() {
        let cfg = debounce(3, Some(5.0));
        let d = decide(Some(false), 0, &eval(true, 7.2), Some(&cfg));
        assert_eq!(
            d.notify,
            Some(NotifyReason::RainStarted),
            "a 7.2mm peak must bypass the 3-run debounce"
        );
        assert!(d.new_state);
    }

    #[test]
    fn test_peak_below_override_does_not_bypass() {
        let cfg = debounce(3, Some(5.0));
        let d = decide(Some(false), 0, &eval(true, 4.9), Some(&cfg));
        assert_eq!(d.notify, None);
        assert!(!d.new_state);
    }

    #[test]
    fn test_need_of_zero_behaves_like_one() {
        let cfg = debounce(0, None);
        let d = decide(Some(false), 0, &eval(true, 0.5), Some(&cfg));
        assert_eq!(d.notify, Some(NotifyReason::RainStarted));
    }

    // --- Exit edge ----------------------------------------------------------

    #[test]
    fn test_exit_fires_immediately_even_with_debounce() {
        let cfg = debounce(5, Some(5.0));
        let d = decide(Some(true), 9, &eval(false, 0.0), Some(&cfg));
        assert_eq!(d.notify, Some(NotifyReason::RainEnded));
        assert!(!d.new_state);
        assert_eq!(d.new_counter, 0, "exit resets the detection streak");
    }

    // --- Multi-run walkthrough ----------------------------------------------

    #[test]
    fn test_full_episode_with_debounce() {
        let cfg = debounce(2, Some(5.0));
        let mut state = None;
        let mut counter = 0;
        let mut notifications = Vec::new();

        // dry, dry, rain, rain, rain, dry
        for (raw, mm) in [(false, 0.0), (false, 0.0), (true, 0.8), (true, 1.1), (true, 0.9), (false, 0.0)] {
            let d = decide(state, counter, &eval(raw, mm), Some(&cfg));
            if let Some(reason) = d.notify {
                notifications.push(reason);
            }
            state = Some(d.new_state);
            counter = d.new_counter;
        }

        assert_eq!(
            notifications,
            vec![
                NotifyReason::InitialStatus, // first run (dry)
                NotifyReason::RainStarted,   // second consecutive detection
                NotifyReason::RainEnded,     // immediate exit
            ]
        );
        assert_eq!(state, Some(false));
        assert_eq!(counter, 0);
    }
}
