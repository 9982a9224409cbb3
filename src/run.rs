/// One batch run of the service.
///
/// A run is a single tick: load state, reconcile subscribers against the
/// command feed, evaluate the forecast, decide whether the rain signal
/// changed, notify, save state. Invoked periodically by an external
/// scheduler (cron); nothing here loops or sleeps.
///
/// All collaborators come in as trait objects so the whole tick can run
/// against fakes. `now` is injected too and is interpreted as local
/// wall-clock time: it gates the quiet-hours window and anchors the 24h
/// forecast window (the service is assumed to run in, or near, the
/// watched city's timezone, as its predecessors did).

use chrono::NaiveDateTime;
use std::io;

use crate::alert::transitions::{self, NotifyReason};
use crate::analysis::rain::{self, Evaluation};
use crate::bot::Messenger;
use crate::config::Config;
use crate::ingest::WeatherProvider;
use crate::ledger;
use crate::logging::{self, Source};
use crate::model::WeatherError;
use crate::store::StateStore;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a completed tick did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// The forecast evaluation, absent when the fetch failed and the
    /// evaluation phase was skipped.
    pub evaluation: Option<Evaluation>,
    /// Chats that received the rain-change (or initial status) broadcast.
    pub notified: Vec<i64>,
    pub welcomed: Vec<i64>,
    pub departed: Vec<i64>,
}

#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    /// Inside the quiet-hours window; nothing was done.
    QuietHours,
    Completed(RunReport),
}

/// Failures that abort the tick.
#[derive(Debug)]
pub enum RunError {
    /// A collaborator could not even be constructed (TLS backend, ...).
    Setup(String),
    /// Geocoding failed; `WeatherError::CityNotFound` maps to the
    /// "no data found" exit code, everything else to the general one.
    Geocode(WeatherError),
    /// The end-of-run state save failed. Aborting loudly beats silently
    /// replaying the whole feed next tick.
    SaveState(io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Setup(msg) => write!(f, "Setup failed: {}", msg),
            RunError::Geocode(e) => write!(f, "Geocoding failed: {}", e),
            RunError::SaveState(e) => write!(f, "Could not save state: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

// ---------------------------------------------------------------------------
// Status text
// ---------------------------------------------------------------------------

pub fn status_text(city: &str, rain_expected: bool) -> String {
    if rain_expected {
        format!("[{}] Rain expected within the next 24 hours.", city)
    } else {
        format!("[{}] No rain expected for the next 24h.", city)
    }
}

// ---------------------------------------------------------------------------
// The tick
// ---------------------------------------------------------------------------

pub fn run_tick(
    cfg: &Config,
    weather: &dyn WeatherProvider,
    messenger: &dyn Messenger,
    store: &dyn StateStore,
    now: NaiveDateTime,
) -> Result<RunOutcome, RunError> {
    use chrono::Timelike;

    if let Some(quiet) = cfg.quiet_hours {
        if quiet.covers_hour(now.hour()) {
            logging::info(
                Source::System,
                None,
                &format!("{} is inside quiet hours ({:02}:00–{:02}:00); skipping run",
                    now, quiet.start_hour, quiet.end_hour),
            );
            return Ok(RunOutcome::QuietHours);
        }
    }

    let mut state = store.load();
    let mut report = RunReport::default();

    // Seeds first, so a freshly seeded chat is already subscribed when the
    // broadcast happens later this same run.
    let seeded = ledger::merge_seeds(&mut state, &cfg.seed_chat_ids);
    if seeded > 0 {
        logging::info(Source::State, None, &format!("Added {} seed subscriber(s)", seeded));
    }

    // Command feed. A fetch failure downgrades to an empty batch; the
    // cursor stays put so nothing is lost, just deferred.
    let batch = match messenger.fetch_updates(state.last_update_id) {
        Ok(batch) => batch,
        Err(e) => {
            logging::warn(Source::Telegram, None, &format!("getUpdates failed: {}", e));
            Vec::new()
        }
    };
    let outcome = ledger::apply_updates(&mut state, &batch);
    report.welcomed = outcome.welcomed.clone();
    report.departed = outcome.departed.clone();

    for chat_id in &outcome.departed {
        match messenger.send(*chat_id, "You have been unsubscribed from rain alerts.") {
            Ok(()) => logging::info(
                Source::Telegram,
                Some(&chat_id.to_string()),
                "Unsubscribed, goodbye sent",
            ),
            Err(e) => logging::log_send_failure(*chat_id, "goodbye", &e),
        }
    }

    // Location is non-negotiable: without it there is nothing to evaluate.
    let location = weather.geocode(&cfg.city).map_err(RunError::Geocode)?;
    logging::info(
        Source::Geocode,
        None,
        &format!(
            "Location: {}, {} ({:.4}, {:.4}, tz {})",
            location.name, location.country, location.latitude, location.longitude,
            location.timezone
        ),
    );

    // Forecast. A failed fetch skips evaluation but the run still finishes:
    // ledger changes and the cursor must be persisted either way.
    let current_eval = match weather.hourly_forecast(&location) {
        Ok(samples) => {
            let eval = rain::evaluate(&samples, &cfg.policy, now);
            logging::info(
                Source::Forecast,
                Some(&location.name),
                &format!(
                    "24h rain status: {} (max prob={}%, max precip={:.1} mm, {} samples)",
                    if eval.rain_expected { "rain" } else { "dry" },
                    eval.max_probability_pct,
                    eval.max_precipitation_mm,
                    eval.sample_count
                ),
            );
            if cfg.verbose {
                for s in rain::window_24h(&samples, now) {
                    logging::debug(
                        Source::Forecast,
                        None,
                        &format!(
                            "  {}: precip={:.1} mm, prob={}%",
                            s.timestamp, s.precipitation_mm, s.precipitation_probability_pct
                        ),
                    );
                }
            }
            Some(eval)
        }
        Err(e) => {
            logging::warn(
                Source::Forecast,
                Some(&location.name),
                &format!("Forecast fetch failed, skipping evaluation this run: {}", e),
            );
            None
        }
    };
    report.evaluation = current_eval.clone();

    // Welcome new subscribers with the freshest status we have.
    let welcome_text = match &current_eval {
        Some(eval) => status_text(&location.name, eval.rain_expected),
        None => state
            .last_status_text
            .clone()
            .unwrap_or_else(|| format!("[{}] Subscribed to rain alerts.", location.name)),
    };
    for chat_id in &outcome.welcomed {
        match messenger.send(*chat_id, &welcome_text) {
            Ok(()) => logging::info(
                Source::Telegram,
                Some(&chat_id.to_string()),
                "Welcomed new subscriber with current status",
            ),
            Err(e) => logging::log_send_failure(*chat_id, "welcome", &e),
        }
    }

    if let Some(eval) = &current_eval {
        let current_status = status_text(&location.name, eval.rain_expected);
        state.last_status_text = Some(current_status.clone());

        let decision = transitions::decide(
            state.rain_state,
            state.consecutive_rain_detections,
            eval,
            cfg.debounce.as_ref(),
        );
        state.rain_state = Some(decision.new_state);
        state.consecutive_rain_detections = decision.new_counter;

        match decision.notify {
            Some(reason) => {
                logging::info(
                    Source::System,
                    None,
                    match reason {
                        NotifyReason::InitialStatus => "First run, sending initial status",
                        NotifyReason::RainStarted => "Signal change: rain ahead",
                        NotifyReason::RainEnded => "Signal change: rain cleared",
                    },
                );
                report.notified = broadcast(messenger, &state.subscriber_ids, &current_status);
            }
            None => logging::info(Source::System, None, "No signal change, staying quiet"),
        }
    }

    store.save(&state).map_err(RunError::SaveState)?;
    logging::debug(
        Source::State,
        None,
        &format!(
            "Saved state: rain={:?}, {} subscriber(s), cursor={:?}, streak={}",
            state.rain_state,
            state.subscriber_ids.len(),
            state.last_update_id,
            state.consecutive_rain_detections
        ),
    );

    Ok(RunOutcome::Completed(report))
}

/// Sends `text` to every subscriber, returning the ids actually reached.
/// A failed send is logged and the rest of the list still gets the message.
fn broadcast(
    messenger: &dyn Messenger,
    subscribers: &std::collections::BTreeSet<i64>,
    text: &str,
) -> Vec<i64> {
    if subscribers.is_empty() {
        logging::info(Source::Telegram, None, "No subscribers, skipping broadcast");
        return Vec::new();
    }

    let mut reached = Vec::new();
    for chat_id in subscribers {
        match messenger.send(*chat_id, text) {
            Ok(()) => {
                logging::info(
                    Source::Telegram,
                    Some(&chat_id.to_string()),
                    &format!("Notified: {}", text),
                );
                reached.push(*chat_id);
            }
            Err(e) => logging::log_send_failure(*chat_id, "notification", &e),
        }
    }
    reached
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_phrasing() {
        assert_eq!(
            status_text("Szczecin", true),
            "[Szczecin] Rain expected within the next 24 hours."
        );
        assert_eq!(
            status_text("Szczecin", false),
            "[Szczecin] No rain expected for the next 24h."
        );
    }
}
