/// Core data types for the rain monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic and no I/O — only types and their error counterparts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Forecast types
// ---------------------------------------------------------------------------

/// A single hourly forecast value from the Open-Meteo hourly arrays.
///
/// Corresponds to one index across the parallel `hourly.time`,
/// `hourly.precipitation`, and `hourly.precipitation_probability` arrays.
/// Malformed or missing numeric fields have already been coerced to 0 by
/// the ingest layer, so both values are always present here.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    /// Local time at the forecast location, e.g. "2024-05-01T13:00".
    /// Open-Meteo returns local wall-clock time without a UTC offset.
    pub timestamp: chrono::NaiveDateTime,
    /// Expected precipitation for the hour, in millimetres.
    pub precipitation_mm: f64,
    /// Probability of any precipitation during the hour, 0–100.
    pub precipitation_probability_pct: u8,
}

/// A geocoded location as resolved by the Open-Meteo geocoding API.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name, e.g. "Europe/Warsaw". Passed through to the
    /// forecast request so hourly timestamps are local to the city.
    pub timezone: String,
}

// ---------------------------------------------------------------------------
// Inbound bot messages
// ---------------------------------------------------------------------------

/// One inbound message from the bot update feed, already flattened from
/// the Telegram `getUpdates` envelope by the bot client.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// State carried between invocations, stored as a JSON file.
///
/// Loaded once at the start of a run, mutated in memory, and written back
/// atomically at the end. Missing fields in an older state file deserialize
/// to their defaults, so the format can grow without migration.
///
/// Invariants:
///   - `subscriber_ids` holds no duplicates (enforced by the set type).
///   - `last_update_id` only ever increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersistedState {
    /// Last committed rain signal: `Some(true)` = RAIN, `Some(false)` =
    /// NO_RAIN, `None` = uninitialized (no run has completed yet).
    pub rain_state: Option<bool>,
    /// Chat ids subscribed to notifications, kept sorted for stable output.
    pub subscriber_ids: BTreeSet<i64>,
    /// Highest update_id already processed from the bot update feed.
    pub last_update_id: Option<i64>,
    /// The most recent status line computed, whether or not it was sent.
    pub last_status_text: Option<String>,
    /// Runs in a row where the raw rain signal was true. Feeds the
    /// debounced NO_RAIN → RAIN transition.
    pub consecutive_rain_detections: u32,
}

impl PersistedState {
    /// Advances the update cursor, never letting it move backwards.
    pub fn advance_cursor(&mut self, update_id: i64) {
        match self.last_update_id {
            Some(cur) if cur >= update_id => {}
            _ => self.last_update_id = Some(update_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or processing Open-Meteo data.
#[derive(Debug, PartialEq)]
pub enum WeatherError {
    /// Non-2xx HTTP response from the Open-Meteo API.
    HttpError(u16),
    /// The request itself failed (DNS, TLS, timeout, ...).
    RequestFailed(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The geocoding search returned no results for the city.
    CityNotFound(String),
}

impl std::fmt::Display for WeatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherError::HttpError(code) => write!(f, "HTTP error: {}", code),
            WeatherError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            WeatherError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            WeatherError::CityNotFound(city) => write!(f, "No location found for: {}", city),
        }
    }
}

impl std::error::Error for WeatherError {}

/// Errors from the Telegram Bot API client.
#[derive(Debug, PartialEq)]
pub enum BotError {
    /// Non-2xx HTTP response from api.telegram.org.
    HttpError(u16),
    /// The request itself failed (DNS, TLS, timeout, ...).
    RequestFailed(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The API answered with `"ok": false`.
    ApiRejected(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::HttpError(code) => write!(f, "HTTP error: {}", code),
            BotError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            BotError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            BotError::ApiRejected(msg) => write!(f, "API rejected request: {}", msg),
        }
    }
}

impl std::error::Error for BotError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_uninitialized() {
        let st = PersistedState::default();
        assert_eq!(st.rain_state, None);
        assert!(st.subscriber_ids.is_empty());
        assert_eq!(st.last_update_id, None);
        assert_eq!(st.consecutive_rain_detections, 0);
    }

    #[test]
    fn test_cursor_only_increases() {
        let mut st = PersistedState::default();
        st.advance_cursor(5);
        assert_eq!(st.last_update_id, Some(5));
        st.advance_cursor(3);
        assert_eq!(st.last_update_id, Some(5), "cursor must never move backwards");
        st.advance_cursor(9);
        assert_eq!(st.last_update_id, Some(9));
    }

    #[test]
    fn test_state_roundtrips_through_json() {
        let mut st = PersistedState::default();
        st.rain_state = Some(true);
        st.subscriber_ids.insert(111);
        st.subscriber_ids.insert(222);
        st.last_update_id = Some(42);
        st.last_status_text = Some("[Szczecin] Rain expected within the next 24 hours.".into());
        st.consecutive_rain_detections = 2;

        let json = serde_json::to_string(&st).unwrap();
        let back: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, st);
    }

    #[test]
    fn test_older_state_file_without_new_fields_loads_with_defaults() {
        // A state file written before the debounce counter existed.
        let json = r#"{"rain_state": false, "subscriber_ids": [7], "last_update_id": 3}"#;
        let st: PersistedState = serde_json::from_str(json).unwrap();
        assert_eq!(st.rain_state, Some(false));
        assert!(st.subscriber_ids.contains(&7));
        assert_eq!(st.consecutive_rain_detections, 0);
        assert_eq!(st.last_status_text, None);
    }
}
