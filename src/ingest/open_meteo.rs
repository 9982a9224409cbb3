/// Open-Meteo API client.
///
/// Retrieves geocoding results and hourly precipitation forecasts from the
/// free Open-Meteo endpoints. No API key required.
///
/// Geocoding: https://geocoding-api.open-meteo.com/v1/search
/// Forecast:  https://api.open-meteo.com/v1/forecast
///
/// The forecast response carries parallel `hourly` arrays. Numeric entries
/// can be `null` or even strings during upstream hiccups; those coerce to
/// 0 instead of failing the run, matching the service's bias toward "run
/// with degraded data rather than not at all".

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::WeatherProvider;
use crate::logging::{self, Source};
use crate::model::{ForecastSample, Location, WeatherError};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Hourly timestamps come back as local wall-clock time without an offset.
const HOURLY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    #[serde(default)]
    country: String,
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlyBlock,
}

/// Values are kept as raw JSON so malformed entries can be coerced
/// leniently instead of failing deserialization of the whole response.
#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    precipitation: Vec<Value>,
    #[serde(default)]
    precipitation_probability: Vec<Value>,
}

// ============================================================================
// Lenient coercion
// ============================================================================

/// Best-effort conversion of a raw JSON value to f64. Handles numbers,
/// numeric strings, and anything else (null, objects) as the default 0.
pub fn lenient_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ============================================================================
// Client
// ============================================================================

/// Blocking Open-Meteo client.
pub struct OpenMeteoClient {
    client: reqwest::blocking::Client,
}

impl OpenMeteoClient {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        OpenMeteoClient { client }
    }
}

impl WeatherProvider for OpenMeteoClient {
    fn geocode(&self, city: &str) -> Result<Location, WeatherError> {
        let response = self
            .client
            .get(GEOCODING_URL)
            .query(&[
                ("name", city),
                ("count", "1"),
                ("language", "pl"),
                ("format", "json"),
            ])
            .send()
            .map_err(|e| WeatherError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WeatherError::HttpError(response.status().as_u16()));
        }

        let body: GeocodingResponse = response
            .json()
            .map_err(|e| WeatherError::ParseError(e.to_string()))?;

        let first = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::CityNotFound(city.to_string()))?;

        Ok(Location {
            name: first.name,
            country: first.country,
            latitude: first.latitude,
            longitude: first.longitude,
            timezone: first.timezone.unwrap_or_else(|| "auto".to_string()),
        })
    }

    fn hourly_forecast(&self, location: &Location) -> Result<Vec<ForecastSample>, WeatherError> {
        let response = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("hourly", "precipitation,precipitation_probability".to_string()),
                ("timezone", location.timezone.clone()),
                // Two days so a run late in the evening still sees a full
                // 24h window ahead.
                ("forecast_days", "2".to_string()),
            ])
            .send()
            .map_err(|e| WeatherError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WeatherError::HttpError(response.status().as_u16()));
        }

        let body: ForecastResponse = response
            .json()
            .map_err(|e| WeatherError::ParseError(e.to_string()))?;

        Ok(samples_from_hourly(&body.hourly))
    }
}

/// Zips the parallel hourly arrays into samples. Rows with an unparseable
/// timestamp are dropped (they cannot be placed in the 24h window); rows
/// shorter than the time array read as 0.
fn samples_from_hourly(hourly: &HourlyBlock) -> Vec<ForecastSample> {
    let mut samples = Vec::with_capacity(hourly.time.len());

    for (i, time) in hourly.time.iter().enumerate() {
        let timestamp = match NaiveDateTime::parse_from_str(time, HOURLY_TIME_FORMAT) {
            Ok(t) => t,
            Err(_) => {
                logging::debug(
                    Source::Forecast,
                    None,
                    &format!("Dropping hourly row {} with bad timestamp {:?}", i, time),
                );
                continue;
            }
        };

        let precipitation_mm = hourly.precipitation.get(i).map(lenient_f64).unwrap_or(0.0);
        let probability = hourly
            .precipitation_probability
            .get(i)
            .map(lenient_f64)
            .unwrap_or(0.0);

        samples.push(ForecastSample {
            timestamp,
            precipitation_mm,
            precipitation_probability_pct: probability.clamp(0.0, 100.0) as u8,
        });
    }

    samples
}

// ============================================================================
// Tests
// ============================================================================
