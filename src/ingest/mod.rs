/// Weather data ingestion.
///
/// The pipeline talks to the weather side of the world through the
/// [`WeatherProvider`] trait; the only production implementation is the
/// Open-Meteo client in `open_meteo`. Tests substitute fixed forecasts.

use crate::model::{ForecastSample, Location, WeatherError};

pub mod open_meteo;

/// Geocoding plus hourly forecast retrieval, as one collaborator.
pub trait WeatherProvider {
    /// Resolves a city name to coordinates and a timezone. No results is
    /// an error: without a location the run cannot proceed.
    fn geocode(&self, city: &str) -> Result<Location, WeatherError>;

    /// Fetches hourly precipitation samples covering at least the next
    /// 24 hours at the given location, in chronological order.
    fn hourly_forecast(&self, location: &Location) -> Result<Vec<ForecastSample>, WeatherError>;
}
