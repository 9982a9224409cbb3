/// Forecast analysis for the rain monitoring service.
///
/// Reduces raw hourly forecast data to the single boolean signal the
/// alerting layer acts on. Kept free of I/O so every policy variant can
/// be tested against synthetic sample sets.
///
/// Submodules:
/// - `rain` — the 24h window selection and rain-signal evaluator.

pub mod rain;
