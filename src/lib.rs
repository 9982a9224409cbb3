//! Rain monitoring and alerting service.
//!
//! Watches the Open-Meteo 24h forecast for one city, derives a boolean
//! rain signal from hourly precipitation data, and notifies Telegram
//! subscribers when that signal changes. Subscribers manage themselves
//! with `/start` and `/stop`. One invocation is one tick; scheduling is
//! external (cron).

pub mod alert;
pub mod analysis;
pub mod bot;
pub mod config;
pub mod http;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod run;
pub mod store;
