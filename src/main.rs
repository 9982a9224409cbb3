//! Binary entry point: wires the real collaborators and maps run results
//! to exit codes.
//!
//! Exit codes:
//!   0 — run completed (or skipped for quiet hours)
//!   1 — no data found (geocoding returned no results for the city)
//!   2 — anything else (bad configuration, state save failure, ...)

use clap::Parser;
use std::process::ExitCode;

use rainmon_service::bot::telegram::TelegramClient;
use rainmon_service::config::{Cli, Config};
use rainmon_service::http;
use rainmon_service::ingest::open_meteo::OpenMeteoClient;
use rainmon_service::logging::{self, LogLevel, Source};
use rainmon_service::model::WeatherError;
use rainmon_service::run::{self, RunError};
use rainmon_service::store::JsonStateStore;

fn main() -> ExitCode {
    // .env is optional; ignore a missing file.
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    let cfg = match Config::resolve(cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logger is not up yet; config errors go straight to stderr.
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let min_level = if verbose { LogLevel::Debug } else { LogLevel::Info };
    logging::init_logger(min_level, cfg.log_file.as_deref());

    match run_service(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Geocode(WeatherError::CityNotFound(city))) => {
            logging::error(Source::Geocode, None, &format!("No location found for: {}", city));
            ExitCode::from(1)
        }
        Err(e) => {
            logging::error(Source::System, None, &format!("Run failed: {}", e));
            ExitCode::from(2)
        }
    }
}

fn run_service(cfg: &Config) -> Result<(), RunError> {
    let client = http::build_client(cfg.insecure)
        .map_err(|e| RunError::Setup(format!("could not build HTTP client: {}", e)))?;

    let weather = OpenMeteoClient::new(client.clone());
    let messenger = TelegramClient::new(client, cfg.bot_token.as_str());
    let store = JsonStateStore::new(cfg.state_path.clone());

    let now = chrono::Local::now().naive_local();
    run::run_tick(cfg, &weather, &messenger, &store, now)?;
    Ok(())
}
