//! tonetape - record a test tone, hear it back five seconds later
//!
//! Run with: cargo run
//!
//! Logs go to `tonetape.log` (filter with `RUST_LOG`).

mod app;
mod ui;

use std::path::Path;
use std::sync::Mutex;

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use app::Tonetape;
use tonetape::TonetapeConfig;

const LOG_FILE: &str = "tonetape.log";

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    init_tracing(Path::new(LOG_FILE))?;

    let config = TonetapeConfig::from_env().wrap_err("invalid environment override")?;
    Tonetape::new(config).run()
}

fn init_tracing(log_path: &Path) -> EyreResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tonetape=debug"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .wrap_err_with(|| format!("failed to open log file {}", log_path.display()))?;

    // The terminal belongs to the TUI, so logs only go to the file
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
