//! Structured logging example
//!
//! Builds the global pipeline from `demos/config.json`: INFO and below go to
//! stdout, WARNING and above to stderr, and everything is written as JSON
//! lines to a rotating file, all through one queue and listener thread.
//!
//! Run with: cargo run --example structured_logging

use rust_json_logger::config::LoggingConfig;
use rust_json_logger::pipeline;
use rust_json_logger::{info, warning, Result};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/config.json".to_string());
    let config = LoggingConfig::load_from_file(&config_path)?;

    // Listener stops and drains when the guard goes out of scope
    let _guard = pipeline::setup(&config)?;

    let logger = pipeline::get_logger("app");
    info!(logger, "Started application"; "note" => "some extra info here");
    warning!(logger, "An example warning message");

    Ok(())
}
