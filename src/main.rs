//! openapi-from-traffic - command-line tool compiling recorded traffic into OpenAPI.
//!
//! Reads a snapshot of observations (one entry per observed request shape,
//! with its validation rules and example response) and writes the OpenAPI 3.0
//! document they describe.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-traffic [OPTIONS] <OBSERVATIONS>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-traffic observations.json -c openapi.yaml -o docs/openapi.yaml
//! ```
//!
//! Generate JSON documentation with debug logging:
//! ```bash
//! openapi-from-traffic observations.yaml -f json -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_traffic::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can pick the log level
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();

    info!("openapi-from-traffic starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document compilation completed successfully");

    Ok(())
}
