use crate::config::Config;
use crate::observation::ObservationStore;
use crate::openapi_builder::OpenApiBuilder;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// OpenAPI from traffic - compile recorded request observations into an OpenAPI 3.0 document
#[derive(Parser, Debug)]
#[command(name = "openapi-from-traffic")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// JSON or YAML file holding the observation snapshot
    #[arg(value_name = "OBSERVATIONS")]
    pub observations_path: PathBuf,

    /// Configuration file (JSON or YAML); defaults are used when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.observations_path.is_file() {
        anyhow::bail!(
            "Observation snapshot does not exist: {}",
            args.observations_path.display()
        );
    }

    if let Some(config_path) = &args.config_path {
        if !config_path.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config_path.display());
        }
    }

    info!("Observations: {}", args.observations_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Counters reported once the document is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub observations_read: usize,
    pub observations_skipped: usize,
    pub paths_compiled: usize,
}

/// Run the main workflow and return the rendered document alongside its summary
pub fn compile(args: &CliArgs) -> Result<(String, RunSummary)> {
    let config = match &args.config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    info!("Loading observations...");
    let store = ObservationStore::from_file(&args.observations_path, config.evaluation_delay)
        .with_context(|| {
            format!(
                "Failed to load observations from {}",
                args.observations_path.display()
            )
        })?;
    info!("Loaded {} observations", store.len());

    info!("Building OpenAPI document...");
    let mut builder = OpenApiBuilder::from_config(&config)?;
    builder.add_observations(store.snapshot());
    let observations_skipped = builder.skipped();

    let document = builder.build();
    let summary = RunSummary {
        observations_read: store.len(),
        observations_skipped,
        paths_compiled: document.paths.len(),
    };

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    Ok((content, summary))
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document compilation...");

    let (content, summary) = compile(&args)?;

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Compilation complete!");
    info!("Summary:");
    info!("  - Observations read: {}", summary.observations_read);
    info!("  - Observations skipped: {}", summary.observations_skipped);
    info!("  - Paths compiled: {}", summary.paths_compiled);

    Ok(())
}
