//! manifestmerge - Feature-gated CRD manifest generator
//!
//! Merges partial CRD manifests into one manifest per feature set, or checks
//! that committed manifests are up to date.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use manifestmerge::featuregate::DEFAULT_FEATURE_GATE_DIR;
use manifestmerge::generator::{Generator, GeneratorOptions};
use manifestmerge::schema::CRD_ROOT_TYPE;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Feature-gated CRD manifest generator
#[derive(Parser, Debug)]
#[command(name = "manifestmerge", version, about, long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `manifestmerge=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write merged manifests next to their partials
    Generate(RunArgs),

    /// Fail if any committed manifest differs from the generated one
    Verify(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directories searched for API version directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory holding featureGate-<FeatureSet>.yaml manifests
    #[arg(long, default_value = DEFAULT_FEATURE_GATE_DIR)]
    feature_gate_dir: PathBuf,

    /// YAML table of per-CRD tuple overrides
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Merge schema replacing the built-in CRD schema
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Name of the root type in the schema
    #[arg(short, long, default_value = CRD_ROOT_TYPE)]
    type_name: String,
}

impl RunArgs {
    fn into_options(self, verify: bool) -> (GeneratorOptions, Vec<PathBuf>) {
        let options = GeneratorOptions {
            verify,
            feature_gate_dir: self.feature_gate_dir,
            overrides: self.overrides,
            schema: self.schema,
            type_name: self.type_name,
        };
        (options, self.paths)
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let (options, paths) = match cli.command {
        Commands::Generate(args) => args.into_options(false),
        Commands::Verify(args) => args.into_options(true),
    };

    let generator = match Generator::from_options(&options) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match generator.run(&paths) {
        Ok(report) => {
            info!("{}", report);
            ExitCode::SUCCESS
        }
        Err(errors) => {
            error!("{} error(s)", errors.len());
            for e in errors.iter() {
                eprintln!("Error: {}", e);
            }
            if errors.iter().any(|e| e.is_fatal()) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
