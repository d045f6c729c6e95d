//! UMS command-line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use octofhir_ums::EngineConfig;
use octofhir_ums::cli::{check, evaluate, generate, output};
use octofhir_ums::overrides::TargetFormat;
use std::path::PathBuf;

/// Universal Measure Specification tool
#[derive(Parser)]
#[command(name = "ums")]
#[command(author, version, about = "Measure logic generation and evaluation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, pretty, table, text)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    /// Engine configuration file (default: $UMS_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate CQL or SQL from a measure document
    Generate {
        /// Measure JSON file
        file: PathBuf,

        /// Target format (cql, sql)
        #[arg(short, long, default_value = "cql")]
        target: TargetFormat,

        /// SQL dialect preset (postgres, sqlserver) or dialect JSON file
        #[arg(short, long)]
        dialect: Option<String>,

        /// Override snapshot JSON file
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// Evaluate patients against a measure
    Evaluate {
        /// Measure JSON file
        file: PathBuf,

        /// Patient records JSON file
        #[arg(short, long)]
        patients: PathBuf,
    },

    /// Check measure documents for structural defects
    Check {
        /// Measure JSON files
        files: Vec<PathBuf>,

        /// Strict mode (warnings as errors)
        #[arg(short, long)]
        strict: bool,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = if verbose {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Debug);
        builder
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    };
    builder.format_timestamp(None).init();
}

fn run(cli: Cli) -> Result<()> {
    let engine = EngineConfig::resolve(cli.config.as_deref()).context("Failed to load engine configuration")?;

    match cli.command {
        Commands::Generate {
            file,
            target,
            dialect,
            overrides,
        } => generate::generate(generate::GenerateConfig {
            file,
            target,
            dialect,
            overrides,
            engine,
            verbose: cli.verbose,
            output_format: cli.format,
            output_file: cli.output,
        }),

        Commands::Evaluate { file, patients } => evaluate::evaluate(evaluate::EvaluateConfig {
            file,
            patients,
            engine,
            verbose: cli.verbose,
            output_format: cli.format,
            output_file: cli.output,
        }),

        Commands::Check { files, strict } => check::check(check::CheckConfig {
            files,
            strict,
            verbose: cli.verbose,
            output_format: cli.format,
        }),
    }
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    output::setup_colors(&cli.color);
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
