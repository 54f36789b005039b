//! Schema Checker CLI
//!
//! Runs compatibility, validity and data checks from the command line.
//!
//! Exit codes: 0 when the check passes, 1 for a negative verdict, 2 for bad
//! input, 3 for internal failures.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use schema_gate::config::LoggingConfig;
use schema_gate::service::RequestKind;
use schema_gate::{CheckError, CheckService, CheckerConfig, Schema, SchemaHistory, ServiceResponse, Verdict};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_NEGATIVE: i32 = 1;
const EXIT_CLIENT_ERROR: i32 = 2;
const EXIT_INTERNAL_ERROR: i32 = 3;

#[derive(Parser)]
#[command(name = "schema-checker")]
#[command(about = "Check schema compatibility and validity")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a candidate schema against its history
    Compatibility {
        /// Schema format (json, avro, protobuf, xml, csv)
        #[arg(short, long)]
        format: String,
        /// Candidate schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// History files, oldest first
        #[arg(long, num_args = 0..)]
        history: Vec<PathBuf>,
        /// Compatibility level (defaults to the configured level)
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Check a single schema for validity
    Validity {
        #[arg(short, long)]
        format: String,
        #[arg(short, long)]
        schema: PathBuf,
        /// Validity level (defaults to the configured level)
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Validate a data file against a schema
    Data {
        #[arg(short, long)]
        format: String,
        #[arg(short, long)]
        schema: PathBuf,
        /// Payload to validate
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Handle a service request body read from a file
    Request {
        #[arg(short, long, value_enum)]
        kind: Kind,
        /// JSON request body
        file: PathBuf,
    },

    /// Report service health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Compatibility,
    Validity,
}

impl From<Kind> for RequestKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Compatibility => RequestKind::Compatibility,
            Kind::Validity => RequestKind::Validity,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match CheckerConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_CLIENT_ERROR);
        }
    };
    init_logging(&config.logging);

    let code = match run(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CheckError>() {
        Some(e) if !e.is_client_error() => EXIT_INTERNAL_ERROR,
        _ => EXIT_CLIENT_ERROR,
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn run(cli: Cli, config: &CheckerConfig) -> anyhow::Result<i32> {
    let service = CheckService::from_config(config);

    match cli.command {
        Commands::Compatibility {
            format,
            schema,
            history,
            level,
        } => {
            let level = match level {
                Some(level) => level.parse()?,
                None => config.defaults.compatibility_level,
            };
            let candidate = Schema::new(
                schema.display().to_string(),
                format.as_str(),
                &read(&schema)?,
            );
            let history = history
                .iter()
                .map(|path| read(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let history: SchemaHistory = history.into_iter().collect();

            let verdict = service
                .compatibility_orchestrator()
                .check_compatibility(&candidate, &history, level)?;
            report(&verdict, cli.json, "Schema is compatible", "Schema is incompatible")
        }

        Commands::Validity { format, schema, level } => {
            let level = match level {
                Some(level) => level.parse()?,
                None => config.defaults.validity_level,
            };
            let verdict = service
                .validity_orchestrator()
                .check_validity(&format, &read(&schema)?, level)?;
            report(&verdict, cli.json, "Schema is valid", "Schema is invalid")
        }

        Commands::Data { format, schema, data } => {
            let verdict = service
                .validity_orchestrator()
                .validate_message(&format, &read(&data)?, &read(&schema)?)?;
            report(&verdict, cli.json, "Data is valid", "Data is invalid")
        }

        Commands::Request { kind, file } => {
            let response = service.handle(kind.into(), &read(&file)?);
            println!("{}", serde_json::to_string_pretty(&response.body)?);
            Ok(response_code(&response))
        }

        Commands::Health => {
            let response = service.health();
            if cli.json {
                println!("{}", serde_json::to_string(&response)?);
            } else {
                println!("✅ Healthy ({})", response.status);
            }
            Ok(EXIT_OK)
        }
    }
}

fn response_code(response: &ServiceResponse) -> i32 {
    match (response.status, &response.body) {
        (200, Some(body)) if !body.result => EXIT_NEGATIVE,
        (200, _) => EXIT_OK,
        (500..=599, _) => EXIT_INTERNAL_ERROR,
        _ => EXIT_CLIENT_ERROR,
    }
}

fn report(verdict: &Verdict, json: bool, passed: &str, failed: &str) -> anyhow::Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(verdict)?);
    } else if verdict.ok {
        println!("✅ {}", passed);
    } else {
        println!("❌ {}:", failed);
        for issue in &verdict.issues {
            println!("   └─ {}", issue);
        }
    }

    Ok(if verdict.ok { EXIT_OK } else { EXIT_NEGATIVE })
}
