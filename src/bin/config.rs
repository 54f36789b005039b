//! Schema Gate Config CLI
//!
//! View and manage schema gate configuration.

use clap::{Parser, Subcommand};
use schema_gate::CheckerConfig;

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "View and manage schema gate configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path (default: schema-gate.toml)
        #[arg(short, long, default_value = "schema-gate.toml")]
        output: String,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = CheckerConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                println!("📋 Schema Gate Configuration\n");
                println!("Defaults:");
                println!("  Compatibility level: {}", cfg.defaults.compatibility_level);
                println!("  Validity level: {}", cfg.defaults.validity_level);

                println!("\nEngines:");
                for format in &cfg.engines.enabled {
                    println!("  - {}", format);
                }

                println!("\nService:");
                println!("  History encoding: {:?}", cfg.service.history_encoding);

                println!("\nLogging:");
                println!("  Filter: {}", cfg.logging.filter);
                println!("  JSON: {}", cfg.logging.json);
            }
        }

        Commands::Init { output } => {
            let cfg = CheckerConfig::default();
            cfg.save(&output)?;
            println!("✅ Created config file: {}", output);
        }

        Commands::Validate { config } => match CheckerConfig::load_from(config.as_deref()) {
            Ok(cfg) => {
                println!("✅ Configuration is valid");
                println!(
                    "   Levels: {} / {}",
                    cfg.defaults.compatibility_level, cfg.defaults.validity_level
                );
                println!("   Engines: {}", cfg.engines.enabled.len());
            }
            Err(e) => {
                eprintln!("❌ Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
