// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chime - admin CLI for the durable alarm database.

mod alarms;

use std::path::PathBuf;

use chime_config::ChimeConfig;
use chime_storage::Database;
use clap::{Parser, Subcommand};

/// Chime - inspect and edit persisted actor alarms.
#[derive(Parser, Debug)]
#[command(name = "chime", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List every persisted alarm.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete the persisted alarm of one actor.
    Delete {
        /// Namespace unique key.
        namespace: String,
        actor_id: String,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chime_config::load_and_validate_path(path),
        None => chime_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chime_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    let result = match cli.command {
        Some(Commands::List { json }) => match open_database(&config).await {
            Ok(db) => alarms::run_list(&db, json).await,
            Err(e) => Err(e),
        },
        Some(Commands::Delete {
            namespace,
            actor_id,
        }) => match open_database(&config).await {
            Ok(db) => alarms::run_delete(&db, &namespace, &actor_id)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        },
        Some(Commands::Config) => {
            print_config(&config);
            Ok(())
        }
        None => {
            println!("chime: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn open_database(config: &ChimeConfig) -> Result<Database, chime_core::ChimeError> {
    Database::open(&config.storage.database_path).await
}

fn print_config(config: &ChimeConfig) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => print!("{rendered}"),
        Err(e) => eprintln!("error: failed to render configuration: {e}"),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chime={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
