// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluvio - backend of a remote watering controller.
//!
//! This is the binary entry point for the Pluvio server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;
mod shutdown;

/// Pluvio - backend of a remote watering controller.
#[derive(Parser, Debug)]
#[command(name = "pluvio", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Pluvio server.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = match pluvio_config::load_config() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: failed to load configuration: {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Config => {
            match pluvio_config::load_config() {
                Ok(config) => {
                    let rendered = serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|e| format!("<unprintable config: {e}>"));
                    println!("{rendered}");
                }
                Err(e) => {
                    eprintln!("error: failed to load configuration: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
