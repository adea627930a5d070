// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

use tobtc_contract::api::{BlockchainClient, ExchangeApi};
use tobtc_contract::config::{self, Config};
use tobtc_contract::models::{ConversionRequest, Ticker};
use tobtc_contract::report;
use tobtc_contract::suite::{self, Group, RunOptions};
use tobtc_contract::tolerance::Tolerance;

#[derive(Parser)]
#[command(author, version, about = "Contract tests for the blockchain.info ticker and tobtc API")]
struct Cli {
    /// Path to config.toml (defaults to $TOBTC_CONFIG or the crate's config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the contract suite against the live API
    Run {
        /// Only run these groups (repeatable)
        #[arg(long = "group", value_enum)]
        groups: Vec<Group>,

        /// Absolute tolerance for conversion checks, overriding the config
        #[arg(long)]
        tolerance: Option<f64>,

        /// Also export the results to output/ as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Print the current ticker
    Ticker,
    /// Request a single conversion and print the raw answer
    Convert {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        value: Option<String>,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(long, default_value = "config.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let load = || -> Result<(Arc<Config>, BlockchainClient)> {
        let config = Config::load(cli.config.as_deref())?;
        let client = BlockchainClient::new(&config.api)?;
        Ok((config, client))
    };

    match &cli.command {
        Commands::Run {
            groups,
            tolerance,
            csv,
        } => {
            let (config, client) = load()?;
            let tolerance = tolerance.map(Tolerance::Absolute);
            if let Some(t) = tolerance {
                if !t.is_valid() {
                    anyhow::bail!("--tolerance must be a positive number");
                }
            }
            let options = RunOptions {
                groups: groups.clone(),
                tolerance,
                show_progress: true,
            };

            println!("Running contract suite against {}", config.api.base_url);
            let results = suite::run_suite(&client, &config, &options).await;
            let summary = report::print_summary(&results);
            if *csv {
                report::export_results_csv(&results, &PathBuf::from("output"))?;
            }
            if !summary.all_passed() {
                anyhow::bail!("{} of {} scenarios failed", summary.failed, summary.total());
            }
        }
        Commands::Ticker => {
            let (_, client) = load()?;
            let response = client.get_ticker().await?;
            println!(
                "HTTP {} in {}ms ({})",
                response.status,
                response.elapsed_ms(),
                response.content_type.as_deref().unwrap_or("no content-type")
            );
            let ticker = Ticker::from_json(&response.body)?;
            report::print_ticker(&ticker);
        }
        Commands::Convert { currency, value } => {
            let (_, client) = load()?;
            let request = ConversionRequest {
                currency: currency.clone(),
                value: value.clone(),
            };
            let response = client.to_btc(&request).await?;
            println!(
                "{} -> HTTP {} in {}ms",
                request,
                response.status,
                response.elapsed_ms()
            );
            println!("{}", response.body);
        }
        Commands::InitConfig { path } => {
            config::save_config(&Config::default(), path)?;
            println!("✅ Default configuration written to {}", path.display());
        }
    }

    Ok(())
}
