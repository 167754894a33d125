//! quotegate - cached stock market time series from the command line
//!
//! Builds an Alpha Vantage client and a cache-backed gateway from the CLI
//! options, then runs the requested command against it.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use quotegate::cli::{Cli, Command};
use quotegate::gateway::DataGateway;
use quotegate::upstream::AlphaVantageClient;
use quotegate::{load_test, logging, CacheKey};

/// Runs the parsed command, returning any error for `main` to report
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = AlphaVantageClient::new(cli.upstream_config())?;
    let gateway = DataGateway::new(Arc::new(client));

    if let Some(config) = cli.command.load_test_config() {
        let report = load_test::run(&gateway, &config).await?;
        if matches!(cli.command, Command::LoadTest { json: true, .. }) {
            println!("{}", report.to_json()?);
        } else {
            println!("{}", report);
        }
        return Ok(());
    }

    if let Command::Fetch {
        granularity,
        symbol,
        repeat,
    } = &cli.command
    {
        let mut last = None;
        for attempt in 1..=*repeat {
            let started = Instant::now();
            let payload = gateway.fetch(*granularity, symbol).await?;
            if *repeat > 1 {
                eprintln!(
                    "[{}/{}] {} in {} ms",
                    attempt,
                    repeat,
                    CacheKey::new(*granularity, symbol),
                    started.elapsed().as_millis()
                );
            }
            last = Some(payload);
        }
        if let Some(payload) = last {
            println!("{}", payload);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
