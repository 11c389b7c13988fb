//! Command implementations for the Kiosk CLI.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{KioskConfig, StoreConfig};
use crate::ingest::load_seed_file;
use crate::server::{self, AppState};

/// Execute a CLI command.
pub async fn execute_command(args: KioskArgs) -> Result<()> {
    let config = args.to_config();
    config
        .validate()
        .context("invalid configuration")?;

    match &args.command {
        Command::Serve(serve_args) => serve(serve_args, config).await,
        Command::Seed(seed_args) => seed(seed_args, config, &args).await,
        Command::Search(search_args) => search(search_args, config, &args).await,
    }
}

/// Serve the HTTP API.
async fn serve(args: &ServeArgs, config: KioskConfig) -> Result<()> {
    let services = config.build().await.context("failed to start services")?;
    let state = AppState::new(services.retriever);
    server::serve(args.bind, state)
        .await
        .with_context(|| format!("server on {} failed", args.bind))
}

/// Reseed the configured stores.
async fn seed(args: &SeedArgs, mut config: KioskConfig, cli_args: &KioskArgs) -> Result<()> {
    let seeds = load_seed_file(&args.file)
        .with_context(|| format!("failed to read seed file {}", args.file.display()))?;

    if let StoreConfig::Memory { seed_file, .. } = &mut config.store {
        // The reseed below is the only one that should run.
        *seed_file = None;
        info!("memory backend selected; the seeded corpus lives only for this run");
    }
    let services = config.build().await.context("failed to start services")?;
    let report = services
        .pipeline
        .reseed_from_seeds(&seeds)
        .await
        .context("reseed failed")?;

    output_result(&report, cli_args)?;
    if !report.is_success() {
        bail!(
            "{} of {} products failed to seed",
            report.failed.len(),
            report.total
        );
    }
    Ok(())
}

/// Run one search.
async fn search(args: &SearchArgs, config: KioskConfig, cli_args: &KioskArgs) -> Result<()> {
    let services = config.build().await.context("failed to start services")?;
    let started = Instant::now();
    let results = services
        .retriever
        .search_scored(&args.query)
        .await
        .context("search failed")?;

    let output = SearchOutput {
        query: args.query.clone(),
        results,
        duration_ms: started.elapsed().as_millis() as u64,
        show_scores: args.scores,
    };
    output_result(&output, cli_args)?;
    Ok(())
}
