//! agentsview-update CLI entry point.

mod cli;

use agentsview_update::event::create_event_channel;
use agentsview_update::{CheckOutcome, GitHubResolver, HttpFetcher, Platform, Updater};
use clap::Parser;
use cli::Cli;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let config = cli.to_config()?;
    let executable = Platform::current().executable_name(&config.binary_name);
    let target = config.resolve_install_path(&executable)?;
    let current = cli.running_version(&target).await?;
    info!("Installed at {}: {:?}", target.display(), current);

    let resolver = GitHubResolver::new(&config.api_base_url, &config.repo, &config.binary_name)?;
    info!("agentsview-update v{} checking {}", env!("CARGO_PKG_VERSION"), resolver.repo());

    // Print progress as it happens
    let (events_tx, mut events_rx) = create_event_channel();
    let printer = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => println!("{event}"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let updater = Updater::new(config, resolver, HttpFetcher::new()?).with_events(events_tx);

    let result = if cli.check {
        updater.check(&current, cli.force).await.map(|outcome| {
            if let CheckOutcome::Available(ref info) = outcome {
                info!("Asset: {}", info.release.asset_url);
            }
            outcome.to_string()
        })
    } else {
        updater.run(&current, cli.force).await.map(|outcome| outcome.to_string())
    };

    // Dropping the updater closes the channel so the printer drains and exits.
    drop(updater);
    let _ = printer.await;

    println!("{}", result?);
    Ok(())
}
