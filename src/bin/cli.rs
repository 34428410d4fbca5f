//! Crew Tracker CLI
//!
//! Runs the live tracker server, or a single scrape cycle for checking a
//! results page.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crew_tracker::{
    api,
    error::Result,
    models::Config,
    pipeline::Tracker,
    services::StaticSource,
};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Crew Tracker - live race progress for a registered crew
#[derive(Parser, Debug)]
#[command(
    name = "crew-tracker",
    version,
    about = "Relays live race progress of a tracked crew"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "crew-tracker.toml")]
    config: PathBuf,

    /// Listen address, overriding the configured one
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run scheduled cycles (default)
    Serve,

    /// Run a single cycle and print the snapshot as JSON
    Scrape {
        /// Results page URL, overriding the configured one
        #[arg(long)]
        url: Option<String>,

        /// Read markup from a saved page instead of fetching
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Track only these bibs
        #[arg(long = "bib")]
        bibs: Vec<String>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging; `RUST_LOG` wins over the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(cli.verbose, &config.logging.level);

    match load_error {
        Some(e) if matches!(cli.command, Some(Command::Validate)) => {
            log::error!("Cannot load {}: {}", cli.config.display(), e);
            return Err(e);
        }
        Some(e) => log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        ),
        None => log::info!("Loaded configuration from {}", cli.config.display()),
    }

    config.apply_env()?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await?,

        Command::Scrape { url, file, bibs } => {
            if let Some(url) = url {
                config.source.url = Some(url);
            }
            config.validate()?;

            let tracker = match file {
                Some(path) => {
                    let markup = std::fs::read_to_string(&path)?;
                    log::info!("Read {} bytes from {}", markup.len(), path.display());
                    Tracker::new(&config, Arc::new(StaticSource::new(markup)))?
                }
                None => Tracker::from_config(&config)?,
            };
            if !bibs.is_empty() {
                tracker.registry().replace_all(&bibs).await;
            }
            tracker.force_refresh().await;

            println!("{}", serde_json::to_string_pretty(&*tracker.current())?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if config.source.url.is_none() {
                log::warn!("No source URL configured; cycles will publish empty snapshots");
            }
            if config.race.start.is_none() {
                log::warn!("No race start configured; distance estimates are disabled");
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    if config.source.url.is_none() {
        log::warn!("No source URL configured; serving empty snapshots");
    }

    let tracker = Arc::new(Tracker::from_config(&config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(Arc::clone(&tracker).run_schedule(shutdown_rx));

    let listener = TcpListener::bind(&config.server.bind).await?;
    log::info!("crew-tracker listening on {}", listener.local_addr()?);

    let app = api::router(Arc::clone(&tracker));
    let signal_tracker = Arc::clone(&tracker);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            log::info!("Shutting down...");
            let _ = shutdown_tx.send(true);
            signal_tracker.close_subscribers();
        })
        .await?;

    if let Err(e) = scheduler.await {
        log::error!("Scheduler task failed: {}", e);
    }

    log::info!("Done!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
