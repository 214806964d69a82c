//! storebridge: bind a canonical facade over a web app's internal modules.

mod cli;
mod cmd_cache;

use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use storebridge_config::{Config, ConfigLoader, storebridge_home};
use storebridge_core::Bridge;

use cli::{Cli, Commands};

/// Initialize tracing with console and daily-rotated file output.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = storebridge_home().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("storebridge")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(path)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        None | Some(Commands::Run) => run(&config).await,
        Some(Commands::Presence { wid }) => presence(&config, &wid).await,
        Some(Commands::Cache { action }) => cmd_cache::handle_cache_command(action, &config).await,
    }
}

/// Bind and keep rebinding until Ctrl-C.
async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting storebridge v{}", env!("CARGO_PKG_VERSION"));

    let bridge = Bridge::start(config).await?;
    let facade = bridge.facade().await?;

    println!("Generation: {}", facade.generation());
    println!("Version:    {}", facade.version().unwrap_or("unknown"));
    println!("Keys:       {}", facade.keys().join(", "));

    info!("Session ready, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    bridge.shutdown().await?;
    Ok(())
}

async fn presence(config: &Config, wid: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bridge = Bridge::start(config).await?;

    let subscribed = bridge.subscribe_presence(wid).await?;
    let record = bridge.read_presence(wid).await?;

    let output = serde_json::json!({
        "wid": wid,
        "subscribed": subscribed,
        "presence": record,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    bridge.shutdown().await?;
    Ok(())
}
