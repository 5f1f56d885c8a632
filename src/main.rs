//! MIDI Mapper - headless front-end
//!
//! Lists devices, monitors traffic, or runs the interactive mapping shell.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_mapper::cli::Shell;
use midi_mapper::config::AppConfig;
use midi_mapper::monitor;
use midi_mapper::paths::AppPaths;
use midi_mapper::{ActionHandlers, LoggingActions, MidiProcessor, ProfileStore};

/// MIDI Mapper - bind controller buttons and faders to desktop actions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: config.yaml in the app directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the profiles document (overrides the config file)
    #[arg(short, long)]
    profiles: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Use simulated devices instead of MIDI hardware
    #[arg(long)]
    test_mode: bool,

    /// List available MIDI devices
    #[arg(long)]
    list_devices: bool,

    /// Print incoming traffic of a device until Ctrl+C
    #[arg(long, value_name = "DEVICE")]
    monitor: Option<String>,

    /// Device to activate when the shell starts
    #[arg(short, long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::detect();
    paths
        .ensure_directories()
        .with_context(|| format!("Failed to create {}", paths.base_dir().display()))?;

    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting MIDI Mapper v{}...", env!("CARGO_PKG_VERSION"));
    if paths.is_portable {
        info!("Portable mode: {}", paths.base_dir().display());
    }

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    let config = AppConfig::load_or_default(&config_path).await?;
    info!("Configuration file: {}", config_path.display());

    let actions = ActionHandlers::all(Arc::new(LoggingActions::new()));
    let processor = if args.test_mode {
        MidiProcessor::test_mode(actions, config.log_capacity)?
    } else {
        MidiProcessor::with_midir(&config.client_name, actions, config.log_capacity)
            .context("Failed to initialize MIDI")?
    };

    if args.list_devices {
        monitor::list_devices_formatted(&processor);
        return Ok(());
    }

    if let Some(device) = args.monitor {
        return monitor::run_monitor(processor, &device, config.monitor_poll_ms).await;
    }

    let profiles_path = args
        .profiles
        .or(config.profiles_path)
        .unwrap_or(paths.profiles);
    let store = ProfileStore::open(&profiles_path)
        .with_context(|| format!("Failed to open profiles file {}", profiles_path.display()))?;

    let device = args.device.or(config.default_device);
    let shell = Shell::new(processor, store);

    // rustyline blocks on stdin
    tokio::task::spawn_blocking(move || shell.run(device))
        .await
        .context("Shell task panicked")??;

    info!("MIDI Mapper shutdown complete");
    Ok(())
}

/// Console output on stderr plus a daily JSON log file in `logs_dir`
fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "midi-mapper.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}
