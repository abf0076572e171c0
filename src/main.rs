//! Playdeck - physical remote control for Sonos and MPD players
//!
//! Wires the control plane, the dispatcher actor, the inactivity timer and
//! the stop file together, then waits for a stop request.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playdeck::backends::{BackendRegistry, NetworkSelector, NoopNetworkSelector, WpaCliSelector};
use playdeck::channel::{command_channel, status_channel};
use playdeck::cli::Console;
use playdeck::config::AppConfig;
use playdeck::control::ControlPlane;
use playdeck::dispatcher::{restore_selection, Dispatcher, PlayerSelection, SelectionSnapshot};
use playdeck::hardware::{Hardware, SelectorReading, VirtualPanel};
use playdeck::leds::LedController;
use playdeck::lifecycle::{InactivityTimer, Lifecycle, StopFileWatcher};
use playdeck::paths::AppPaths;

/// Playdeck - switches, LEDs and a volume knob for Sonos and MPD
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: detected from the environment)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Drive a virtual panel from an interactive console
    #[arg(long)]
    console: bool,

    /// Never run the power-off command
    #[arg(long)]
    no_power_off: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths = paths.with_config(config.clone());
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting playdeck v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    let config = load_config(&paths.config).await?;

    if args.check_config {
        print_config_summary(&config);
        return Ok(());
    }

    let selection = restore_selection(paths.selection_file(), &config).await;
    run_app(config, selection, &paths, &args).await?;

    info!("Playdeck shutdown complete");
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!("{} not found, using built-in defaults", path.display());
        return Ok(AppConfig::default());
    }
    let config = AppConfig::load(&path.to_string_lossy()).await?;
    info!("Configuration loaded successfully");
    Ok(config)
}

async fn run_app(
    config: AppConfig,
    selection: PlayerSelection,
    paths: &AppPaths,
    args: &Args,
) -> Result<()> {
    let panel = Arc::new(VirtualPanel::new());
    panel.set_selector(SelectorReading::new(selection.network, selection.room));

    let (dispatcher_handle, command_rx) = command_channel();
    let (status_tx, status_rx) = status_channel();
    let lifecycle = Lifecycle::new(dispatcher_handle.clone());

    // The console has no wireless interface to switch
    let network_selector: Arc<dyn NetworkSelector> = if args.console {
        Arc::new(NoopNetworkSelector)
    } else {
        Arc::new(WpaCliSelector::new())
    };

    let dispatcher = Dispatcher::new(
        &config,
        selection,
        command_rx,
        status_tx.clone(),
        BackendRegistry::console(),
        network_selector,
        lifecycle.clone(),
    )
    .spawn();

    let plane = ControlPlane::new(
        &config.input,
        Hardware::virtual_panel(panel.clone()),
        dispatcher_handle.clone(),
        lifecycle.clone(),
    );
    let control = tokio::spawn(plane.clone().run(
        LedController::new(&config.leds),
        status_rx,
        config.input.poll_interval(),
    ));

    let idle = tokio::spawn(
        InactivityTimer::new(&config.shutdown, lifecycle.clone(), dispatcher_handle.clone()).run(),
    );

    let _stop_file = match std::env::current_dir()
        .context("Failed to read working directory")
        .and_then(|dir| StopFileWatcher::new(dir, &config.shutdown.stop_file, lifecycle.clone()))
    {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Stop file disabled: {:#}", e);
            None
        }
    };

    if args.console {
        Console::new(panel, plane, dispatcher_handle, status_tx, lifecycle.clone()).spawn()?;
    }

    {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    lifecycle.request_stop();
                }
                Err(e) => error!("Failed to install CTRL+C signal handler: {}", e),
            }
        });
    }

    info!("✅ Ready");
    lifecycle.stopped().await;
    info!("Shutting down...");

    let state = dispatcher.await.context("Dispatcher task failed")?;
    if let Err(e) = control.await {
        warn!("Control plane task failed: {}", e);
    }
    if let Err(e) = idle.await {
        warn!("Inactivity timer task failed: {}", e);
    }

    if let Err(e) = SelectionSnapshot::new(state.selection)
        .save_to_file(paths.selection_file())
        .await
    {
        error!("Failed to save selection: {:#}", e);
    }

    if lifecycle.power_off_requested() {
        let command = config.shutdown.power_off_command.trim();
        if args.no_power_off || command.is_empty() {
            info!("Power-off requested but disabled, exiting only");
        } else if let Err(e) = power_off(command).await {
            error!("Power-off failed: {:#}", e);
        }
    }

    Ok(())
}

async fn power_off(command: &str) -> Result<()> {
    info!("🔌 Powering off: {}", command);
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .with_context(|| format!("Failed to run '{}'", command))?;
    if !status.success() {
        bail!("'{}' exited with {}", command, status);
    }
    Ok(())
}

fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
        .add_directive("rustyline=warn".parse()?)
        .add_directive("notify=warn".parse()?);

    // Headless device: the log file is the only place failures show up
    let file_appender = tracing_appender::rolling::daily(logs_dir, "playdeck.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
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

fn print_config_summary(config: &AppConfig) {
    println!("\n{}", "=== Configuration ===".bold().cyan());
    println!(
        "  Debounce: {} ms, poll: {} ms, switch-off hold: {} ms",
        config.input.switch_debounce_ms, config.input.poll_interval_ms, config.input.switch_off_hold_ms
    );
    println!(
        "  Idle shutdown: {} s ({} deferrals)",
        config.shutdown.idle_timeout_secs, config.shutdown.max_deferrals
    );

    println!("\n{}", "Networks:".bold());
    for network in &config.site.networks {
        println!(
            "  {} {} ({})",
            network.index.to_string().yellow(),
            network.name,
            network.backend
        );
        for room in config.site.rooms.iter().filter(|r| r.network == network.index) {
            println!("      room {} {}", room.index, room.name.green());
        }
    }

    let selection = config.player.default_selection(&config.site);
    println!(
        "\nDefault selection: network {}, room {}",
        selection.network, selection.room
    );
    println!("\n{}", "✅ Configuration is valid".green().bold());
}
