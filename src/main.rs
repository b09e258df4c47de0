#![forbid(unsafe_code)]

mod bindings;
mod combo;
mod config;
mod constants;
mod daemon;
mod dispatch;
mod error;
mod input;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;

use config::{RunMode, Settings};
use constants::combo::DEFAULT_MAX_COMBO;

/// Launch commands when key combinations are pressed on an input device
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input device to read key events from (e.g. /dev/input/event3)
    #[arg(required_unless_present = "list_devices")]
    device: Option<PathBuf>,

    /// Binding file to load instead of ~/.babybindsrc
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of keys held at once (and keycodes per binding)
    #[arg(short, long, default_value_t = DEFAULT_MAX_COMBO, value_parser = parse_max_combo)]
    max_combo: usize,

    /// Log the keycode of every pressed key instead of running bindings
    #[arg(long)]
    show_keycodes: bool,

    /// List input devices that report key events and exit
    #[arg(long, conflicts_with = "show_keycodes")]
    list_devices: bool,

    /// Debug logging (overrides LOG_LEVEL)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_max_combo(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    // Parse log level from environment variable
    let log_level = if verbose {
        TraceLevel::DEBUG
    } else {
        match std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => TraceLevel::TRACE,
            "debug" => TraceLevel::DEBUG,
            "warn" => TraceLevel::WARN,
            "error" => TraceLevel::ERROR,
            _ => TraceLevel::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn list_devices() -> Result<()> {
    if !input::check_permissions() {
        input::print_permission_error();
        anyhow::bail!("Cannot read {}", constants::paths::DEV_INPUT);
    }
    let devices = input::list_keyboard_devices().context("Failed to scan input devices")?;
    if devices.is_empty() {
        info!("No readable devices report key events");
    }
    for (path, name) in devices {
        println!("{}\t{}", path.display(), name);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_devices {
        return list_devices();
    }

    let device = cli.device.context("No input devices passed!")?;
    let mut settings = Settings::new(device, cli.config)?;
    settings.max_combo = cli.max_combo;
    if cli.show_keycodes {
        settings.mode = RunMode::ShowKeycodes;
    }

    daemon::run(&settings).inspect_err(|e| {
        if matches!(e, error::DaemonError::DeviceOpen { .. }) && !input::check_permissions() {
            input::print_permission_error();
        }
    })?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
