//! # Joystick Mirror
//!
//! Test application printing the live state of a joystick.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (optional `--config` file, flags override)
//!    - Set up logging with tracing subscriber
//!    - Enumerate joysticks, ask for a device ID unless configured
//!    - Open the joystick and print its name and capabilities
//!
//! 2. **Main Loop**
//!    - Print one state line per refresh interval (text or JSON)
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Stop the poll worker and release the device
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --device 0
//! ```
//!
//! Expected output:
//! ```text
//! Joystick Mirror v0.1.0 test application
//! Number of joysticks: 1
//!
//! Joystick open. Name: Wireless Controller Buttons: 13 Axes: 6 Hats: 1
//!
//! Axes: 128:128:0:128:128:0: hat value: 0 buttons: _ _ _ X _ _ _ _ _ _ _ _ _
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use joystick_mirror::config::{Config, LoggingConfig};
use joystick_mirror::display::{self, OutputFormat};
use joystick_mirror::input::EvdevBackend;
use joystick_mirror::mirror::JoystickMirror;

/// File name prefix of rolling log files
const LOG_FILE_PREFIX: &str = "joystick-mirror.log";

#[derive(Parser, Debug)]
#[command(version, about = "Print the live state of a joystick")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Joystick ID to open (prompted when omitted)
    #[arg(long)]
    device: Option<i32>,

    /// State line format
    #[arg(long, value_parser = ["text", "json"])]
    format: Option<String>,
}

impl Args {
    /// Loads the config file (or defaults) and applies flag overrides.
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(id) = self.device {
            config.device.id = Some(id);
        }
        if let Some(format) = self.format {
            config.display.format = format;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Installs the global subscriber.
///
/// Logs go to stderr so state lines on stdout stay clean, or to a daily
/// rolling file when `log_dir` is set. The returned guard flushes the file
/// writer on drop.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config.level.parse()?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Parses a device ID typed by the user.
fn parse_device_id(input: &str) -> Result<i32> {
    let input = input.trim();
    input
        .parse()
        .with_context(|| format!("Invalid joystick ID: '{}'", input))
}

fn prompt_device_id(count: usize) -> Result<i32> {
    print!("Enter joystick ID (from 0 to {}): ", count.saturating_sub(1));
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    parse_device_id(&line)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    let _log_guard = init_logging(&config.logging)?;

    println!("Joystick Mirror v{} test application", JoystickMirror::version());

    let mut mirror =
        JoystickMirror::with_poll_interval(Box::new(EvdevBackend::new()), config.poll_interval());

    let count = mirror.enumerate();
    if count == 0 {
        anyhow::bail!("No available joysticks");
    }
    println!("Number of joysticks: {}\n", count);

    let device_id = match config.device.id {
        Some(id) => id,
        None => prompt_device_id(count)?,
    };

    mirror
        .open(device_id)
        .with_context(|| format!("Joystick {} not opened", device_id))?;

    println!(
        "Joystick open. Name: {} Buttons: {} Axes: {} Hats: {}\n",
        mirror.name(),
        mirror.num_buttons(),
        mirror.num_axes(),
        mirror.num_hats()
    );

    let format = OutputFormat::from_name(&config.display.format);
    let mut refresh = interval(config.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Printing state every {:?}, press Ctrl+C to exit", config.refresh_interval());

    // Main loop
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                match display::render(&mirror, format) {
                    Ok(line) => println!("{}", line),
                    Err(e) => debug!("Failed to render state: {}", e),
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    mirror.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::try_parse_from(["joystick-mirror", "--device", "2", "--format", "json"])
            .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.device.id, Some(2));
        assert_eq!(config.display.format, "json");
    }

    #[test]
    fn test_args_reject_unknown_format() {
        let result = Args::try_parse_from(["joystick-mirror", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_device_flag_rejected_by_validation() {
        let args = Args::try_parse_from(["joystick-mirror", "--device=-1"]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_parse_device_id() {
        assert_eq!(parse_device_id("0\n").unwrap(), 0);
        assert_eq!(parse_device_id("  3 ").unwrap(), 3);
        assert!(parse_device_id("abc").is_err());
        assert!(parse_device_id("").is_err());
    }

    #[test]
    fn test_log_file_prefix() {
        assert_eq!(LOG_FILE_PREFIX, "joystick-mirror.log");
    }
}
