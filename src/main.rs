//! Fob reader host - bring up the reader over I2C and drive it from a console.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use fobreader_host as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use app::bus::{BusTransport, I2cBus, SimulatedBus, SimulatedReader};
use app::config::{AppConfig, ConfigLoadResult, LoggingConfig};
use app::fob::DeviceSession;
use app::shell::Shell;

/// Address the emulated reader answers on in `--simulate` mode.
const SIMULATED_ADDRESS: u8 = 0x42;

/// Host-side test console for the fob reader peripheral.
#[derive(Parser)]
#[command(name = "fobreader-host", version)]
struct Cli {
    /// Path to config.toml (default: next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Talk to an emulated reader instead of the I2C bus
    #[arg(long)]
    simulate: bool,

    /// I2C bus number, overrides the config file
    #[arg(long)]
    bus: Option<u8>,

    /// Bring the reader up, print its details and exit
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine config path based on mode
    let config_path = match (&cli.config, cli.dev) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("config.toml"),
        (None, false) => AppConfig::default_path(),
    };

    let (mut config, missing) = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => (config, false),
        ConfigLoadResult::Missing => (AppConfig::default(), true),
        ConfigLoadResult::Invalid(e) => bail!("Invalid config {}: {e}", config_path.display()),
    };
    if let Some(bus) = cli.bus {
        config.bus.i2c_bus = bus;
    }

    let _log_guard = init_logging(&config.logging);

    tracing::info!("Fob reader host v{} booting...", env!("CARGO_PKG_VERSION"));
    if missing {
        tracing::info!("Config {:?} missing, using defaults", config_path);
    } else {
        tracing::info!("Config loaded from {:?}", config_path);
    }

    let bus: Box<dyn BusTransport> = if cli.simulate {
        tracing::info!("Simulation mode: emulated reader at 0x{SIMULATED_ADDRESS:02X}");
        Box::new(simulated_bus())
    } else {
        let bus = I2cBus::open(&config.bus)
            .with_context(|| format!("Failed to open I2C bus {}", config.bus.i2c_bus))?;
        Box::new(bus)
    };

    let mut session = DeviceSession::new(bus);
    if let Err(e) = session.start() {
        tracing::warn!("Reader bring-up incomplete: {e}");
    }
    tracing::info!("Boot sequence complete.");

    let stdin = std::io::stdin();
    let mut shell = Shell::new(session, stdin.lock(), std::io::stdout())
        .with_tag_read_delay(config.reader.tag_read_delay());

    shell.print_summary()?;
    if cli.once {
        return Ok(());
    }

    shell.run()?;
    Ok(())
}

/// Install the console subscriber and, if configured, a daily log file.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    match config.directory() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fobreader-host.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry.with(fmt::layer().with_ansi(false).with_writer(writer)).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Emulated reader with a tag resting in the field.
fn simulated_bus() -> SimulatedBus {
    let reader = SimulatedReader::new(SIMULATED_ADDRESS)
        .with_firmware(b"1.0")
        .with_tag(1, &[0x04, 0xA1, 0x2B, 0x7C, 0x5D, 0x80, 0x00]);
    SimulatedBus::new().with_reader(reader)
}
