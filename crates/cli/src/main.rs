//! virpil-led CLI: list Virpil controllers and drive their LEDs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use virpil_led_core::hid::HidapiTransport;
use virpil_led_core::{BoardType, DeviceKey, DeviceRegistry, LedColor, MonitorConfig};

#[derive(Parser)]
#[command(
    name = "virpil-led",
    version,
    about = "LED control for Virpil HID controllers"
)]
struct Cli {
    /// JSON configuration file (vendor IDs, identity mode, poll interval).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached controllers.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set one LED to a color.
    SetLed {
        /// Product ID, hex (e.g. 825B or 0x825B).
        #[arg(long, value_parser = parse_u16_hex)]
        pid: u16,
        /// Serial number (or friendly name) when several units share a PID.
        #[arg(long)]
        serial: Option<String>,
        /// Board the LED sits on.
        #[arg(long, value_enum)]
        board: BoardArg,
        /// LED index on the board (0-32).
        #[arg(long)]
        led: u8,
        /// Color as 6 hex digits, each pair one of 00, 40, 80, FF.
        #[arg(long)]
        color: LedColor,
    },
    /// Print controllers as they are attached and removed.
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoardArg {
    Default,
    Add,
    On,
    Slave,
    Extra,
}

impl From<BoardArg> for BoardType {
    fn from(arg: BoardArg) -> Self {
        match arg {
            BoardArg::Default => BoardType::Default,
            BoardArg::Add => BoardType::AddBoard,
            BoardArg::On => BoardType::OnBoard,
            BoardArg::Slave => BoardType::SlaveBoard,
            BoardArg::Extra => BoardType::ExtraBoard,
        }
    }
}

fn parse_u16_hex(s: &str) -> std::result::Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex product ID '{s}': {e}"))
}

fn load_config(path: Option<&PathBuf>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(MonitorConfig::default()),
    }
}

fn open_registry(config: MonitorConfig) -> Result<Arc<DeviceRegistry>> {
    let transport = Arc::new(HidapiTransport::new(config.poll_interval())?);
    Ok(virpil_led_core::global().initialize(transport, config)?)
}

fn describe(key: &DeviceKey) -> String {
    let family = virpil_led_core::DeviceFamily::from_pid(key.product_id)
        .map(|f| f.name())
        .unwrap_or("Unknown device");
    format!("{family} (PID: 0x{:04X}, id: {})", key.product_id, key.identity)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::List { json } => {
            let registry = open_registry(config)?;
            let devices = registry.all_devices();
            if json {
                let entries: Vec<_> = devices
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "vendor_id": format!("0x{:04X}", d.vendor_id()),
                            "product_id": format!("0x{:04X}", d.product_id()),
                            "identity": d.identity(),
                            "family": d.family().map(|f| f.name()),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if devices.is_empty() {
                println!("No Virpil controllers found.");
                println!("Ensure the device is connected and hidraw permissions are set up.");
            } else {
                for dev in &devices {
                    println!("{}", describe(&DeviceKey::of(dev)));
                }
            }
        }
        Commands::SetLed {
            pid,
            serial,
            board,
            led,
            color,
        } => {
            let registry = open_registry(config)?;
            let device = registry
                .try_get_device(pid, serial.as_deref())
                .ok_or_else(|| {
                    virpil_led_core::Error::DeviceNotFound(match &serial {
                        Some(id) => format!("0x{pid:04X}/{id}"),
                        None => format!("0x{pid:04X}"),
                    })
                })?;
            let board = BoardType::from(board);
            if !device.send_color(board, led, color)? {
                anyhow::bail!("device 0x{pid:04X} was removed before the command was sent");
            }
            println!("Set LED {led} on {board} to {color}");
        }
        Commands::Watch => {
            let interval = config.poll_interval();
            let registry = open_registry(config)?;
            let mut known: BTreeSet<DeviceKey> = BTreeSet::new();
            println!("Watching for Virpil controllers (Ctrl-C to stop)...");
            loop {
                let current: BTreeSet<DeviceKey> = registry.keys().into_iter().collect();
                for key in current.difference(&known) {
                    println!("+ {}", describe(key));
                }
                for key in known.difference(&current) {
                    println!("- {}", describe(key));
                }
                known = current;
                std::thread::sleep(interval);
            }
        }
    }

    Ok(())
}
