mod domain;
mod error;
mod infrastructure;
mod presentation;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use domain::settings::{Settings, SettingsService};
use eframe::egui;
use infrastructure::bluetooth::led::{LedConfig, LedController, LedOutcome};
use infrastructure::bluetooth::protocol::{self, SensorCharacteristics};
use infrastructure::bluetooth::scanner::position_by_name;
use infrastructure::bluetooth::{BleConnection, BleScanner};
use infrastructure::bus::codec::FrameLayout;
use infrastructure::bus::publisher::{run_session, SensorPublisher, ZmqSink};
use infrastructure::bus::subscriber::{print_sample, run_console, ZmqSource};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ble-sensor-lab", version, about = "BLE sensor bridge and plotter")]
struct Cli {
    /// Force debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Alternate settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List advertising devices and look for the sensor board
    Scan {
        #[arg(long)]
        name: Option<String>,
        /// Scan duration in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        macos_use_bdaddr: bool,
    },
    /// Blink the board LED
    Led {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        iterations: Option<u32>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Forward accelerometer and gyroscope notifications to the bus
    Publish {
        #[command(flatten)]
        target: PublishTarget,
        /// Service UUIDs to filter the scan with
        #[arg(long, num_args = 1..)]
        services: Vec<String>,
        #[arg(long)]
        url: Option<String>,
        /// Send `[header, payload]` without a topic frame
        #[arg(long)]
        bare: bool,
    },
    /// Print every sample received from the bus
    Subscribe {
        #[arg(long)]
        url: Option<String>,
    },
    /// Live plot of the bus data
    Gui {
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("device").args(["name", "address"])))]
struct Target {
    /// Advertised device name
    #[arg(long)]
    name: Option<String>,
    /// BD address or platform id
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    macos_use_bdaddr: bool,
}

/// Like [`Target`], but one of `--name` or `--address` must be given.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("publish_device").args(["name", "address"]).required(true)))]
struct PublishTarget {
    /// Advertised device name
    #[arg(long)]
    name: Option<String>,
    /// BD address or platform id
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    macos_use_bdaddr: bool,
}

impl From<PublishTarget> for Target {
    fn from(target: PublishTarget) -> Self {
        Self {
            name: target.name,
            address: target.address,
            macos_use_bdaddr: target.macos_use_bdaddr,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = SettingsService::load(cli.config.clone())?;
    let _log_guard =
        infrastructure::logging::init_logger(&settings.get().log_settings, cli.debug)?;
    info!("Settings loaded from {}", settings.path().display());

    match cli.command {
        Command::Gui { url } => run_gui(settings, url),
        command => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(run_command(command, settings.get().clone()))
        }
    }
}

async fn run_command(command: Command, settings: Settings) -> anyhow::Result<()> {
    match command {
        Command::Scan {
            name,
            timeout,
            macos_use_bdaddr,
        } => {
            let name = name.unwrap_or(settings.device_name);
            let timeout = Duration::from_secs(timeout.unwrap_or(settings.scan_timeout_secs));
            scan(&name, timeout, macos_use_bdaddr).await
        }
        Command::Led {
            target,
            iterations,
            interval_ms,
        } => {
            let connection = connect(&target, &settings, &[]).await?;
            let config = LedConfig {
                characteristic: protocol::parse_uuid(&settings.led_char_uuid)?,
                iterations: iterations.unwrap_or(settings.led_iterations),
                interval: Duration::from_millis(interval_ms.unwrap_or(settings.led_interval_ms)),
            };
            let outcome = LedController::new(&connection, config).run().await;
            connection.disconnect().await;
            if let LedOutcome::Completed { cycles } = outcome? {
                info!("LED loop finished after {} cycles", cycles);
            }
            Ok(())
        }
        Command::Publish {
            target,
            services,
            url,
            bare,
        } => {
            let target = Target::from(target);
            let services = services
                .iter()
                .map(|s| protocol::parse_uuid(s))
                .collect::<Result<Vec<_>, _>>()?;
            let url = url.unwrap_or(settings.bus_url.clone());
            let layout = if bare {
                FrameLayout::Bare
            } else {
                FrameLayout::Topic
            };
            let characteristics =
                SensorCharacteristics::from_strs(&settings.accel_char_uuid, &settings.gyro_char_uuid)?;

            let connection = connect(&target, &settings, &services).await?;
            let sink = ZmqSink::bind(&url).await?;
            let publisher = SensorPublisher::new(sink, characteristics, layout);

            let token = CancellationToken::new();
            spawn_stop_watchers(token.clone());
            let result = run_session(&connection, publisher, token).await;
            connection.disconnect().await;
            result.map(|_| ())
        }
        Command::Subscribe { url } => {
            let url = url.unwrap_or(settings.bus_url);
            let mut source = ZmqSource::connect(&url).await?;
            source.subscribe("").await?;
            let samples = run_console(&mut source, print_sample).await?;
            info!("Received {} samples", samples);
            Ok(())
        }
        Command::Gui { .. } => anyhow::bail!("the GUI runs on the main thread"),
    }
}

async fn scan(name: &str, timeout: Duration, use_bdaddr: bool) -> anyhow::Result<()> {
    let scanner = BleScanner::new().await?;
    let found = scanner.discover(timeout, &[]).await?;
    let devices: Vec<_> = found.into_iter().map(|(_, device)| device).collect();

    for device in &devices {
        println!(
            "{} {} rssi={}",
            device.display_id(use_bdaddr),
            device.name.as_deref().unwrap_or("(unnamed)"),
            device
                .signal_strength
                .map_or_else(|| "?".to_string(), |rssi| rssi.to_string())
        );
    }

    match position_by_name(&devices, name) {
        Some(i) => println!("Found {} at {}", name, devices[i].display_id(use_bdaddr)),
        None => println!("{} not found", name),
    }
    Ok(())
}

/// Scan for the target and connect, failing when it is not advertising.
async fn connect(
    target: &Target,
    settings: &Settings,
    services: &[uuid::Uuid],
) -> anyhow::Result<BleConnection> {
    let scanner = BleScanner::new().await?;
    let timeout = Duration::from_secs(settings.scan_timeout_secs);

    let found = match (&target.address, &target.name) {
        (Some(address), _) => scanner.find_by_address(address, timeout, services).await?,
        (None, name) => {
            let name = name.as_deref().unwrap_or(&settings.device_name);
            scanner.find_by_name(name, timeout, services).await?
        }
    };
    let (peripheral, device) = found.context("device not found")?;
    info!(
        "Using device {}",
        device.display_id(target.macos_use_bdaddr)
    );

    Ok(BleConnection::connect(peripheral, device, services).await?)
}

/// Cancel on Ctrl-C or when the user types `a` and Enter.
fn spawn_stop_watchers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                ctrl_c_token.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim() == "a" => {
                        token.cancel();
                        break;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        error!("stdin read failed: {}", e);
                        break;
                    }
                },
            }
        }
    });
}

fn run_gui(settings: SettingsService, url: Option<String>) -> anyhow::Result<()> {
    let url = url.unwrap_or_else(|| settings.get().bus_url.clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([800.0, 560.0])
            .with_title("BLE Sensor Lab"),
        ..Default::default()
    };

    eframe::run_native(
        "BLE Sensor Lab",
        options,
        Box::new(move |cc| {
            Ok(Box::new(presentation::app::SensorPlotApp::new(
                cc, settings, url,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_requires_name_or_address() {
        assert!(Cli::try_parse_from(["ble-sensor-lab", "publish"]).is_err());
        assert!(Cli::try_parse_from([
            "ble-sensor-lab",
            "publish",
            "--name",
            "BLE-LAB55",
            "--address",
            "AA:BB:CC:DD:EE:FF",
        ])
        .is_err());

        let cli = Cli::try_parse_from(["ble-sensor-lab", "publish", "--address", "AA:BB"]).unwrap();
        match cli.command {
            Command::Publish { target, bare, .. } => {
                assert_eq!(target.address.as_deref(), Some("AA:BB"));
                assert!(!bare);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn led_falls_back_to_configured_name() {
        let cli = Cli::try_parse_from(["ble-sensor-lab", "-d", "led"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Command::Led { target, .. } => assert!(target.name.is_none() && target.address.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
