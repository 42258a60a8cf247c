//! Boiler monitor CLI
//!
//! A command-line interface (CLI) application for collecting boiler telemetry
//! from the plant PLC using Modbus ASCII over a serial line (9600 baud, 7E1).
//!
//! This tool allows users to:
//! - List the serial ports of the machine.
//! - Show and change the stored plant identifier and serial port.
//! - Read the telemetry of all boilers once.
//! - Dump an arbitrary range of holding registers.
//! - Run in a continuous daemon mode that polls the PLC and prints the
//!   readings as text or JSON.
//!
//! The CLI leverages the `boiler_telemetry_lib` crate for the protocol, the
//! connection handling and the polling.

use anyhow::{Context, Result, bail};
use boiler_telemetry_lib::{
    config_store::{ConfigStore, ConnectionConfig},
    protocol::BoilerReading,
    scheduler::{PollingScheduler, TelemetrySink},
    tokio_async_safe_client::SafeClient,
    tokio_common::SLAVE_ID,
    transport::SerialConnector,
};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use settings::PollerSettings;
use std::panic;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

mod commandline;
mod settings;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// Prints the telemetry of one poll cycle in the selected format.
struct ReadingPrinter {
    output: commandline::DaemonOutput,
    plant_id: String,
}

impl ReadingPrinter {
    fn print(&self, readings: &[BoilerReading]) -> Result<()> {
        match self.output {
            commandline::DaemonOutput::Console => {
                println!(
                    "{} plant '{}'",
                    humantime::format_rfc3339_seconds(SystemTime::now()),
                    self.plant_id
                );
                for reading in readings {
                    println!("  {reading}");
                }
            }
            commandline::DaemonOutput::Json => {
                let document = serde_json::json!({
                    "plantId": self.plant_id,
                    "readings": readings,
                });
                println!(
                    "{}",
                    serde_json::to_string(&document).context("Cannot serialize readings")?
                );
            }
        }
        Ok(())
    }
}

impl TelemetrySink for ReadingPrinter {
    fn on_readings(&mut self, readings: Vec<BoilerReading>) {
        if let Err(error) = self.print(&readings) {
            error!("{error:#}");
        }
    }
}

/// Resolves the serial port, connects and remembers an explicitly given port.
async fn connect(
    store: &ConfigStore,
    settings: &PollerSettings,
    port: Option<&str>,
) -> Result<(SafeClient<SerialConnector>, ConnectionConfig)> {
    let mut config = store
        .load()
        .with_context(|| format!("Cannot load connection config from {:?}", store.path()))?;
    if let Some(port) = port {
        config.port = port.to_string();
    }
    if config.port.trim().is_empty() {
        bail!("No serial port configured. Use --port or `config set --port <PORT>`.");
    }

    let client = SafeClient::new(
        SerialConnector::new(SLAVE_ID, settings.request_timeout),
        settings.register_map.clone(),
        settings.read_policy.clone(),
    )
    .context("Invalid poller settings")?;

    info!("Attempting to connect to serial port {}...", config.port);
    client
        .connect(&config)
        .await
        .with_context(|| format!("Failed to connect to the PLC on {}", config.port))?;

    if port.is_some() {
        store
            .save(&config)
            .with_context(|| format!("Cannot store serial port {}", config.port))?;
    }
    Ok((client, config))
}

fn handle_list_ports() -> Result<()> {
    let ports = tokio_serial::available_ports().context("Cannot enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        match port.port_type {
            tokio_serial::SerialPortType::UsbPort(usb) => println!(
                "{}: USB {:04x}:{:04x} {} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.manufacturer.unwrap_or_default(),
                usb.product.unwrap_or_default()
            ),
            tokio_serial::SerialPortType::PciPort => println!("{}: PCI", port.port_name),
            tokio_serial::SerialPortType::BluetoothPort => {
                println!("{}: Bluetooth", port.port_name)
            }
            tokio_serial::SerialPortType::Unknown => println!("{}", port.port_name),
        }
    }
    Ok(())
}

fn handle_config(store: &ConfigStore, action: &commandline::ConfigAction) -> Result<()> {
    let mut config = store
        .load()
        .with_context(|| format!("Cannot load connection config from {:?}", store.path()))?;
    match action {
        commandline::ConfigAction::Show => {}
        commandline::ConfigAction::Set { plant_id, port } => {
            if plant_id.is_none() && port.is_none() {
                bail!("Nothing to change, use --plant-id and/or --port.");
            }
            if let Some(plant_id) = plant_id {
                config.plant_id = plant_id.clone();
            }
            if let Some(port) = port {
                config.port = port.clone();
            }
            store.save(&config).context("Cannot store connection config")?;
            info!("Stored {config:?} in {:?}", store.path());
        }
    }
    println!("Plant ID:    {}", config.plant_id);
    println!("Serial port: {}", config.port);
    Ok(())
}

async fn handle_daemon(
    client: SafeClient<SerialConnector>,
    config: ConnectionConfig,
    poll_interval: Duration,
    output: commandline::DaemonOutput,
) -> Result<()> {
    info!("Starting daemon mode: output={output:?}, interval={poll_interval:?}");
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, stopping"),
            Err(error) => error!("Cannot listen for Ctrl-C: {error}"),
        }
        ctrl_c.cancel();
    });

    let printer = ReadingPrinter {
        output,
        plant_id: config.plant_id,
    };
    PollingScheduler::new(client.clone(), poll_interval)
        .spawn(cancel, printer)
        .await
        .context("Polling task failed")?;

    client
        .disconnect()
        .await
        .context("Cannot close the serial port")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    // 1. Initialize logging as early as possible
    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "Boiler monitor started. Log level: {}",
        args.verbose.log_level_filter()
    );

    let store = ConfigStore::new(&args.config_file);

    // 2. Commands without a PLC connection
    match &args.command {
        commandline::CliCommands::ListPorts => return handle_list_ports(),
        commandline::CliCommands::Config { action } => return handle_config(&store, action),
        _ => {}
    }

    // 3. Commands talking to the PLC
    let settings = PollerSettings::load(args.settings.as_deref())?;
    match &args.command {
        commandline::CliCommands::Read { port } => {
            info!("Executing: Read boiler telemetry");
            let (client, config) = connect(&store, &settings, port.as_deref()).await?;
            let readings = client
                .read_readings(&CancellationToken::new())
                .await
                .with_context(|| "Cannot read boiler telemetry")?;
            println!("Plant '{}' on {}:", config.plant_id, config.port);
            for reading in &readings {
                println!("  {reading}");
            }
            client
                .disconnect()
                .await
                .context("Cannot close the serial port")?;
        }
        commandline::CliCommands::ReadRegisters {
            address,
            count,
            port,
        } => {
            info!("Executing: Read {count} registers from {address}");
            let (client, _) = connect(&store, &settings, port.as_deref()).await?;
            let frame = client
                .read_block(*address, *count, &CancellationToken::new())
                .await
                .with_context(|| format!("Cannot read {count} registers from {address}"))?;
            let start = frame.block().start() as u32;
            for (offset, word) in frame.words().enumerate() {
                let register = start + offset as u32;
                println!("{register:5} (0x{register:04X}): {word:5} (0x{word:04X})");
            }
            client
                .disconnect()
                .await
                .context("Cannot close the serial port")?;
        }
        commandline::CliCommands::Daemon {
            poll_interval,
            port,
            output,
        } => {
            let (client, config) = connect(&store, &settings, port.as_deref()).await?;
            let interval = poll_interval.unwrap_or(settings.poll_interval);
            handle_daemon(client, config, interval, *output).await?;
        }
        commandline::CliCommands::ListPorts | commandline::CliCommands::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boiler_telemetry_lib::protocol::{RawFrame, RegisterMap};

    #[test]
    fn json_document_layout() {
        let map = RegisterMap::default();
        let block = map.block().unwrap();
        let frame = RawFrame::new(block, vec![0; block.byte_len()]).unwrap();
        let readings = map.decode(&frame).unwrap();

        let document = serde_json::json!({ "plantId": "PLANT-01", "readings": readings });
        assert_eq!(document["plantId"], "PLANT-01");
        assert_eq!(document["readings"].as_array().unwrap().len(), 3);
        assert_eq!(document["readings"][2]["id"], 3);
        assert_eq!(document["readings"][0]["processStartTime"], "00:00:00");
    }
}
