use boiler_telemetry_lib::config_store::ConfigStore;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;
use std::time::Duration;

fn parse_address(s: &str) -> Result<u16, String> {
    clap_num::maybe_hex::<u16>(s).map_err(|e| format!("Invalid register address format: {e}"))
}

fn parse_count(s: &str) -> Result<u16, String> {
    let count =
        clap_num::maybe_hex::<u16>(s).map_err(|e| format!("Invalid register count format: {e}"))?;
    if count == 0 {
        return Err(String::from("Register count must be at least 1"));
    }
    Ok(count)
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Print the stored plant identifier and serial port.
    Show,
    /// Change the stored plant identifier and/or serial port.
    Set {
        /// Identifier of the monitored plant.
        #[arg(long)]
        plant_id: Option<String>,
        /// Serial port the PLC is attached to.
        /// Examples: "/dev/ttyUSB0" (Linux), "COM9" (Windows).
        #[arg(long, verbatim_doc_comment)]
        port: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonOutput {
    /// Human readable lines on the standard output.
    Console,
    /// One JSON document per poll cycle on the standard output.
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// List the serial ports of this machine.
    ListPorts,

    /// Show or change the stored connection parameters.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Read and display the current telemetry of all boilers once.
    Read {
        /// Serial port to use instead of the stored one.
        /// The port is stored after a successful connect.
        #[arg(short, long, verbatim_doc_comment)]
        port: Option<String>,
    },

    /// Read and dump a raw range of holding registers.
    /// Address and count can be given in decimal or hexadecimal (e.g., "0x1172").
    #[clap(verbatim_doc_comment)]
    ReadRegisters {
        /// First holding register.
        #[arg(value_parser = parse_address)]
        address: u16,
        /// Number of registers to read.
        #[arg(value_parser = parse_count)]
        count: u16,
        /// Serial port to use instead of the stored one.
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Run in daemon mode: continuously poll the PLC at a specified interval
    /// until interrupted with Ctrl-C.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// Interval between poll cycles (e.g., "2s", "1m").
        /// Defaults to the settings file, or 2 seconds.
        #[arg(value_parser = humantime::parse_duration, short = 'i', long, verbatim_doc_comment)]
        poll_interval: Option<Duration>,

        /// Serial port to use instead of the stored one.
        #[arg(short, long)]
        port: Option<String>,

        /// Specifies the output.
        #[arg(short, long, value_enum, default_value_t = DaemonOutput::Console)]
        output: DaemonOutput,
    },
}

const fn about_text() -> &'static str {
    "Boiler monitor - Poll boiler telemetry from the plant PLC via Modbus ASCII."
}

#[derive(Parser, Debug)]
#[command(name="boilermon", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warnings only.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: CliCommands,

    /// File holding the plant identifier and the last used serial port.
    #[arg(global = true, long, default_value = ConfigStore::DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Optional YAML file with poller settings (register map, retries, timing).
    #[arg(global = true, long)]
    pub settings: Option<PathBuf>,
}
