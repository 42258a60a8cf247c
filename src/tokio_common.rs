//! This module provides common data structures and error types for the `tokio`
//! based clients.
//!
//! It defines the `Error` enum, which encapsulates all possible communication
//! errors, and the fixed serial line settings of the boiler PLC.
use crate::{ascii, config_store, protocol as proto};
use std::time::Duration;

/// Represents all possible errors that can occur while talking to the PLC.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("Cannot open serial port '{port}': {source}")]
    Connection {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// A request was issued while no transport is open.
    #[error("Not connected to the PLC")]
    NotConnected,

    /// A single request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A request timed out on every attempt.
    #[error("Request timed out {attempts} times in a row")]
    TimeoutExhausted { attempts: u32 },

    /// The device answered with a malformed or unexpected frame.
    #[error("Modbus protocol error: {0}")]
    ProtocolError(#[from] ascii::FrameError),

    /// Wraps `std::io::Error` of the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The read was cancelled before the next request was issued.
    #[error("Read cancelled")]
    Cancelled,

    /// Wraps `proto::Error`.
    #[error(transparent)]
    DecodeError(#[from] proto::Error),

    /// Wraps `config_store::Error`.
    #[error(transparent)]
    ConfigError(#[from] config_store::Error),
}

impl Error {
    /// Only timeouts are considered transient and worth another attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// The result type for tokio operations.
pub type Result<T> = std::result::Result<T, crate::tokio_common::Error>;

/// The baud rate used for serial communication.
pub const BAUD_RATE: u32 = 9600;
/// The Modbus slave address of the PLC.
pub const SLAVE_ID: u8 = 1;
/// How long a single request may take before it counts as timed out.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(feature = "serial")]
/// The parity used for serial communication.
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::Even;
#[cfg(feature = "serial")]
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
#[cfg(feature = "serial")]
/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Seven;

/// Creates a `tokio_serial::SerialPortBuilder` for the PLC line (9600 7E1).
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0` or `COM9`).
#[cfg(feature = "serial")]
pub fn serial_port_builder(device: &str) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, BAUD_RATE)
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}
