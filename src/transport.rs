//! The seam between the polling engine and the serial line.
//!
//! [`Transport`] is one open, half-duplex link to the PLC; [`Connector`]
//! opens such links. The engine only ever talks to these traits, so tests
//! can substitute scripted fakes for the real serial port.

use crate::{protocol::RegisterBlock, tokio_common::Result};
use async_trait::async_trait;

/// An open link able to answer "Read Holding Registers" requests.
#[async_trait]
pub trait Transport: Send {
    /// Reads `block` and returns its data bytes, two per register.
    ///
    /// A request that does not complete in time must fail with
    /// [`Error::Timeout`](crate::tokio_common::Error::Timeout) so the caller
    /// can retry it.
    async fn read_holding_registers(&mut self, block: &RegisterBlock) -> Result<Vec<u8>>;

    /// Releases the underlying handle.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to a named port.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, port: &str) -> Result<Box<dyn Transport>>;
}

#[cfg(feature = "serial")]
pub use serial::{SerialAsciiTransport, SerialConnector};

#[cfg(feature = "serial")]
mod serial {
    use super::{Connector, Transport};
    use crate::{
        ascii,
        protocol::RegisterBlock,
        tokio_common::{self, Error, Result},
    };
    use async_trait::async_trait;
    use log::*;
    use std::fmt;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_serial::{SerialPort, SerialStream};

    /// Modbus ASCII over a `tokio_serial::SerialStream`.
    pub struct SerialAsciiTransport {
        port: String,
        stream: Option<SerialStream>,
        slave: u8,
        timeout: Duration,
    }

    impl fmt::Debug for SerialAsciiTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("SerialAsciiTransport")
                .field("port", &self.port)
                .field("open", &self.stream.is_some())
                .field("slave", &self.slave)
                .field("timeout", &self.timeout)
                .finish()
        }
    }

    impl SerialAsciiTransport {
        /// Opens `port` with the fixed 9600 7E1 line settings.
        pub fn open(port: &str, slave: u8, timeout: Duration) -> Result<Self> {
            let stream = SerialStream::open(&tokio_common::serial_port_builder(port)).map_err(
                |err| Error::Connection {
                    port: port.to_string(),
                    source: err.into(),
                },
            )?;
            Ok(Self {
                port: port.to_string(),
                stream: Some(stream),
                slave,
                timeout,
            })
        }

        async fn transact(stream: &mut SerialStream, request: &[u8]) -> Result<Vec<u8>> {
            stream.write_all(request).await?;
            stream.flush().await?;

            let mut frame = Vec::with_capacity(ascii::MAX_FRAME_LEN);
            let mut buf = [0u8; 64];
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                frame.extend_from_slice(&buf[..n]);
                if frame.ends_with(b"\n") || frame.len() > ascii::MAX_FRAME_LEN {
                    return Ok(frame);
                }
            }
        }
    }

    #[async_trait]
    impl Transport for SerialAsciiTransport {
        async fn read_holding_registers(&mut self, block: &RegisterBlock) -> Result<Vec<u8>> {
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            // Drop leftovers of an answer that arrived after a previous timeout.
            stream
                .clear(tokio_serial::ClearBuffer::Input)
                .map_err(std::io::Error::from)?;

            let request = ascii::encode_read_holding_registers(self.slave, block);
            trace!("{} -> {}", self.port, String::from_utf8_lossy(&request).trim_end());
            let frame = tokio::time::timeout(self.timeout, Self::transact(stream, &request))
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
            trace!("{} <- {}", self.port, String::from_utf8_lossy(&frame).trim_end());

            Ok(ascii::decode_read_holding_registers(&frame, self.slave, block)?)
        }

        async fn close(&mut self) -> Result<()> {
            if let Some(mut stream) = self.stream.take() {
                // the port is released when `stream` drops, flushed or not
                stream.flush().await?;
                debug!("Closed serial port {}", self.port);
            }
            Ok(())
        }
    }

    /// Opens [`SerialAsciiTransport`]s talking to one slave.
    #[derive(Debug, Clone)]
    pub struct SerialConnector {
        slave: u8,
        timeout: Duration,
    }

    impl SerialConnector {
        pub fn new(slave: u8, timeout: Duration) -> Self {
            Self { slave, timeout }
        }
    }

    impl Default for SerialConnector {
        fn default() -> Self {
            Self::new(tokio_common::SLAVE_ID, tokio_common::REQUEST_TIMEOUT)
        }
    }

    #[async_trait]
    impl Connector for SerialConnector {
        async fn open(&self, port: &str) -> Result<Box<dyn Transport>> {
            Ok(Box::new(SerialAsciiTransport::open(
                port,
                self.slave,
                self.timeout,
            )?))
        }
    }
}
