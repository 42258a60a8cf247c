//! Stateful, thread-safe access to the boiler PLC.
//!
//! [`SafeClient`] owns the connection state machine. The open transport lives
//! behind an asynchronous mutex, so connecting, disconnecting and register
//! reads never overlap: callers queue for the lock in arrival order. Clones
//! share the same connection, which lets an on-demand reader and the
//! [`PollingScheduler`](crate::scheduler::PollingScheduler) use one link.
//!
//! ## Example
//!
//! ```no_run
//! use boiler_telemetry_lib::{
//!     config_store::ConnectionConfig,
//!     protocol::RegisterMap,
//!     tokio_async::ReadPolicy,
//!     tokio_async_safe_client::SafeClient,
//!     transport::SerialConnector,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SafeClient::new(
//!         SerialConnector::default(),
//!         RegisterMap::default(),
//!         ReadPolicy::default(),
//!     )?;
//!     client.connect(&ConnectionConfig::new("PLANT-01", "COM9")).await?;
//!
//!     for reading in client.read_readings(&CancellationToken::new()).await? {
//!         println!("{reading}");
//!     }
//!     Ok(())
//! }
//! ```

use crate::{
    config_store::ConnectionConfig,
    protocol::{BoilerReading, RawFrame, RegisterBlock, RegisterMap},
    tokio_async::{ReadPolicy, RegisterReader},
    tokio_common::{Error, Result},
    transport::{Connector, Transport},
};
use log::*;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

/// Whether a transport is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Result of [`SafeClient::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// An open transport was closed.
    Closed,
    /// There was no open transport.
    NothingToDisconnect,
}

enum Link {
    Disconnected,
    Connected {
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
    },
}

impl Link {
    /// Closes the open transport, if any, leaving the link disconnected.
    ///
    /// The link is disconnected afterwards even if closing the handle failed.
    async fn close(&mut self) -> Result<Disconnect> {
        match std::mem::replace(self, Link::Disconnected) {
            Link::Disconnected => Ok(Disconnect::NothingToDisconnect),
            Link::Connected {
                config,
                mut transport,
            } => {
                let closed = transport.close().await;
                info!("Disconnected from serial port {}", config.port);
                closed.map(|()| Disconnect::Closed)
            }
        }
    }
}

/// Asynchronous, cloneable client for the boiler PLC.
pub struct SafeClient<C> {
    link: Arc<Mutex<Link>>,
    // Mirrors `link`, only written while the link lock is held.
    state: Arc<watch::Sender<ConnectionState>>,
    connector: Arc<C>,
    reader: RegisterReader,
    register_map: RegisterMap,
}

impl<C> Clone for SafeClient<C> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            state: self.state.clone(),
            connector: self.connector.clone(),
            reader: self.reader.clone(),
            register_map: self.register_map.clone(),
        }
    }
}

impl<C: Connector> SafeClient<C> {
    /// Creates a disconnected client.
    pub fn new(connector: C, register_map: RegisterMap, policy: ReadPolicy) -> Result<Self> {
        register_map.block()?;
        Ok(Self {
            link: Arc::new(Mutex::new(Link::Disconnected)),
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
            connector: Arc::new(connector),
            reader: RegisterReader::new(policy)?,
            register_map,
        })
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.register_map
    }

    /// Opens the serial port named in `config`.
    ///
    /// An already open transport is closed first, so reconnecting never leaks
    /// a handle. If opening fails the client stays disconnected and the error
    /// of the serial layer is returned.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        let mut link = self.link.lock().await;
        if let Err(err) = link.close().await {
            warn!("Closing the previous connection failed: {err}");
        }
        self.state.send_replace(ConnectionState::Disconnected);

        if config.port.trim().is_empty() {
            return Err(Error::Connection {
                port: config.port.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "no serial port configured",
                ),
            });
        }
        match self.connector.open(&config.port).await {
            Ok(transport) => {
                info!(
                    "Connected to serial port {} (plant '{}')",
                    config.port, config.plant_id
                );
                *link = Link::Connected {
                    config: config.clone(),
                    transport,
                };
                self.state.send_replace(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                error!("Failed to connect to serial port {}: {err}", config.port);
                Err(err)
            }
        }
    }

    /// Closes the open transport.
    ///
    /// The client is disconnected afterwards in any case; an error reports
    /// that releasing the serial handle failed.
    pub async fn disconnect(&self) -> Result<Disconnect> {
        let mut link = self.link.lock().await;
        let result = link.close().await;
        self.state.send_replace(ConnectionState::Disconnected);
        result
    }

    /// The current connection state.
    ///
    /// Does not wait for a running read.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Notifies about every connect and disconnect.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// The configuration of the open connection.
    pub async fn connection(&self) -> Option<ConnectionConfig> {
        match &*self.link.lock().await {
            Link::Connected { config, .. } => Some(config.clone()),
            Link::Disconnected => None,
        }
    }

    /// Reads `count` registers starting at `start`.
    ///
    /// See [`RegisterReader::read_block`] for chunking, retries and errors.
    pub async fn read_block(
        &self,
        start: u16,
        count: u16,
        cancel: &CancellationToken,
    ) -> Result<RawFrame> {
        let block = RegisterBlock::new(start, count)?;
        let mut link = self.link.lock().await;
        match &mut *link {
            Link::Connected { transport, .. } => {
                self.reader
                    .read_block(transport.as_mut(), block, cancel)
                    .await
            }
            Link::Disconnected => Err(Error::NotConnected),
        }
    }

    /// Reads the process image and decodes it into one reading per boiler.
    pub async fn read_readings(&self, cancel: &CancellationToken) -> Result<Vec<BoilerReading>> {
        let block = self.register_map.block()?;
        let frame = self.read_block(block.start(), block.count(), cancel).await?;
        let readings = self.register_map.decode(&frame)?;
        if readings.len() < self.register_map.boilers as usize {
            warn!(
                "Decoded {} of {} boilers",
                readings.len(),
                self.register_map.boilers
            );
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{word_at, FakeConnector, Reply, Script};
    use assert_matches::assert_matches;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn client(script: &Script) -> SafeClient<FakeConnector> {
        SafeClient::new(
            FakeConnector::new(script.clone()),
            RegisterMap::default(),
            ReadPolicy::default(),
        )
        .unwrap()
    }

    fn config(port: &str) -> ConnectionConfig {
        ConnectionConfig::new("PLANT-01", port)
    }

    #[tokio::test]
    async fn connect_and_disconnect() {
        let script = Script::default();
        let client = client(&script);
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.connect(&config("COM9")).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(client.connection().await, Some(config("COM9")));

        assert_eq!(client.disconnect().await.unwrap(), Disconnect::Closed);
        assert!(!client.is_connected());
        assert_eq!(
            client.disconnect().await.unwrap(),
            Disconnect::NothingToDisconnect
        );
        assert_eq!(script.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconnect_closes_previous_transport() {
        let script = Script::default();
        let client = client(&script);

        client.connect(&config("COM9")).await.unwrap();
        client.connect(&config("COM9")).await.unwrap();
        client.connect(&config("COM3")).await.unwrap();

        assert_eq!(script.counters.opened.load(Ordering::SeqCst), 3);
        assert_eq!(script.counters.closed.load(Ordering::SeqCst), 2);
        assert_eq!(client.connection().await, Some(config("COM3")));
    }

    #[tokio::test]
    async fn failed_connect_leaves_client_disconnected() {
        let script = Script::default();
        let mut connector = FakeConnector::new(script.clone());
        connector.fail_ports.push("COM4".to_string());
        let client = SafeClient::new(connector, RegisterMap::default(), ReadPolicy::default())
            .unwrap();

        client.connect(&config("COM9")).await.unwrap();
        let result = client.connect(&config("COM4")).await;

        assert_matches!(result, Err(Error::Connection { ref port, .. }) if port == "COM4");
        assert!(!client.is_connected());
        assert_eq!(script.counters.closed.load(Ordering::SeqCst), 1);

        assert_matches!(
            client.connect(&config("  ")).await,
            Err(Error::Connection { .. })
        );
    }

    #[tokio::test]
    async fn read_requires_connection() {
        let script = Script::default();
        let client = client(&script);
        let cancel = CancellationToken::new();

        assert_matches!(
            client.read_block(4466, 42, &cancel).await,
            Err(Error::NotConnected)
        );
        assert_matches!(client.read_readings(&cancel).await, Err(Error::NotConnected));
        assert_eq!(script.requests(), 0);
    }

    #[tokio::test]
    async fn read_readings_decodes_three_boilers() {
        let script = Script::default();
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();

        let readings = client
            .read_readings(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(readings.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(readings[0].reactor_temp, Some(word_at(4466) as i16));
        assert_eq!(readings[1].reactor_temp, Some(word_at(4480) as i16));
        assert_eq!(readings[2].gas_tank_pressure, Some(word_at(4494 + 6) as i16));
    }

    #[tokio::test]
    async fn read_block_validates_range() {
        let client = client(&Script::default());
        client.connect(&config("COM9")).await.unwrap();

        assert_matches!(
            client.read_block(0xFFFF, 2, &CancellationToken::new()).await,
            Err(Error::DecodeError(_))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_are_serialized() {
        let script = Script::new(std::iter::repeat(Reply::Slow(Duration::from_millis(100))).take(6));
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();
        let other = client.clone();
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(client.read_readings(&cancel), other.read_readings(&cancel));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(script.requests(), 6);
        assert_eq!(script.counters.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_waits_for_running_read() {
        let script = Script::new([Reply::Slow(Duration::from_secs(1))]);
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();

        let reader = client.clone();
        let read = tokio::spawn(async move {
            reader.read_block(4466, 14, &CancellationToken::new()).await
        });
        tokio::task::yield_now().await;

        assert_eq!(client.disconnect().await.unwrap(), Disconnect::Closed);
        assert!(read.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn disconnect_reports_close_failure() {
        let script = Script::default();
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();
        script.counters.fail_close.store(true, Ordering::SeqCst);

        assert_matches!(client.disconnect().await, Err(Error::Io(_)));
        assert!(!client.is_connected());
        assert_eq!(client.connection().await, None);
        assert_eq!(
            client.disconnect().await.unwrap(),
            Disconnect::NothingToDisconnect
        );
        assert_eq!(script.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconnect_survives_close_failure() {
        let script = Script::default();
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();
        script.counters.fail_close.store(true, Ordering::SeqCst);

        client.connect(&config("COM3")).await.unwrap();

        assert!(client.is_connected());
        assert_eq!(script.counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(script.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_does_not_wait_for_running_read() {
        let script = Script::new(std::iter::repeat(Reply::Timeout).take(3));
        let client = client(&script);
        client.connect(&config("COM9")).await.unwrap();
        let mut changes = client.subscribe();

        let reader = client.clone();
        let read = tokio::spawn(async move {
            reader.read_block(4466, 14, &CancellationToken::new()).await
        });
        tokio::task::yield_now().await;
        assert_eq!(script.requests(), 1);

        let started = Instant::now();
        assert!(client.is_connected());
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(started.elapsed(), Duration::ZERO);

        assert_matches!(
            read.await.unwrap(),
            Err(Error::TimeoutExhausted { attempts: 3 })
        );
        assert!(started.elapsed() >= crate::tokio_common::REQUEST_TIMEOUT * 3);

        assert!(!changes.has_changed().unwrap());
        client.disconnect().await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), ConnectionState::Disconnected);
    }
}
