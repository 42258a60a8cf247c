//! A library for polling boiler telemetry from a PLC via Modbus ASCII.
//!
//! The PLC exposes the process image of three boilers as a contiguous range of
//! holding registers. This crate opens the serial link, reads that range in
//! chunks, retrying requests that time out, and decodes it into typed
//! [`protocol::BoilerReading`] records.
//!
//! The crate is layered, from the leaves up:
//!
//! 1.  **Pure protocol**: [`protocol`] describes register blocks, the register
//!     map and the decoding of raw words; [`ascii`] encodes and decodes Modbus
//!     ASCII frames.
//! 2.  **Transport**: [`transport::Transport`] is one open link,
//!     [`transport::Connector`] opens links. With the `serial` feature the
//!     crate provides a `tokio-serial` implementation (9600 baud, 7E1).
//! 3.  **Stateless reads**: [`tokio_async::RegisterReader`] chunks and retries
//!     reads against a transport it borrows.
//! 4.  **Stateful client**: [`tokio_async_safe_client::SafeClient`] owns the
//!     connection state machine and serializes connect, disconnect and reads.
//!     This is the recommended entry point.
//! 5.  **Polling**: [`scheduler::PollingScheduler`] runs read cycles at a fixed
//!     interval until cancelled.
//!
//! [`config_store`] persists the last used plant identifier and serial port.
//!
//! ## Quick Start
//!
//! ```no_run
//! use boiler_telemetry_lib::{
//!     config_store::ConfigStore,
//!     protocol::{BoilerReading, RegisterMap},
//!     scheduler::PollingScheduler,
//!     tokio_async::ReadPolicy,
//!     tokio_async_safe_client::SafeClient,
//!     transport::SerialConnector,
//! };
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigStore::default().load()?;
//!     let client = SafeClient::new(
//!         SerialConnector::default(),
//!         RegisterMap::default(),
//!         ReadPolicy::default(),
//!     )?;
//!     client.connect(&config).await?;
//!
//!     let cancel = CancellationToken::new();
//!     let poller = PollingScheduler::new(client, Duration::from_secs(2)).spawn(
//!         cancel.clone(),
//!         |readings: Vec<BoilerReading>| {
//!             for reading in readings {
//!                 println!("{reading}");
//!             }
//!         },
//!     );
//!
//!     tokio::signal::ctrl_c().await?;
//!     cancel.cancel();
//!     poller.await?;
//!     Ok(())
//! }
//! ```

pub mod ascii;
pub mod config_store;
pub mod protocol;
pub mod scheduler;
pub mod tokio_async;
pub mod tokio_async_safe_client;
pub mod tokio_common;
pub mod transport;
