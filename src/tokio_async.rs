//! Stateless, asynchronous register reads against an open [`Transport`].
//!
//! [`RegisterReader`] splits a [`RegisterBlock`] into requests the device can
//! answer, retries requests that time out and assembles the answers into a
//! single [`RawFrame`]. It does not own the transport; callers are expected
//! to hold exclusive access for the duration of a read (see
//! [`crate::tokio_async_safe_client::SafeClient`]).
//!
//! # Example
//!
//! ```no_run
//! use boiler_telemetry_lib::protocol::RegisterBlock;
//! use boiler_telemetry_lib::tokio_async::{ReadPolicy, RegisterReader};
//! use boiler_telemetry_lib::transport::SerialAsciiTransport;
//! use boiler_telemetry_lib::tokio_common::{REQUEST_TIMEOUT, SLAVE_ID};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = SerialAsciiTransport::open("/dev/ttyUSB0", SLAVE_ID, REQUEST_TIMEOUT)?;
//!     let reader = RegisterReader::new(ReadPolicy::default())?;
//!     let block = RegisterBlock::new(4466, 42)?;
//!     let frame = reader
//!         .read_block(&mut transport, block, &CancellationToken::new())
//!         .await?;
//!     println!("Read {} bytes", frame.as_bytes().len());
//!     Ok(())
//! }
//! ```

use crate::{
    protocol::{self as proto, RawFrame, RegisterBlock},
    tokio_common::{Error, Result},
    transport::Transport,
};
use log::*;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How register ranges are requested from the device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadPolicy {
    /// Most registers requested at once.
    pub max_chunk: u16,
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    /// Pause after a timed out attempt.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            max_chunk: proto::DEFAULT_MAX_CHUNK,
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Reads register blocks in chunks, retrying timed out requests.
#[derive(Debug, Clone)]
pub struct RegisterReader {
    policy: ReadPolicy,
}

impl RegisterReader {
    /// Creates a reader, validating the chunk size of `policy`.
    pub fn new(policy: ReadPolicy) -> Result<Self> {
        if !(1..=proto::MAX_REGISTERS_PER_REQUEST).contains(&policy.max_chunk) {
            return Err(proto::Error::ChunkSizeOutOfRange(policy.max_chunk).into());
        }
        Ok(Self {
            policy: ReadPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        })
    }

    pub fn policy(&self) -> &ReadPolicy {
        &self.policy
    }

    /// Reads `block` through `transport`.
    ///
    /// The block is requested in chunks of at most `max_chunk` registers, in
    /// ascending address order. A chunk that fails fails the whole block; no
    /// partial frame is ever returned.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `cancel` fired before a request was issued.
    /// * [`Error::TimeoutExhausted`] if every attempt of a chunk timed out.
    /// * [`Error::DecodeError`] with `LengthMismatch` if the device returned
    ///   the wrong number of bytes.
    /// * Any other transport error, unchanged and without retry.
    pub async fn read_block(
        &self,
        transport: &mut dyn Transport,
        block: RegisterBlock,
        cancel: &CancellationToken,
    ) -> Result<RawFrame> {
        let mut bytes = Vec::with_capacity(block.byte_len());
        for chunk in block.chunks(self.policy.max_chunk) {
            let data = self.read_chunk(transport, &chunk, cancel).await?;
            if data.len() != chunk.byte_len() {
                return Err(proto::Error::LengthMismatch {
                    expected: chunk.byte_len(),
                    actual: data.len(),
                }
                .into());
            }
            bytes.extend_from_slice(&data);
        }
        Ok(RawFrame::new(block, bytes)?)
    }

    async fn read_chunk(
        &self,
        transport: &mut dyn Transport,
        chunk: &RegisterBlock,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let attempts = self.policy.max_attempts;
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match transport.read_holding_registers(chunk).await {
                Ok(data) => {
                    trace!("Registers {chunk}: {data:02X?}");
                    return Ok(data);
                }
                Err(err) if err.is_timeout() && attempt < attempts => {
                    warn!("Reading registers {chunk} failed (attempt {attempt}/{attempts}): {err}");
                    tokio::select! {
                        _ = tokio::time::sleep(self.policy.retry_delay) => {}
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                    }
                }
                Err(err) if err.is_timeout() => {
                    warn!("Reading registers {chunk} timed out {attempts} times, giving up");
                    return Err(Error::TimeoutExhausted { attempts });
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::TimeoutExhausted { attempts })
    }
}
