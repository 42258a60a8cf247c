//! Periodic polling of the process image.
//!
//! A [`PollingScheduler`] runs one read-decode-publish cycle per tick on a
//! shared [`SafeClient`] and hands the outcome to a [`TelemetrySink`]. Cycles
//! run inside the polling task, so a slow cycle delays the next tick instead
//! of overlapping with it; ticks missed meanwhile are skipped.

use crate::{
    protocol::BoilerReading,
    tokio_async_safe_client::SafeClient,
    tokio_common::Error,
    transport::Connector,
};
use log::*;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest accepted polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receives the outcome of every poll cycle.
pub trait TelemetrySink: Send {
    /// Readings of a successful cycle, one per boiler.
    fn on_readings(&mut self, readings: Vec<BoilerReading>);

    /// The cycle was skipped because no connection is open.
    fn on_skipped(&mut self) {
        debug!("Not connected, poll cycle skipped");
    }

    /// The cycle failed. Polling continues with the next tick.
    fn on_error(&mut self, err: &Error) {
        warn!("Poll cycle failed: {err}");
    }
}

impl<F> TelemetrySink for F
where
    F: FnMut(Vec<BoilerReading>) + Send,
{
    fn on_readings(&mut self, readings: Vec<BoilerReading>) {
        self(readings)
    }
}

/// Drives [`SafeClient::read_readings`] at a fixed interval.
pub struct PollingScheduler<C> {
    client: SafeClient<C>,
    interval: Duration,
}

impl<C: Connector + 'static> PollingScheduler<C> {
    pub fn new(client: SafeClient<C>, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {interval:?} is too short, using {MIN_POLL_INTERVAL:?}"
            );
        }
        Self {
            client,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until `cancel` fires.
    ///
    /// The first cycle starts immediately. A cancellation during a cycle is
    /// honored before the next register request, so the task ends within one
    /// tick.
    pub async fn run<S: TelemetrySink>(&self, cancel: CancellationToken, mut sink: S) {
        info!("Polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.poll_once(&cancel, &mut sink).await {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("Polling stopped");
    }

    /// Moves the scheduler onto its own task.
    pub fn spawn<S>(self, cancel: CancellationToken, sink: S) -> JoinHandle<()>
    where
        S: TelemetrySink + 'static,
    {
        tokio::spawn(async move { self.run(cancel, sink).await })
    }

    /// Runs one cycle. Returns `false` once the cycle saw the cancellation.
    async fn poll_once<S: TelemetrySink>(&self, cancel: &CancellationToken, sink: &mut S) -> bool {
        match self.client.read_readings(cancel).await {
            Ok(readings) => sink.on_readings(readings),
            Err(Error::NotConnected) => sink.on_skipped(),
            Err(Error::Cancelled) => return false,
            Err(err) => sink.on_error(&err),
        }
        !cancel.is_cancelled()
    }
}
