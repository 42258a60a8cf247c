use anyhow::{Context, Result};
use boiler_telemetry_lib::{
    protocol::RegisterMap, tokio_async::ReadPolicy, tokio_common::REQUEST_TIMEOUT,
};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Deployment specific tuning of the poller, read from a YAML file.
///
/// Every key is optional:
///
/// ```yaml
/// poll_interval: 2s
/// request_timeout: 10s
/// register_map:
///   base_address: 4466
///   boilers: 3
///   layout: [reactorTemp, separatorTemp, furnaceTemp]
/// read_policy:
///   max_chunk: 14
///   max_attempts: 3
///   retry_delay: 500ms
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub register_map: RegisterMap,
    pub read_policy: ReadPolicy,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            register_map: RegisterMap::default(),
            read_policy: ReadPolicy::default(),
            poll_interval: Duration::from_secs(2),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl PollerSettings {
    /// Loads the settings from `path`, or the defaults if no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        log::debug!("Loading settings from {path:?}");
        let file =
            File::open(path).with_context(|| format!("Cannot open settings file {path:?}"))?;
        serde_yaml::from_reader(file).with_context(|| format!("Invalid settings file {path:?}"))
    }
}
