//! SDK configuration
//!
//! Values come from a TOML file overlaid with `DEX_SDK_*` environment
//! variables. Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::SdkResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub ws_url: String,
    /// Delay before reconnect attempt n is `reconnect_timeouts_ms[min(n, len - 1)]`
    pub reconnect_timeouts_ms: Vec<u64>,
    /// Attempt counter resets after this long without a new attempt
    pub reconnect_reset_window_ms: Option<u64>,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    /// Capacity of the transport event broadcast
    pub event_buffer: usize,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8001/ws".to_string(),
            reconnect_timeouts_ms: vec![1_000, 5_000, 30_000, 60_000],
            reconnect_reset_window_ms: Some(120_000),
            ping_interval_ms: 30_000,
            pong_timeout_ms: 60_000,
            event_buffer: 1024,
        }
    }
}

impl SdkConfig {
    /// Load configuration from a TOML file, then apply `DEX_SDK_*` overrides
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(
                config::Environment::with_prefix("DEX_SDK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("reconnect_timeouts_ms"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from an inline TOML document
    pub fn from_toml_str(contents: &str) -> SdkResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn reconnect_timeouts(&self) -> Vec<Duration> {
        self.reconnect_timeouts_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn reset_window(&self) -> Option<Duration> {
        self.reconnect_reset_window_ms.map(Duration::from_millis)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }
}
