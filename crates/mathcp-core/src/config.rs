//! mathcp.toml configuration parser.
//!
//! Every section and key is optional; a missing file section falls back
//! to the built-in defaults. Command-line overrides are applied on top
//! with [`MathcpConfig::with_overrides`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathcpConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub pool: PoolSettings,
    pub framing: FramingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep between scheduling passes, in milliseconds.
    pub pause_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { pause_ms: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Worker thread cap. Unset means one per available CPU.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub delimiter: String,
    pub terminator: String,
    pub encoding: String,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            delimiter: "\n".to_string(),
            terminator: "\r\n".to_string(),
            encoding: "utf8".to_string(),
        }
    }
}

impl MathcpConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MathcpConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Replace the listen address parts that were given explicitly.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.scheduler.pause_ms)
    }
}
