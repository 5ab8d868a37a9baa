use std::net::IpAddr;
use std::time::Duration;

use tracing::trace;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Seed devices registered into the store at startup.
    pub devices: Option<Vec<DeviceConfig>>,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Cycle intervals and the per-probe network timeout, in seconds.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,

    #[serde(default = "default_alarm_interval")]
    pub alarm_interval: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            collection_interval: default_collection_interval(),
            alarm_interval: default_alarm_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl ScheduleConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DeviceConfig {
    pub id: Option<String>,
    pub name: String,
    pub brand: String,
    pub ip: IpAddr,
    pub port: u16,
    pub username: String,
    /// Stored ciphertext; decrypted through the credential cipher port.
    pub password: String,
    #[serde(default)]
    pub channel_count: u32,
}

fn default_collection_interval() -> u64 {
    30
}

fn default_alarm_interval() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    10
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
