pub mod adapters;
pub mod alarm;
pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod store;
pub mod util;

use serde::{Deserialize, Serialize};

use crate::util::{bytes_to_gb, round2};

/// Vendor-agnostic snapshot of one device poll.
///
/// Produced by a protocol adapter, persisted verbatim as a
/// [`store::schema::StatusRecord`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedStatus {
    pub disk: DiskSummary,
    pub recording: RecordingState,
    pub channels: ChannelSummary,
    pub network: NetworkState,
    /// Raw vendor payload, retained for diagnostics.
    pub raw: serde_json::Value,
}

/// Aggregated disk figures across all disks of a device, in gigabytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskSummary {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    /// Usage percentage in [0, 100], two decimals.
    ///
    /// Always recomputed from used/total; vendor-reported rates are ignored
    /// since some firmwares omit or misreport them.
    pub usage_rate: f64,
}

impl DiskSummary {
    /// Build a summary from vendor byte counts.
    ///
    /// A zero-capacity device reports 0% instead of dividing by zero.
    pub fn from_bytes(total: f64, used: f64, free: f64) -> Self {
        let usage_rate = if total > 0.0 {
            round2((used / total * 100.0).clamp(0.0, 100.0))
        } else {
            0.0
        };

        Self {
            total_gb: round2(bytes_to_gb(total)),
            used_gb: round2(bytes_to_gb(used)),
            free_gb: round2(bytes_to_gb(free)),
            usage_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub online: u32,
    pub total: u32,
}

/// Recording state as far as the vendor protocol exposes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingState {
    Recording,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkState {
    Online,
    Unstable,
    #[default]
    Unknown,
}
