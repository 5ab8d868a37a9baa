//! Row types shared with the administrative/storage layer.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NormalizedStatus;
use crate::adapters::factory::Brand;

/// Connection facts and denormalized health of one NVR.
///
/// Owned by the administrative layer; the core reads connection facts and
/// writes only the online flag, the last-online/last-offline stamps and the
/// denormalized disk usage figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub brand: Brand,
    pub ip: IpAddr,
    pub port: u16,
    pub username: String,
    /// Ciphertext as stored; opened through the credential cipher port.
    pub password: String,
    pub channel_count: u32,
    pub state: DeviceState,
    pub company_id: Option<String>,

    pub online: bool,
    pub last_online_at: Option<DateTime<Utc>>,
    pub last_offline_at: Option<DateTime<Utc>>,
    /// Last known disk usage percentage, kept on the device row so fleet
    /// listings don't have to join against status history.
    pub disk_usage_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Active,
    Inactive,
}

/// One persisted poll result. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: String,
    pub device_id: String,
    pub status: NormalizedStatus,
    pub collected_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(device_id: &str, status: NormalizedStatus, collected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            status,
            collected_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: String,
    pub device_id: String,
    pub category: AlarmCategory,
    pub severity: Severity,
    pub title: String,
    pub content: String,
    /// The reading that tripped the rule, e.g. "95.2%" or "OFFLINE".
    pub value: String,
    pub status: AlarmState,
    pub handler_id: Option<String>,
    pub handled_at: Option<DateTime<Utc>>,
    pub handle_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmCategory {
    Disk,
    Device,
    Network,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Pending,
    Handled,
}
