//! Protocol adapters for vendor NVR APIs.
//!
//! Each vendor's wire protocol is hidden behind [`DeviceStatusProbe`]; the
//! factory picks the implementation from the device's declared brand. Two
//! protocols are supported:
//!
//! - **Dahua**: JSON-RPC with a login session and request sequence numbers
//! - **Hikvision**: ISAPI XML endpoints behind digest authentication
//!
//! Adapters tolerate partial responses. Disk figures are the load-bearing
//! signal for alarms, so a failed disk fetch fails the probe; channel and
//! network sub-calls are best-effort and default when they fail.

pub mod dahua;
pub mod factory;
pub mod hikvision;
pub mod xml;

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::NormalizedStatus;
use crate::error::Result;

/// Connection facts handed to an adapter. The password is plaintext here;
/// decryption happens at the collector boundary.
#[derive(Debug, Clone)]
pub struct ConnectionFacts {
    pub ip: IpAddr,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ConnectionFacts {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

/// Vendor identity fields. Absent fields default to empty strings rather
/// than failing the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_name: String,
    pub device_id: String,
    pub device_type: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
}

/// Outcome of a connectivity test. Never an error: failures are folded into
/// `success = false` plus a human-readable message.
#[derive(Debug, Clone)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
}

/// Uniform status-probe capability over one device.
#[async_trait]
pub trait DeviceStatusProbe: Send + Sync {
    async fn fetch_device_info(&self) -> Result<DeviceInfo>;

    /// One full status poll: disk summary plus best-effort channel and
    /// network telemetry, issued concurrently against the same session.
    async fn fetch_device_status(&self) -> Result<NormalizedStatus>;

    async fn test_connection(&self) -> ConnectionTest {
        match self.fetch_device_info().await {
            Ok(info) => ConnectionTest {
                success: true,
                message: format!("connected: {} {}", info.model, info.serial_number),
            },
            Err(e) => ConnectionTest {
                success: false,
                message: e.to_string(),
            },
        }
    }
}
