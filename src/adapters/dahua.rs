//! Dahua DHAPI adapter (session-authenticated JSON-RPC).
//!
//! The device speaks a method-invocation protocol: `POST /RPC2_Login` yields
//! an opaque session token, and every subsequent `POST /RPC2` carries an
//! incrementing request id plus that token. When the device reports the
//! session as invalid the adapter drops it and re-authenticates in place, so
//! callers only ever observe added latency, never a session-expiry error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

use crate::error::{Error, Result};
use crate::{ChannelSummary, DiskSummary, NetworkState, NormalizedStatus, RecordingState};

use super::{ConnectionFacts, DeviceInfo, DeviceStatusProbe};

/// RPC response envelope. `params` is absent on some calls; `error` is only
/// present on failure.
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: bool,
    session: Option<String>,
    params: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: Option<String>,
}

pub struct DahuaAdapter {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Option<String>>,
    seq: AtomicU64,
}

impl DahuaAdapter {
    pub fn new(facts: &ConnectionFacts) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(facts.timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: facts.base_url(),
            username: facts.username.clone(),
            password: facts.password.clone(),
            session: Mutex::new(None),
            seq: AtomicU64::new(1),
        }
    }

    /// Authenticate and cache the session token.
    async fn login(&self) -> Result<String> {
        let url = format!("{}/RPC2_Login", self.base_url);
        let params = json!({
            "userName": self.username,
            "password": self.password,
        });

        let response = self.client.post(&url).json(&params).send().await?;
        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| Error::ProtocolError(e.to_string()))?;

        match (envelope.result, envelope.session) {
            (true, Some(session)) => {
                trace!("login succeeded");
                *self.session.lock().await = Some(session.clone());
                Ok(session)
            }
            _ => Err(Error::AuthenticationFailed(
                envelope
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "login rejected".to_string()),
            )),
        }
    }

    /// Issue one RPC, logging in first when no session is cached and retrying
    /// once through a fresh login when the device rejects the session.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let session = {
            let cached = self.session.lock().await.clone();
            match cached {
                Some(session) => session,
                None => self.login().await?,
            }
        };

        match self.dispatch(method, &params, &session).await {
            Err(Error::AuthenticationFailed(message)) => {
                debug!("session rejected ({message}), re-authenticating");
                *self.session.lock().await = None;
                let session = self.login().await?;
                self.dispatch(method, &params, &session).await
            }
            other => other,
        }
    }

    async fn dispatch(&self, method: &str, params: &Value, session: &str) -> Result<Value> {
        let url = format!("{}/RPC2", self.base_url);
        let payload = json!({
            "id": self.seq.fetch_add(1, Ordering::Relaxed),
            "session": session,
            "method": method,
            "params": params,
        });

        trace!("RPC {method}");

        let response = self.client.post(&url).json(&payload).send().await?;
        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| Error::ProtocolError(e.to_string()))?;

        if envelope.result {
            return Ok(envelope.params.unwrap_or_else(|| json!({})));
        }

        let message = envelope
            .error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| format!("RPC {method} failed"));

        // Session-expiry surfaces as an error mentioning the session (or the
        // vendor's invalid-session code); report it as an auth failure so the
        // caller in `call` re-authenticates.
        let session_invalid = message.to_lowercase().contains("session")
            || envelope.error.as_ref().is_some_and(|e| e.code == 287_637_505);
        if session_invalid {
            return Err(Error::AuthenticationFailed(message));
        }

        Err(Error::ProtocolError(message))
    }

    /// Best-effort logout. A dropped session also just expires server-side,
    /// so failures are only logged.
    pub async fn logout(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };
        if let Err(e) = self.dispatch("magicBox.logout", &json!({}), &session).await {
            debug!("logout failed: {e}");
        }
    }

    async fn fetch_storage(&self) -> Result<(DiskSummary, Value)> {
        let raw = self.call("magicBox.getStorageDevice", json!({})).await?;

        let disks = raw
            .get("AHCI")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut total = 0.0;
        let mut used = 0.0;
        let mut free = 0.0;
        for disk in &disks {
            total += number_field(disk, "Capacity");
            used += number_field(disk, "UsedSpace");
            free += number_field(disk, "FreeSpace");
        }

        Ok((DiskSummary::from_bytes(total, used, free), raw))
    }

    async fn fetch_channels(&self) -> Result<u32> {
        let raw = self.call("magicBox.getChannelNumber", json!({})).await?;
        let analog = raw.get("Analog").and_then(Value::as_u64).unwrap_or(0);
        let digital = raw.get("Digital").and_then(Value::as_u64).unwrap_or(0);
        Ok((analog + digital) as u32)
    }

    /// Per-channel recording flags; `states[i] != 0` means channel i records.
    async fn fetch_record_status(&self) -> Result<Vec<bool>> {
        let raw = self.call("recordManager.getRecordStatus", json!({})).await?;
        let states = raw
            .get("states")
            .and_then(Value::as_array)
            .map(|states| {
                states
                    .iter()
                    .map(|s| s.as_i64().unwrap_or(0) != 0)
                    .collect()
            })
            .unwrap_or_default();
        Ok(states)
    }

    async fn fetch_network(&self) -> Result<NetworkState> {
        let raw = self.call("magicBox.getNetworkInfo", json!({})).await?;
        // A reachable device with an empty interface table is misconfigured
        // rather than offline.
        let has_address = raw
            .get("IP")
            .and_then(Value::as_str)
            .is_some_and(|ip| !ip.is_empty());
        Ok(if has_address {
            NetworkState::Online
        } else {
            NetworkState::Unstable
        })
    }
}

fn number_field(disk: &Value, field: &str) -> f64 {
    match disk.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[async_trait]
impl DeviceStatusProbe for DahuaAdapter {
    #[instrument(skip(self))]
    async fn fetch_device_info(&self) -> Result<DeviceInfo> {
        let raw = self.call("magicBox.getDeviceInfo", json!({})).await?;

        let text = |field: &str| {
            raw.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(DeviceInfo {
            device_name: text("DeviceName"),
            device_id: text("DeviceID"),
            device_type: text("DeviceType"),
            model: text("model"),
            serial_number: text("SerialNumber"),
            firmware_version: text("FirmwareVersion"),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_device_status(&self) -> Result<NormalizedStatus> {
        // Disk is mandatory; the rest is best-effort telemetry issued
        // concurrently against the same session.
        let (storage, channels, record, network) = tokio::join!(
            self.fetch_storage(),
            self.fetch_channels(),
            self.fetch_record_status(),
            self.fetch_network(),
        );

        let (disk, raw_storage) = storage?;

        let channel_total = channels.unwrap_or_else(|e| {
            warn!("channel query failed: {e}");
            0
        });
        let record_states = record.unwrap_or_else(|e| {
            warn!("record status query failed: {e}");
            Vec::new()
        });
        let network = network.unwrap_or_else(|e| {
            warn!("network query failed: {e}");
            NetworkState::Unknown
        });

        let recording_channels = record_states.iter().filter(|s| **s).count() as u32;
        let recording = if recording_channels > 0 {
            RecordingState::Recording
        } else {
            RecordingState::Unknown
        };

        Ok(NormalizedStatus {
            disk,
            recording,
            channels: ChannelSummary {
                online: recording_channels,
                total: channel_total.max(recording_channels),
            },
            network,
            raw: raw_storage,
        })
    }
}
