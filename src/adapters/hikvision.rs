//! Hikvision ISAPI adapter (digest-authenticated XML endpoints).
//!
//! Every request carries a freshly computed digest Authorization header
//! (MD5 challenge-response with qop, request counter and client nonce) and
//! returns an XML document parsed with the tag scanner in [`super::xml`].
//! Missing optional fields default to empty/zero instead of failing a call.
//!
//! Disk sizes in `diskInfo` responses are reported in megabytes.

use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::RngCore;
use serde_json::json;
use tracing::{instrument, trace, warn};

use crate::error::{Error, Result};
use crate::util::mb_to_bytes;
use crate::{ChannelSummary, DiskSummary, NetworkState, NormalizedStatus, RecordingState};

use super::xml::{extract_blocks, extract_number, extract_tag};
use super::{ConnectionFacts, DeviceInfo, DeviceStatusProbe};

const DEVICE_INFO_PATH: &str = "/ISAPI/System/deviceInfo";
const DISK_INFO_PATH: &str = "/ISAPI/Storage/diskInfo";
const CHANNELS_PATH: &str = "/ISAPI/Streaming/channels";
const NETWORK_PATH: &str = "/ISAPI/System/network/interfaces";

pub struct HikvisionAdapter {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HikvisionAdapter {
    pub fn new(facts: &ConnectionFacts) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(facts.timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: facts.base_url(),
            username: facts.username.clone(),
            password: facts.password.clone(),
        }
    }

    /// Compute the digest Authorization header for one request.
    ///
    /// qop=auth with nc=00000001: each request opens a fresh nonce cycle, so
    /// the counter never advances within one.
    fn digest_header(&self, method: &str, uri: &str) -> String {
        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);

        let mut cnonce_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut cnonce_bytes);
        let cnonce = hex::encode(cnonce_bytes);

        let qop = "auth";
        let nc = "00000001";

        let ha1 = md5_hex(&format!("{}:{nonce}:{}", self.username, self.password));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"));

        format!(
            "Digest username=\"{}\", realm=\"Digest\", nonce=\"{nonce}\", uri=\"{uri}\", \
             qop={qop}, nc={nc}, cnonce=\"{cnonce}\", response=\"{response}\"",
            self.username
        )
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        trace!("GET {path}");

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.digest_header("GET", path))
            .header("Content-Type", "application/xml")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::AuthenticationFailed(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::ProtocolError(format!("HTTP {status} on {path}")));
        }

        Ok(response.text().await?)
    }

    async fn fetch_disks(&self) -> Result<(DiskSummary, String)> {
        let body = self.get(DISK_INFO_PATH).await?;
        let disks = extract_blocks(&body, "Disk");

        if disks.is_empty() && !body.contains("Disk") {
            return Err(Error::ProtocolError(
                "diskInfo response carries no disk list".to_string(),
            ));
        }

        let mut total = 0.0;
        let mut used = 0.0;
        let mut free = 0.0;
        for disk in &disks {
            total += mb_to_bytes(extract_number(disk, "capacity"));
            used += mb_to_bytes(extract_number(disk, "usedSpace"));
            free += mb_to_bytes(extract_number(disk, "freeSpace"));
        }

        Ok((DiskSummary::from_bytes(total, used, free), body))
    }

    async fn fetch_channels(&self) -> Result<ChannelSummary> {
        let body = self.get(CHANNELS_PATH).await?;
        let channels = extract_blocks(&body, "Channel");

        let total = channels.len() as u32;
        let online = channels
            .iter()
            .filter(|c| {
                extract_tag(c, "status")
                    .or_else(|| extract_tag(c, "Status"))
                    .is_some_and(|s| s.eq_ignore_ascii_case("online"))
            })
            .count() as u32;

        Ok(ChannelSummary { online, total })
    }

    async fn fetch_network(&self) -> Result<NetworkState> {
        let body = self.get(NETWORK_PATH).await?;
        let interfaces = extract_blocks(&body, "NetworkInterface");

        if interfaces.is_empty() {
            return Ok(NetworkState::Unknown);
        }

        // An interface reporting anything but an up/ok status marks the
        // device's uplink as unstable.
        let degraded = interfaces.iter().any(|iface| {
            extract_tag(iface, "status")
                .is_some_and(|s| !s.eq_ignore_ascii_case("up") && !s.eq_ignore_ascii_case("ok"))
        });

        Ok(if degraded {
            NetworkState::Unstable
        } else {
            NetworkState::Online
        })
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl DeviceStatusProbe for HikvisionAdapter {
    #[instrument(skip(self))]
    async fn fetch_device_info(&self) -> Result<DeviceInfo> {
        let body = self.get(DEVICE_INFO_PATH).await?;

        let text = |tag: &str| extract_tag(&body, tag).unwrap_or_default();

        Ok(DeviceInfo {
            device_name: text("deviceName"),
            device_id: text("deviceID"),
            device_type: text("deviceType"),
            model: text("model"),
            serial_number: text("serialNumber"),
            firmware_version: text("firmwareVersion"),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_device_status(&self) -> Result<NormalizedStatus> {
        let (disks, channels, network) = tokio::join!(
            self.fetch_disks(),
            self.fetch_channels(),
            self.fetch_network(),
        );

        // Disk metrics are mandatory; channel and network telemetry default
        // when their endpoints fail.
        let (disk, raw_body) = disks?;

        let channels = channels.unwrap_or_else(|e| {
            warn!("channel query failed: {e}");
            ChannelSummary::default()
        });
        let network = network.unwrap_or_else(|e| {
            warn!("network query failed: {e}");
            NetworkState::Unknown
        });

        let recording = if channels.online > 0 {
            RecordingState::Recording
        } else {
            RecordingState::Unknown
        };

        Ok(NormalizedStatus {
            disk,
            recording,
            channels,
            network,
            raw: json!({ "diskInfo": raw_body }),
        })
    }
}
