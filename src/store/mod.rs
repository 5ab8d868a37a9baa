//! Ports to the administrative/storage layer.
//!
//! The core never talks to a database directly. Everything it needs from
//! persistent storage goes through the [`DeviceStore`] trait, and stored
//! credentials are opened through [`CredentialCipher`]. Production
//! implementations live with the administrative layer; [`MemoryStore`] backs
//! tests and single-process deployments.

pub mod memory;
pub mod schema;

pub use memory::MemoryStore;
pub use schema::{AlarmRecord, AlarmState, Device, DeviceState, StatusRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Query interface over devices, status history and alarms.
///
/// Implementations must support independent per-row writes; there is no
/// cross-device transaction requirement, and one device's write failing
/// must not roll back another's.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All devices with operational state Active, regardless of the online
    /// flag (offline devices are retried on every cycle).
    async fn list_active_devices(&self) -> Result<Vec<Device>>;

    /// Fails with [`crate::error::Error::DeviceNotFound`] for unknown ids.
    async fn get_device(&self, id: &str) -> Result<Device>;

    /// Append-only status history write.
    async fn append_status_record(&self, record: StatusRecord) -> Result<()>;

    /// Flip the online flag, stamp last-online/last-offline, and refresh the
    /// denormalized disk usage figure when one is available.
    async fn update_device_online_state(
        &self,
        id: &str,
        online: bool,
        at: DateTime<Utc>,
        disk_usage_rate: Option<f64>,
    ) -> Result<()>;

    async fn get_latest_status(&self, device_id: &str) -> Result<Option<StatusRecord>>;

    /// Status history for one device, newest first.
    async fn query_status_history(
        &self,
        device_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<StatusRecord>>;

    async fn append_alarm_record(&self, record: AlarmRecord) -> Result<()>;

    /// Transition an alarm pending -> handled, stamping handler and time.
    ///
    /// Fails with [`crate::error::Error::AlarmNotFound`] for unknown ids and
    /// must leave no trace in that case.
    async fn mark_alarm_handled(
        &self,
        id: &str,
        handler_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<AlarmRecord>;

    /// Pending alarms, newest first, optionally scoped to one company.
    async fn get_pending_alarms(&self, company_id: Option<&str>) -> Result<Vec<AlarmRecord>>;

    async fn count_pending_alarms(&self) -> Result<usize>;
}

/// Opaque credential decryption capability.
///
/// The real cipher (AES with a configured key/IV) belongs to the
/// administrative layer; the core only ever asks for plaintext.
pub trait CredentialCipher: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// Pass-through cipher for tests and unencrypted deployments.
pub struct PlainCredentials;

impl CredentialCipher for PlainCredentials {
    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }
}
