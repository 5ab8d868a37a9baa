//! In-memory store implementation.
//!
//! Backs tests and single-process deployments. Status history is capped per
//! device so long-running processes don't grow without bound.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

use super::DeviceStore;
use super::schema::{AlarmRecord, AlarmState, Device, DeviceState, StatusRecord};

/// Maximum status records kept per device.
const MAX_HISTORY_PER_DEVICE: usize = 1000;

#[derive(Default)]
struct Inner {
    devices: HashMap<String, Device>,
    /// Status history per device, oldest first.
    history: HashMap<String, Vec<StatusRecord>>,
    /// Alarms in creation order.
    alarms: Vec<AlarmRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device. Used by bootstrap seeding and tests; the
    /// administrative layer owns device creation in production.
    pub async fn add_device(&self, device: Device) {
        let mut inner = self.inner.write().await;
        inner.devices.insert(device.id.clone(), device);
    }

    pub async fn device_count(&self) -> usize {
        self.inner.read().await.devices.len()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn list_active_devices(&self) -> Result<Vec<Device>> {
        let inner = self.inner.read().await;
        let mut devices: Vec<Device> = inner
            .devices
            .values()
            .filter(|d| d.state == DeviceState::Active)
            .cloned()
            .collect();
        // Stable roster order for deterministic cycles.
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    async fn get_device(&self, id: &str) -> Result<Device> {
        let inner = self.inner.read().await;
        inner
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))
    }

    async fn append_status_record(&self, record: StatusRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let history = inner.history.entry(record.device_id.clone()).or_default();
        history.push(record);
        if history.len() > MAX_HISTORY_PER_DEVICE {
            history.remove(0);
        }
        Ok(())
    }

    async fn update_device_online_state(
        &self,
        id: &str,
        online: bool,
        at: DateTime<Utc>,
        disk_usage_rate: Option<f64>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let device = inner
            .devices
            .get_mut(id)
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))?;

        device.online = online;
        if online {
            device.last_online_at = Some(at);
            if let Some(rate) = disk_usage_rate {
                device.disk_usage_rate = rate;
            }
        } else {
            device.last_offline_at = Some(at);
        }

        debug!("device {id} online={online}");
        Ok(())
    }

    async fn get_latest_status(&self, device_id: &str) -> Result<Option<StatusRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .get(device_id)
            .and_then(|records| records.last().cloned()))
    }

    async fn query_status_history(
        &self,
        device_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<StatusRecord>> {
        let inner = self.inner.read().await;
        let records = inner
            .history
            .get(device_id)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .filter(|r| from.is_none_or(|f| r.collected_at >= f))
                    .filter(|r| to.is_none_or(|t| r.collected_at <= t))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }

    async fn append_alarm_record(&self, record: AlarmRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.alarms.push(record);
        Ok(())
    }

    async fn mark_alarm_handled(
        &self,
        id: &str,
        handler_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<AlarmRecord> {
        let mut inner = self.inner.write().await;
        let alarm = inner
            .alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::AlarmNotFound(id.to_string()))?;

        alarm.status = AlarmState::Handled;
        alarm.handler_id = Some(handler_id.to_string());
        alarm.handle_content = Some(content.to_string());
        alarm.handled_at = Some(at);

        Ok(alarm.clone())
    }

    async fn get_pending_alarms(&self, company_id: Option<&str>) -> Result<Vec<AlarmRecord>> {
        let inner = self.inner.read().await;
        let mut alarms: Vec<AlarmRecord> = inner
            .alarms
            .iter()
            .filter(|a| a.status == AlarmState::Pending)
            .filter(|a| match company_id {
                Some(company) => inner
                    .devices
                    .get(&a.device_id)
                    .is_some_and(|d| d.company_id.as_deref() == Some(company)),
                None => true,
            })
            .cloned()
            .collect();

        alarms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alarms)
    }

    async fn count_pending_alarms(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .alarms
            .iter()
            .filter(|a| a.status == AlarmState::Pending)
            .count())
    }
}
