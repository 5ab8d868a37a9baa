//! Fleet-wide status collection.
//!
//! One cycle probes every active device concurrently, persists normalized
//! snapshots, keeps the online flag current and fans out status events.
//! Each probe's outcome is isolated: a hung or failing device costs the
//! cycle nothing but its own slot in the aggregate counts.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, instrument, warn};

use crate::NormalizedStatus;
use crate::adapters::factory::AdapterFactory;
use crate::adapters::ConnectionFacts;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus, device_topic};
use crate::store::schema::{Device, StatusRecord};
use crate::store::{CredentialCipher, DeviceStore};

/// Aggregate result of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Collector {
    store: Arc<dyn DeviceStore>,
    cipher: Arc<dyn CredentialCipher>,
    bus: Arc<EventBus>,
    probe_timeout: Duration,
    /// Devices with a probe currently in flight. A second probe for the same
    /// device is suppressed rather than queued, so one slow device never
    /// stacks requests against its own session.
    in_flight: Mutex<HashSet<String>>,
}

enum ProbeOutcome {
    Succeeded,
    Failed,
    Skipped,
}

impl Collector {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        cipher: Arc<dyn CredentialCipher>,
        bus: Arc<EventBus>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cipher,
            bus,
            probe_timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Poll every active device once, concurrently.
    ///
    /// Offline devices are included: the retry for an unreachable device is
    /// simply the next cycle reaching it again.
    #[instrument(skip(self))]
    pub async fn collect_all(&self) -> Result<CollectionOutcome> {
        let devices = self.store.list_active_devices().await?;
        debug!("collection cycle over {} devices", devices.len());

        let mut probes: FuturesUnordered<_> = devices
            .into_iter()
            .map(|device| self.collect_device(device))
            .collect();

        let mut outcome = CollectionOutcome::default();
        while let Some(result) = probes.next().await {
            match result {
                ProbeOutcome::Succeeded => outcome.succeeded += 1,
                ProbeOutcome::Failed => outcome.failed += 1,
                ProbeOutcome::Skipped => {}
            }
        }

        if outcome.succeeded + outcome.failed > 0 {
            debug!(
                "collection cycle done: {} succeeded, {} failed",
                outcome.succeeded, outcome.failed
            );
        }

        Ok(outcome)
    }

    /// Probe one device on demand and return the stored record.
    ///
    /// Unlike the cycle path, errors here surface to the caller: the
    /// administrative layer turns them into user-facing responses.
    #[instrument(skip(self))]
    pub async fn collect_one(&self, device_id: &str) -> Result<StatusRecord> {
        let device = self.store.get_device(device_id).await?;

        if !self.begin_probe(&device.id) {
            return Err(Error::ProbeInFlight(device.id));
        }

        let result = self.probe_and_persist(&device).await;
        self.end_probe(&device.id);
        result
    }

    /// Cycle-path wrapper: isolates one device's outcome and never errors.
    async fn collect_device(&self, device: Device) -> ProbeOutcome {
        if !self.begin_probe(&device.id) {
            debug!("probe for {} still in flight, skipping", device.id);
            return ProbeOutcome::Skipped;
        }

        let result = self.probe_and_persist(&device).await;
        self.end_probe(&device.id);

        match result {
            Ok(_) => ProbeOutcome::Succeeded,
            Err(e) => {
                warn!("collection failed for {} ({}): {e}", device.name, device.id);
                ProbeOutcome::Failed
            }
        }
    }

    async fn probe_and_persist(&self, device: &Device) -> Result<StatusRecord> {
        match self.probe(device).await {
            Ok(status) => self.persist_success(device, status).await,
            Err(e) => {
                let now = Utc::now();
                if let Err(store_err) = self
                    .store
                    .update_device_online_state(&device.id, false, now, None)
                    .await
                {
                    error!("offline-state write failed for {}: {store_err}", device.id);
                }
                Err(e)
            }
        }
    }

    /// The bounded network part of a probe: decrypt, build the adapter, fetch.
    async fn probe(&self, device: &Device) -> Result<NormalizedStatus> {
        let password = self.cipher.decrypt(&device.password)?;
        let facts = ConnectionFacts {
            ip: device.ip,
            port: device.port,
            username: device.username.clone(),
            password,
            timeout: self.probe_timeout,
        };

        let adapter = AdapterFactory::create(device.brand, &facts);

        tokio::time::timeout(self.probe_timeout, adapter.fetch_device_status())
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn persist_success(
        &self,
        device: &Device,
        status: NormalizedStatus,
    ) -> Result<StatusRecord> {
        let now = Utc::now();
        let usage_rate = status.disk.usage_rate;
        let record = StatusRecord::new(&device.id, status, now);

        self.store.append_status_record(record.clone()).await?;
        self.store
            .update_device_online_state(&device.id, true, now, Some(usage_rate))
            .await?;

        self.bus.publish_to(
            &device_topic(&device.id),
            Event::DeviceStatus {
                device_id: device.id.clone(),
                status: record.status.clone(),
                timestamp: now,
            },
        );
        self.bus.broadcast(Event::DeviceStatusUpdate {
            device_id: device.id.clone(),
            disk_usage_rate: usage_rate,
            online: true,
            timestamp: now,
        });

        Ok(record)
    }

    fn begin_probe(&self, device_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .insert(device_id.to_string())
    }

    fn end_probe(&self, device_id: &str) {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(device_id);
    }
}
