//! Stateful alarm evaluation over the latest collected status.
//!
//! The engine owns the only mutable shared state in the core: the in-memory
//! cooldown map keyed by (device id, rule id). The map lives exactly as long
//! as the process. Losing it on restart means a standing condition may alarm
//! once more after a restart, which is accepted and documented rather than
//! persisted away.

pub mod rules;

pub use rules::{AlarmRule, RuleId, RuleInput, default_rules};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::events::{ALARMS_TOPIC, Event, EventBus};
use crate::store::DeviceStore;
use crate::store::schema::{AlarmRecord, AlarmState, Device};

/// Cooldown bookkeeping for one (device, rule) pair.
#[derive(Debug, Clone)]
struct CooldownEntry {
    alarm_id: String,
    fired_at: DateTime<Utc>,
}

pub struct AlarmEngine {
    store: Arc<dyn DeviceStore>,
    bus: Arc<EventBus>,
    rules: &'static [AlarmRule],
    cooldowns: Mutex<HashMap<(String, RuleId), CooldownEntry>>,
    /// Serializes alarm cycles: a cycle still running when the next trigger
    /// fires is skipped, not queued.
    cycle_gate: tokio::sync::Mutex<()>,
}

impl AlarmEngine {
    pub fn new(store: Arc<dyn DeviceStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            rules: default_rules(),
            cooldowns: Mutex::new(HashMap::new()),
            cycle_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Evaluate every enabled rule against every active device.
    ///
    /// Returns the number of alarms created. Overlapping invocations are
    /// collapsed: if a cycle is already running this returns immediately.
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> Result<usize> {
        let Ok(_gate) = self.cycle_gate.try_lock() else {
            debug!("previous alarm cycle still running, skipping this trigger");
            return Ok(0);
        };

        let devices = self.store.list_active_devices().await?;
        let now = Utc::now();

        let mut created = 0;
        for device in &devices {
            created += self.check_device(device, now).await;
        }

        if created > 0 {
            debug!("alarm cycle created {created} alarms");
        }

        Ok(created)
    }

    /// Evaluate one device. Failures are logged per (device, rule) and never
    /// stop the rest of the cycle.
    async fn check_device(&self, device: &Device, now: DateTime<Utc>) -> usize {
        let latest = match self.store.get_latest_status(&device.id).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("latest-status lookup failed for {}: {e}", device.id);
                return 0;
            }
        };

        let input = RuleInput::build(device, latest.as_ref(), now);

        let mut created = 0;
        for rule in self.rules.iter().filter(|r| r.enabled) {
            if !(rule.predicate)(&input) {
                continue;
            }

            match self.fire(device, rule, &input, now).await {
                Ok(true) => created += 1,
                Ok(false) => {} // suppressed by cooldown
                Err(e) => warn!("alarm write failed for {}/{}: {e}", device.id, rule.id),
            }
        }

        created
    }

    /// Create an alarm for a firing rule unless its cooldown is still open.
    async fn fire(
        &self,
        device: &Device,
        rule: &AlarmRule,
        input: &RuleInput,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let key = (device.id.clone(), rule.id);

        {
            let cooldowns = self.cooldowns.lock().expect("cooldown lock poisoned");
            if let Some(entry) = cooldowns.get(&key) {
                let elapsed = now.signed_duration_since(entry.fired_at);
                if elapsed < chrono::Duration::seconds(rule.cooldown.as_secs() as i64) {
                    trace!("{}/{} still cooling down, suppressed", device.id, rule.id);
                    return Ok(false);
                }
            }
        }

        let alarm = AlarmRecord {
            id: Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
            category: rule.category,
            severity: rule.severity,
            title: format!("{} - {}", device.name, rule.name),
            content: rule.message.to_string(),
            value: rule.captured_value(input),
            status: AlarmState::Pending,
            handler_id: None,
            handled_at: None,
            handle_content: None,
            created_at: now,
        };

        self.store.append_alarm_record(alarm.clone()).await?;

        self.cooldowns.lock().expect("cooldown lock poisoned").insert(
            key,
            CooldownEntry {
                alarm_id: alarm.id.clone(),
                fired_at: now,
            },
        );

        warn!("alarm: {} - {}", alarm.title, alarm.content);

        self.bus.publish_to(ALARMS_TOPIC, Event::NewAlarm { alarm });

        let pending = self.store.count_pending_alarms().await.unwrap_or(0);
        self.bus.broadcast(Event::AlarmCountUpdate {
            count: pending,
            timestamp: now,
        });

        Ok(true)
    }

    /// Transition an alarm pending -> handled.
    ///
    /// Also drops any cooldown entry pointing at this alarm, so a condition
    /// that is resolved and recurs may alarm again without waiting out the
    /// original window.
    #[instrument(skip(self, content))]
    pub async fn handle(
        &self,
        alarm_id: &str,
        handler_id: &str,
        content: &str,
    ) -> Result<AlarmRecord> {
        let handled = self
            .store
            .mark_alarm_handled(alarm_id, handler_id, content, Utc::now())
            .await?;

        self.cooldowns
            .lock()
            .expect("cooldown lock poisoned")
            .retain(|_, entry| entry.alarm_id != alarm_id);

        self.bus.broadcast(Event::AlarmHandled {
            alarm_id: alarm_id.to_string(),
            handler_id: handler_id.to_string(),
        });

        Ok(handled)
    }

    /// Pending alarms for the presentation layer, optionally company-scoped.
    pub async fn get_pending_alarms(&self, company_id: Option<&str>) -> Result<Vec<AlarmRecord>> {
        self.store.get_pending_alarms(company_id).await
    }

    #[cfg(test)]
    fn cooldown_count(&self) -> usize {
        self.cooldowns.lock().unwrap().len()
    }
}
