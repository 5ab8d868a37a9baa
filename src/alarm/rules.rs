//! The fixed alarm rule set.
//!
//! Rules are data: an ordered table of pure predicates over [`RuleInput`],
//! not a trait hierarchy. The order is stable so cycles are deterministic;
//! it does not affect which rules fire, since rules are evaluated
//! independently and are not mutually exclusive (except where the predicates
//! themselves partition a range, as the two disk rules do at 90%).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NetworkState;
use crate::store::schema::{AlarmCategory, Device, Severity, StatusRecord};

/// Fleet-wide default cooldown between repeated alarms of one rule on one
/// device. Rules may override it; none of the default set does.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// A device is considered "just recovered" while its last offline stamp is
/// at most this old.
const RECENT_OFFLINE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    DiskFull,
    DiskWarning,
    DeviceOffline,
    DeviceOnline,
    NetworkUnstable,
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            RuleId::DiskFull => "DISK_FULL",
            RuleId::DiskWarning => "DISK_WARNING",
            RuleId::DeviceOffline => "DEVICE_OFFLINE",
            RuleId::DeviceOnline => "DEVICE_ONLINE",
            RuleId::NetworkUnstable => "NETWORK_UNSTABLE",
        };
        write!(f, "{code}")
    }
}

/// The view of a device a rule predicate sees.
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub disk_usage_rate: f64,
    pub online: bool,
    pub network: NetworkState,
    pub was_offline_recently: bool,
    pub channels_online: u32,
    pub channels_total: u32,
}

impl RuleInput {
    /// Assemble the rule view from the device row and its latest status
    /// record, if any. A device with no history evaluates with zeroed
    /// telemetry; the online flag still comes from the device row.
    pub fn build(device: &Device, latest: Option<&StatusRecord>, now: DateTime<Utc>) -> Self {
        let was_offline_recently = device.last_offline_at.is_some_and(|at| {
            let age = now.signed_duration_since(at);
            age >= chrono::Duration::zero()
                && age <= chrono::Duration::seconds(RECENT_OFFLINE_WINDOW_SECS)
        });

        Self {
            disk_usage_rate: latest.map_or(0.0, |r| r.status.disk.usage_rate),
            online: device.online,
            network: latest.map_or(NetworkState::Unknown, |r| r.status.network),
            was_offline_recently,
            channels_online: latest.map_or(0, |r| r.status.channels.online),
            channels_total: latest.map_or(0, |r| r.status.channels.total),
        }
    }
}

pub struct AlarmRule {
    pub id: RuleId,
    pub name: &'static str,
    pub category: AlarmCategory,
    pub severity: Severity,
    pub predicate: fn(&RuleInput) -> bool,
    pub message: &'static str,
    pub enabled: bool,
    pub cooldown: Duration,
}

impl AlarmRule {
    /// The reading recorded on the alarm: usage for disk rules, the
    /// online-state word otherwise.
    pub fn captured_value(&self, input: &RuleInput) -> String {
        match self.category {
            AlarmCategory::Disk => format!("{}%", input.disk_usage_rate),
            _ => {
                if input.online {
                    "ONLINE".to_string()
                } else {
                    "OFFLINE".to_string()
                }
            }
        }
    }
}

/// The default rule table, in stable evaluation order.
pub fn default_rules() -> &'static [AlarmRule] {
    const RULES: &[AlarmRule] = &[
        AlarmRule {
            id: RuleId::DiskFull,
            name: "硬盘空间不足",
            category: AlarmCategory::Disk,
            severity: Severity::High,
            predicate: |input| input.disk_usage_rate >= 90.0,
            message: "硬盘使用率超过90%",
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
        },
        AlarmRule {
            id: RuleId::DiskWarning,
            name: "硬盘空间预警",
            category: AlarmCategory::Disk,
            severity: Severity::Medium,
            predicate: |input| input.disk_usage_rate >= 80.0 && input.disk_usage_rate < 90.0,
            message: "硬盘使用率超过80%",
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
        },
        AlarmRule {
            id: RuleId::DeviceOffline,
            name: "设备离线",
            category: AlarmCategory::Device,
            severity: Severity::High,
            predicate: |input| !input.online,
            message: "设备已离线",
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
        },
        AlarmRule {
            id: RuleId::DeviceOnline,
            name: "设备上线",
            category: AlarmCategory::Device,
            severity: Severity::Info,
            predicate: |input| input.online && input.was_offline_recently,
            message: "设备已恢复在线",
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
        },
        AlarmRule {
            id: RuleId::NetworkUnstable,
            name: "网络不稳定",
            category: AlarmCategory::Network,
            severity: Severity::Medium,
            predicate: |input| input.network == NetworkState::Unstable,
            message: "网络连接不稳定",
            enabled: true,
            cooldown: DEFAULT_COOLDOWN,
        },
    ];
    RULES
}
