//! Helper functions for integration tests

use std::sync::Arc;
use std::time::Duration;

use nvr_monitoring::adapters::factory::Brand;
use nvr_monitoring::alarm::AlarmEngine;
use nvr_monitoring::collector::Collector;
use nvr_monitoring::events::EventBus;
use nvr_monitoring::store::schema::{Device, DeviceState};
use nvr_monitoring::store::{MemoryStore, PlainCredentials};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// ISAPI diskInfo document for a single-disk device at the given usage.
/// Sizes are in megabytes, as the vendor reports them.
pub fn hik_disk_xml(total_mb: u64, used_mb: u64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<DiskList version="2.0">
  <Disk>
    <id>1</id>
    <capacity>{total_mb}</capacity>
    <usedSpace>{used_mb}</usedSpace>
    <freeSpace>{}</freeSpace>
    <status>ok</status>
  </Disk>
</DiskList>"#,
        total_mb - used_mb
    )
}

pub fn hik_channels_xml(online: usize, offline: usize) -> String {
    let mut channels = String::new();
    for i in 0..online {
        channels.push_str(&format!(
            "<Channel><id>{}</id><status>online</status></Channel>",
            101 + i
        ));
    }
    for i in 0..offline {
        channels.push_str(&format!(
            "<Channel><id>{}</id><status>offline</status></Channel>",
            201 + i
        ));
    }
    format!("<ChannelList>{channels}</ChannelList>")
}

/// Mount a healthy Hikvision mock reporting the given disk usage.
pub async fn mount_hik_device(server: &MockServer, total_mb: u64, used_mb: u64) {
    Mock::given(method("GET"))
        .and(path("/ISAPI/Storage/diskInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hik_disk_xml(total_mb, used_mb)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/Streaming/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hik_channels_xml(8, 0)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/network/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<NetworkInterfaceList><NetworkInterface><id>1</id><status>up</status>\
             </NetworkInterface></NetworkInterfaceList>",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<DeviceInfo><deviceName>Test NVR</deviceName><model>DS-7608NI</model>\
             <serialNumber>SN-0820</serialNumber></DeviceInfo>",
        ))
        .mount(server)
        .await;
}

pub fn device_pointing_at(id: &str, brand: Brand, server: &MockServer) -> Device {
    let url = url::Url::parse(&server.uri()).unwrap();
    device_at(id, brand, url.host_str().unwrap(), url.port().unwrap())
}

pub fn device_at(id: &str, brand: Brand, ip: &str, port: u16) -> Device {
    Device {
        id: id.to_string(),
        name: format!("NVR {id}"),
        brand,
        ip: ip.parse().unwrap(),
        port,
        username: "admin".to_string(),
        password: "secret".to_string(),
        channel_count: 8,
        state: DeviceState::Active,
        company_id: None,
        online: false,
        last_online_at: None,
        last_offline_at: None,
        disk_usage_rate: 0.0,
    }
}

/// Fully wired core against an in-memory store.
pub struct TestSystem {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
    pub collector: Collector,
    pub engine: AlarmEngine,
}

pub fn test_system(probe_timeout: Duration) -> TestSystem {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let collector = Collector::new(
        store.clone(),
        Arc::new(PlainCredentials),
        bus.clone(),
        probe_timeout,
    );
    let engine = AlarmEngine::new(store.clone(), bus.clone());

    TestSystem {
        store,
        bus,
        collector,
        engine,
    }
}
