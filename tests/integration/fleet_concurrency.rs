//! Fleet-scale concurrency: outcome isolation, timeouts, aggregate counts

use std::time::Duration;

use nvr_monitoring::adapters::factory::Brand;
use nvr_monitoring::store::DeviceStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

/// 50 active devices: 40 healthy, 10 pointing at an endpoint that answers
/// slower than the probe timeout. The cycle must report exactly
/// {succeeded: 40, failed: 10} and write exactly 40 status records.
#[tokio::test]
async fn test_fifty_devices_with_ten_timeouts() {
    let healthy = MockServer::start().await;
    mount_hik_device(&healthy, 1_048_576, 524_288).await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/Storage/diskInfo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(hik_disk_xml(1_048_576, 524_288))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(10)))
        .mount(&slow)
        .await;

    let system = test_system(Duration::from_millis(750));

    for i in 0..40 {
        system
            .store
            .add_device(device_pointing_at(
                &format!("ok-{i:02}"),
                Brand::Hikvision,
                &healthy,
            ))
            .await;
    }
    for i in 0..10 {
        system
            .store
            .add_device(device_pointing_at(
                &format!("slow-{i:02}"),
                Brand::Hikvision,
                &slow,
            ))
            .await;
    }

    let outcome = system.collector.collect_all().await.unwrap();

    assert_eq!(outcome.succeeded, 40);
    assert_eq!(outcome.failed, 10);

    // Exactly 40 new records: one per healthy device, none for the slow ones.
    let mut records = 0;
    for device in system.store.list_active_devices().await.unwrap() {
        let latest = system.store.get_latest_status(&device.id).await.unwrap();
        if device.id.starts_with("ok-") {
            assert!(device.online, "{} should be online", device.id);
            records += i32::from(latest.is_some());
        } else {
            assert!(!device.online, "{} should be offline", device.id);
            assert!(latest.is_none(), "{} must have no record", device.id);
        }
    }
    assert_eq!(records, 40);
}

/// A cycle triggered while a device's probe from the previous cycle is still
/// in flight must skip that device rather than stacking a second probe.
#[tokio::test]
async fn test_overlapping_cycles_do_not_double_probe() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/Storage/diskInfo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(hik_disk_xml(1_048_576, 524_288))
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&slow)
        .await;

    let system = test_system(Duration::from_secs(5));
    system
        .store
        .add_device(device_pointing_at("d1", Brand::Hikvision, &slow))
        .await;

    let system = std::sync::Arc::new(system);
    let first = {
        let system = system.clone();
        tokio::spawn(async move { system.collector.collect_all().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Second cycle while the first is still waiting on the device: the
    // device is skipped, so the cycle reports no outcomes at all.
    let second = system.collector.collect_all().await.unwrap();
    assert_eq!((second.succeeded, second.failed), (0, 0));

    let first = first.await.unwrap();
    assert_eq!((first.succeeded, first.failed), (1, 0));

    // Only one record was ever written.
    let history = system
        .store
        .query_status_history("d1", None, None, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

/// Requests for distinct devices genuinely run in parallel: a fleet of slow
/// devices completes in roughly one probe's latency, not the sum.
#[tokio::test]
async fn test_probes_run_concurrently() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/Storage/diskInfo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(hik_disk_xml(1_048_576, 524_288))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&slow)
        .await;

    let system = test_system(Duration::from_secs(5));
    for i in 0..10 {
        system
            .store
            .add_device(device_pointing_at(
                &format!("d{i}"),
                Brand::Hikvision,
                &slow,
            ))
            .await;
    }

    let started = std::time::Instant::now();
    let outcome = system.collector.collect_all().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.succeeded, 10);
    // Serial execution would need 10 x 400ms.
    assert!(
        elapsed < Duration::from_secs(2),
        "cycle took {elapsed:?}, probes are not concurrent"
    );
}
