//! Brand resolution and the connectivity test surface

use std::time::Duration;

use nvr_monitoring::adapters::factory::{AdapterFactory, Brand, supported_brands};
use nvr_monitoring::adapters::ConnectionFacts;
use nvr_monitoring::error::Error;
use wiremock::MockServer;

use crate::helpers::*;

fn facts_for(server: &MockServer) -> ConnectionFacts {
    let url = url::Url::parse(&server.uri()).unwrap();
    ConnectionFacts {
        ip: url.host_str().unwrap().parse().unwrap(),
        port: url.port().unwrap(),
        username: "admin".to_string(),
        password: "secret".to_string(),
        timeout: Duration::from_secs(2),
    }
}

/// "海康" and "HIKVISION" are the same adapter; unknown strings are rejected.
#[tokio::test]
async fn test_brand_aliases_and_rejection() {
    assert_eq!(Brand::parse("海康").unwrap(), Brand::parse("HIKVISION").unwrap());
    assert_eq!(Brand::parse("大华").unwrap(), Brand::parse("dahua").unwrap());

    let err = Brand::parse("UNKNOWNVENDOR").unwrap_err();
    assert!(matches!(err, Error::UnsupportedBrand(_)));

    let server = MockServer::start().await;
    mount_hik_device(&server, 1_048_576, 524_288).await;
    let facts = facts_for(&server);

    // Both spellings produce a working probe against the same endpoint.
    for brand in ["海康", "HIKVISION"] {
        let adapter = AdapterFactory::create_from_str(brand, &facts).unwrap();
        let info = adapter.fetch_device_info().await.unwrap();
        assert_eq!(info.model, "DS-7608NI");
    }
}

#[tokio::test]
async fn test_connection_test_success_and_failure() {
    let server = MockServer::start().await;
    mount_hik_device(&server, 1_048_576, 524_288).await;

    let ok = AdapterFactory::test_connection("HIKVISION", &facts_for(&server)).await;
    assert!(ok.success);
    assert!(ok.message.contains("DS-7608NI"));

    // Unknown brand folds into a failed result instead of an error.
    let unknown = AdapterFactory::test_connection("UNKNOWNVENDOR", &facts_for(&server)).await;
    assert!(!unknown.success);
    assert!(unknown.message.contains("UNKNOWNVENDOR"));

    // Unreachable device likewise.
    let dead = ConnectionFacts {
        ip: "127.0.0.1".parse().unwrap(),
        port: 1,
        username: "admin".to_string(),
        password: "secret".to_string(),
        timeout: Duration::from_millis(300),
    };
    let down = AdapterFactory::test_connection("DAHUA", &dead).await;
    assert!(!down.success);
}

#[test]
fn test_supported_brand_listing() {
    let brands = supported_brands();

    let codes: Vec<&str> = brands.iter().map(|b| b.code).collect();
    assert_eq!(codes, vec!["HIKVISION", "DAHUA"]);
    assert_eq!(brands[0].display_name, "海康威视");
    assert_eq!(brands[0].short_name, "海康");
}
