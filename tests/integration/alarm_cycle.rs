//! Alarm lifecycle: cooldown windows, handling, event fan-out

use std::time::Duration;

use nvr_monitoring::adapters::factory::Brand;
use nvr_monitoring::events::{ALARMS_TOPIC, Event};
use nvr_monitoring::store::DeviceStore;
use nvr_monitoring::store::schema::AlarmState;
use tokio::sync::broadcast::error::TryRecvError;

use crate::helpers::*;

/// No two alarms for one (device, rule) pair inside the cooldown window --
/// unless the earlier one is handled first.
#[tokio::test]
async fn test_cooldown_respected_until_handled() {
    let system = test_system(Duration::from_secs(1));
    system
        .store
        .add_device(device_at("d1", Brand::Hikvision, "127.0.0.1", 1))
        .await;
    // Device row says offline; DEVICE_OFFLINE fires without any probing.
    system
        .store
        .update_device_online_state("d1", false, chrono::Utc::now(), None)
        .await
        .unwrap();

    assert_eq!(system.engine.check_all().await.unwrap(), 1);
    assert_eq!(system.engine.check_all().await.unwrap(), 0);
    assert_eq!(system.engine.check_all().await.unwrap(), 0);

    let pending = system.engine.get_pending_alarms(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    let first_id = pending[0].id.clone();

    // Handling the alarm reopens the pair immediately.
    system
        .engine
        .handle(&first_id, "operator-1", "acknowledged")
        .await
        .unwrap();

    assert_eq!(system.engine.check_all().await.unwrap(), 1);

    let pending = system.engine.get_pending_alarms(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_ne!(pending[0].id, first_id);
}

#[tokio::test]
async fn test_alarm_event_fanout_sequence() {
    let system = test_system(Duration::from_secs(1));
    system
        .store
        .add_device(device_at("d1", Brand::Dahua, "127.0.0.1", 1))
        .await;
    system
        .store
        .update_device_online_state("d1", false, chrono::Utc::now(), None)
        .await
        .unwrap();

    let mut alarms_rx = system.bus.subscribe(ALARMS_TOPIC);
    let mut all_rx = system.bus.subscribe_all();

    system.engine.check_all().await.unwrap();

    // Scoped topic sees the alarm itself.
    let alarm = match alarms_rx.try_recv().unwrap() {
        Event::NewAlarm { alarm } => alarm,
        other => panic!("expected NewAlarm, got {other:?}"),
    };
    assert_eq!(alarm.device_id, "d1");
    assert_eq!(alarm.status, AlarmState::Pending);

    // Broadcast sees the pending-count update.
    match all_rx.try_recv().unwrap() {
        Event::AlarmCountUpdate { count, .. } => assert_eq!(count, 1),
        other => panic!("expected AlarmCountUpdate, got {other:?}"),
    }

    // Handling broadcasts the handled notice.
    system
        .engine
        .handle(&alarm.id, "operator-9", "false positive")
        .await
        .unwrap();

    match all_rx.try_recv().unwrap() {
        Event::AlarmHandled {
            alarm_id,
            handler_id,
        } => {
            assert_eq!(alarm_id, alarm.id);
            assert_eq!(handler_id, "operator-9");
        }
        other => panic!("expected AlarmHandled, got {other:?}"),
    }

    // Nothing further on either channel.
    assert!(matches!(alarms_rx.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(all_rx.try_recv(), Err(TryRecvError::Empty)));
}

/// The handled transition is visible through the pending query and keeps
/// handler metadata.
#[tokio::test]
async fn test_handled_alarm_leaves_pending_set() {
    let system = test_system(Duration::from_secs(1));
    system
        .store
        .add_device(device_at("d1", Brand::Hikvision, "127.0.0.1", 1))
        .await;
    system
        .store
        .update_device_online_state("d1", false, chrono::Utc::now(), None)
        .await
        .unwrap();

    system.engine.check_all().await.unwrap();
    let alarm_id = system.engine.get_pending_alarms(None).await.unwrap()[0]
        .id
        .clone();

    let handled = system
        .engine
        .handle(&alarm_id, "operator-2", "replaced cable")
        .await
        .unwrap();

    assert_eq!(handled.status, AlarmState::Handled);
    assert_eq!(handled.handler_id.as_deref(), Some("operator-2"));
    assert_eq!(handled.handle_content.as_deref(), Some("replaced cable"));
    assert!(handled.handled_at.is_some());

    assert!(system.engine.get_pending_alarms(None).await.unwrap().is_empty());
}
