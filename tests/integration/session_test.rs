//! Session behavior against an in-memory trainer.

use std::sync::atomic::Ordering;

use routesim::metrics::zones::PowerZone;
use routesim::sensors::ftms::{
    GradientCommand, CYCLING_POWER_MEASUREMENT_UUID, FTMS_CONTROL_POINT_UUID, FTMS_SERVICE_UUID,
};
use routesim::sensors::types::ConnectionState;
use routesim::session::{SessionError, SessionEvent, TrainerSession};
use routesim::storage::config::AppConfig;

use crate::mock_trainer::{mock_link, power_payload};

/// Flat start, then a 1 m rise over 0.001 degrees of longitude at the equator.
const CLIMB_GPX: &str = r#"<gpx><trk><name>Climb</name><trkseg>
    <trkpt lat="0" lon="0"><ele>0</ele></trkpt>
    <trkpt lat="0" lon="0.001"><ele>1</ele></trkpt>
</trkseg></trk></gpx>"#;

fn half_lap_config() -> AppConfig {
    let mut config = AppConfig::default();
    // Two ticks per lap so the second point is reached on the first tick
    config.playback.increment = 0.5;
    config
}

#[tokio::test]
async fn test_connect_subscribes_to_power() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();

    let subscription = session.connect().await.unwrap();
    assert_eq!(subscription.characteristic(), CYCLING_POWER_MEASUREMENT_UUID);
    assert_eq!(session.state(), ConnectionState::Connected);

    let log = control.log.lock().unwrap();
    assert_eq!(log.connect_requests, vec![FTMS_SERVICE_UUID]);
    assert_eq!(log.subscribed, vec![CYCLING_POWER_MEASUREMENT_UUID]);
    assert!(log.writes.is_empty());
    drop(log);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.device_name.as_deref(), Some("Mock Trainer"));
    assert!(snapshot.connected_at.is_some());
}

#[tokio::test]
async fn test_connect_requests_control_when_configured() {
    let (link, control, _tx) = mock_link();
    let mut config = AppConfig::default();
    config.trainer.request_control = true;
    let mut session = TrainerSession::new(link, &config).unwrap();

    session.connect().await.unwrap();
    assert_eq!(control.writes(), vec![(FTMS_CONTROL_POINT_UUID, vec![0x00])]);
}

#[tokio::test]
async fn test_connect_failure() {
    let (link, control, _tx) = mock_link();
    control.fail_connect.store(true, Ordering::SeqCst);
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::ConnectError(_)));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session
        .last_error()
        .unwrap()
        .starts_with("Error connecting to trainer: "));
}

#[tokio::test]
async fn test_subscribe_failure_releases_device() {
    let (link, control, _tx) = mock_link();
    control.fail_subscribe.store(true, Ordering::SeqCst);
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();

    assert!(session.connect().await.is_err());
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(control.log.lock().unwrap().disconnects, 1);
}

#[tokio::test]
async fn test_power_updates_zone_and_snapshot() {
    let (link, _control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();
    let events = session.event_receiver();
    session.connect().await.unwrap();

    let update = session.handle_power_data(&power_payload(200), 0).unwrap();
    assert_eq!(update.smoothed_watts, 200);
    assert_eq!(update.zone, PowerZone::Tempo);

    let update = session.handle_power_data(&power_payload(300), 1000).unwrap();
    assert_eq!(update.instant_watts, 300);
    assert_eq!(update.smoothed_watts, 250);
    assert_eq!(update.zone, PowerZone::Threshold);

    // Too short to carry power
    assert!(session.handle_power_data(&[0x00, 0x00, 0x10], 1500).is_none());
    assert_eq!(session.smoothed_power(), Some(250));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.zone, Some(4));
    assert_eq!(snapshot.zone_name, Some("Threshold"));
    assert!((snapshot.watts_per_kg.unwrap() - 250.0 / 75.0).abs() < 1e-9);

    let powers = events
        .try_iter()
        .filter(|event| matches!(event, SessionEvent::Power(_)))
        .count();
    assert_eq!(powers, 2);
}

#[tokio::test]
async fn test_ftp_change_reclassifies_current_power() {
    let (link, _control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();
    session.connect().await.unwrap();

    session.handle_power_data(&power_payload(200), 0);
    assert_eq!(session.zone(), Some(PowerZone::Tempo));

    session.set_ftp(150.0).unwrap();
    assert_eq!(session.zone(), Some(PowerZone::Anaerobic));
}

#[tokio::test]
async fn test_tick_writes_gradient_of_current_point() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &half_lap_config()).unwrap();
    session.load_route(CLIMB_GPX).unwrap();
    session.connect().await.unwrap();

    let gradient = session.tick().await.unwrap().unwrap();
    assert!((gradient - 0.8993).abs() < 1e-3);

    let gradient = session.tick().await.unwrap().unwrap();
    assert_eq!(gradient, 0.0);

    let writes = control.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].0, FTMS_CONTROL_POINT_UUID);
    assert_eq!(writes[0].1, vec![0x46, 90, 0x00]);
    assert_eq!(GradientCommand::decode(&writes[1].1), Some(0.0));
}

#[tokio::test]
async fn test_write_failure_keeps_session_connected() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &half_lap_config()).unwrap();
    session.load_route(CLIMB_GPX).unwrap();
    session.connect().await.unwrap();

    control.set_fail_writes(true);
    let err = session.tick().await.unwrap_err();
    assert!(matches!(err, SessionError::WriteError(_)));
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(session
        .last_error()
        .unwrap()
        .starts_with("Error setting gradient: "));
    assert!(control.writes().is_empty());

    // Playback moved on regardless; the next write goes out normally
    control.set_fail_writes(false);
    assert_eq!(session.tick().await.unwrap(), Some(0.0));
    assert_eq!(control.writes().len(), 1);
}

#[tokio::test]
async fn test_disconnect_releases_subscription() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();
    let subscription = session.connect().await.unwrap();
    session.handle_power_data(&power_payload(180), 0);

    session.disconnect(subscription).await;

    assert_eq!(session.state(), ConnectionState::Disconnected);
    let log = control.log.lock().unwrap();
    assert_eq!(log.unsubscribed, vec![CYCLING_POWER_MEASUREMENT_UUID]);
    assert_eq!(log.disconnects, 1);
    drop(log);

    assert!(session.smoothed_power().is_none());
    assert!(session.handle_power_data(&power_payload(180), 100).is_none());
    assert_eq!(session.tick().await.unwrap(), None);
}

#[tokio::test]
async fn test_snapshot_serializes() {
    let (link, _control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &AppConfig::default()).unwrap();
    session.load_route(CLIMB_GPX).unwrap();

    let json = serde_json::to_value(session.snapshot()).unwrap();
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["ftp"], 250.0);
    assert_eq!(json["route"]["point_count"], 2);
    assert!(json["smoothed_power"].is_null());
}
