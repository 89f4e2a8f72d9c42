//! Ride loop against an in-memory trainer.

use std::sync::atomic::Ordering;
use std::time::Duration;

use routesim::ride::{self, RideOutcome};
use routesim::sensors::ftms::{CYCLING_POWER_MEASUREMENT_UUID, FTMS_CONTROL_POINT_UUID};
use routesim::sensors::types::ConnectionState;
use routesim::session::TrainerSession;
use routesim::storage::config::AppConfig;

use crate::mock_trainer::{mock_link, power_payload};

const ROUTE_GPX: &str = r#"<gpx><trk><trkseg>
    <trkpt lat="0" lon="0"><ele>0</ele></trkpt>
    <trkpt lat="0" lon="0.001"><ele>2</ele></trkpt>
    <trkpt lat="0" lon="0.002"><ele>1</ele></trkpt>
</trkseg></trk></gpx>"#;

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.playback.tick_ms = 5;
    config.playback.increment = 0.1;
    config
}

#[tokio::test]
async fn test_ride_stops_on_shutdown() {
    let (link, control, tx) = mock_link();
    let mut session = TrainerSession::new(link, &fast_config()).unwrap();
    session.load_route(ROUTE_GPX).unwrap();
    let subscription = session.connect().await.unwrap();

    tx.unbounded_send(power_payload(210)).unwrap();

    let outcome = ride::run(
        &mut session,
        subscription,
        tokio::time::sleep(Duration::from_millis(100)),
    )
    .await;

    assert_eq!(outcome, RideOutcome::Stopped);
    assert_eq!(session.state(), ConnectionState::Disconnected);

    let log = control.log.lock().unwrap();
    assert!(!log.writes.is_empty());
    assert!(log
        .writes
        .iter()
        .all(|(uuid, bytes)| *uuid == FTMS_CONTROL_POINT_UUID && bytes[0] == 0x46));
    assert_eq!(log.unsubscribed, vec![CYCLING_POWER_MEASUREMENT_UUID]);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_ride_ends_when_trainer_goes_away() {
    let (link, control, tx) = mock_link();
    let mut session = TrainerSession::new(link, &fast_config()).unwrap();
    session.load_route(ROUTE_GPX).unwrap();
    let subscription = session.connect().await.unwrap();

    tx.unbounded_send(power_payload(150)).unwrap();
    tx.unbounded_send(power_payload(250)).unwrap();
    drop(tx);

    let outcome = ride::run(&mut session, subscription, std::future::pending::<()>()).await;

    assert_eq!(outcome, RideOutcome::DeviceLost);
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.smoothed_power().is_none());

    // The device is already gone, nothing to unsubscribe from
    let log = control.log.lock().unwrap();
    assert!(log.unsubscribed.is_empty());
    assert_eq!(log.disconnects, 0);
}

#[tokio::test]
async fn test_ride_survives_failed_writes() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &fast_config()).unwrap();
    session.load_route(ROUTE_GPX).unwrap();
    let subscription = session.connect().await.unwrap();
    control.set_fail_writes(true);

    let outcome = ride::run(
        &mut session,
        subscription,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await;

    assert_eq!(outcome, RideOutcome::Stopped);
    assert!(control.writes().is_empty());
    assert!(session
        .last_error()
        .unwrap()
        .starts_with("Error setting gradient"));
    assert_eq!(control.log.lock().unwrap().disconnects, 1);
}

#[tokio::test]
async fn test_shutdown_abandons_unacknowledged_write() {
    let (link, control, _tx) = mock_link();
    let mut session = TrainerSession::new(link, &fast_config()).unwrap();
    session.load_route(ROUTE_GPX).unwrap();
    let subscription = session.connect().await.unwrap();
    control.hang_writes.store(true, Ordering::SeqCst);

    let ride = ride::run(
        &mut session,
        subscription,
        tokio::time::sleep(Duration::from_millis(100)),
    );
    let outcome = tokio::time::timeout(Duration::from_secs(2), ride)
        .await
        .expect("ride should stop while a write is pending");

    assert_eq!(outcome, RideOutcome::Stopped);
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(control.writes().is_empty());
    assert_eq!(control.log.lock().unwrap().disconnects, 1);
}
