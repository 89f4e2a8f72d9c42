//! Unit tests for route playback.

use std::time::Duration;

use routesim::route::{PlaybackProgress, RoutePoint};

fn route(len: usize) -> Vec<RoutePoint> {
    (0..len)
        .map(|i| RoutePoint {
            elevation: i as f64,
            ..Default::default()
        })
        .collect()
}

#[test]
fn test_default_lap_wraps_once_per_thousand_ticks() {
    let mut playback = PlaybackProgress::default();
    let mut previous = playback.progress();
    let mut wraps = Vec::new();

    for tick in 1..=1001 {
        let progress = playback.advance();
        assert!((0.0..1.0).contains(&progress));
        if progress < previous {
            wraps.push(tick);
        }
        previous = progress;
    }

    assert_eq!(wraps.len(), 1);
    assert!(wraps[0] == 1000 || wraps[0] == 1001, "wrapped at {}", wraps[0]);
    assert!(playback.progress() < 0.002);
}

#[test]
fn test_cursor_visits_every_point_in_order() {
    let points = route(10);
    let mut playback = PlaybackProgress::new(Duration::from_millis(50), 0.01);
    let mut visited = vec![0usize];

    for _ in 0..99 {
        playback.advance();
        let index = playback.point_index(points.len()).unwrap();
        if visited.last() != Some(&index) {
            visited.push(index);
        }
    }

    assert_eq!(visited, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_current_point_on_empty_route() {
    let playback = PlaybackProgress::default();
    assert!(playback.current_point(&[]).is_none());
    assert_eq!(playback.current_point(&route(3)).unwrap().elevation, 0.0);
}

#[test]
fn test_invalid_increment_falls_back_to_default() {
    let playback = PlaybackProgress::new(Duration::from_millis(50), 0.0);
    assert_eq!(playback.increment(), 0.001);
    let playback = PlaybackProgress::new(Duration::from_millis(50), 1.5);
    assert_eq!(playback.increment(), 0.001);
}
