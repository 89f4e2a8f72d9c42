//! Unit tests for power smoothing.

use routesim::metrics::smoothing::PowerSmoother;

#[test]
fn test_window_drops_old_samples() {
    let mut smoother = PowerSmoother::three_second();
    assert_eq!(smoother.add_sample(100, 0), 100);
    assert_eq!(smoother.add_sample(200, 1000), 150);
    // 100 W @ 0 is now older than 3 s
    assert_eq!(smoother.add_sample(200, 4000), 200);
    assert_eq!(smoother.len(), 2);
}

#[test]
fn test_constant_power_is_unchanged() {
    let mut smoother = PowerSmoother::three_second();
    for t in 0..100 {
        assert_eq!(smoother.add_sample(237, t * 250), 237);
    }
}

#[test]
fn test_average_stays_within_window_extremes() {
    let mut smoother = PowerSmoother::new(2000);
    let readings = [150u16, 400, 90, 310, 0, 1200, 275, 275, 60];

    for (i, watts) in readings.iter().enumerate() {
        let now = i as u64 * 700;
        let smoothed = smoother.add_sample(*watts, now);

        let window: Vec<u16> = readings[..=i]
            .iter()
            .enumerate()
            .filter(|(j, _)| *j as u64 * 700 + 2000 >= now)
            .map(|(_, w)| *w)
            .collect();
        let min = *window.iter().min().unwrap();
        let max = *window.iter().max().unwrap();
        assert!(smoothed >= min && smoothed <= max);
    }
}

#[test]
fn test_reset_clears_history() {
    let mut smoother = PowerSmoother::three_second();
    smoother.add_sample(500, 0);
    smoother.reset();
    assert!(smoother.is_empty());
    assert_eq!(smoother.average(), None);
    assert_eq!(smoother.add_sample(100, 10), 100);
}
