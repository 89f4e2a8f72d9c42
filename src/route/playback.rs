//! Route playback cursor.
//!
//! Progress runs over `[0, 1)` and wraps back to the start, so a route is
//! replayed in a continuous loop for as long as the ride lasts.

use std::time::Duration;

use super::RoutePoint;

/// Default tick period for playback.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Default progress added per tick (full route in ~1000 ticks).
pub const DEFAULT_INCREMENT: f64 = 0.001;

/// Fixed-step cursor over a route.
#[derive(Debug, Clone)]
pub struct PlaybackProgress {
    progress: f64,
    increment: f64,
    tick: Duration,
}

impl Default for PlaybackProgress {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, DEFAULT_INCREMENT)
    }
}

impl PlaybackProgress {
    /// Create a cursor advancing by `increment` every `tick`.
    ///
    /// An increment outside `(0, 1)` falls back to [`DEFAULT_INCREMENT`].
    pub fn new(tick: Duration, increment: f64) -> Self {
        let increment = if increment > 0.0 && increment < 1.0 {
            increment
        } else {
            tracing::warn!(
                "Invalid playback increment {}, using {}",
                increment,
                DEFAULT_INCREMENT
            );
            DEFAULT_INCREMENT
        };

        Self {
            progress: 0.0,
            increment,
            tick,
        }
    }

    /// Current position in `[0, 1)`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Time taken to replay the whole route once, saturating at [`Duration::MAX`].
    pub fn lap_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.tick.as_secs_f64() / self.increment)
            .unwrap_or(Duration::MAX)
    }

    /// Advance by one tick, wrapping modulo 1. Returns the new progress.
    pub fn advance(&mut self) -> f64 {
        self.progress = (self.progress + self.increment) % 1.0;
        self.progress
    }

    /// Back to the start of the route.
    pub fn reset(&mut self) {
        self.progress = 0.0;
    }

    /// Index of the point under the cursor for a route of `point_count` points.
    pub fn point_index(&self, point_count: usize) -> Option<usize> {
        if point_count == 0 {
            return None;
        }
        let index = (self.progress * point_count as f64).floor() as usize;
        Some(index.min(point_count - 1))
    }

    /// The point under the cursor.
    pub fn current_point<'a>(&self, points: &'a [RoutePoint]) -> Option<&'a RoutePoint> {
        self.point_index(points.len()).map(|i| &points[i])
    }
}
