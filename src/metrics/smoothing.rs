//! Power smoothing over a trailing time window.
//!
//! Samples are kept while they are younger than the window and the smoothed
//! value is their rounded arithmetic mean. Eviction is by timestamp, so a
//! sample that arrives out of order never pushes a newer one out.

use std::collections::VecDeque;

/// Default smoothing window (3-second power).
pub const DEFAULT_WINDOW_MS: u64 = 3000;

/// One instantaneous power reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSample {
    pub watts: u16,
    /// Monotonic receive time in milliseconds
    pub timestamp_ms: u64,
}

/// Rolling mean of power over a trailing time window.
#[derive(Debug)]
pub struct PowerSmoother {
    /// Samples currently inside the window
    buffer: VecDeque<PowerSample>,
    /// Window length in milliseconds
    window_ms: u64,
}

impl Default for PowerSmoother {
    fn default() -> Self {
        Self::three_second()
    }
}

impl PowerSmoother {
    /// Create a smoother with the given window length.
    pub fn new(window_ms: u64) -> Self {
        Self {
            buffer: VecDeque::new(),
            window_ms,
        }
    }

    /// Create a 3-second smoother (default for power display).
    pub fn three_second() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Add a sample received at `now_ms` and return the smoothed power.
    ///
    /// The new sample is appended before eviction, so the mean is always
    /// taken over at least one sample.
    pub fn add_sample(&mut self, watts: u16, now_ms: u64) -> u16 {
        self.buffer.push_back(PowerSample {
            watts,
            timestamp_ms: now_ms,
        });

        let cutoff = now_ms.saturating_sub(self.window_ms);
        self.buffer.retain(|sample| sample.timestamp_ms >= cutoff);

        // The sample just pushed has timestamp_ms == now_ms >= cutoff
        self.average().unwrap_or(watts)
    }

    /// Mean of the buffered samples, rounded half up.
    pub fn average(&self) -> Option<u16> {
        if self.buffer.is_empty() {
            return None;
        }

        let count = self.buffer.len() as u64;
        let sum: u64 = self.buffer.iter().map(|s| u64::from(s.watts)).sum();
        let rounded = (2 * sum + count) / (2 * count);

        Some(rounded.min(u64::from(u16::MAX)) as u16)
    }

    /// Clear all samples.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
