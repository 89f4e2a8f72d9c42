//! Route subsystem: GPX parsing, segment geometry and playback.
//!
//! A route is an ordered list of [`RoutePoint`]s in ride order. Each point
//! carries the distance and gradient of the segment that ends at it, so the
//! first point of every route has both set to zero.

pub mod geo;
pub mod gpx;
pub mod playback;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use geo::distance_km;
pub use gpx::{extract_name, parse_gpx};
pub use playback::PlaybackProgress;

/// Steepest gradient (in percent, either direction) a route point may carry.
pub const MAX_GRADIENT_PERCENT: f64 = 20.0;

/// One sample along a ridden route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Elevation in meters (0 when the source has none)
    pub elevation: f64,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Great-circle distance from the previous point in kilometers
    pub distance_from_previous: f64,
    /// Grade of the segment ending here, percent, clamped to +/-20
    pub gradient: f64,
}

/// Errors that can occur during route import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Calculate the gradient of a segment in percent.
///
/// `elevation_change_m` is in meters, `distance_km` in kilometers. Zero-length
/// segments have no defined grade and yield 0. The result is clamped to
/// [`MAX_GRADIENT_PERCENT`] in both directions.
pub fn segment_gradient(elevation_change_m: f64, distance_km: f64) -> f64 {
    if distance_km == 0.0 || !distance_km.is_finite() {
        return 0.0;
    }

    let raw = elevation_change_m / (distance_km * 1000.0) * 100.0;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(-MAX_GRADIENT_PERCENT, MAX_GRADIENT_PERCENT)
}

/// Summary figures for a loaded route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStats {
    pub point_count: usize,
    pub min_gradient: f64,
    pub max_gradient: f64,
    pub total_distance_km: f64,
    /// Sum of all positive elevation changes in meters
    pub elevation_gain_m: f64,
}

/// A sample of the elevation profile, keyed by distance from the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance_km: f64,
    pub elevation: f64,
    pub gradient: f64,
}

/// A parsed route. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    /// Track or metadata name, if the file has one
    pub name: Option<String>,
    points: Vec<RoutePoint>,
}

impl Route {
    pub fn new(name: Option<String>, points: Vec<RoutePoint>) -> Self {
        Self { name, points }
    }

    /// Parse GPX text into a route.
    pub fn from_gpx(content: &str) -> Result<Self, ImportError> {
        let points = parse_gpx(content)?;
        Ok(Self::new(extract_name(content), points))
    }

    /// Parse raw GPX bytes, which must be UTF-8.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ImportError> {
        let content =
            std::str::from_utf8(data).map_err(|e| ImportError::InvalidUtf8(e.to_string()))?;
        Self::from_gpx(content)
    }

    /// Read and parse a GPX file.
    pub fn from_file(path: &Path) -> Result<Self, ImportError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Cumulative distance from the start in km, one entry per point.
    pub fn cumulative_distances(&self) -> Vec<f64> {
        self.points
            .iter()
            .scan(0.0, |total, point| {
                *total += point.distance_from_previous;
                Some(*total)
            })
            .collect()
    }

    /// Total route length in kilometers.
    pub fn total_distance_km(&self) -> f64 {
        self.points.iter().map(|p| p.distance_from_previous).sum()
    }

    /// Elevation profile series (distance, elevation, gradient) for charting.
    pub fn elevation_profile(&self) -> Vec<ProfilePoint> {
        self.cumulative_distances()
            .into_iter()
            .zip(&self.points)
            .map(|(distance_km, point)| ProfilePoint {
                distance_km,
                elevation: point.elevation,
                gradient: point.gradient,
            })
            .collect()
    }

    /// Compute route statistics. An empty route reports all zeros.
    pub fn stats(&self) -> RouteStats {
        if self.points.is_empty() {
            return RouteStats::default();
        }

        let gradients = self.points.iter().map(|p| p.gradient);
        let min_gradient = gradients.clone().fold(f64::INFINITY, f64::min);
        let max_gradient = gradients.fold(f64::NEG_INFINITY, f64::max);

        let elevation_gain_m = self
            .points
            .windows(2)
            .map(|pair| pair[1].elevation - pair[0].elevation)
            .filter(|delta| *delta > 0.0)
            .sum();

        RouteStats {
            point_count: self.points.len(),
            min_gradient,
            max_gradient,
            total_distance_km: self.total_distance_km(),
            elevation_gain_m,
        }
    }
}
