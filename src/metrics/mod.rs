//! Metrics module for power smoothing and training zones.

pub mod smoothing;
pub mod zones;

pub use smoothing::{PowerSample, PowerSmoother};
pub use zones::{zone_of, zone_watt_range, PowerZone, PowerZones, WattRange, ZoneError};
