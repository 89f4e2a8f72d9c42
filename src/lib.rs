//! RouteSim - GPX route playback for smart trainers
//!
//! Parses a GPX track into per-segment gradients, plays it back on a fixed
//! tick, and drives a Bluetooth FTMS trainer's simulated slope while reading
//! power from its Cycling Power service. Power is smoothed over a rolling
//! window and classified into Coggan training zones.

pub mod metrics;
pub mod ride;
pub mod route;
pub mod sensors;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use metrics::smoothing::PowerSmoother;
pub use metrics::zones::{PowerZone, PowerZones};
pub use ride::RideOutcome;
pub use route::{Route, RoutePoint, RouteStats};
pub use sensors::ble::BleTrainerLink;
pub use session::{SessionError, SessionEvent, SessionSnapshot, TrainerSession};
pub use storage::config::AppConfig;
