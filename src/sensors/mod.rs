//! Trainer communication: GATT protocol, transport capability and BLE backend.

pub mod ble;
pub mod ftms;
pub mod transport;
pub mod types;

pub use ble::{BleTrainer, BleTrainerLink};
pub use ftms::{parse_cycling_power_measurement, GradientCommand};
pub use transport::{NotificationStream, Subscription, TrainerDevice, TrainerLink};
pub use types::{ConnectRequest, ConnectionState, SensorError};
