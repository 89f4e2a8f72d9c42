//! Connection types and errors for the trainer transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sensors::ftms::{CYCLING_POWER_SERVICE_UUID, FTMS_SERVICE_UUID};

/// Connection state of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Active connection
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Services a device must (and may) expose to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub required_service: Uuid,
    pub optional_services: Vec<Uuid>,
}

impl ConnectRequest {
    /// A smart trainer: Fitness Machine required, Cycling Power optional.
    pub fn trainer() -> Self {
        Self {
            required_service: FTMS_SERVICE_UUID,
            optional_services: vec![CYCLING_POWER_SERVICE_UUID],
        }
    }
}

/// Errors that can occur talking to the trainer.
#[derive(Debug, Error)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// No device advertising the required service was found
    #[error("No device found advertising service {0}")]
    DeviceNotFound(Uuid),

    /// Connection to device failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timed out
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// Required service missing after discovery
    #[error("Service {0} not available on device")]
    MissingService(Uuid),

    /// Characteristic missing after discovery
    #[error("Characteristic {0} not available on device")]
    MissingCharacteristic(Uuid),

    /// Failed to subscribe to notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// Failed to write to a characteristic
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}
