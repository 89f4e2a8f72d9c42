//! Trainer transport capability.
//!
//! The session only needs three things from a device: a stream of power
//! notifications, a way to write control point commands, and a way to let
//! go. [`TrainerLink`] produces connected [`TrainerDevice`]s; the BLE
//! implementation lives in [`crate::sensors::ble`], tests use in-memory ones.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::sensors::types::{ConnectRequest, SensorError};

/// Boxed stream of raw notification payloads.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Something that can find and connect to a trainer.
#[async_trait]
pub trait TrainerLink: Send {
    type Device: TrainerDevice;

    /// Find a device exposing `request.required_service` and connect to it.
    async fn connect(&mut self, request: &ConnectRequest) -> Result<Self::Device, SensorError>;
}

/// A connected trainer.
#[async_trait]
pub trait TrainerDevice: Send {
    /// Advertised device name.
    fn name(&self) -> String;

    /// Start notifications on a characteristic.
    async fn subscribe(&mut self, characteristic: Uuid) -> Result<Subscription, SensorError>;

    /// Stop notifications on a characteristic.
    async fn unsubscribe(&mut self, characteristic: Uuid) -> Result<(), SensorError>;

    /// Write a payload to a characteristic and wait for the acknowledgment.
    async fn write(&mut self, characteristic: Uuid, payload: &[u8]) -> Result<(), SensorError>;

    /// Drop the connection.
    async fn disconnect(&mut self) -> Result<(), SensorError>;
}

/// An active notification subscription.
///
/// The stream ending means the device went away. The subscription is
/// handed back to the session on disconnect so it can be unregistered.
pub struct Subscription {
    characteristic: Uuid,
    notifications: NotificationStream,
}

impl Subscription {
    pub fn new(characteristic: Uuid, notifications: NotificationStream) -> Self {
        Self {
            characteristic,
            notifications,
        }
    }

    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }

    /// Next notification payload, `None` once the device is gone.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.notifications.next().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("characteristic", &self.characteristic)
            .finish_non_exhaustive()
    }
}
