//! btleplug-backed trainer transport.
//!
//! Scans for the first peripheral advertising the required service,
//! connects, discovers services and hands out a [`BleTrainer`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::future;
use futures::stream::StreamExt;
use uuid::Uuid;

use crate::sensors::transport::{Subscription, TrainerDevice, TrainerLink};
use crate::sensors::types::{ConnectRequest, SensorError};

/// Finds and connects to trainers over Bluetooth LE.
pub struct BleTrainerLink {
    /// BLE adapter, set up lazily on first connect
    adapter: Option<Adapter>,
    /// How long to scan before giving up
    scan_timeout: Duration,
    /// How long to wait for the GATT connection
    connection_timeout: Duration,
}

impl BleTrainerLink {
    pub fn new(scan_timeout: Duration, connection_timeout: Duration) -> Self {
        Self {
            adapter: None,
            scan_timeout,
            connection_timeout,
        }
    }

    /// Initialize the BLE adapter.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        if self.adapter.is_some() {
            return Ok(());
        }

        tracing::info!("Initializing BLE adapter");

        let manager = Manager::new()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        self.adapter = Some(adapter);
        Ok(())
    }

    /// Check whether a peripheral advertises `service`.
    async fn advertises(peripheral: &Peripheral, service: Uuid) -> bool {
        match peripheral.properties().await {
            Ok(Some(properties)) => properties.services.contains(&service),
            _ => false,
        }
    }

    /// Scan until a peripheral advertising `service` shows up.
    async fn scan_for(adapter: &Adapter, service: Uuid) -> Result<Peripheral, SensorError> {
        let mut events = adapter
            .events()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        // Devices seen before the scan started
        if let Ok(known) = adapter.peripherals().await {
            for peripheral in known {
                if Self::advertises(&peripheral, service).await {
                    return Ok(peripheral);
                }
            }
        }

        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };

            let Ok(peripheral) = adapter.peripheral(&id).await else {
                continue;
            };
            if Self::advertises(&peripheral, service).await {
                return Ok(peripheral);
            }
        }

        Err(SensorError::DeviceNotFound(service))
    }
}

#[async_trait]
impl TrainerLink for BleTrainerLink {
    type Device = BleTrainer;

    async fn connect(&mut self, request: &ConnectRequest) -> Result<BleTrainer, SensorError> {
        self.initialize().await?;
        let adapter = self.adapter.clone().ok_or(SensorError::AdapterNotFound)?;

        tracing::info!("Scanning for trainer ({})", request.required_service);

        let found = tokio::time::timeout(
            self.scan_timeout,
            Self::scan_for(&adapter, request.required_service),
        )
        .await;

        if let Err(e) = adapter.stop_scan().await {
            tracing::debug!("Failed to stop scan: {}", e);
        }

        let peripheral = found.map_err(|_| SensorError::DeviceNotFound(request.required_service))??;

        let name = match peripheral.properties().await {
            Ok(Some(properties)) => properties.local_name,
            _ => None,
        }
        .unwrap_or_else(|| "Unknown Device".to_string());

        tracing::info!("Connecting to {}", name);

        let attempt = tokio::time::timeout(self.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| SensorError::ConnectionTimeout)
            .and_then(|r| r.map_err(|e| SensorError::ConnectionFailed(e.to_string())));
        release_on_error(attempt, || peripheral.disconnect()).await?;

        let discovered = peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()));
        release_on_error(discovered, || peripheral.disconnect()).await?;

        let services = peripheral.services();
        let has_service = |uuid: Uuid| services.iter().any(|s| s.uuid == uuid);

        let required = if has_service(request.required_service) {
            Ok(())
        } else {
            Err(SensorError::MissingService(request.required_service))
        };
        release_on_error(required, || peripheral.disconnect()).await?;

        for optional in &request.optional_services {
            if has_service(*optional) {
                tracing::debug!("Optional service {} available", optional);
            } else {
                tracing::debug!("Optional service {} not offered", optional);
            }
        }

        Ok(BleTrainer {
            adapter,
            peripheral,
            name,
            write_timeout: self.connection_timeout,
        })
    }
}

/// Drop a half-open connection when a setup step fails.
///
/// The original error is returned; a failure to close is only logged.
async fn release_on_error<T, F, Fut, E>(
    result: Result<T, SensorError>,
    release: F,
) -> Result<T, SensorError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if result.is_err() {
        if let Err(close_err) = release().await {
            tracing::debug!("Disconnect after failed setup: {}", close_err);
        }
    }
    result
}

/// A connected BLE trainer.
pub struct BleTrainer {
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
    /// How long to wait for a write acknowledgment
    write_timeout: Duration,
}

impl BleTrainer {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, SensorError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(SensorError::MissingCharacteristic(uuid))
    }
}

#[async_trait]
impl TrainerDevice for BleTrainer {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn subscribe(&mut self, characteristic: Uuid) -> Result<Subscription, SensorError> {
        let target = self.characteristic(characteristic)?;

        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        // End the stream when the adapter reports this device gone
        let id = self.peripheral.id();
        let disconnected = self
            .adapter
            .events()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?
            .filter(move |event| {
                future::ready(matches!(event, CentralEvent::DeviceDisconnected(d) if *d == id))
            })
            .into_future();

        let stream = notifications
            .filter(move |n| future::ready(n.uuid == characteristic))
            .map(|n| n.value)
            .take_until(disconnected);

        tracing::debug!("Subscribed to characteristic: {}", characteristic);

        Ok(Subscription::new(characteristic, Box::pin(stream)))
    }

    async fn unsubscribe(&mut self, characteristic: Uuid) -> Result<(), SensorError> {
        let target = self.characteristic(characteristic)?;
        self.peripheral
            .unsubscribe(&target)
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))
    }

    async fn write(&mut self, characteristic: Uuid, payload: &[u8]) -> Result<(), SensorError> {
        let target = self.characteristic(characteristic)?;
        tokio::time::timeout(
            self.write_timeout,
            self.peripheral.write(&target, payload, WriteType::WithResponse),
        )
        .await
        .map_err(|_| SensorError::WriteFailed("no acknowledgment from trainer".to_string()))?
        .map_err(|e| SensorError::WriteFailed(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), SensorError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))
    }
}
