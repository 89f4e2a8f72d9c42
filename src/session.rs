//! Trainer session: ties the route, the power pipeline and the device together.
//!
//! State machine: `Disconnected -> Connecting -> Connected -> Disconnected`.
//! Inbound power notifications go through the smoother and zone classifier;
//! playback ticks pick the current route point and write its gradient to
//! the control point. A failed connect leaves the session disconnected and a
//! failed write is dropped; nothing is retried automatically.

use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender};
use serde::Serialize;
use thiserror::Error;

use crate::metrics::smoothing::PowerSmoother;
use crate::metrics::zones::{zone_of, PowerZone, PowerZones, ZoneError};
use crate::route::playback::PlaybackProgress;
use crate::route::{ImportError, Route, RouteStats};
use crate::sensors::ftms::{
    build_request_control, parse_cycling_power_measurement, GradientCommand,
    CYCLING_POWER_MEASUREMENT_UUID, FTMS_CONTROL_POINT_UUID,
};
use crate::sensors::transport::{Subscription, TrainerDevice, TrainerLink};
use crate::sensors::types::{ConnectRequest, ConnectionState, SensorError};
use crate::storage::config::AppConfig;

/// Session-level errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Route not loaded: {0}")]
    ParseError(#[from] ImportError),

    #[error("Error connecting to trainer: {0}")]
    ConnectError(#[source] SensorError),

    #[error("Error setting gradient: {0}")]
    WriteError(#[source] SensorError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ZoneError> for SessionError {
    fn from(err: ZoneError) -> Self {
        match err {
            ZoneError::InvalidConfig(msg) => SessionError::InvalidConfig(msg),
        }
    }
}

/// Events from the session for the presentation layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection state changed
    ConnectionChanged(ConnectionState),
    /// A new route was loaded
    RouteLoaded(RouteStats),
    /// New power reading processed
    Power(PowerUpdate),
    /// Gradient written to the trainer
    GradientSent { gradient: f64, progress: f64 },
    /// User-facing error message
    Error(String),
}

/// Result of processing one power notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerUpdate {
    pub instant_watts: u16,
    pub smoothed_watts: u16,
    pub zone: PowerZone,
}

/// Read-only view of the session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub device_name: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub ftp: f64,
    pub weight_kg: f64,
    pub current_power: Option<u16>,
    pub smoothed_power: Option<u16>,
    pub watts_per_kg: Option<f64>,
    pub zone: Option<u8>,
    pub zone_name: Option<&'static str>,
    pub current_gradient: Option<f64>,
    pub progress: f64,
    pub route: Option<RouteStats>,
    pub error: Option<String>,
}

/// One rider, one trainer, one route.
pub struct TrainerSession<L: TrainerLink> {
    link: L,
    device: Option<L::Device>,
    device_name: Option<String>,
    state: ConnectionState,
    connected_at: Option<DateTime<Utc>>,
    request_control: bool,

    ftp: f64,
    weight_kg: f64,

    smoother: PowerSmoother,
    playback: PlaybackProgress,
    route: Option<Route>,

    current_power: Option<u16>,
    smoothed_power: Option<u16>,
    zone: Option<PowerZone>,
    last_gradient: Option<f64>,
    last_error: Option<String>,

    event_tx: Option<Sender<SessionEvent>>,
}

impl<L: TrainerLink> TrainerSession<L> {
    /// Create a session from configuration.
    pub fn new(link: L, config: &AppConfig) -> Result<Self, SessionError> {
        let mut session = Self {
            link,
            device: None,
            device_name: None,
            state: ConnectionState::Disconnected,
            connected_at: None,
            request_control: config.trainer.request_control,
            ftp: 0.0,
            weight_kg: 0.0,
            smoother: PowerSmoother::new(config.smoothing.window_ms),
            playback: PlaybackProgress::new(config.playback.tick(), config.playback.increment),
            route: None,
            current_power: None,
            smoothed_power: None,
            zone: None,
            last_gradient: None,
            last_error: None,
            event_tx: None,
        };

        session.set_ftp(f64::from(config.rider.ftp))?;
        session.set_weight(f64::from(config.rider.weight_kg))?;
        Ok(session)
    }

    /// Get an event receiver for session events.
    pub fn event_receiver(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.event_tx = Some(tx);
        rx
    }

    /// Send an event if the channel is available.
    fn send_event(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!("Trainer {}", state);
            self.state = state;
            self.send_event(SessionEvent::ConnectionChanged(state));
        }
    }

    fn record_error(&mut self, message: String) {
        tracing::error!("{}", message);
        self.send_event(SessionEvent::Error(message.clone()));
        self.last_error = Some(message);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn playback(&self) -> &PlaybackProgress {
        &self.playback
    }

    pub fn smoothed_power(&self) -> Option<u16> {
        self.smoothed_power
    }

    pub fn zone(&self) -> Option<PowerZone> {
        self.zone
    }

    pub fn last_gradient(&self) -> Option<f64> {
        self.last_gradient
    }

    /// Change FTP. Must be positive; the current zone is re-evaluated.
    pub fn set_ftp(&mut self, ftp: f64) -> Result<(), SessionError> {
        let zone = zone_of(f64::from(self.smoothed_power.unwrap_or(0)), ftp)?;
        self.ftp = ftp;
        self.zone = self.smoothed_power.map(|_| zone);
        Ok(())
    }

    /// Change rider weight in kilograms. Must be positive.
    pub fn set_weight(&mut self, weight_kg: f64) -> Result<(), SessionError> {
        if !(weight_kg.is_finite() && weight_kg > 0.0) {
            return Err(SessionError::InvalidConfig(format!(
                "Weight must be a positive number of kilograms, got {}",
                weight_kg
            )));
        }
        self.weight_kg = weight_kg;
        Ok(())
    }

    /// Parse and load a GPX route, replacing the current one.
    ///
    /// On a parse error the previous route stays loaded.
    pub fn load_route(&mut self, gpx: &str) -> Result<RouteStats, SessionError> {
        let route = Route::from_gpx(gpx).map_err(|e| {
            self.record_error(format!("Error processing GPX file: {}", e));
            e
        })?;

        Ok(self.set_route(route))
    }

    /// Replace the current route with an already parsed one.
    pub fn set_route(&mut self, route: Route) -> RouteStats {
        let stats = route.stats();
        tracing::info!(
            "Loaded route {:?}: {} points, {:.1} km",
            route.name,
            stats.point_count,
            stats.total_distance_km
        );

        self.route = Some(route);
        self.playback.reset();
        self.last_gradient = None;
        self.send_event(SessionEvent::RouteLoaded(stats));

        stats
    }

    /// Connect to a trainer and subscribe to power notifications.
    ///
    /// The returned subscription must be handed back to [`Self::disconnect`].
    pub async fn connect(&mut self) -> Result<Subscription, SessionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(SessionError::ConnectError(SensorError::ConnectionFailed(
                format!("session is already {}", self.state),
            )));
        }

        self.last_error = None;
        self.set_state(ConnectionState::Connecting);

        match self.negotiate().await {
            Ok((device, subscription)) => {
                let name = device.name();
                tracing::info!("Connected to: {}", name);

                self.device = Some(device);
                self.device_name = Some(name);
                self.connected_at = Some(Utc::now());
                self.set_state(ConnectionState::Connected);
                Ok(subscription)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                let err = SessionError::ConnectError(e);
                self.record_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Connect, subscribe and optionally take control, tearing down on failure.
    async fn negotiate(&mut self) -> Result<(L::Device, Subscription), SensorError> {
        let request_control = self.request_control;
        let mut device = self.link.connect(&ConnectRequest::trainer()).await?;

        let setup = async {
            let subscription = device.subscribe(CYCLING_POWER_MEASUREMENT_UUID).await?;
            if request_control {
                device
                    .write(FTMS_CONTROL_POINT_UUID, &build_request_control())
                    .await?;
            }
            Ok::<_, SensorError>(subscription)
        }
        .await;

        match setup {
            Ok(subscription) => Ok((device, subscription)),
            Err(e) => {
                if let Err(close_err) = device.disconnect().await {
                    tracing::debug!("Disconnect after failed setup: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Process one power notification received at `now_ms`.
    ///
    /// Ignored unless connected. Payloads too short to hold a power value
    /// are dropped.
    pub fn handle_power_data(&mut self, data: &[u8], now_ms: u64) -> Option<PowerUpdate> {
        if !self.is_connected() {
            return None;
        }

        let Some(measurement) = parse_cycling_power_measurement(data) else {
            tracing::warn!("Ignoring short power notification ({} bytes)", data.len());
            return None;
        };

        let watts = measurement.power_watts;
        let smoothed = self.smoother.add_sample(watts, now_ms);
        tracing::debug!("Power reading: {}W, 3s average: {}W", watts, smoothed);

        let zone = match zone_of(f64::from(smoothed), self.ftp) {
            Ok(zone) => zone,
            Err(e) => {
                // ftp is validated in set_ftp
                tracing::warn!("Cannot classify power: {}", e);
                return None;
            }
        };

        if self.zone != Some(zone) {
            tracing::info!("Power zone changed to: {}", zone);
        }

        self.current_power = Some(watts);
        self.smoothed_power = Some(smoothed);
        self.zone = Some(zone);

        let update = PowerUpdate {
            instant_watts: watts,
            smoothed_watts: smoothed,
            zone,
        };
        self.send_event(SessionEvent::Power(update));
        Some(update)
    }

    /// Advance playback one tick and send the gradient under the cursor.
    ///
    /// Returns the gradient written, or `None` when there is no device or
    /// route. A failed write is reported and dropped; the session stays
    /// connected.
    pub async fn tick(&mut self) -> Result<Option<f64>, SessionError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(None);
        };
        let Some(route) = self.route.as_ref() else {
            return Ok(None);
        };

        let progress = self.playback.advance();
        let Some(point) = self.playback.current_point(route.points()) else {
            return Ok(None);
        };
        let gradient = point.gradient;

        let command = GradientCommand::encode(gradient);
        match device.write(FTMS_CONTROL_POINT_UUID, command.as_ref()).await {
            Ok(()) => {
                tracing::debug!("Set gradient {:.2}% at progress {:.3}", gradient, progress);
                self.last_gradient = Some(gradient);
                self.send_event(SessionEvent::GradientSent { gradient, progress });
                Ok(Some(gradient))
            }
            Err(e) => {
                let err = SessionError::WriteError(e);
                tracing::warn!("Dropping gradient write: {}", err);
                self.record_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Disconnect on user request, releasing the power subscription.
    pub async fn disconnect(&mut self, subscription: Subscription) {
        if let Some(mut device) = self.device.take() {
            tracing::info!("Disconnecting from trainer");

            if let Err(e) = device.unsubscribe(subscription.characteristic()).await {
                tracing::debug!("Unsubscribe failed: {}", e);
            }
            drop(subscription);

            if let Err(e) = device.disconnect().await {
                tracing::warn!("Disconnect failed: {}", e);
            }
        }

        self.reset_connection();
    }

    /// The device went away on its own.
    pub fn handle_device_disconnected(&mut self) {
        if self.device.is_some() {
            tracing::warn!("Trainer disconnected");
        }
        self.device = None;
        self.reset_connection();
    }

    fn reset_connection(&mut self) {
        self.device_name = None;
        self.connected_at = None;
        self.smoother.reset();
        self.current_power = None;
        self.smoothed_power = None;
        self.zone = None;
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn ftp(&self) -> f64 {
        self.ftp
    }

    /// Watts per kilogram at the smoothed power.
    pub fn watts_per_kg(&self) -> Option<f64> {
        self.smoothed_power
            .map(|watts| f64::from(watts) / self.weight_kg)
    }

    /// Zone table for the current FTP.
    pub fn zone_table(&self) -> Result<PowerZones, SessionError> {
        Ok(PowerZones::from_ftp(self.ftp)?)
    }

    /// Current values for display.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            device_name: self.device_name.clone(),
            connected_at: self.connected_at,
            ftp: self.ftp,
            weight_kg: self.weight_kg,
            current_power: self.current_power,
            smoothed_power: self.smoothed_power,
            watts_per_kg: self.watts_per_kg(),
            zone: self.zone.map(PowerZone::number),
            zone_name: self.zone.map(PowerZone::name),
            current_gradient: self.last_gradient,
            progress: self.playback.progress(),
            route: self.route.as_ref().map(Route::stats),
            error: self.last_error.clone(),
        }
    }
}
