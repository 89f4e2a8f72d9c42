//! Ride loop: drives a connected session until shutdown or device loss.
//!
//! Power notifications and playback ticks are handled on the same task,
//! so the session needs no locking.

use std::future::Future;
use std::time::Instant;

use tokio::time::{interval, MissedTickBehavior};

use crate::sensors::transport::{Subscription, TrainerLink};
use crate::session::TrainerSession;

/// Why the ride loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideOutcome {
    /// Shutdown was requested; the trainer was released.
    Stopped,
    /// The notification stream ended under us.
    DeviceLost,
}

/// Run the session until `shutdown` resolves or the trainer goes away.
///
/// Gradient write failures are logged by the session and the loop keeps
/// going; the next tick sends a fresh value. Shutdown is honored even while
/// a write is in flight.
pub async fn run<L, S>(
    session: &mut TrainerSession<L>,
    mut subscription: Subscription,
    shutdown: S,
) -> RideOutcome
where
    L: TrainerLink,
    S: Future<Output = ()>,
{
    let started = Instant::now();
    let mut ticker = interval(session.playback().tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!("Ride started");

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break RideOutcome::Stopped,
            notification = subscription.next() => match notification {
                Some(data) => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    session.handle_power_data(&data, now_ms);
                }
                None => break RideOutcome::DeviceLost,
            },
            _ = ticker.tick() => {
                // A write still waiting for its acknowledgment is abandoned on shutdown
                tokio::select! {
                    _ = &mut shutdown => break RideOutcome::Stopped,
                    result = session.tick() => {
                        if let Err(e) = result {
                            tracing::debug!("Tick failed, continuing: {}", e);
                        }
                    }
                }
            }
        }
    };

    match outcome {
        RideOutcome::Stopped => session.disconnect(subscription).await,
        RideOutcome::DeviceLost => session.handle_device_disconnected(),
    }

    tracing::info!(
        "Ride ended after {:.0}s: {:?}",
        started.elapsed().as_secs_f64(),
        outcome
    );
    outcome
}
