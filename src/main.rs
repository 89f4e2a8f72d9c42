//! RouteSim - ride a GPX route on a smart trainer
//!
//! Main entry point for the command line application.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use routesim::ride::{self, RideOutcome};
use routesim::session::{SessionEvent, TrainerSession};
use routesim::storage::config::{self, AppConfig};
use routesim::{BleTrainerLink, Route};

#[derive(Parser)]
#[command(
    name = "routesim",
    version,
    about = "Ride a GPX route on a Bluetooth FTMS trainer",
    long_about = "Plays a GPX track back on a fixed tick, sets the trainer's simulated gradient \
                  for the current point and reports smoothed power and training zone"
)]
struct Args {
    /// GPX file to ride
    route: PathBuf,

    /// Functional Threshold Power override in watts
    #[arg(long)]
    ftp: Option<u16>,

    /// Rider weight override in kilograms
    #[arg(long)]
    weight: Option<f32>,

    /// Configuration file (defaults to the platform data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist --ftp/--weight overrides to the configuration file
    #[arg(long)]
    save: bool,

    /// Print route information and zones, then exit without connecting
    #[arg(long)]
    info: bool,

    /// Emit power updates and the final snapshot as JSON lines
    #[arg(long)]
    json: bool,
}

fn load_settings(args: &Args) -> Result<AppConfig> {
    let path = args.config.clone().unwrap_or_else(config::get_config_path);
    let mut settings = config::load_config_from(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if let Some(ftp) = args.ftp {
        settings.rider.set_ftp(ftp)?;
    }
    if let Some(weight) = args.weight {
        settings.rider.set_weight(weight)?;
    }
    settings.validate()?;

    if args.save {
        config::save_config_to(&settings, &path)?;
        tracing::info!("Saved configuration to {}", path.display());
    }

    Ok(settings)
}

fn print_event(event: &SessionEvent, json: bool) {
    match event {
        SessionEvent::Power(update) if json => match serde_json::to_string(update) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to encode power update: {}", e),
        },
        SessionEvent::Power(update) => println!(
            "{:>4} W  (3s {:>4} W)  {}",
            update.instant_watts, update.smoothed_watts, update.zone
        ),
        SessionEvent::ConnectionChanged(state) if !json => println!("Trainer {}", state),
        SessionEvent::Error(message) => eprintln!("{}", message),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting RouteSim v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let settings = load_settings(&args)?;

    let route = Route::from_file(&args.route)
        .with_context(|| format!("Error processing GPX file {}", args.route.display()))?;

    let link = BleTrainerLink::new(
        Duration::from_secs(settings.trainer.scan_timeout_secs),
        Duration::from_secs(settings.trainer.connection_timeout_secs),
    );
    let mut session = TrainerSession::new(link, &settings)?;
    let events = session.event_receiver();

    let stats = session.set_route(route);
    let name = session
        .route()
        .and_then(|route| route.name.clone())
        .unwrap_or_else(|| "Unnamed route".to_string());

    println!("{}", name);
    println!(
        "  {} points, {:.2} km, {:.0} m climbing, gradient {:.1}% to {:.1}%",
        stats.point_count,
        stats.total_distance_km,
        stats.elevation_gain_m,
        stats.min_gradient,
        stats.max_gradient
    );
    println!(
        "  one lap every {:.0}s",
        session.playback().lap_duration().as_secs_f64()
    );

    println!("Power zones (FTP {} W):", settings.rider.ftp);
    for range in session.zone_table()?.all_zones() {
        println!("  Z{} {:<16} {}", range.zone.number(), range.name, range.watts);
    }

    if args.info {
        return Ok(());
    }

    let json = args.json;
    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            print_event(&event, json);
        }
    });

    let subscription = session.connect().await?;

    let outcome = ride::run(&mut session, subscription, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    let snapshot = session.snapshot();
    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
    }

    // Closes the event channel so the printer thread finishes
    drop(session);
    printer
        .join()
        .map_err(|_| anyhow!("Event printer thread panicked"))?;

    match outcome {
        RideOutcome::Stopped => Ok(()),
        RideOutcome::DeviceLost => Err(anyhow!("Trainer disconnected during the ride")),
    }
}
