//! ErgRide - smart trainer control with a simulated outdoor ride
//!
//! Main entry point for the application.

use anyhow::Context;
use ergride::sensors::{Device, SensorManager};
use ergride::simulation::{shutdown_channel, RideEvent, RideSimulator};
use ergride::storage::config::{get_config_path, load_config, save_config, AppConfig};
use ergride::workouts::{parse_workout, Workout};
use ergride::world::Route;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn connect_device(config: &AppConfig) -> anyhow::Result<Device> {
    if config.trainer.mock {
        tracing::info!("Using mock trainer");
        return Ok(Device::mock_with_backpressure(
            config.simulation.backpressure,
        ));
    }

    let manager = SensorManager::with_first_adapter(config.trainer.sensor_config())
        .await?
        .with_backpressure(config.simulation.backpressure);

    manager
        .connect_trainer()
        .await
        .context("Could not connect to a trainer")
}

fn load_workout(config: &AppConfig) -> anyhow::Result<Workout> {
    match &config.session.workout {
        Some(text) => parse_workout(text).context("Invalid workout in config"),
        None => Ok(Workout::sample()),
    }
}

fn load_route(config: &AppConfig) -> anyhow::Result<Route> {
    match &config.session.route_path {
        Some(path) => Route::from_geojson_file(path)
            .with_context(|| format!("Could not load route {}", path.display())),
        None => Ok(Route::example()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ErgRide v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    if !get_config_path().exists() {
        // Leave an editable copy of the defaults behind
        match save_config(&config) {
            Ok(()) => tracing::info!("Wrote default config to {}", get_config_path().display()),
            Err(e) => tracing::warn!("Could not write default config: {}", e),
        }
    }
    let workout = load_workout(&config)?;
    let route = load_route(&config)?;
    let device = connect_device(&config).await?;

    let mut simulator =
        RideSimulator::new(device.clone(), workout, route, config.simulation_config());
    let events = simulator.event_receiver();

    // Renderers and serializers live outside this crate, log what they would get
    std::thread::spawn(move || {
        for event in events {
            match event {
                RideEvent::TargetPowerChanged { watts } => tracing::info!("Target: {}W", watts),
                RideEvent::Paused { elapsed } => tracing::info!("Paused at {:?}", elapsed),
                RideEvent::Resumed { elapsed } => tracing::info!("Resumed at {:?}", elapsed),
                RideEvent::PointRecorded(_) | RideEvent::Finished(_) => {}
            }
        }
    });

    let (shutdown, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ride interrupted");
                shutdown.shutdown();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let outcome = simulator.run(signal).await?;
    device.disconnect().await;

    let summary = &outcome.summary;
    tracing::info!(
        "{}: {:?}, {:.2} km, avg {:?}W, max {:?}W, {:.1} km/h, {} track points",
        summary.name,
        summary.moving_time,
        summary.distance_m / 1000.0,
        summary.avg_power,
        summary.max_power,
        summary.avg_speed_kmh,
        summary.points
    );

    Ok(())
}
