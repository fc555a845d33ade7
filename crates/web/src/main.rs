use anyhow::Context;
use engine::{RaceService, snapshot::SnapshotStore};
use ingest::{
    MessageLog, TelemetryArchive, TelemetryPipeline, Transport,
    archive::{MemoryArchive, PostgresArchive},
    resilience::{Reconnector, TransportWatchdog},
    transport::{MqttSettings, MqttTransport, telemetry_filters},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod middleware;
mod routes;
mod state;

use config::Config;
use features::{data, leaderboard, points, races, settings, transport, vehicles};
use state::AppState;

const INBOUND_CAPACITY: usize = 1024;
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(OpenApi)]
#[openapi(
    paths(
        vehicles::handlers::list_vehicles,
        vehicles::handlers::set_roster,
        vehicles::handlers::get_latest,
        races::handlers::list_races,
        races::handlers::set_schedule,
        races::handlers::get_results,
        races::handlers::start_races,
        races::handlers::finish_race,
        races::handlers::finish_vehicle,
        leaderboard::handlers::get_leaderboard,
        leaderboard::handlers::reset_leaderboard,
        points::handlers::update_points,
        points::handlers::reset_points,
        settings::handlers::get_settings,
        settings::handlers::update_settings,
        transport::handlers::send_raw,
        transport::handlers::get_log,
        transport::handlers::clear_log,
        data::handlers::save_data,
        data::handlers::reset_data,
    ),
    components(
        schemas(
            engine::dto::vehicle::VehicleRequest,
            engine::dto::race::RaceRequest,
            engine::dto::race::StartRaceRequest,
            engine::dto::race::StartRaceOutcome,
            engine::dto::race::FinishVehicleRequest,
            engine::dto::race::FinishVehicleResponse,
            engine::dto::race::FinishRaceRequest,
            engine::dto::race::FinishRaceResponse,
            engine::dto::race::RaceResult,
            engine::dto::points::PointsRequest,
            engine::dto::points::PointsEntry,
            engine::dto::telemetry::LatestTelemetry,
            engine::dto::telemetry::ArchivedReading,
            engine::models::Vehicle,
            engine::models::Race,
            engine::models::RaceKey,
            engine::models::RaceMetrics,
            engine::models::RacePhase,
            engine::models::LeaderboardEntry,
            engine::models::LiveStatus,
            engine::models::Settings,
            data::handlers::SaveResponse,
            data::handlers::ResetResponse,
        )
    ),
    tags(
        (name = "vehicles", description = "Roster management"),
        (name = "races", description = "Schedule, race control and results"),
        (name = "leaderboard", description = "Standings per category"),
        (name = "points", description = "Manual point awards"),
        (name = "settings", description = "Race coefficient and speed limit"),
        (name = "transport", description = "Broker pass-through and inbound message log"),
        (name = "data", description = "State persistence"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting race telemetry server");

    let config = Config::from_env().context("Failed to load server configuration")?;
    tracing::info!("Configuration loaded successfully");

    let archive: Arc<dyn TelemetryArchive> = match &config.database_url {
        Some(url) => {
            tracing::info!(
                "Connecting to telemetry archive at: {}",
                url.split('@').next_back().unwrap_or("unknown")
            );
            Arc::new(
                PostgresArchive::connect(url)
                    .await
                    .context("Failed to initialize telemetry archive")?,
            )
        }
        None => {
            tracing::info!("DATABASE_URL not set, keeping only the latest telemetry in memory");
            Arc::new(MemoryArchive::default())
        }
    };

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let mqtt = Arc::new(MqttTransport::new(
        MqttSettings {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            client_id: config.mqtt_client_id.clone(),
            username: config.mqtt_user.clone(),
            password: config.mqtt_password.clone(),
            keep_alive: MQTT_KEEP_ALIVE,
        },
        inbound_tx,
    ));

    let service = Arc::new(RaceService::new(
        mqtt.clone(),
        SnapshotStore::new(&config.state_dir),
        config.session_queue_capacity,
    ));
    service
        .load_snapshot()
        .await
        .context("Failed to load saved race state")?;

    let log = Arc::new(MessageLog::default());
    let pipeline = Arc::new(TelemetryPipeline::new(service.clone(), log.clone(), archive.clone()));
    let shutdown = CancellationToken::new();
    let transport: Arc<dyn Transport> = mqtt;

    let tasks = vec![
        spawn_supervised("pipeline", pipeline.run(inbound_rx, shutdown.clone())),
        spawn_supervised(
            "reconnector",
            Reconnector::new(transport.clone(), telemetry_filters())
                .with_interval(config.reconnect_interval)
                .run(shutdown.clone()),
        ),
        spawn_supervised(
            "watchdog",
            TransportWatchdog::new(transport.clone(), service.activity().clone())
                .with_timing(config.watchdog_interval, config.watchdog_threshold)
                .run(shutdown.clone()),
        ),
        spawn_supervised("broadcast", {
            let service = service.clone();
            let token = shutdown.clone();
            let period = config.broadcast_interval;
            async move { service.hub().run_broadcast(period, token).await }
        }),
        spawn_supervised("setpoint refresh", {
            let service = service.clone();
            let token = shutdown.clone();
            let period = config.setpoint_refresh_interval;
            async move { service.run_setpoint_refresh(period, token).await }
        }),
        spawn_supervised("autosave", {
            let service = service.clone();
            let token = shutdown.clone();
            let period = config.autosave_interval;
            async move { service.run_autosave(period, token).await }
        }),
    ];

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let app = routes::router(AppState::new(service.clone(), log, archive))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(ServiceBuilder::new().layer(cors));

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }

    match service.save_snapshot().await {
        Ok(path) => tracing::info!(path = %path.display(), "Race state saved"),
        Err(e) => tracing::error!(error = %e, "Failed to save race state on shutdown"),
    }

    served.context("Server error")?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Runs a background task and logs how it ended as soon as it does.
fn spawn_supervised<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::spawn(task).await {
            Ok(()) => tracing::info!(task = name, "Background task stopped"),
            Err(e) => tracing::error!(task = name, error = %e, "Background task panicked"),
        }
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
