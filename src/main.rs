use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use secrecy::ExposeSecret;
use tokio::sync::{Notify, mpsc};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use site_attendance::api::AppState;
use site_attendance::attendance::AttendanceMachine;
use site_attendance::config::Config;
use site_attendance::db;
use site_attendance::directory::WorkerDirectory;
use site_attendance::gate::DebounceGate;
use site_attendance::kiosk::Kiosk;
use site_attendance::routes;
use site_attendance::store::memory::MemoryCentralStore;
use site_attendance::store::mysql::MySqlCentralStore;
use site_attendance::store::{CentralHandle, CentralStore, DualStore, LocalBuffer};
use site_attendance::sync::{self, ApiTransport, DirectTransport, SyncEngine, SyncTransport};

/// Recognitions waiting for the kiosk; the identity source reports far
/// faster than triggers happen, so overflow is dropped at the API.
const RECOGNITION_QUEUE: usize = 256;

fn init_tracing(config: &Config) -> WorkerGuard {
    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(fmt::layer().with_target(false))
        .init();

    guard
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = init_tracing(&config);

    info!(device = %config.sync.device_name, "Device starting...");

    let database_url = config.database_url.expose_secret();
    let central_store: Arc<dyn CentralStore> = if database_url.starts_with("memory:") {
        warn!("DATABASE_URL points at the in-process store, nothing leaves this device");
        Arc::new(MemoryCentralStore::new())
    } else {
        let pool = db::init_central(database_url, config.store_timeout)?;
        Arc::new(MySqlCentralStore::new(pool, config.sync.device_name.clone()))
    };
    let central = Arc::new(CentralHandle::new(central_store, config.store_timeout));
    let buffer = LocalBuffer::new(db::init_buffer(&config.buffer_path).await?).await?;

    let directory = WorkerDirectory::new(config.sync.project_id);
    if central.probe().await {
        if let Err(e) = directory.load(&central).await {
            warn!(error = %e, "Failed to warm up worker directory");
        }
    } else {
        warn!("Central store unreachable at startup, running from the local buffer");
    }

    let mut transports: Vec<Box<dyn SyncTransport>> =
        vec![Box::new(DirectTransport::new(central.clone()))];
    if let Some(api) = ApiTransport::from_config(&config.sync)? {
        transports.push(Box::new(api));
    }
    let engine = Arc::new(
        SyncEngine::new(
            buffer.clone(),
            central.clone(),
            transports,
            config.sync.max_retry_attempts,
        )
        .with_reference_data(Arc::new(directory.clone())),
    );
    let (sync_handle, sync_task) = sync::worker::spawn(
        engine.clone(),
        config.sync.interval,
        config.sync.probe_interval,
    );

    let machine = AttendanceMachine::new(
        DualStore::new(central.clone(), buffer.clone()),
        &config.attendance,
    );
    let kiosk = Kiosk::new(
        DebounceGate::new(config.gate.clone()),
        machine,
        directory,
        config.attendance.min_confidence,
    );
    let last_event = kiosk.subscribe();
    let (events, events_rx) = mpsc::channel(RECOGNITION_QUEUE);
    let kiosk_shutdown = Arc::new(Notify::new());
    let kiosk_task = tokio::spawn(kiosk.run(events_rx, kiosk_shutdown.clone()));

    let state = AppState {
        central,
        buffer: buffer.clone(),
        engine,
        sync: sync_handle.clone(),
        events,
        last_event,
        device_name: config.sync.device_name.clone(),
        project_id: config.sync.project_id,
        api_token: config.api_token.clone(),
    };

    let server_addr = config.server_addr.clone();
    info!(%server_addr, "Operator API listening");

    // run() resolves on SIGINT/SIGTERM
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Shutting down");
    kiosk_shutdown.notify_one();
    sync_handle.stop();
    let (kiosk_result, sync_result) = tokio::join!(kiosk_task, sync_task);
    if let Err(e) = kiosk_result.and(sync_result) {
        warn!(error = %e, "Background task ended abnormally");
    }
    buffer.close().await;

    Ok(())
}
