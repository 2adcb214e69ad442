use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use production_portal_api::{
    app_router, config, db,
    errors::{exit_code_for, ServiceError},
    events::{self, EventSender},
    gateway::SqlErpGateway,
    services::mrp::MrpService,
    services::projections::ProjectionStore,
    AppState,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Configuration first: the log filter default comes from it.
    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();
    tracing::info!(
        cache_ttl_secs = cfg.cache_ttl_secs,
        request_deadline_secs = cfg.request_deadline_secs,
        "configuration loaded"
    );

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "startup failed");
            ExitCode::from(exit_code_for(&err) as u8)
        }
    }
}

async fn run(cfg: config::AppConfig) -> Result<(), ServiceError> {
    let local_db = Arc::new(
        db::connect_local(&cfg.local_database_url)
            .await
            .map_err(ServiceError::local_store)?,
    );
    tracing::info!("local database connection established");

    let erp_db = Arc::new(
        db::connect_erp(&cfg.erp_database_url)
            .await
            .map_err(ServiceError::upstream)?,
    );
    tracing::info!("ERP read connection established");

    let projections = Arc::new(ProjectionStore::new(local_db.clone()));
    projections.ensure_schema().await?;

    let erp: Arc<dyn production_portal_api::gateway::ErpReadGateway> = Arc::new(
        SqlErpGateway::new(erp_db, cfg.upstream_call_timeout()),
    );

    let mrp = Arc::new(MrpService::new(
        erp.clone(),
        projections.clone(),
        cfg.cache_ttl(),
        cfg.engine_settings(),
    ));

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(256);
    let event_sender = EventSender::new(event_tx);
    let event_task = tokio::spawn(events::process_events(event_rx));

    let state = AppState {
        db: local_db,
        erp,
        config: cfg.clone(),
        event_sender,
        mrp,
        projections,
    };

    let app = app_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(cfg.request_deadline()))
            .layer(CorsLayer::permissive())
            .layer(CompressionLayer::new()),
    );

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr())
        .await
        .map_err(|err| ServiceError::ValidationError(format!("cannot bind {}: {err}", cfg.bind_addr())))?;
    tracing::info!(addr = %cfg.bind_addr(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| ServiceError::ValidationError(format!("server error: {err}")))?;

    event_task.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
