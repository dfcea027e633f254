use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_ops_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use vaultra::app::Application;
use vaultra::config::AppConfig;
use vaultra::error::AppError;
use vaultra::http::api_router;
use vaultra::store::MemoryStore;
use vaultra::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.no_scheduler {
        config.pipeline.scheduler_enabled = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let application = Application::from_config(&config, Arc::new(MemoryStore::default()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_loops = if config.pipeline.scheduler_enabled {
        application.orchestrator.clone().spawn(shutdown_rx)
    } else {
        info!("scheduler disabled; periodic jobs will not run");
        Vec::new()
    };

    let app = with_ops_routes(api_router(application.state.clone()))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "funding readiness service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    shutdown_tx.send(true).ok();
    for job_loop in job_loops {
        if let Err(err) = job_loop.await {
            warn!(error = %err, "job loop ended abnormally");
        }
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
