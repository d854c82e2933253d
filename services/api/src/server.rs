use crate::cli::ServeArgs;
use crate::infra::{in_memory, load_directory, AppState};
use crate::routes::with_check_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shift_report::config::AppConfig;
use shift_report::error::AppError;
use shift_report::telemetry;
use shift_report::workflows::checks::{CheckWorkflowService, ZonedClock};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let seed = load_directory(&config.reporting)?;
    let clock = Arc::new(ZonedClock::new(config.reporting.timezone));
    let infrastructure = in_memory(seed, clock);

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        outbox: infrastructure.outbox.clone(),
    };

    let service = Arc::new(CheckWorkflowService::new(
        infrastructure.collaborators,
        config.reporting.clone(),
    ));

    let app = with_check_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        timezone = %config.reporting.timezone,
        "shift report service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
