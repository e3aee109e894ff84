use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryConversations, InMemoryEntityStore, LoggingNotifier};
use crate::routes::with_hiring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use recruit_flow::config::AppConfig;
use recruit_flow::error::AppError;
use recruit_flow::telemetry;
use recruit_flow::workflows::hiring::HiringWorkflowService;
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let hiring_service = Arc::new(HiringWorkflowService::new(
        Arc::new(InMemoryEntityStore::default()),
        Arc::new(LoggingNotifier::default()),
        Arc::new(InMemoryConversations::default()),
        &config.workflow,
    ));

    let app = with_hiring_routes(hiring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        bottleneck_threshold_days = config.workflow.bottleneck_threshold_days,
        "recruitment workflow service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
