use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use shift_report::workflows::checks::{
    checks_router, ChatId, CheckWorkflowService, OutboundMessage,
};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct OutboxEntry {
    pub(crate) recipient: ChatId,
    pub(crate) message: OutboundMessage,
}

pub(crate) fn with_check_routes(service: Arc<CheckWorkflowService>) -> axum::Router {
    checks_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/outbox", axum::routing::get(outbox_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Hands every queued outbound message to the chat gateway exactly once.
pub(crate) async fn outbox_endpoint(Extension(state): Extension<AppState>) -> Json<Vec<OutboxEntry>> {
    let entries = state
        .outbox
        .drain()
        .into_iter()
        .map(|(recipient, message)| OutboxEntry { recipient, message })
        .collect();
    Json(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shift_report::workflows::checks::{FanOut, RecordingTransport};
    use std::sync::atomic::AtomicBool;

    fn state(outbox: Arc<RecordingTransport>) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(recorder.handle()),
            outbox,
        }
    }

    #[tokio::test]
    async fn outbox_is_drained_once() {
        let outbox = Arc::new(RecordingTransport::default());
        FanOut::new(outbox.clone()).send(
            &[ChatId(7), ChatId(8)],
            &[OutboundMessage::text("Sent for review")],
        );

        let Json(first) = outbox_endpoint(Extension(state(outbox.clone()))).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].recipient, ChatId(7));

        let Json(second) = outbox_endpoint(Extension(state(outbox))).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let app_state = state(Arc::new(RecordingTransport::default()));
        app_state
            .readiness
            .store(false, std::sync::atomic::Ordering::Relaxed);

        let response = readiness_endpoint(Extension(app_state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
