use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::digest::ScheduledJob;
use super::domain::{ChatId, ReportId, ReportKind};
use super::service::{CheckWorkflowService, InboundEvent, ServiceError};
use crate::error::AppError;

/// Router exposing the event entry point, owner browse and job triggers.
pub fn checks_router(service: Arc<CheckWorkflowService>) -> Router {
    Router::new()
        .route("/api/v1/checks/events", post(event_handler))
        .route("/api/v1/checks/reports", get(reports_handler))
        .route("/api/v1/checks/reports/:report_id", get(report_handler))
        .route("/api/v1/checks/summary", get(summary_handler))
        .route("/api/v1/checks/jobs/:job", post(job_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportsQuery {
    date: NaiveDate,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryQuery {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
struct JobRequest {
    #[serde(default)]
    target: Option<ChatId>,
}

pub(crate) async fn event_handler(
    State(service): State<Arc<CheckWorkflowService>>,
    axum::Json(event): axum::Json<InboundEvent>,
) -> Response {
    match service.handle(event) {
        Ok(reply) => (StatusCode::OK, axum::Json(reply)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn reports_handler(
    State(service): State<Arc<CheckWorkflowService>>,
    Query(query): Query<ReportsQuery>,
) -> Response {
    let kind = match query.kind.as_deref().map(ReportKind::parse) {
        None => None,
        Some(Some(kind)) => Some(kind),
        Some(None) => return bad_request("unknown report kind"),
    };

    match service.reports_on(query.date, kind) {
        Ok(reports) => (StatusCode::OK, axum::Json(reports)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn report_handler(
    State(service): State<Arc<CheckWorkflowService>>,
    Path(report_id): Path<u64>,
) -> Response {
    match service.report(ReportId(report_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn summary_handler(
    State(service): State<Arc<CheckWorkflowService>>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    if query.end < query.start {
        return bad_request("end precedes start");
    }
    match service.summary(query.start, query.end) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => workflow_error(err),
    }
}

pub(crate) async fn job_handler(
    State(service): State<Arc<CheckWorkflowService>>,
    Path(job): Path<String>,
    body: Bytes,
) -> Response {
    let Some(job) = ScheduledJob::parse(&job) else {
        let payload = json!({ "error": format!("unknown job {job}") });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };
    let request = if body.is_empty() {
        JobRequest::default()
    } else {
        match serde_json::from_slice::<JobRequest>(&body) {
            Ok(request) => request,
            Err(err) => return bad_request(&err.to_string()),
        }
    };

    match service.run_job(job, request.target) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => workflow_error(err),
    }
}

fn bad_request(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn workflow_error(err: ServiceError) -> Response {
    if !err.is_not_found() {
        error!(%err, "check workflow request failed");
    }
    AppError::from(err).into_response()
}
