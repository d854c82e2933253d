use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::workflows::checks::{ReportKind, ReportRepository, UniqueKey};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn events_route_drives_a_session() {
    let harness = Harness::new(at(monday(), 9, 30, 0));

    let response = harness
        .router()
        .oneshot(post_json(
            "/api/v1/checks/events",
            json!({ "type": "text", "conversation_id": 100, "text": "✅ Opening" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["menu"]["type"], "choices");
    assert_eq!(body["menu"]["options"], json!(["Setup", "By 10", "By 12"]));
    assert!(harness.session(ANNA).is_some());
}

#[tokio::test]
async fn confirmation_for_missing_report_is_generic_not_found() {
    let harness = Harness::new(at(monday(), 9, 30, 0));

    let response = harness
        .router()
        .oneshot(post_json(
            "/api/v1/checks/events",
            json!({ "type": "confirmation", "conversation_id": 200, "report_id": 42 }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body, json!({ "error": "could not process the request" }));
}

#[tokio::test]
async fn report_routes_expose_status_views() {
    let harness = Harness::new(at(monday(), 9, 30, 0));
    harness.submit_opening_early(ANNA, "North");
    let record = harness
        .store
        .find_unique(&UniqueKey::new("North", ReportKind::OpeningEarly, monday()))
        .expect("lookup")
        .expect("record stored");

    let response = harness
        .router()
        .oneshot(get(&format!("/api/v1/checks/reports/{}", record.id)))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "opening-early");
    assert_eq!(body["approver"], "Sidorova");
    assert_eq!(body["verified"], false);
    assert_eq!(body["evidence_count"], 2);

    let response = harness
        .router()
        .oneshot(get("/api/v1/checks/reports?date=2024-07-01&kind=opening-early"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = harness
        .router()
        .oneshot(get("/api/v1/checks/reports?date=2024-07-01&kind=lunch"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_report_id_is_not_found() {
    let harness = Harness::new(at(monday(), 9, 30, 0));

    let response = harness
        .router()
        .oneshot(get("/api/v1/checks/reports/77"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn job_route_accepts_optional_target() {
    let harness = Harness::new(at(monday(), 9, 0, 0));
    harness.roster.assign(monday(), "North", ANNA).expect("roster writable");

    let response = harness
        .router()
        .oneshot(post_json(
            "/api/v1/checks/jobs/checklist-reminder",
            json!({ "target": 101 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["delivered"], json!([101]));

    let response = harness
        .router()
        .oneshot(
            Request::post("/api/v1/checks/jobs/checklist-reminder")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body["delivered"], json!([100]));

    let response = harness
        .router()
        .oneshot(post_json("/api/v1/checks/jobs/lunch", json!({})))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_route_rejects_inverted_range() {
    let harness = Harness::new(at(monday(), 9, 30, 0));

    let response = harness
        .router()
        .oneshot(get("/api/v1/checks/summary?start=2024-07-02&end=2024-07-01"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .router()
        .oneshot(get("/api/v1/checks/summary?start=2024-07-01&end=2024-07-31"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["rows"], json!([]));
}
