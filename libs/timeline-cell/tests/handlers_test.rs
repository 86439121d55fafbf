mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use timeline_cell::handlers::TimelineState;
use timeline_cell::router::timeline_routes;

use common::{fixture, Fixture};

fn router(f: &Fixture) -> Router {
    timeline_routes(Arc::new(TimelineState {
        config: TestConfig::default().to_arc(),
        projector: f.projector.clone(),
    }))
}

fn token(user: &TestUser) -> String {
    JwtTestUtils::bearer(user, &TestConfig::default().to_app_config())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post(uri: &str, user: &TestUser, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", token(user))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, user: &TestUser) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", token(user))
        .body(Body::empty())
        .unwrap()
}

fn hook_body(change: &str, status: &str, patient_id: Uuid, doctor_id: Uuid, appointment_id: Uuid) -> Value {
    json!({
        "type": change,
        "record": {
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_at": "2030-01-07T10:00:00Z",
            "issue": "Headache",
            "status": status,
            "version": 2
        }
    })
}

#[tokio::test]
async fn hook_is_service_only() {
    let f = fixture();
    let patient = TestUser::patient("patient@example.com");
    let body = hook_body("UPDATE", "confirmed", patient.uuid(), f.doctor_id, Uuid::new_v4());

    let (status, _) = send(&router(&f), post("/hooks/appointments", &patient, body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hook_ignores_inserts_and_other_statuses() {
    let f = fixture();
    let service = TestUser::service();
    let patient_id = Uuid::new_v4();
    let app = router(&f);

    let (status, body) = send(
        &app,
        post("/hooks/appointments", &service, hook_body("INSERT", "pending", patient_id, f.doctor_id, Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No action needed for non-update events");

    let (status, _) = send(
        &app,
        post("/hooks/appointments", &service, hook_body("UPDATE", "canceled", patient_id, f.doctor_id, Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(f.projector.list(patient_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn hook_projects_confirmation_once() {
    let f = fixture();
    let service = TestUser::service();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let app = router(&f);
    let body = hook_body("UPDATE", "confirmed", patient_id, f.doctor_id, appointment_id);

    let (status, first) = send(&app, post("/hooks/appointments", &service, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);
    assert_eq!(first["event"]["type"], "appointment");
    assert_eq!(first["event"]["title"], "Appointment with Dr. Ada Okafor");

    let (_, second) = send(&app, post("/hooks/appointments", &service, body)).await;
    assert_eq!(second["created"], false);
    assert_eq!(f.projector.list(patient_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn patient_records_and_reads_own_timeline() {
    let f = fixture();
    let patient = TestUser::patient("patient@example.com");
    let app = router(&f);

    let (status, body) = send(
        &app,
        post(
            "/events",
            &patient,
            json!({
                "date": "2030-03-01T08:00:00Z",
                "title": "Started vitamin D",
                "description": "1000 IU daily",
                "type": "medicine",
                "related_file_url": null
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["user_id"], patient.uuid().to_string());

    let (status, body) = send(&app, get("/", &patient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["events"][0]["type"], "medicine");
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let f = fixture();
    let patient = TestUser::patient("patient@example.com");

    let (status, _) = send(
        &router(&f),
        post(
            "/events",
            &patient,
            json!({ "date": "2030-03-01T08:00:00Z", "title": "", "type": "alert" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn timeline_requires_a_token() {
    let f = fixture();
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, _) = send(&router(&f), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
