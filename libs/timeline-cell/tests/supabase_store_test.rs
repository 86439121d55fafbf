use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::SupabaseClient;
use shared_utils::test_utils::TestConfig;
use timeline_cell::models::{EventKind, TimelineEvent};
use timeline_cell::services::{SupabaseTimelineStore, TimelineStore};

fn store(server: &MockServer) -> SupabaseTimelineStore {
    let config = TestConfig::default().with_supabase(&server.uri());
    SupabaseTimelineStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn appointment_event(user_id: Uuid, appointment_id: Uuid) -> TimelineEvent {
    TimelineEvent {
        id: Uuid::new_v4(),
        user_id,
        date: Utc::now(),
        title: "Appointment with Dr. Ada Okafor".to_string(),
        description: None,
        kind: EventKind::Appointment,
        related_file_url: None,
        report_id: None,
        source_appointment_id: Some(appointment_id),
        source_report_id: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn projected_insert_ignores_duplicates() {
    let server = MockServer::start().await;
    let event = appointment_event(Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("POST"))
        .and(path("/rest/v1/medical_events"))
        .and(query_param("on_conflict", "user_id,source_appointment_id"))
        .and(header("Prefer", "return=representation,resolution=ignore-duplicates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([event])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store(&server).append(&event).await.unwrap());
}

#[tokio::test]
async fn duplicate_insert_reports_nothing_written() {
    let server = MockServer::start().await;
    let event = appointment_event(Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("POST"))
        .and(path("/rest/v1/medical_events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(!store(&server).append(&event).await.unwrap());
}

#[tokio::test]
async fn list_orders_newest_first() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_events"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .and(query_param("order", "date.desc,created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store(&server).list(user_id).await.unwrap().is_empty());
}
