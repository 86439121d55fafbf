use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentStatus, StatusChange};
use appointment_cell::services::{AppointmentStore, EventOutbox, SupabaseAppointmentStore};
use shared_database::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn store(server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::default().with_supabase(&server.uri());
    SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn confirm_change(id: Uuid) -> StatusChange {
    StatusChange {
        appointment_id: id,
        expected_version: 1,
        to: AppointmentStatus::Confirmed,
        require_free_slot: false,
    }
}

#[tokio::test]
async fn transition_goes_through_rpc() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/transition_appointment"))
        .and(body_partial_json(json!({
            "p_id": id,
            "p_expected_version": 1,
            "p_status": "confirmed",
            "p_require_free_slot": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockSupabaseResponses::appointment_row(
            &id.to_string(),
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            "confirmed",
            2,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let updated = store(&server).transition(&confirm_change(id)).await.unwrap();
    assert_eq!(updated.status, AppointmentStatus::Confirmed);
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn version_conflict_maps_to_concurrent_modification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/transition_appointment"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("version_conflict", "PT409"),
        ))
        .mount(&server)
        .await;

    let result = store(&server).transition(&confirm_change(Uuid::new_v4())).await;
    assert_matches!(result, Err(AppointmentError::ConcurrentModification));
}

#[tokio::test]
async fn slot_conflict_maps_to_slot_taken() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/transition_appointment"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("slot_taken", "PT409"),
        ))
        .mount(&server)
        .await;

    let result = store(&server).transition(&confirm_change(Uuid::new_v4())).await;
    assert_matches!(result, Err(AppointmentError::SlotTaken));
}

#[tokio::test]
async fn unknown_appointment_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/transition_appointment"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            MockSupabaseResponses::error_response("appointment_not_found", "PT404"),
        ))
        .mount(&server)
        .await;

    let result = store(&server).transition(&confirm_change(Uuid::new_v4())).await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn pending_events_are_read_oldest_first() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_events"))
        .and(query_param("delivered_at", "is.null"))
        .and(query_param("order", "occurred_at.asc"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": id,
            "kind": "confirmed",
            "snapshot": MockSupabaseResponses::appointment_row(
                &id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "confirmed",
                2,
            ),
            "occurred_at": "2029-12-01T00:00:00Z",
            "delivered_at": null
        }])))
        .mount(&server)
        .await;

    let events = store(&server).pending(25).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].appointment_id, id);
    assert_eq!(events[0].snapshot.status, AppointmentStatus::Confirmed);
}
