mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use appointment_cell::models::AppointmentEventKind;
use appointment_cell::services::{EventOutbox, OutboxRelay};
use shared_config::BookingPolicy;

use common::{booking, fixture, RecordingHandler};

#[tokio::test]
async fn drain_delivers_and_acknowledges() {
    let f = fixture(BookingPolicy::Exclusive);
    let handler = Arc::new(RecordingHandler::default());
    let relay = OutboxRelay::new(f.store.clone(), 10, Duration::from_millis(10)).with_handler(handler.clone());

    let appt = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "10:00")).await.unwrap();
    f.registry.confirm(appt.id, f.doctor_id).await.unwrap();

    assert_eq!(relay.drain().await.unwrap(), 1);
    assert_eq!(handler.count(), 1);
    assert_eq!(handler.seen.lock().unwrap()[0].kind, AppointmentEventKind::Confirmed);

    // Nothing left to deliver.
    assert_eq!(relay.drain().await.unwrap(), 0);
    assert!(f.store.pending(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_delivery_stays_pending_and_is_retried() {
    let f = fixture(BookingPolicy::Exclusive);
    let handler = Arc::new(RecordingHandler::failing(1));
    let relay = OutboxRelay::new(f.store.clone(), 10, Duration::from_millis(10)).with_handler(handler.clone());

    let appt = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "10:00")).await.unwrap();
    f.registry.confirm(appt.id, f.doctor_id).await.unwrap();

    assert_eq!(relay.drain().await.unwrap(), 0);
    assert_eq!(f.store.pending(10).await.unwrap().len(), 1);

    assert_eq!(relay.drain().await.unwrap(), 1);
    assert_eq!(handler.count(), 1);
}

#[tokio::test]
async fn event_is_acknowledged_only_when_every_handler_succeeds() {
    let f = fixture(BookingPolicy::Exclusive);
    let healthy = Arc::new(RecordingHandler::default());
    let flaky = Arc::new(RecordingHandler::failing(1));
    let relay = OutboxRelay::new(f.store.clone(), 10, Duration::from_millis(10))
        .with_handler(healthy.clone())
        .with_handler(flaky.clone());

    let appt = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "10:00")).await.unwrap();
    f.registry.confirm(appt.id, f.doctor_id).await.unwrap();

    relay.drain().await.unwrap();
    relay.drain().await.unwrap();

    // At-least-once: the healthy handler sees the redelivery too.
    assert_eq!(healthy.count(), 2);
    assert_eq!(flaky.count(), 1);
    assert!(f.store.pending(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn drain_walks_multiple_batches() {
    let f = fixture(BookingPolicy::Exclusive);
    let handler = Arc::new(RecordingHandler::default());
    let relay = OutboxRelay::new(f.store.clone(), 2, Duration::from_millis(10)).with_handler(handler.clone());

    for slot in ["09:00", "10:00", "11:00", "14:00", "15:00"] {
        let appt = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, slot)).await.unwrap();
        f.registry.confirm(appt.id, f.doctor_id).await.unwrap();
    }

    assert_eq!(relay.drain().await.unwrap(), 5);
    assert_eq!(handler.count(), 5);
}

#[tokio::test]
async fn run_delivers_in_background_and_stops_on_shutdown() {
    let f = fixture(BookingPolicy::Exclusive);
    let handler = Arc::new(RecordingHandler::default());
    let relay = Arc::new(
        OutboxRelay::new(f.store.clone(), 10, Duration::from_millis(5)).with_handler(handler.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.run(shutdown_rx).await })
    };

    let appt = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "10:00")).await.unwrap();
    f.registry.confirm(appt.id, f.doctor_id).await.unwrap();

    for _ in 0..100 {
        if handler.count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handler.count(), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn delivered_events_leave_the_outbox() {
    let f = fixture(BookingPolicy::Exclusive);
    let handler = Arc::new(RecordingHandler::default());
    let relay = OutboxRelay::new(f.store.clone(), 10, Duration::from_millis(10)).with_handler(handler.clone());

    let first = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "09:00")).await.unwrap();
    f.registry.confirm(first.id, f.doctor_id).await.unwrap();
    assert_eq!(relay.drain().await.unwrap(), 1);
    assert!(f.store.outbox_snapshot().await.is_empty());

    let second = f.registry.request_appointment(Uuid::new_v4(), booking(f.doctor_id, "10:00")).await.unwrap();
    f.registry.confirm(second.id, f.doctor_id).await.unwrap();

    let waiting = f.store.outbox_snapshot().await;
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].snapshot.id, second.id);

    // Acknowledging twice is harmless.
    f.store.acknowledge(waiting[0].id).await.unwrap();
    f.store.acknowledge(waiting[0].id).await.unwrap();
    assert!(f.store.pending(10).await.unwrap().is_empty());
    assert_eq!(handler.count(), 1);
}
