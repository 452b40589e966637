use std::sync::Arc;

use super::*;
use crate::messaging::topics;

fn message(kind: &str) -> WsMessage {
    WsMessage::new(kind, None)
}

#[tokio::test]
async fn send_to_unregistered_id_fails_not_found() {
    let registry = ConnectionRegistry::new();

    let err = registry
        .send("rider-1", &message(topics::TRIP_NO_DRIVERS_FOUND))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::NotFound(id) if id == "rider-1"));
}

#[tokio::test]
async fn send_routes_to_registered_connection() {
    let registry = ConnectionRegistry::new();
    let connection = Arc::new(MockConnection::new());
    registry.add("driver-1", connection.clone()).await;

    registry
        .send("driver-1", &message(topics::DRIVER_CMD_TRIP_REQUEST))
        .await
        .unwrap();

    let sent = connection.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, topics::DRIVER_CMD_TRIP_REQUEST);
}

#[tokio::test]
async fn remove_makes_subsequent_sends_fail() {
    let registry = ConnectionRegistry::new();
    registry.add("rider-1", Arc::new(MockConnection::new())).await;
    registry.remove("rider-1").await;

    let err = registry
        .send("rider-1", &message(topics::TRIP_DRIVER_ASSIGNED))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn re_registration_routes_to_newest_handle_only() {
    let registry = ConnectionRegistry::new();
    let first = Arc::new(MockConnection::new());
    let second = Arc::new(MockConnection::new());

    registry.add("driver-1", first.clone()).await;
    registry.add("driver-1", second.clone()).await;

    registry
        .send("driver-1", &message(topics::DRIVER_CMD_TRIP_REQUEST))
        .await
        .unwrap();

    assert!(first.sent().is_empty());
    assert_eq!(second.sent().len(), 1);
}

#[tokio::test]
async fn dead_connection_surfaces_send_error() {
    let registry = ConnectionRegistry::new();
    let connection = Arc::new(MockConnection::new());
    registry.add("rider-1", connection.clone()).await;
    connection.kill();

    let err = registry
        .send("rider-1", &message(topics::TRIP_DRIVER_ASSIGNED))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Send(_)));
}
