//! End-to-end tests for the realtime WebSocket path.
//!
//! Each test serves the gateway on an ephemeral port with the in-process
//! relay, so a write through the core services travels publisher, relay,
//! fan-out and session exactly as it does in production.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::float_cmp
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use fleetwatch_core::{
    AccidentReport, FleetConfig, FleetStore, LocationReport, MemoryStore, SystemClock,
};
use fleetwatch_gateway::{AppState, Claims, JwtIdentityProvider, build_router, start_fanout};
use fleetwatch_relay::{LocalRelay, Relay, RelayPublisher};
use fleetwatch_types::{
    Identity, IdentityId, Role, Severity, Vehicle, VehicleId, VehicleStatus,
};

const SECRET: &str = "realtime-test-secret";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    addr: String,
    state: Arc<AppState>,
    store: Arc<MemoryStore>,
}

async fn serve() -> Harness {
    let relay: Arc<dyn Relay> = Arc::new(LocalRelay::new(64));
    let (publisher, _drain) = RelayPublisher::spawn(Arc::clone(&relay), 64);
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(
        store.clone(),
        Arc::new(publisher),
        Arc::new(SystemClock),
        Arc::new(JwtIdentityProvider::new(SECRET, 0).unwrap()),
        &FleetConfig::default(),
    ));
    start_fanout(relay, state.topics.clone()).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Harness { addr, state, store }
}

fn token(role: Role) -> String {
    let identity = Identity {
        id: IdentityId::new(),
        email: String::from("dispatch@fleet.test"),
        full_name: String::from("Dispatch"),
        role,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &Claims::new(&identity, Utc::now().timestamp() + 3600),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn connect(harness: &Harness, role: Role) -> Socket {
    let url = format!("ws://{}/ws?token={}", harness.addr, token(role));
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

/// Next text frame as JSON, skipping control frames.
async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn subscribe(socket: &mut Socket, event: &str) {
    let frame = json!({ "event": event }).to_string();
    socket.send(Message::Text(frame)).await.unwrap();
}

async fn register(store: &MemoryStore, reg: &str) -> VehicleId {
    store
        .register_vehicle(Vehicle {
            id: VehicleId::new(),
            registration_number: reg.to_owned(),
            make: None,
            model: None,
            year: None,
            color: None,
            driver_id: None,
            status: VehicleStatus::Active,
            position: None,
            speed_kmh: 0.0,
            heading: 0.0,
            last_location_time: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn connected_frame_carries_the_verified_identity() {
    let harness = serve().await;
    let mut socket = connect(&harness, Role::Viewer).await;

    let hello = next_frame(&mut socket).await;
    assert_eq!(hello["event"], "connected");
    assert_eq!(hello["data"]["greeting"], "Connected to Vehicle Monitoring System");
    assert_eq!(hello["data"]["identity"]["role"], "viewer");
    assert_eq!(hello["data"]["identity"]["email"], "dispatch@fleet.test");
}

#[tokio::test]
async fn vehicle_snapshot_then_live_updates() {
    let harness = serve().await;
    let id = register(&harness.store, "KA-05-RT-0001").await;
    harness
        .state
        .ingestion
        .ingest(id, &LocationReport::at(12.90, 77.60))
        .await
        .unwrap();

    let mut socket = connect(&harness, Role::Viewer).await;
    next_frame(&mut socket).await;
    subscribe(&mut socket, "subscribe:vehicles").await;

    let snapshot = next_frame(&mut socket).await;
    assert_eq!(snapshot["event"], "vehicles:current");
    assert_eq!(snapshot["data"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["data"][0]["id"], id.to_string());

    harness
        .state
        .ingestion
        .ingest(id, &LocationReport::at(12.91, 77.61))
        .await
        .unwrap();

    let update = next_frame(&mut socket).await;
    assert_eq!(update["event"], "vehicle:location:update");
    assert_eq!(update["data"]["vehicleId"], id.to_string());
    assert_eq!(update["data"]["latitude"], 12.91);
}

#[tokio::test]
async fn accident_reaches_alert_subscribers() {
    let harness = serve().await;
    let mut socket = connect(&harness, Role::Viewer).await;
    next_frame(&mut socket).await;
    subscribe(&mut socket, "subscribe:alerts").await;

    let snapshot = next_frame(&mut socket).await;
    assert_eq!(snapshot["event"], "alerts:current");
    assert!(snapshot["data"].as_array().unwrap().is_empty());

    let reported = harness
        .state
        .alerts
        .report_accident(
            AccidentReport::at(12.97, 77.59, Severity::Severe),
            IdentityId::new(),
        )
        .await
        .unwrap();

    let notice = next_frame(&mut socket).await;
    assert_eq!(notice["event"], "accident:new");
    assert_eq!(notice["data"]["accidentId"], reported.accident.id.to_string());
    assert_eq!(notice["data"]["alertId"], reported.alert.id.to_string());
    assert_eq!(notice["data"]["severity"], "severe");
}

#[tokio::test]
async fn unsubscribed_sessions_get_no_updates() {
    let harness = serve().await;
    let id = register(&harness.store, "KA-05-RT-0002").await;

    let mut quiet = connect(&harness, Role::Viewer).await;
    next_frame(&mut quiet).await;
    let mut listening = connect(&harness, Role::Viewer).await;
    next_frame(&mut listening).await;
    subscribe(&mut listening, "subscribe:vehicles").await;
    next_frame(&mut listening).await;

    harness
        .state
        .ingestion
        .ingest(id, &LocationReport::at(12.90, 77.60))
        .await
        .unwrap();
    let update = next_frame(&mut listening).await;
    assert_eq!(update["event"], "vehicle:location:update");

    // The quiet session only ever sees replies to its own frames.
    subscribe(&mut quiet, "subscribe:alerts").await;
    let reply = next_frame(&mut quiet).await;
    assert_eq!(reply["event"], "alerts:current");
}

#[tokio::test]
async fn unknown_frame_gets_an_error_frame() {
    let harness = serve().await;
    let mut socket = connect(&harness, Role::Driver).await;
    next_frame(&mut socket).await;

    socket
        .send(Message::Text(String::from(r#"{"event":"subscribe:weather"}"#)))
        .await
        .unwrap();
    let reply = next_frame(&mut socket).await;
    assert_eq!(reply["event"], "error");

    // The session stays usable.
    subscribe(&mut socket, "subscribe:alerts").await;
    assert_eq!(next_frame(&mut socket).await["event"], "alerts:current");
}

#[tokio::test]
async fn reconnect_receives_a_fresh_snapshot() {
    let harness = serve().await;
    let id = register(&harness.store, "KA-05-RT-0003").await;

    let mut first = connect(&harness, Role::Viewer).await;
    next_frame(&mut first).await;
    subscribe(&mut first, "subscribe:vehicles").await;
    let before = next_frame(&mut first).await;
    assert_eq!(before["data"].as_array().unwrap().len(), 1);
    assert!(before["data"][0]["latitude"].is_null());
    first.close(None).await.unwrap();

    harness
        .state
        .ingestion
        .ingest(id, &LocationReport::at(12.90, 77.60))
        .await
        .unwrap();

    let mut second = connect(&harness, Role::Viewer).await;
    next_frame(&mut second).await;
    subscribe(&mut second, "subscribe:vehicles").await;
    let after = next_frame(&mut second).await;
    assert_eq!(after["data"].as_array().unwrap().len(), 1);
    assert_eq!(after["data"][0]["id"], id.to_string());
    assert_eq!(after["data"][0]["latitude"], 12.90);
    assert_eq!(after["data"][0]["longitude"], 77.60);
}

#[tokio::test]
async fn location_updates_arrive_in_publish_order() {
    let harness = serve().await;
    let id = register(&harness.store, "KA-05-RT-0004").await;

    let mut socket = connect(&harness, Role::Viewer).await;
    next_frame(&mut socket).await;
    subscribe(&mut socket, "subscribe:vehicles").await;
    next_frame(&mut socket).await;

    for (lat, lon) in [(12.90, 77.60), (12.95, 77.65)] {
        harness
            .state
            .ingestion
            .ingest(id, &LocationReport::at(lat, lon))
            .await
            .unwrap();
    }

    let first = next_frame(&mut socket).await;
    let second = next_frame(&mut socket).await;
    assert_eq!(first["event"], "vehicle:location:update");
    assert_eq!(second["event"], "vehicle:location:update");
    assert_eq!(first["data"]["latitude"], 12.90);
    assert_eq!(second["data"]["latitude"], 12.95);
}

#[tokio::test]
async fn subscribe_frame_with_payload_is_accepted() {
    let harness = serve().await;
    let mut socket = connect(&harness, Role::Viewer).await;
    next_frame(&mut socket).await;

    let frame = json!({ "event": "subscribe:alerts", "data": { "region": "north" } });
    socket.send(Message::Text(frame.to_string())).await.unwrap();
    assert_eq!(next_frame(&mut socket).await["event"], "alerts:current");
}

#[tokio::test]
async fn bad_token_is_refused_before_upgrade() {
    let harness = serve().await;
    let url = format!("ws://{}/ws?token=not-a-jwt", harness.addr);
    match connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        Err(e) => panic!("expected HTTP 401, got {e}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}
