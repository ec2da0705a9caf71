//! WebSocket session lifecycle.
//!
//! Clients connect to `GET /ws` with a bearer token. The token is verified
//! before the upgrade; a bad token gets a 401 JSON response and no socket.
//!
//! Once upgraded, the session:
//! 1. registers with the [`TopicRouter`] and joins its identity and role
//!    topics,
//! 2. sends `connected`,
//! 3. answers `subscribe:vehicles` / `subscribe:alerts` by joining the topic
//!    and then sending a snapshot,
//! 4. forwards every frame queued for it by the fan-out task,
//! 5. leaves all topics when the socket closes.
//!
//! This task is the only writer to the socket. Updates fanned out while a
//! snapshot is being read wait in the session queue and go out after it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, info, warn};

use fleetwatch_types::{
    AlertSnapshot, ClientMessage, Connected, ErrorNotice, Identity, ServerMessage, Topic,
    VehicleSnapshot,
};

use crate::auth::CurrentIdentity;
use crate::state::{AppState, GREETING};
use crate::topics::SessionId;

/// Upgrade an authenticated request to a realtime session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session(
    CurrentIdentity(identity): CurrentIdentity,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, identity, state))
}

/// Whether the session should keep running.
enum Flow {
    Continue,
    Close,
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Flow {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode server frame");
            return Flow::Continue;
        }
    };
    if socket.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket send failed");
        return Flow::Close;
    }
    Flow::Continue
}

fn error_frame(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error(ErrorNotice {
        message: message.into(),
    })
}

async fn run_session(mut socket: WebSocket, identity: Identity, state: Arc<AppState>) {
    let (session, mut outbound) = state
        .topics
        .register(state.settings.session_queue_capacity)
        .await;
    state.topics.join(session, Topic::Identity(identity.id)).await;
    state.topics.join(session, Topic::Role(identity.role)).await;

    info!(session = %session, email = %identity.email, role = %identity.role, "client connected");

    let hello = ServerMessage::Connected(Connected {
        greeting: GREETING.to_owned(),
        identity: identity.clone(),
    });

    if matches!(send(&mut socket, &hello).await, Flow::Continue) {
        loop {
            let flow = tokio::select! {
                queued = outbound.recv() => match queued {
                    Some(message) => send(&mut socket, &message).await,
                    None => Flow::Close,
                },
                incoming = socket.recv() => {
                    handle_incoming(&mut socket, incoming, session, &state).await
                }
            };
            if matches!(flow, Flow::Close) {
                break;
            }
        }
    }

    state.topics.remove(session).await;
    info!(session = %session, email = %identity.email, "client disconnected");
}

async fn handle_incoming(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, axum::Error>>,
    session: SessionId,
    state: &AppState,
) -> Flow {
    match incoming {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => handle_request(socket, request, session, state).await,
            Err(e) => {
                debug!(session = %session, error = %e, "unrecognised client frame");
                send(socket, &error_frame(format!("unrecognised frame: {e}"))).await
            }
        },
        Some(Ok(Message::Binary(_))) => {
            send(socket, &error_frame("binary frames are not supported")).await
        }
        Some(Ok(Message::Ping(data))) => {
            if socket.send(Message::Pong(data)).await.is_err() {
                return Flow::Close;
            }
            Flow::Continue
        }
        Some(Ok(Message::Pong(_))) => Flow::Continue,
        Some(Ok(Message::Close(_))) | None => Flow::Close,
        Some(Err(e)) => {
            debug!(session = %session, error = %e, "WebSocket error");
            Flow::Close
        }
    }
}

async fn handle_request(
    socket: &mut WebSocket,
    request: ClientMessage,
    session: SessionId,
    state: &AppState,
) -> Flow {
    match request {
        ClientMessage::SubscribeVehicles => {
            // Join first so nothing published during the read is missed.
            state.topics.join(session, Topic::AllVehicles).await;
            match state.vehicles.active().await {
                Ok(vehicles) => {
                    let snapshot = vehicles.iter().map(VehicleSnapshot::from).collect();
                    send(socket, &ServerMessage::VehiclesCurrent(snapshot)).await
                }
                Err(e) => {
                    warn!(session = %session, error = %e, "vehicle snapshot failed");
                    send(socket, &error_frame("vehicle snapshot unavailable")).await
                }
            }
        }
        ClientMessage::SubscribeAlerts => {
            state.topics.join(session, Topic::AllAlerts).await;
            match state.alerts.active_alerts(None).await {
                Ok(alerts) => {
                    let snapshot = alerts.iter().map(|a| AlertSnapshot::from(&a.alert)).collect();
                    send(socket, &ServerMessage::AlertsCurrent(snapshot)).await
                }
                Err(e) => {
                    warn!(session = %session, error = %e, "alert snapshot failed");
                    send(socket, &error_frame("alert snapshot unavailable")).await
                }
            }
        }
    }
}
