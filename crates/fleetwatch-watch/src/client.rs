//! Connect, subscribe, print, reconnect.
//!
//! The client subscribes to both topics as soon as the gateway greets it,
//! so every reconnection starts from fresh snapshots. Failed attempts are
//! retried with a fixed delay; a rejected token is never retried.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use fleetwatch_types::{ClientMessage, ServerMessage, VehicleSnapshot};

use crate::config::WatchConfig;
use crate::error::WatchError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Watch until the retry budget runs out or the token is rejected.
///
/// The failure count resets whenever a connection is established.
pub async fn run(config: &WatchConfig) -> Result<(), WatchError> {
    let mut failures: u32 = 0;
    loop {
        match watch_once(config).await {
            Ok(()) => {
                failures = 0;
                warn!("disconnected from gateway");
            }
            Err(WatchError::Unauthorized) => return Err(WatchError::Unauthorized),
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(
                    attempt = failures,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "connection attempt failed"
                );
                if failures >= config.max_attempts {
                    return Err(WatchError::GaveUp { attempts: failures });
                }
            }
        }
        tokio::time::sleep(config.backoff).await;
    }
}

/// One connection, from handshake to close.
///
/// Returns `Ok` once a connection that was established ends for any reason.
async fn watch_once(config: &WatchConfig) -> Result<(), WatchError> {
    let mut request = config.url.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
        .map_err(|e| WatchError::Config(format!("token is not a valid header value: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let mut socket = match connect_async(request).await {
        Ok((socket, _)) => socket,
        Err(tungstenite::Error::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
            return Err(WatchError::Unauthorized);
        }
        Err(e) => return Err(e.into()),
    };
    info!(url = %config.url, "connected to gateway");

    while let Some(frame) = socket.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => {
                    println!("{}", render(&message));
                    if matches!(message, ServerMessage::Connected(_)) {
                        if let Err(e) = subscribe_all(&mut socket).await {
                            warn!(error = %e, "subscribe failed");
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "unrecognised server frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(other) => debug!(kind = ?other, "control frame"),
            Err(e) => {
                warn!(error = %e, "connection lost");
                break;
            }
        }
    }
    Ok(())
}

async fn subscribe_all(socket: &mut Socket) -> Result<(), WatchError> {
    for request in [ClientMessage::SubscribeVehicles, ClientMessage::SubscribeAlerts] {
        socket
            .send(Message::Text(serde_json::to_string(&request)?))
            .await?;
    }
    Ok(())
}

fn vehicle_line(vehicle: &VehicleSnapshot) -> String {
    match (vehicle.latitude, vehicle.longitude) {
        (Some(lat), Some(lon)) => format!(
            "  - {}: {lat}, {lon} ({} km/h)",
            vehicle.registration_number, vehicle.speed_kmh
        ),
        _ => format!("  - {}: no fix yet", vehicle.registration_number),
    }
}

/// Human-readable form of one server frame.
pub fn render(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Connected(hello) => format!(
            "{} as {} ({})",
            hello.greeting, hello.identity.email, hello.identity.role
        ),
        ServerMessage::VehiclesCurrent(vehicles) => std::iter::once(format!(
            "current vehicles ({}):",
            vehicles.len()
        ))
        .chain(vehicles.iter().map(vehicle_line))
        .collect::<Vec<_>>()
        .join("\n"),
        ServerMessage::AlertsCurrent(alerts) => std::iter::once(format!(
            "active alerts ({}):",
            alerts.len()
        ))
        .chain(
            alerts
                .iter()
                .map(|a| format!("  - [{}] {}: {}", a.severity, a.title, a.message)),
        )
        .collect::<Vec<_>>()
        .join("\n"),
        ServerMessage::VehicleLocationUpdate(update) => format!(
            "vehicle {} at {}, {} ({} km/h, heading {})",
            update.vehicle_id, update.latitude, update.longitude, update.speed, update.heading
        ),
        ServerMessage::AccidentNew(notice) => format!(
            "ACCIDENT {} ({}) at {}, {} -> alert {}",
            notice.accident_id, notice.severity, notice.latitude, notice.longitude, notice.alert_id
        ),
        ServerMessage::Error(notice) => format!("gateway error: {}", notice.message),
    }
}
