/// Real-time channel
///
/// ```text
/// GET /v1/realtime?token=<access token>
/// ```
///
/// Browsers cannot set headers on a WebSocket upgrade, so the access token
/// travels in the query string and is checked before upgrading. Once open,
/// the socket is bound to the token's user through
/// [`Presence::on_connect`](teamsync_shared::presence::Presence::on_connect)
/// and receives every message pushed to that user plus presence broadcasts:
///
/// ```json
/// { "event": "newNotification", "data": { "id": "...", "type": "task_assigned", ... } }
/// { "event": "userStatusChange", "data": { "userId": "...", "isOnline": true } }
/// ```
///
/// Client frames are ignored apart from pong and close.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use std::time::Duration;
use teamsync_shared::{auth::middleware::authenticate_token, models::UserId};
use tokio::{sync::mpsc, time::Instant};

/// How often to send WebSocket Ping frames
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong before considering the connection dead
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub token: String,
}

/// Authenticates and upgrades
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired token
pub async fn realtime(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> ApiResult<Response> {
    let auth = authenticate_token(&query.token, state.jwt_secret())?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let (connection, outbound) = state.rooms.attach();

    if let Err(e) = state.core.presence.on_connect(connection, user_id).await {
        tracing::warn!(user_id = %user_id, error = %e, "Rejecting real-time session");
        state.rooms.detach(connection);
        return;
    }

    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, outbound).await;

    if let Err(e) = state.core.presence.on_disconnect(connection).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to release session");
    }
    state.rooms.detach(connection);
}

/// Forwards pushed messages and keeps the socket alive
///
/// Exits when the client closes, a send fails, or no Pong arrives within
/// [`PONG_TIMEOUT`] after a Ping.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick completes immediately
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("Pong timeout, closing real-time session");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            pushed = outbound.recv() => {
                match pushed {
                    Some(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
