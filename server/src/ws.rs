use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, oneshot};

use pitchside_shared::protocol::{ClientMsg, CurrencyUpdateMsg, BetErrorMsg, PongMsg, ServerMsg};

use crate::room_loop::{RoomBroadcast, RoomCommand};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub room_tx: tokio::sync::mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<RoomBroadcast>,
    pub next_session: Arc<AtomicU64>,
    /// Sockets that never announce themselves are dropped after this long
    pub join_timeout: Duration,
}

/// Liveness endpoint; the client probes this before opening the socket.
pub async fn health_handler() -> &'static str {
    "ok"
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Opaque per-connection session id; discarded on disconnect.
    let session_id = format!("s-{}", app_state.next_session.fetch_add(1, Ordering::Relaxed));

    // The client announces itself with a join message before anything else.
    let joined = tokio::time::timeout(app_state.join_timeout, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Join { room_id }) => break Some(room_id),
                    Ok(_) => continue, // Not joined yet; ignore
                    Err(_) => continue,
                },
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break None,
            }
        }
    })
    .await;
    let room_id = match joined {
        Ok(Some(room_id)) => room_id,
        Ok(None) => return,
        Err(_) => {
            tracing::debug!(session = %session_id, "dropped silent socket before join");
            return;
        }
    };
    tracing::debug!(session = %session_id, room = %room_id, "join requested");

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .room_tx
        .send(RoomCommand::Join {
            session_id: session_id.clone(),
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("failed to send Join command");
        return;
    }

    let welcome = match resp_rx.await {
        Ok(welcome) => welcome,
        Err(_) => {
            tracing::error!("failed to receive welcome");
            return;
        }
    };

    tracing::info!(session = %session_id, "session connected");

    if let Ok(json) = serde_json::to_string(&ServerMsg::Welcome(welcome)) {
        if sink.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    // Subscribe to broadcasts
    let mut broadcast_rx = app_state.broadcast_tx.subscribe();

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(client_msg) = serde_json::from_str::<ClientMsg>(&text) {
                            match client_msg {
                                ClientMsg::PlaceBet { team, amount } => {
                                    let _ = app_state.room_tx.send(RoomCommand::PlaceBet {
                                        session_id: session_id.clone(),
                                        amount,
                                        team,
                                    }).await;
                                }
                                ClientMsg::Ping { timestamp } => {
                                    // Echoed directly; no room round-trip.
                                    let pong = ServerMsg::Pong(PongMsg { timestamp });
                                    if let Ok(json) = serde_json::to_string(&pong) {
                                        if sink.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                ClientMsg::Join { .. } => {} // Already joined
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(broadcast) => {
                        let json = match &broadcast {
                            RoomBroadcast::MatchUpdate(snapshot) => {
                                serde_json::to_string(&ServerMsg::MatchUpdate(snapshot.clone()))
                            }
                            RoomBroadcast::CurrencyUpdate { session_id: target, balance } => {
                                if *target != session_id {
                                    continue; // Not for this client
                                }
                                serde_json::to_string(&ServerMsg::CurrencyUpdate(
                                    CurrencyUpdateMsg { balance: *balance },
                                ))
                            }
                            RoomBroadcast::BetError { session_id: target, message } => {
                                if *target != session_id {
                                    continue; // Rejections go to the offender only
                                }
                                serde_json::to_string(&ServerMsg::BetError(
                                    BetErrorMsg { message: message.clone() },
                                ))
                            }
                        };

                        if let Ok(json) = json {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(session = %session_id, "lagged by {} messages", n);
                        // Continue - every snapshot is a full state push, dropping is fine
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = app_state
        .room_tx
        .send(RoomCommand::Leave {
            session_id: session_id.clone(),
        })
        .await;
    tracing::info!(session = %session_id, "session disconnected");
}
