//! WebSocket handler for live subtree subscriptions

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{models::*, websocket::normalize, AppState};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn error_message(code: &str, message: &str) -> WsServerMessage {
    WsServerMessage::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<WsServerMessage>();

    let connection_id = format!("ws-{}", NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed));
    let mut email: Option<String> = None;

    // Task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<WsClientMessage>(&text) {
                Ok(WsClientMessage::Authenticate { .. }) if email.is_some() => {
                    // Registering again would drop this socket's subscriptions.
                    let _ = tx.send(error_message("ALREADY_AUTHENTICATED", "Already authenticated"));
                }

                Ok(WsClientMessage::Authenticate { token }) => {
                    match state.db.storage().validate_session(&token).await {
                        Ok(Some(session)) => {
                            state
                                .db
                                .subscriptions()
                                .register(&connection_id, &session.email, tx.clone());
                            let _ = tx.send(WsServerMessage::Authenticated {
                                email: session.email.clone(),
                            });
                            tracing::info!(
                                "WebSocket authenticated: connection={}, email={}",
                                connection_id,
                                session.email
                            );
                            email = Some(session.email);
                        }
                        _ => {
                            let _ = tx.send(error_message("AUTH_FAILED", "Invalid or expired token"));
                        }
                    }
                }

                Ok(WsClientMessage::Subscribe { path }) => {
                    if email.is_none() {
                        let _ = tx.send(error_message("UNAUTHORIZED", "Authenticate first"));
                        continue;
                    }

                    // Replay the current value so the client starts in sync.
                    if let Err(e) = state.db.attach(&connection_id, &path).await {
                        tracing::error!("Failed to read {} for subscriber: {}", path, e);
                        let _ = tx.send(error_message("READ_FAILED", "Could not read path"));
                    }
                }

                Ok(WsClientMessage::Unsubscribe { path }) => {
                    let path = normalize(&path);
                    state.db.subscriptions().unsubscribe(&connection_id, &path);
                    let _ = tx.send(WsServerMessage::Unsubscribed { path });
                }

                Ok(WsClientMessage::Ping) => {
                    let _ = tx.send(WsServerMessage::Pong);
                }

                Err(e) => {
                    tracing::warn!("Failed to parse WebSocket message: {}", e);
                    let _ = tx.send(error_message(
                        "PARSE_ERROR",
                        &format!("Invalid message format: {}", e),
                    ));
                }
            },
            Ok(Message::Close(_)) => {
                break;
            }
            Ok(_) => {
                // Binary frames are not part of the protocol; pings are
                // answered by the library.
            }
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    // Cleanup
    if let Some(email) = email {
        state.db.subscriptions().unregister(&connection_id);
        tracing::info!("WebSocket closed: connection={}, email={}", connection_id, email);
    }

    // Abort send task
    send_task.abort();
}
