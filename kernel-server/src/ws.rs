//! The `/kernel` WS upgrade handler: one multiplexed channel per
//! connection, framed per [`crate::wire`], grounded on the teacher's
//! `websocket::ws_handler`/`handle_socket` split (a single connection
//! future selecting over inbound frames and outbound bus events, torn
//! down together on close or socket error).

use crate::dispatcher::{self, is_pre_auth};
use crate::state::AppState;
use crate::wire::{broadcast_frame, response_error, response_ok, KernelCommand};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use kernel_auth::User;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.get("token").cloned()))
}

async fn handle_socket(socket: WebSocket, state: AppState, query_token: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    // A `?token=` query param authenticates the connection up front; absent
    // that, the first frame must be `auth.login`/`auth.register`.
    let mut current_user: Option<User> = match query_token {
        Some(token) => state.auth.validate_token(&token).await.unwrap_or(None),
        None => None,
    };

    let mut events = state.events_tx.subscribe();

    loop {
        tokio::select! {
            biased;

            incoming = stream.next() => {
                let Some(frame) = incoming else { break };
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let command: KernelCommand = match serde_json::from_str(&text) {
                    Ok(c) => c,
                    Err(e) => {
                        let err = kernel_core::KernelError::invalid_argument(format!("malformed frame: {e}"));
                        if send_json(&mut sink, &response_error("unknown".to_string(), kernel_core::WireError::from(&err))).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if handle_command(&state, &mut current_user, &command, &mut sink).await.is_err() {
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(envelope) => {
                        let frame = broadcast_frame(envelope.event_id, &envelope.event);
                        if send_json(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "ws connection lagged behind the event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Handles one decoded frame: either completes the pre-auth `auth.login`/
/// `auth.register` handshake or routes to [`dispatcher::dispatch`]. Returns
/// `Err` only when the underlying socket write failed, signalling the
/// caller to tear the connection down.
async fn handle_command(
    state: &AppState,
    current_user: &mut Option<User>,
    command: &KernelCommand,
    sink: &mut SplitSink<WebSocket, Message>,
) -> Result<(), ()> {
    if is_pre_auth(&command.command_type) {
        let result = run_auth_handshake(state, command).await;
        return match result {
            Ok((token, user)) => {
                let data = json!({ "token": token, "user": user });
                let reply = response_ok(command.id.clone(), data);
                *current_user = Some(user);
                send_json(sink, &reply).await
            }
            Err(e) => send_json(sink, &response_error(command.id.clone(), kernel_core::WireError::from(&e))).await,
        };
    }

    let Some(user) = current_user.clone() else {
        let err = kernel_core::KernelError::unauthorized("no authenticated session on this connection");
        return send_json(sink, &response_error(command.id.clone(), kernel_core::WireError::from(&err))).await;
    };

    match dispatcher::dispatch(state, &user, &command.command_type, &command.payload).await {
        Ok(data) => send_json(sink, &response_ok(command.id.clone(), data)).await,
        Err(e) => send_json(sink, &response_error(command.id.clone(), kernel_core::WireError::from(&e))).await,
    }
}

async fn run_auth_handshake(state: &AppState, command: &KernelCommand) -> kernel_core::Result<(String, User)> {
    match command.command_type.as_str() {
        "auth.login" => {
            let username = str_field(&command.payload, "username")?;
            let password = str_field(&command.payload, "password")?;
            state.auth.login(&username, &password).await
        }
        "auth.register" => {
            let username = str_field(&command.payload, "username")?;
            let password = str_field(&command.payload, "password")?;
            let display_name = command
                .payload
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or(&username)
                .to_string();
            let user = state
                .auth
                .create_user(&username, &password, &display_name, kernel_core::SystemRole::User)
                .await?;
            let (token, user) = state.auth.login(&user.username, &password).await?;
            Ok((token, user))
        }
        other => unreachable!("is_pre_auth admitted non-auth command {other}"),
    }
}

fn str_field(payload: &Value, name: &str) -> kernel_core::Result<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| kernel_core::KernelError::invalid_argument(format!("missing field '{name}'")))
}

async fn send_json<T: Serialize>(sink: &mut SplitSink<WebSocket, Message>, frame: &T) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}
