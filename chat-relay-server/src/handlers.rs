use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chat_relay_agent::RelayError;
use chat_relay_core::config::ProviderErrorPolicy;
use chat_relay_core::session::SessionInfo;
use tracing::Instrument;

use crate::state::AppState;

/// Close code sent when the model provider fails under the `close` policy
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// GET /ws/:session_id - relay endpoint
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("relay_connection", session_id = %session_id);
        handle_socket(socket, state, session_id).instrument(span)
    })
}

/// Why a relay connection ended
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Close frame, end of stream or receive error from the client side
    ClientLeft,
    /// The `close` policy ended the connection after a provider failure
    ClosedOnProviderError,
    /// A reply could not be written
    SendFailed,
}

/// What goes back to the client for one finished turn
#[derive(Debug)]
enum TurnReply {
    Text(String),
    Close(CloseFrame<'static>),
}

async fn handle_socket(mut socket: WebSocket, state: AppState, session_id: String) {
    tracing::info!("Client connected");

    let end = loop {
        let message = match socket.recv().await {
            Some(Ok(message)) => message,
            Some(Err(error)) => {
                tracing::debug!("websocket receive error: {error}");
                break ConnectionEnd::ClientLeft;
            }
            None => break ConnectionEnd::ClientLeft,
        };

        match message {
            Message::Text(text) => {
                let result = state.relay.process_turn(&session_id, &text).await;
                if let Err(error) = &result {
                    tracing::error!("Turn failed: {}", error);
                }
                match turn_reply(state.error_policy, result) {
                    TurnReply::Text(reply) => {
                        if socket.send(Message::Text(reply)).await.is_err() {
                            break ConnectionEnd::SendFailed;
                        }
                    }
                    TurnReply::Close(frame) => {
                        let _ = socket.send(Message::Close(Some(frame))).await;
                        break ConnectionEnd::ClosedOnProviderError;
                    }
                }
            }
            Message::Close(_) => break ConnectionEnd::ClientLeft,
            Message::Ping(data) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break ConnectionEnd::SendFailed;
                }
            }
            Message::Binary(data) => {
                tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
            }
            Message::Pong(_) => {}
        }
    };

    match end {
        ConnectionEnd::ClientLeft => tracing::info!("Client disconnected"),
        ConnectionEnd::ClosedOnProviderError => {
            tracing::warn!("Closed connection after provider error")
        }
        ConnectionEnd::SendFailed => tracing::info!("Connection lost while sending"),
    }
}

/// Map a turn outcome to the frame the error policy calls for
fn turn_reply(policy: ProviderErrorPolicy, result: Result<String, RelayError>) -> TurnReply {
    match (result, policy) {
        (Ok(reply), _) => TurnReply::Text(reply),
        (Err(error), ProviderErrorPolicy::Reply) => TurnReply::Text(format!("[error] {error}")),
        (Err(_), ProviderErrorPolicy::Close) => TurnReply::Close(CloseFrame {
            code: CLOSE_INTERNAL_ERROR,
            reason: "model provider error".into(),
        }),
    }
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn list_sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions().list())
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions().get(&session_id) {
        Some(session) => Json(serde_json::json!({
            "id": session.id(),
            "messages": session.messages(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("session '{}' not found", session_id)
            })),
        )
            .into_response(),
    }
}
