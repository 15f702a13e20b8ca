//! WebSocket streaming of exploration snapshots.
use crate::api::error::ApiError;
use crate::state::{AppState, SessionEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use std::sync::Arc;

/// Handler for `/v1/explorations/:id/stream`.
pub async fn exploration_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if state.session_view(&id).is_none() {
        return ApiError::SessionNotFound(id).into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, id))
        .into_response()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, session_id: String) {
    // Subscribe before reading the current view so no frame falls in between.
    let mut rx = state.tx.subscribe();

    let Some(view) = state.session_view(&session_id) else {
        return;
    };
    let current = SessionEvent::Snapshot {
        session_id: session_id.clone(),
        snapshot: view.snapshot,
    };
    if socket.send(Message::Text(current.to_json().to_string())).await.is_err() {
        return;
    }
    if let Some(report) = view.report {
        let done = SessionEvent::Report {
            session_id: session_id.clone(),
            report,
        };
        let _ = socket.send(Message::Text(done.to_json().to_string())).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(msg) => {
                        if msg.session_id != session_id {
                            continue;
                        }
                        let frame = Message::Text(msg.payload.as_ref().to_owned());
                        if socket.send(frame).await.is_err() {
                            break;
                        }
                        if msg.is_final {
                            let _ = socket.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(session = %session_id, skipped, "stream lagged");
                        continue;
                    }
                    Err(_) => break,
                }
            }
        }
    }
}
