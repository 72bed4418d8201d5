use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;
use vigil_notify::channels::websocket::SessionHub;

/// Upgrades to a websocket that receives the user's alert pushes until it
/// closes.
pub async fn connect(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| session(socket, user_id, state.hub))
}

async fn session(mut socket: WebSocket, user_id: String, hub: Arc<SessionHub>) {
    let (session_id, mut outgoing) = hub.connect(&user_id);
    tracing::info!(user_id = %user_id, session_id, "Websocket session opened");

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Client frames carry nothing; pings are answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }

    hub.disconnect(&user_id, session_id);
    tracing::info!(user_id = %user_id, session_id, "Websocket session closed");
}
