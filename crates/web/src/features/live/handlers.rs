use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use engine::RaceService;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::state::AppState;

/// Upgrades to a live session: periodic dashboard snapshots go out, text
/// frames from the client are relayed to every other session.
pub async fn live_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_session(socket, state.service))
}

async fn serve_session(socket: WebSocket, service: Arc<RaceService>) {
    let sessions = service.hub().sessions();
    let (session_id, mut queue) = sessions.open();
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = queue.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let delivered = sessions.broadcast_except(session_id, &text);
                    debug!(session_id, delivered, "Relayed session message");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id, error = %e, "Session read failed");
                    break;
                }
            },
        }
    }

    sessions.close(session_id);
    writer.abort();
}
