//! WebSocket front end.
//!
//! One connection equals one subscriber. The attach path binds the socket to
//! a session named by the `session` query parameter, mints a user id, and
//! registers a bounded outbound channel with the session actor. A dedicated
//! writer task drains that channel to the wire so a slow peer never holds the
//! read loop or the session.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::http::AppState;
use crate::config::policy;
use crate::id;
use crate::protocol::ClientFrame;
use crate::session::{Origin, SessionHandle};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    session: Option<String>,
}

/// Upgrade handler for `GET /ws?session=<id>`.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, query.session, socket))
}

async fn handle_socket(state: Arc<AppState>, session_id: Option<String>, mut socket: WebSocket) {
    let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: Utf8Bytes::from_static("missing session query parameter"),
            })))
            .await;
        return;
    };

    let handle = match state.registry.get_or_create(&session_id).await {
        Ok(handle) => handle,
        Err(error) => {
            tracing::error!(session_id = %session_id, %error, "session unavailable for socket");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: Utf8Bytes::from_static("session unavailable"),
                })))
                .await;
            return;
        }
    };

    let user_id = id::user_id();
    let (frame_tx, mut frame_rx) = mpsc::channel::<Utf8Bytes>(policy::SUBSCRIBER_QUEUE_DEPTH);
    if handle.attach(user_id.clone(), frame_tx).await.is_err() {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: Utf8Bytes::from_static("session unavailable"),
            })))
            .await;
        return;
    }

    let (mut sink, mut stream) = socket.split();

    // Dedicated writer: the only task touching the sink.
    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(incoming) = stream.next().await {
        let message = match incoming {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(session_id = %session_id, user_id = %user_id, %error, "socket read error");
                break;
            }
        };

        match message {
            Message::Text(text) => dispatch_frame(&handle, &user_id, text.as_str()).await,
            Message::Close(_) => break,
            // Ping/pong is answered by the protocol layer; binary is not part
            // of the contract.
            _ => {}
        }
    }

    handle.detach(user_id.clone()).await;
    state.registry.schedule_eviction(session_id.clone());
    // Detach cancels pending outbound frames for this subscriber.
    writer.abort();
}

/// Decode one inbound frame and dispatch it into the session. Every failure
/// mode here drops the frame and keeps the connection open.
async fn dispatch_frame(handle: &SessionHandle, user_id: &str, raw: &str) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::debug!(user_id = %user_id, %error, "ignoring undecodable frame");
            return;
        }
    };

    let origin = Origin::Socket(user_id.to_string());
    let result = match frame {
        ClientFrame::Draw { element } => match validate::element(element) {
            Ok(element) => handle.create(element, origin).await.map(drop),
            Err(error) => {
                tracing::debug!(user_id = %user_id, %error, "dropping invalid draw element");
                return;
            }
        },
        ClientFrame::Erase { element_id } => handle.delete(element_id, origin).await,
        ClientFrame::Clear => handle.clear(origin).await,
        ClientFrame::Move { element_id, element } => match validate::element(element) {
            Ok(element) => handle.move_element(element_id, element, origin).await.map(drop),
            Err(error) => {
                tracing::debug!(user_id = %user_id, %error, "dropping invalid move element");
                return;
            }
        },
        ClientFrame::Reorder { element_id, position } => {
            handle.reorder(element_id, position, origin).await
        }
        ClientFrame::Cursor { x, y } => {
            handle.cursor(user_id.to_string(), x, y).await;
            Ok(())
        }
    };

    if let Err(error) = result {
        tracing::debug!(user_id = %user_id, %error, "socket mutation refused");
    }
}
