//! Per-feed websocket channel.
//!
//! Clients open `/ws/{feed}` with the same credential as the REST API. A
//! rejected open is still upgraded, then closed straight away with code
//! `4000 + http status` so browsers can tell "wrong PIN" from "no such feed".
//! Once accepted, the server pushes every feed event as JSON and answers
//! the text frame `feed` with a full snapshot. A peer that stops reading is
//! dropped once a write stalls for [`SEND_TIMEOUT`].

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use common::prelude::{Feed, FeedError, NotificationHub};

use crate::http_server::api::status_for;
use crate::http_server::credentials::Credential;
use crate::ServiceState;

pub const CLOSE_CODE_OFFSET: u16 = 4000;
pub const SNAPSHOT_REQUEST: &str = "feed";
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub fn close_code_for(err: &FeedError) -> u16 {
    CLOSE_CODE_OFFSET + status_for(err.kind()).as_u16()
}

/// Clients may send the request with a trailing newline.
fn is_snapshot_request(text: &str) -> bool {
    text.trim() == SNAPSHOT_REQUEST
}

/// Write one frame, giving up on peers that stall past [`SEND_TIMEOUT`].
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, message: Message) -> bool {
    match tokio::time::timeout(SEND_TIMEOUT, sender.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "websocket write failed, dropping connection");
            false
        }
        Err(_) => {
            tracing::warn!("websocket write timed out, dropping connection");
            false
        }
    }
}

#[tracing::instrument(skip(state, ws))]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(feed_name): Path<String>,
    credential: Credential,
    ws: WebSocketUpgrade,
) -> Response {
    match state
        .feeds()
        .resolve_authorized(&feed_name, credential.as_str())
        .await
    {
        Ok(feed) => {
            let hub = state.hub().clone();
            ws.on_upgrade(move |socket| serve(socket, feed, hub))
        }
        Err(err) => {
            let status = status_for(err.kind());
            let code = CLOSE_CODE_OFFSET + status.as_u16();
            tracing::debug!(feed = %feed_name, error = %err, code, "refusing websocket");
            let reason = status.canonical_reason().unwrap_or("error");
            ws.on_upgrade(move |socket| reject(socket, code, reason))
        }
    }
}

async fn reject(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "unable to send close frame");
    }
}

async fn serve(socket: WebSocket, feed: Feed, hub: NotificationHub) {
    let (mut sender, mut receiver) = socket.split();
    // dropping the listener unregisters this connection
    let mut listener = hub.listen(feed.name());
    tracing::debug!(feed = %feed.name(), connection = ?listener.id(), "websocket connected");

    loop {
        tokio::select! {
            event = listener.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "unable to encode feed event");
                        continue;
                    }
                };
                if !send_frame(&mut sender, Message::Text(text)).await {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if is_snapshot_request(&text) => {
                        let reply = match feed.public().await {
                            Ok(snapshot) => serde_json::to_string(&snapshot).map(Message::Text).ok(),
                            Err(err) => {
                                tracing::error!(feed = %feed.name(), error = %err, "unable to build snapshot");
                                let frame = CloseFrame {
                                    code: close_code_for(&err),
                                    reason: "unable to read feed".into(),
                                };
                                send_frame(&mut sender, Message::Close(Some(frame))).await;
                                break;
                            }
                        };
                        if let Some(reply) = reply {
                            if !send_frame(&mut sender, reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(feed = %feed.name(), message = %text, "ignoring websocket message");
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(feed = %feed.name(), connection = ?listener.id(), "websocket closed");
}
