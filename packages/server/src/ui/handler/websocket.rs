//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, UserId},
    infrastructure::dto::websocket::{InvocationMessage, ServerMessage},
    ui::state::AppState,
    usecase::{HubCallerContext, MultiplayerHub},
};

/// Query parameters for WebSocket connection
///
/// `user_id` stands in for an authenticated identity.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: i64,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let ctx = HubCallerContext::new(UserId::new(query.user_id), ConnectionId::generate());
    tracing::info!(
        "User {} is connecting (connection '{}')",
        ctx.user_id,
        ctx.connection_id
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, ctx))
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// Both hub events and invocation completions go through this channel, so a client observes
/// the events caused by an invocation before its completion.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Parses an invocation envelope, runs it and encodes the completion
async fn handle_invocation(hub: &MultiplayerHub, ctx: &HubCallerContext, text: &str) -> Option<String> {
    let completion = match serde_json::from_str::<InvocationMessage>(text) {
        Ok(invocation) => {
            let result = hub.invoke(ctx, invocation.request).await;
            if let Err(e) = &result {
                tracing::debug!(
                    "Invocation {} from user {} failed: {}",
                    invocation.invocation_id,
                    ctx.user_id,
                    e
                );
            }
            ServerMessage::completion(invocation.invocation_id, result)
        }
        Err(e) => {
            tracing::warn!("Failed to parse message from user {}: {}", ctx.user_id, e);
            ServerMessage::invalid_request(e.to_string())
        }
    };

    match serde_json::to_string(&completion) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize completion: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, ctx: HubCallerContext) {
    let (sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive messages
    let (tx, rx) = mpsc::unbounded_channel();

    if let Err(e) = state.hub.on_connected(&ctx, tx.clone()).await {
        tracing::warn!("Failed to set up connection for user {}: {}", ctx.user_id, e);
        return;
    }

    let hub = state.hub.clone();
    let recv_ctx = ctx.clone();

    // Spawn a task to receive invocations from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    if let Some(reply) = handle_invocation(&hub, &recv_ctx, text.as_str()).await
                        && tx.send(reply).is_err()
                    {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("User {} requested close", recv_ctx.user_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to forward hub events and completions to this client
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    if let Err(e) = state.hub.on_disconnected(&ctx).await {
        tracing::warn!("Failed to clean up after user {} disconnected: {}", ctx.user_id, e);
    }
}
