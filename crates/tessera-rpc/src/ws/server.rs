use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::events::{EventBroadcaster, NodeEvent};

/// Which event kinds a client receives. An empty set means all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kinds: BTreeSet<String>,
}

impl EventFilter {
    /// Parse a comma separated list such as `BlockCommitted,BatchReceived`
    pub fn parse(list: &str) -> Self {
        EventFilter {
            kinds: list
                .split(',')
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn matches(&self, event: &NodeEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(event.kind())
    }
}

/// Query string of the upgrade request, e.g. `/ws?events=BlockCommitted`
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub events: Option<String>,
}

/// Message a connected client sends to replace its filter
#[derive(Debug, Deserialize)]
struct SubscribeMessage {
    subscribe: Vec<String>,
}

pub struct WsState {
    pub broadcaster: Arc<EventBroadcaster>,
}

/// Create WebSocket router
pub fn create_ws_router(broadcaster: Arc<EventBroadcaster>) -> Router {
    let state = Arc::new(WsState { broadcaster });

    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<WsState>>,
) -> Response {
    let filter = query
        .events
        .as_deref()
        .map(EventFilter::parse)
        .unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.broadcaster.subscribe();
    let (filter_tx, filter_rx) = watch::channel(filter);

    info!("New WebSocket connection");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if !filter_rx.borrow().matches(&event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize {} event: {}", event.kind(), e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                debug!("WebSocket send failed: {}", e);
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<SubscribeMessage>(&text) {
                    Ok(message) => {
                        let filter = EventFilter::parse(&message.subscribe.join(","));
                        debug!("WebSocket filter changed to {:?}", filter);
                        filter_tx.send_replace(filter);
                    }
                    Err(e) => debug!("Ignoring WebSocket message: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    info!("WebSocket connection closed");
}
