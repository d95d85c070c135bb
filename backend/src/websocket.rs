use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use sentinel_shared::PushMessage;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::notifications::PushChannel;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct WsConnection {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub roles: Vec<String>,
    pub sender: broadcast::Sender<PushMessage>,
}

#[derive(Default)]
pub struct WsManager {
    connections: Arc<RwLock<HashMap<Uuid, WsConnection>>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_connection(&self, conn: WsConnection) {
        let mut connections = self.connections.write().await;
        connections.insert(conn.id, conn);
    }

    pub async fn remove_connection(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        connections.remove(id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl PushChannel for WsManager {
    async fn broadcast_to_role(&self, role: &str, event: &str, payload: serde_json::Value) -> usize {
        let message = PushMessage {
            event_type: event.to_string(),
            role: Some(role.to_string()),
            payload,
            timestamp: chrono::Utc::now(),
        };

        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.roles.iter().any(|r| r == role))
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub employee_id: Uuid,
}

/// Push subscription. Callers are authenticated upstream; the socket only
/// needs to know whose role memberships to subscribe to.
pub async fn websocket_handler(
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.employee_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, employee_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let roles = match state.directory.roles_of(employee_id).await {
        Ok(roles) if !roles.is_empty() => roles,
        Ok(_) => {
            let _ = sender
                .send(Message::Text(
                    serde_json::json!({
                        "event_type": "error",
                        "payload": {"message": "No active roles for employee"}
                    })
                    .to_string(),
                ))
                .await;
            return;
        }
        Err(e) => {
            tracing::warn!("Role lookup failed for {}: {}", employee_id, e);
            return;
        }
    };

    let (tx, mut rx) = broadcast::channel(100);

    state
        .ws_manager
        .add_connection(WsConnection {
            id: connection_id,
            employee_id,
            roles: roles.clone(),
            sender: tx,
        })
        .await;

    let _ = sender
        .send(Message::Text(
            serde_json::json!({
                "event_type": "connected",
                "payload": {
                    "connection_id": connection_id,
                    "employee_id": employee_id,
                    "roles": roles
                }
            })
            .to_string(),
        ))
        .await;

    let mut send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.ws_manager.remove_connection(&connection_id).await;
    tracing::debug!("Push connection {} closed", connection_id);
}
