// The WebSocket streaming transport (§4.9/§6): a per-task fan-out channel
// fed by `orchestrator::OrchestratorCallbacks`/`workflow_engine` events and
// drained by every client subscribed to that task. Grounded on the
// `namastexlabs-forge-core` tasks route's WebSocket-upgrade + broadcast
// pattern, simplified to this spec's flat event set (no cache-refresh loop —
// this transport has no filtered secondary query to keep warm).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use contracts::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use orchestrator::OrchestratorCallbacks;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::auth::verify_token;
use crate::context::ServerContext;

/// Per-client outbound channel plus the set of task ids that client is
/// currently subscribed to, and vice versa for fan-out lookup.
#[derive(Default)]
pub struct StreamHub {
    inner: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    clients: HashMap<Uuid, UnboundedSender<ServerMessage>>,
    subscriptions: HashMap<Uuid, HashSet<Uuid>>, // task_id -> client_ids
    active_task: HashMap<Uuid, Uuid>,            // client_id -> task_id it started
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (Uuid, UnboundedReceiver<ServerMessage>) {
        let client_id = Uuid::now_v7();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().clients.insert(client_id, tx);
        (client_id, rx)
    }

    /// Removes a disconnected client's channel and subscriptions, returning
    /// the task id it had active (if any) so the caller can cancel it —
    /// the `SubscribedClient` lifecycle (§3) requires `activeTaskId` to be
    /// cancelled cooperatively on disconnect.
    fn remove(&self, client_id: Uuid) -> Option<Uuid> {
        let mut state = self.inner.lock().unwrap();
        state.clients.remove(&client_id);
        for subscribers in state.subscriptions.values_mut() {
            subscribers.remove(&client_id);
        }
        state.active_task.remove(&client_id)
    }

    /// Records the task id a client's run started, so a later disconnect can
    /// cancel it.
    pub fn set_active_task(&self, client_id: Uuid, task_id: Uuid) {
        self.inner.lock().unwrap().active_task.insert(client_id, task_id);
    }

    /// Clears the active task once it finishes, but only if it is still the
    /// one recorded (a client may have started a newer run since).
    pub fn clear_active_task(&self, client_id: Uuid, task_id: Uuid) {
        let mut state = self.inner.lock().unwrap();
        if state.active_task.get(&client_id) == Some(&task_id) {
            state.active_task.remove(&client_id);
        }
    }

    pub fn subscribe(&self, client_id: Uuid, task_id: Uuid) {
        self.inner.lock().unwrap().subscriptions.entry(task_id).or_default().insert(client_id);
    }

    pub fn unsubscribe(&self, client_id: Uuid, task_id: Uuid) {
        if let Some(subscribers) = self.inner.lock().unwrap().subscriptions.get_mut(&task_id) {
            subscribers.remove(&client_id);
        }
    }

    fn send_to(&self, client_id: Uuid, message: ServerMessage) {
        let state = self.inner.lock().unwrap();
        if let Some(tx) = state.clients.get(&client_id) {
            let _ = tx.send(message);
        }
    }

    /// Fans `message` out to every client subscribed to `task_id`, in the
    /// order this method is called — the per-subscriber ordering guarantee
    /// in §5 falls out of each client having its own unbounded mpsc queue
    /// fed only by sequential `publish` calls.
    pub fn publish(&self, task_id: Uuid, message: ServerMessage) {
        let state = self.inner.lock().unwrap();
        let Some(subscribers) = state.subscriptions.get(&task_id) else { return };
        for client_id in subscribers {
            if let Some(tx) = state.clients.get(client_id) {
                let _ = tx.send(message.clone());
            }
        }
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<ServerContext>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let user_id = query
        .token
        .as_deref()
        .and_then(|token| verify_token(&ctx.jwt_secret, token).ok().map(|u| u.user_id));

    ws.on_upgrade(move |socket| handle_socket(socket, ctx, user_id))
}

async fn handle_socket(socket: WebSocket, ctx: ServerContext, user_id: Option<Uuid>) {
    let (client_id, mut rx) = ctx.hub.register();
    let (mut sink, mut stream) = socket.split();

    let connected = ServerMessage::Connected { client_id, authenticated: user_id.is_some() };
    if sink.send(to_ws_message(&connected)).await.is_err() {
        ctx.hub.remove(client_id);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(to_ws_message(&message)).await.is_err() {
                break;
            }
        }
    });

    let recv_ctx = ctx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = stream.next().await {
            let Ok(client_message) = serde_json::from_str::<ClientMessage>(&text) else { continue };
            handle_client_message(client_message, &recv_ctx, client_id, user_id).await;
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Disconnect: drop this client's channel/subscriptions and cooperatively
    // cancel whatever task it had running, per the `SubscribedClient`
    // lifecycle (§3) and the streaming transport's disconnect rule (§4.9).
    if let Some(task_id) = ctx.hub.remove(client_id) {
        ctx.orchestrator.cancel_task(task_id);
    }
}

async fn handle_client_message(message: ClientMessage, ctx: &ServerContext, client_id: Uuid, user_id: Option<Uuid>) {
    match message {
        ClientMessage::Ping => ctx.hub.send_to(client_id, ServerMessage::Pong),
        ClientMessage::Subscribe { task_id } => ctx.hub.subscribe(client_id, task_id),
        ClientMessage::Unsubscribe { task_id } => ctx.hub.unsubscribe(client_id, task_id),
        ClientMessage::Cancel { task_id } => {
            ctx.orchestrator.cancel_task(task_id);
        }
        ClientMessage::Task { message } => {
            let ctx = ctx.clone();
            let user_id = user_id.unwrap_or(Uuid::nil());
            tokio::spawn(async move {
                let callbacks = StreamCallbacks { hub: ctx.hub.clone(), auto_subscribe: client_id };
                ctx.orchestrator.handle_message(&message, user_id, None, &callbacks).await;
            });
        }
    }
}

fn to_ws_message(message: &ServerMessage) -> Message {
    Message::Text(serde_json::to_string(message).unwrap_or_default())
}

/// Bridges `OrchestratorCallbacks` events onto the hub, auto-subscribing the
/// connection that initiated the run so it observes its own task without a
/// separate `subscribe` round trip.
pub struct StreamCallbacks {
    pub hub: std::sync::Arc<StreamHub>,
    pub auto_subscribe: Uuid,
}

#[async_trait]
impl OrchestratorCallbacks for StreamCallbacks {
    async fn on_task_started(&self, task_id: Uuid) {
        self.hub.subscribe(self.auto_subscribe, task_id);
        self.hub.set_active_task(self.auto_subscribe, task_id);
        self.hub.publish(task_id, ServerMessage::TaskStarted { task_id });
    }

    async fn on_log(&self, task_id: Uuid, level: &str, message: &str) {
        self.hub.publish(task_id, ServerMessage::Log { task_id, level: level.to_string(), message: message.to_string() });
    }

    async fn on_tool_call(&self, task_id: Uuid, tool_name: &str, input: &Value) {
        self.hub.publish(
            task_id,
            ServerMessage::ToolCall { task_id, tool_name: tool_name.to_string(), input: input.clone() },
        );
    }

    async fn on_progress(&self, task_id: Uuid, progress: f32, step_id: Option<&str>) {
        self.hub.publish(
            task_id,
            ServerMessage::Progress { task_id, progress, step_id: step_id.map(str::to_string) },
        );
    }

    async fn on_task_completed(&self, task_id: Uuid, summary: &str) {
        self.hub.clear_active_task(self.auto_subscribe, task_id);
        self.hub.publish(task_id, ServerMessage::TaskCompleted { task_id, summary: summary.to_string() });
    }

    async fn on_task_error(&self, task_id: Uuid, error: &str) {
        self.hub.clear_active_task(self.auto_subscribe, task_id);
        self.hub.publish(task_id, ServerMessage::TaskError { task_id, error: error.to_string() });
    }

    async fn on_cancelled(&self, task_id: Uuid) {
        self.hub.clear_active_task(self.auto_subscribe, task_id);
        self.hub.publish(task_id, ServerMessage::Cancelled { task_id });
    }
}
