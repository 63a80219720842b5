//! Realtime change feed over the Phoenix channel protocol (JSON v1).
//!
//! One websocket is shared by every subscription. A background task owns
//! the socket and talks to `RealtimeClient` through a command channel:
//!
//! ```text
//!   open()  ── Join ──►  ┌──────────────┐ ── phx_join ──►
//!   close() ── Leave ──► │ connection   │ ── phx_leave ─►   websocket
//!                        │ task         │ ── heartbeat ─►
//!   FeedSink ◄─ events ─ └──────────────┘ ◄─ postgres_changes ─
//! ```
//!
//! Each subscription joins its own topic, so events are routed to exactly
//! one sink and leaving one subscription never affects another.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::backend::{
    BackendError, ChangeEvent, ChangeFeed, FeedFilter, FeedSink, Message, SubscriptionHandle,
};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const PHOENIX_TOPIC: &str = "phoenix";

/// One Phoenix channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference: None,
        }
    }
}

/// Builds the websocket URL for a project base URL
/// (`https://x.supabase.co` → `wss://x.supabase.co/realtime/v1/websocket?...`).
pub fn socket_url(base_url: &str, anon_key: &str) -> Result<Url, BackendError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| BackendError::Config(format!("invalid backend URL {}: {}", base_url, e)))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(BackendError::Config(format!(
                "unsupported URL scheme: {}",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| BackendError::Config(format!("cannot use {} for {}", scheme, base_url)))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Join payload subscribing to every change on the filtered rows.
pub fn join_payload(filter: &FeedFilter, access_token: Option<&str>) -> Value {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [{
                "event": "*",
                "schema": "public",
                "table": filter.table,
                "filter": filter.expression(),
            }]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    payload
}

/// Decodes the payload of a `postgres_changes` event.
pub fn decode_change(payload: &Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let record = |key: &str| -> Option<Message> {
        match serde_json::from_value(data.get(key)?.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Undecodable {} in change event: {}", key, e);
                None
            }
        }
    };
    match data.get("type")?.as_str()? {
        "INSERT" => record("record").map(ChangeEvent::Insert),
        "UPDATE" => record("record").map(ChangeEvent::Update),
        "DELETE" => {
            let id = data.get("old_record")?.get("id")?.as_str()?;
            id.parse().ok().map(|id| ChangeEvent::Delete { id })
        }
        other => {
            debug!("Ignoring change type {}", other);
            None
        }
    }
}

// ============================================================================
// Connection task
// ============================================================================

enum Command {
    Join {
        topic: String,
        payload: Value,
        sink: FeedSink,
        ack: oneshot::Sender<Result<(), BackendError>>,
    },
    Leave {
        topic: String,
        ack: oneshot::Sender<()>,
    },
    Token(String),
}

/// Channel bookkeeping for one socket, independent of the socket itself.
#[derive(Default)]
struct Router {
    next_ref: u64,
    /// Outstanding joins by message ref.
    pending: HashMap<String, (String, oneshot::Sender<Result<(), BackendError>>)>,
    /// Sinks by topic.
    routes: HashMap<String, FeedSink>,
}

impl Router {
    fn stamp(&mut self, mut frame: Frame) -> Frame {
        self.next_ref += 1;
        frame.reference = Some(self.next_ref.to_string());
        frame
    }

    fn join(
        &mut self,
        topic: String,
        payload: Value,
        sink: FeedSink,
        ack: oneshot::Sender<Result<(), BackendError>>,
    ) -> Frame {
        let frame = self.stamp(Frame::new(topic.clone(), "phx_join", payload));
        if let Some(reference) = frame.reference.clone() {
            self.pending.insert(reference, (topic.clone(), ack));
        }
        self.routes.insert(topic, sink);
        frame
    }

    fn leave(&mut self, topic: &str) -> Option<Frame> {
        self.pending.retain(|_, (pending_topic, _)| pending_topic != topic);
        self.routes.remove(topic)?;
        Some(self.stamp(Frame::new(topic, "phx_leave", json!({}))))
    }

    fn heartbeat(&mut self) -> Frame {
        self.stamp(Frame::new(PHOENIX_TOPIC, "heartbeat", json!({})))
    }

    fn refresh_token(&mut self, token: &str) -> Vec<Frame> {
        let topics: Vec<String> = self.routes.keys().cloned().collect();
        topics
            .into_iter()
            .map(|topic| {
                self.stamp(Frame::new(
                    topic,
                    "access_token",
                    json!({ "access_token": token }),
                ))
            })
            .collect()
    }

    fn handle(&mut self, frame: Frame) {
        match frame.event.as_str() {
            "phx_reply" => self.handle_reply(frame),
            "postgres_changes" => {
                let Some(sink) = self.routes.get(&frame.topic) else {
                    debug!("Change on unknown topic {}", frame.topic);
                    return;
                };
                if let Some(event) = decode_change(&frame.payload)
                    && sink.send(event).is_err()
                {
                    debug!("Sink for {} dropped", frame.topic);
                    self.routes.remove(&frame.topic);
                }
            }
            "phx_error" | "phx_close" => {
                warn!("Channel {} closed by server ({})", frame.topic, frame.event);
                self.routes.remove(&frame.topic);
            }
            other => debug!("Ignoring {} on {}", other, frame.topic),
        }
    }

    fn handle_reply(&mut self, frame: Frame) {
        let Some(reference) = frame.reference.as_ref() else {
            return;
        };
        let Some((topic, ack)) = self.pending.remove(reference) else {
            return;
        };
        let status = frame.payload.get("status").and_then(Value::as_str);
        if status == Some("ok") {
            info!("Joined {}", topic);
            let _ = ack.send(Ok(()));
        } else {
            let reason = frame
                .payload
                .get("response")
                .map(|r| r.to_string())
                .unwrap_or_else(|| "join rejected".to_string());
            warn!("Join of {} rejected: {}", topic, reason);
            self.routes.remove(&topic);
            let _ = ack.send(Err(BackendError::Api {
                status: 0,
                message: reason,
            }));
        }
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn run_connection(socket: Socket, mut commands: mpsc::UnboundedReceiver<Command>) {
    let (mut tx, mut rx) = socket.split();
    let mut router = Router::default();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        let outgoing: Vec<Frame> = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Join { topic, payload, sink, ack }) => {
                    vec![router.join(topic, payload, sink, ack)]
                }
                Some(Command::Leave { topic, ack }) => {
                    let frames = router.leave(&topic).into_iter().collect();
                    let _ = ack.send(());
                    frames
                }
                Some(Command::Token(token)) => router.refresh_token(&token),
                None => break,
            },
            incoming = rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<Frame>(&text) {
                        Ok(frame) => router.handle(frame),
                        Err(e) => warn!("Malformed realtime frame: {}", e),
                    }
                    Vec::new()
                }
                Some(Ok(WsMessage::Close(reason))) => {
                    info!("Realtime socket closed: {:?}", reason);
                    break;
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!("Realtime socket error: {}", e);
                    break;
                }
                None => break,
            },
            _ = heartbeat.tick() => vec![router.heartbeat()],
        };

        for frame in outgoing {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode {} frame: {}", frame.event, e);
                    continue;
                }
            };
            if let Err(e) = tx.send(WsMessage::Text(text)).await {
                warn!("Realtime send failed: {}", e);
                return;
            }
        }
    }
    let _ = tx.close().await;
    debug!("Realtime connection task finished");
}

// ============================================================================
// Client
// ============================================================================

/// `ChangeFeed` backed by a Supabase Realtime websocket. The socket is
/// opened lazily by the first subscription and reopened if it drops.
pub struct RealtimeClient {
    url: Url,
    access_token: RwLock<Option<String>>,
    next_id: AtomicU64,
    connection: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl RealtimeClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        Ok(Self {
            url: socket_url(base_url, anon_key)?,
            access_token: RwLock::new(None),
            next_id: AtomicU64::new(1),
            connection: Mutex::new(None),
        })
    }

    fn token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|guard| guard.clone())
    }

    async fn commands(&self) -> Result<mpsc::UnboundedSender<Command>, BackendError> {
        let mut connection = self.connection.lock().await;
        if let Some(commands) = connection.as_ref()
            && !commands.is_closed()
        {
            return Ok(commands.clone());
        }

        info!(
            "Connecting realtime feed to {}",
            self.url.host_str().unwrap_or("?")
        );
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(socket, rx));
        *connection = Some(tx.clone());
        Ok(tx)
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token.clone(),
            Err(_) => warn!("Realtime token lock poisoned"),
        }
        // Push the new token to live channels; a missing connection is fine.
        if let (Some(token), Ok(connection)) = (token, self.connection.try_lock())
            && let Some(commands) = connection.as_ref()
        {
            let _ = commands.send(Command::Token(token));
        }
    }

    async fn open(
        &self,
        filter: FeedFilter,
        sink: FeedSink,
    ) -> Result<SubscriptionHandle, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let topic = format!("realtime:{}:{}:{}", filter.table, filter.value, id);
        let payload = join_payload(&filter, self.token().as_deref());
        debug!("Joining {} ({})", topic, filter.expression());

        let commands = self.commands().await?;
        let (ack, joined) = oneshot::channel();
        commands
            .send(Command::Join {
                topic: topic.clone(),
                payload,
                sink,
                ack,
            })
            .map_err(|_| BackendError::Closed)?;

        match tokio::time::timeout(JOIN_TIMEOUT, joined).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(BackendError::Closed),
            Err(_) => {
                let (ack, _) = oneshot::channel();
                let _ = commands.send(Command::Leave {
                    topic: topic.clone(),
                    ack,
                });
                return Err(BackendError::Network(format!("join of {} timed out", topic)));
            }
        }
        Ok(SubscriptionHandle { id, topic })
    }

    async fn close(&self, handle: SubscriptionHandle) -> Result<(), BackendError> {
        let connection = self.connection.lock().await;
        let Some(commands) = connection.as_ref().filter(|c| !c.is_closed()).cloned() else {
            debug!("Realtime connection gone; {} already closed", handle.topic);
            return Ok(());
        };
        drop(connection);

        info!("Leaving {}", handle.topic);
        let (ack, left) = oneshot::channel();
        commands
            .send(Command::Leave {
                topic: handle.topic,
                ack,
            })
            .map_err(|_| BackendError::Closed)?;
        left.await.map_err(|_| BackendError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message_json(id: Uuid) -> Value {
        json!({
            "id": id,
            "content": "hello",
            "user_id": Uuid::nil(),
            "conversation_id": Uuid::nil(),
            "created_at": "2024-05-01T12:00:00+00:00",
            "is_edited": false,
            "updated_at": null
        })
    }

    #[test]
    fn test_socket_url_from_https() {
        let url = socket_url("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        let local = socket_url("http://127.0.0.1:54321", "k").unwrap();
        assert_eq!(local.scheme(), "ws");
        assert!(socket_url("ftp://x", "k").is_err());
    }

    #[test]
    fn test_join_payload_shape() {
        let conversation = Uuid::nil();
        let payload = join_payload(&FeedFilter::messages_in(conversation), Some("tok"));
        let change = &payload["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "*");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["filter"], format!("conversation_id=eq.{}", conversation));
        assert_eq!(payload["access_token"], "tok");

        let anonymous = join_payload(&FeedFilter::messages_in(conversation), None);
        assert!(anonymous.get("access_token").is_none());
    }

    #[test]
    fn test_decode_insert_update_delete() {
        let id = Uuid::new_v4();
        let insert = json!({ "data": { "type": "INSERT", "record": message_json(id) } });
        assert!(matches!(decode_change(&insert), Some(ChangeEvent::Insert(m)) if m.id == id));

        let update = json!({
            "data": { "type": "UPDATE", "record": message_json(id), "old_record": { "id": id } }
        });
        assert!(matches!(decode_change(&update), Some(ChangeEvent::Update(_))));

        let delete = json!({ "data": { "type": "DELETE", "old_record": { "id": id } } });
        assert_eq!(decode_change(&delete), Some(ChangeEvent::Delete { id }));

        let garbage = json!({ "data": { "type": "INSERT", "record": { "id": "x" } } });
        assert_eq!(decode_change(&garbage), None);
    }

    #[test]
    fn test_frame_serializes_ref_key() {
        let mut router = Router::default();
        let frame = router.heartbeat();
        let text = serde_json::to_value(&frame).unwrap();
        assert_eq!(text["topic"], "phoenix");
        assert_eq!(text["event"], "heartbeat");
        assert_eq!(text["ref"], "1");
    }

    #[tokio::test]
    async fn test_router_acks_join_and_routes_changes() {
        let mut router = Router::default();
        let (sink, mut events) = mpsc::unbounded_channel();
        let (ack, joined) = oneshot::channel();
        let join = router.join("realtime:a".into(), json!({}), sink, ack);
        assert_eq!(join.event, "phx_join");

        router.handle(Frame {
            topic: "realtime:a".into(),
            event: "phx_reply".into(),
            payload: json!({ "status": "ok", "response": {} }),
            reference: join.reference.clone(),
        });
        assert!(joined.await.unwrap().is_ok());

        let id = Uuid::new_v4();
        router.handle(Frame::new(
            "realtime:a",
            "postgres_changes",
            json!({ "data": { "type": "INSERT", "record": message_json(id) } }),
        ));
        // Another topic's events never reach this sink.
        router.handle(Frame::new(
            "realtime:b",
            "postgres_changes",
            json!({ "data": { "type": "INSERT", "record": message_json(Uuid::new_v4()) } }),
        ));
        assert!(matches!(events.recv().await, Some(ChangeEvent::Insert(m)) if m.id == id));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_router_rejected_join_drops_route() {
        let mut router = Router::default();
        let (sink, _events) = mpsc::unbounded_channel();
        let (ack, joined) = oneshot::channel();
        let join = router.join("realtime:a".into(), json!({}), sink, ack);
        router.handle(Frame {
            topic: "realtime:a".into(),
            event: "phx_reply".into(),
            payload: json!({ "status": "error", "response": { "reason": "unauthorized" } }),
            reference: join.reference,
        });
        assert!(joined.await.unwrap().is_err());
        assert!(router.routes.is_empty());
    }

    #[test]
    fn test_router_leave_unknown_topic_sends_nothing() {
        let mut router = Router::default();
        let (sink, _events) = mpsc::unbounded_channel();
        let (ack, _joined) = oneshot::channel();
        router.join("realtime:a".into(), json!({}), sink, ack);
        assert_eq!(router.leave("realtime:a").map(|f| f.event), Some("phx_leave".into()));
        assert!(router.leave("realtime:a").is_none());
        assert!(router.pending.is_empty());
    }
}
