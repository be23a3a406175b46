//! The SSE transport: session table, endpoint handshake, broadcast
//! delivery, and idle-session sweeping.
//!
//! Lock discipline for the session table: take the read lock to send,
//! take the write lock only to insert, remove, or touch `last_seen`.
//! Never hold either lock across a queue push.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use quill_mcp_json_rpc::JsonRpcMessage;
use quill_mcp_server::{MessageQueue, ServerError, Transport};

use crate::{HttpServerError, Result};

/// A single SSE frame.
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Wire form: `event:` line, `data:` line, blank line.
    pub fn format(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

struct SseSession {
    created_at: Instant,
    last_seen: Instant,
    sink: mpsc::UnboundedSender<String>,
}

/// A [`Transport`] over Server-Sent Events.
///
/// Downstream traffic is broadcast to every connected stream; upstream
/// messages arrive via HTTP POST and go straight to the inbound queue, so
/// [`read_message`](Transport::read_message) always reports "nothing here".
pub struct SseServerTransport {
    endpoint: String,
    sessions: RwLock<HashMap<String, SseSession>>,
    inbound: Arc<MessageQueue<JsonRpcMessage>>,
    outbound: Arc<MessageQueue<JsonRpcMessage>>,
    started: AtomicBool,
}

impl SseServerTransport {
    /// `endpoint` is the POST path clients send messages to, e.g.
    /// `/messages`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sessions: RwLock::new(HashMap::new()),
            inbound: Arc::new(MessageQueue::new()),
            outbound: Arc::new(MessageQueue::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Register a new SSE stream. Returns the session id and the frame
    /// receiver to drain into the response body; the first frame is the
    /// `endpoint` event telling the client where to POST.
    pub async fn handle_sse_request(&self) -> (String, mpsc::UnboundedReceiver<String>) {
        let session_id = Uuid::new_v4().simple().to_string();
        let (sink, receiver) = mpsc::unbounded_channel();

        let endpoint_event = SseEvent::new(
            "endpoint",
            format!("{}?session_id={}", self.endpoint, session_id),
        );
        // Receiver is in hand, this cannot fail
        let _ = sink.send(endpoint_event.format());

        let now = Instant::now();
        self.sessions.write().await.insert(
            session_id.clone(),
            SseSession {
                created_at: now,
                last_seen: now,
                sink,
            },
        );
        info!(session_id = %session_id, "SSE session opened");
        (session_id, receiver)
    }

    /// Accept a client-to-server message posted for `session_id`.
    pub async fn handle_post_request(&self, session_id: &str, body: &[u8]) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| HttpServerError::SessionNotFound(session_id.to_string()))?;
            session.last_seen = Instant::now();
        }

        let message = JsonRpcMessage::decode(body)?;
        debug!(session_id = %session_id, method = ?message.method(), "message received");

        if !self.inbound.push(message, None).await {
            return Err(HttpServerError::Server(ServerError::Transport(
                "inbound queue closed".to_string(),
            )));
        }
        Ok(())
    }

    /// Drop one session, closing its stream.
    pub async fn close_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "SSE session closed");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl Transport for SseServerTransport {
    async fn start(&self) -> std::result::Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::Transport(
                "SSE transport already started".to_string(),
            ));
        }
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), ServerError> {
        if self.started.swap(false, Ordering::SeqCst) {
            self.sessions.write().await.clear();
            self.inbound.close().await;
            self.outbound.close().await;
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Upstream messages arrive via [`handle_post_request`], not here.
    /// Paced so a polling caller does not spin.
    async fn read_message(&self) -> std::result::Result<Option<JsonRpcMessage>, ServerError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(None)
    }

    /// Broadcast to every open stream. Streams whose receiver is gone are
    /// dropped from the table.
    async fn write_message(
        &self,
        message: &JsonRpcMessage,
    ) -> std::result::Result<(), ServerError> {
        let frame = SseEvent::new("message", message.encode()?).format();

        let dead: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, session)| session.sink.send(frame.clone()).is_err())
                .map(|(id, _)| id.clone())
                .collect()
        };

        if !dead.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in dead {
                sessions.remove(&id);
                warn!(session_id = %id, "SSE stream gone, session dropped");
            }
        }
        Ok(())
    }

    fn streams(&self) -> (Arc<MessageQueue<JsonRpcMessage>>, Arc<MessageQueue<JsonRpcMessage>>) {
        (Arc::clone(&self.inbound), Arc::clone(&self.outbound))
    }

    async fn cleanup_expired(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.last_seen.elapsed() <= max_age;
            if !keep {
                debug!(
                    session_id = %id,
                    age_secs = session.created_at.elapsed().as_secs(),
                    "idle SSE session expired"
                );
            }
            keep
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_format() {
        let event = SseEvent::new("message", "{\"a\":1}");
        assert_eq!(event.format(), "event: message\ndata: {\"a\":1}\n\n");
    }

    #[tokio::test]
    async fn test_sse_handshake_sends_endpoint_event() {
        let transport = SseServerTransport::new("/messages");
        let (session_id, mut receiver) = transport.handle_sse_request().await;

        assert_eq!(session_id.len(), 32);
        let first = receiver.recv().await.unwrap();
        assert!(first.starts_with("event: endpoint\n"));
        assert!(first.contains(&format!("/messages?session_id={session_id}")));
        assert_eq!(transport.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_post_unknown_session_is_rejected() {
        let transport = SseServerTransport::new("/messages");
        let result = transport
            .handle_post_request("nope", b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}")
            .await;
        match result {
            Err(HttpServerError::SessionNotFound(id)) => assert_eq!(id, "nope"),
            other => panic!("expected session-not-found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_routes_to_inbound_queue() {
        let transport = SseServerTransport::new("/messages");
        let (session_id, _receiver) = transport.handle_sse_request().await;
        transport
            .handle_post_request(
                &session_id,
                b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}",
            )
            .await
            .unwrap();

        let (inbound, _) = transport.streams();
        let message = inbound.pop(Some(Duration::from_millis(50))).await.unwrap();
        assert_eq!(message.method(), Some("ping"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_stream() {
        let transport = SseServerTransport::new("/messages");
        let (_id1, mut rx1) = transport.handle_sse_request().await;
        let (_id2, mut rx2) = transport.handle_sse_request().await;
        // Skip the endpoint events
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();

        let message =
            JsonRpcMessage::decode(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/tools/list_changed\"}")
                .unwrap();
        transport.write_message(&message).await.unwrap();

        let frame1 = rx1.recv().await.unwrap();
        let frame2 = rx2.recv().await.unwrap();
        assert_eq!(frame1, frame2);
        assert!(frame1.starts_with("event: message\n"));
    }

    #[tokio::test]
    async fn test_dropped_stream_is_removed_on_broadcast() {
        let transport = SseServerTransport::new("/messages");
        let (_id, receiver) = transport.handle_sse_request().await;
        drop(receiver);

        let message =
            JsonRpcMessage::decode(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/tools/list_changed\"}")
                .unwrap();
        transport.write_message(&message).await.unwrap();
        assert_eq!(transport.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expires_idle_sessions() {
        let transport = SseServerTransport::new("/messages");
        let (_id, _receiver) = transport.handle_sse_request().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(transport.cleanup_expired(Duration::from_secs(60)).await, 0);
        assert_eq!(transport.cleanup_expired(Duration::ZERO).await, 1);
        assert_eq!(transport.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_post_after_sweep_is_rejected() {
        let transport = SseServerTransport::new("/messages");
        let (session_id, _receiver) = transport.handle_sse_request().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.cleanup_expired(Duration::ZERO).await;

        let result = transport
            .handle_post_request(
                &session_id,
                b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}",
            )
            .await;
        assert!(matches!(result, Err(HttpServerError::SessionNotFound(_))));
    }
}
