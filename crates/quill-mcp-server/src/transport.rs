//! The transport abstraction the runner drives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_mcp_json_rpc::JsonRpcMessage;

use crate::queue::MessageQueue;
use crate::Result;

/// A bidirectional message transport.
///
/// Implementations own an inbound and an outbound [`MessageQueue`]. The
/// runner's read unit calls [`read_message`](Transport::read_message) and
/// pushes results to the inbound queue; its write unit pops the outbound
/// queue and calls [`write_message`](Transport::write_message). The session
/// itself only ever sees the queues.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Prepare the transport for reading and writing. Calling this twice
    /// without an intervening `stop` is an error.
    async fn start(&self) -> Result<()>;

    /// Release transport resources. Idempotent.
    async fn stop(&self) -> Result<()>;

    fn is_started(&self) -> bool;

    /// Read the next message from the peer. `Ok(None)` means no message is
    /// available right now; the caller should poll again. End of input is
    /// reported as a transport error.
    async fn read_message(&self) -> Result<Option<JsonRpcMessage>>;

    /// Deliver one message to the peer.
    async fn write_message(&self, message: &JsonRpcMessage) -> Result<()>;

    /// The (inbound, outbound) queue pair the session consumes and feeds.
    fn streams(&self) -> (Arc<MessageQueue<JsonRpcMessage>>, Arc<MessageQueue<JsonRpcMessage>>);

    /// Drop peer state older than `max_age`. Transports without per-peer
    /// state ignore this.
    async fn cleanup_expired(&self, _max_age: Duration) -> usize {
        0
    }
}

// Transports shared between a front end and the runner go through Arc
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    fn is_started(&self) -> bool {
        (**self).is_started()
    }

    async fn read_message(&self) -> Result<Option<JsonRpcMessage>> {
        (**self).read_message().await
    }

    async fn write_message(&self, message: &JsonRpcMessage) -> Result<()> {
        (**self).write_message(message).await
    }

    fn streams(&self) -> (Arc<MessageQueue<JsonRpcMessage>>, Arc<MessageQueue<JsonRpcMessage>>) {
        (**self).streams()
    }

    async fn cleanup_expired(&self, max_age: Duration) -> usize {
        (**self).cleanup_expired(max_age).await
    }
}
