//! Newline-delimited JSON transport over stdin/stdout.
//!
//! One JSON-RPC message per line. Reads poll with a short timeout so the
//! runner can observe shutdown between lines; writes flush eagerly because
//! a buffered response is indistinguishable from a hung server to the peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::trace;

use quill_mcp_json_rpc::JsonRpcMessage;

use crate::queue::MessageQueue;
use crate::transport::Transport;
use crate::{Result, ServerError};

const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// A [`Transport`] over any line-oriented byte stream pair, stdin/stdout
/// by default. Tests drive it over in-memory duplex pipes.
pub struct StdioServerTransport<R = Stdin, W = Stdout> {
    reader: Mutex<LineReader<R>>,
    writer: Mutex<W>,
    started: AtomicBool,
    inbound: Arc<MessageQueue<JsonRpcMessage>>,
    outbound: Arc<MessageQueue<JsonRpcMessage>>,
}

/// Partial lines survive a timed-out poll here; `read_until` is cancel
/// safe and keeps appending to `buf` across calls.
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl StdioServerTransport {
    pub fn new() -> Self {
        Self::with_streams(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdioServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioServerTransport<R, W>
where
    R: tokio::io::AsyncRead + Send + Sync + Unpin,
    W: tokio::io::AsyncWrite + Send + Sync + Unpin,
{
    pub fn with_streams(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(LineReader {
                inner: BufReader::new(reader),
                buf: Vec::new(),
            }),
            writer: Mutex::new(writer),
            started: AtomicBool::new(false),
            inbound: Arc::new(MessageQueue::new()),
            outbound: Arc::new(MessageQueue::new()),
        }
    }
}

#[async_trait]
impl<R, W> Transport for StdioServerTransport<R, W>
where
    R: tokio::io::AsyncRead + Send + Sync + Unpin,
    W: tokio::io::AsyncWrite + Send + Sync + Unpin,
{
    async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::Transport(
                "stdio transport already started".to_string(),
            ));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.started.swap(false, Ordering::SeqCst) {
            self.inbound.close().await;
            self.outbound.close().await;
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    async fn read_message(&self) -> Result<Option<JsonRpcMessage>> {
        let mut guard = self.reader.lock().await;
        let LineReader { inner, buf } = &mut *guard;

        let read =
            match tokio::time::timeout(READ_POLL_TIMEOUT, inner.read_until(b'\n', buf)).await {
                // No complete line yet; whatever arrived stays in buf
                Err(_) => return Ok(None),
                Ok(read) => read?,
            };

        if read == 0 && buf.is_empty() {
            return Err(ServerError::Transport("end of input".to_string()));
        }

        let line = String::from_utf8(std::mem::take(buf))
            .map_err(|e| ServerError::Transport(format!("invalid UTF-8 on stdin: {e}")))?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        trace!(bytes = line.len(), "received stdio line");
        let message = JsonRpcMessage::decode_str(line)?;
        Ok(Some(message))
    }

    async fn write_message(&self, message: &JsonRpcMessage) -> Result<()> {
        let encoded = message.encode()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(encoded.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        trace!(bytes = encoded.len(), "sent stdio line");
        Ok(())
    }

    fn streams(&self) -> (Arc<MessageQueue<JsonRpcMessage>>, Arc<MessageQueue<JsonRpcMessage>>) {
        (Arc::clone(&self.inbound), Arc::clone(&self.outbound))
    }
}
