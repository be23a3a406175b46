//! Drives a transport and a session on Tokio.
//!
//! Four units run concurrently: read (transport to inbound queue), write
//! (outbound queue to transport), process (session dispatch), and cleanup
//! (expired peer state). Every unit catches and logs its own failures so
//! one bad message never takes the server down; shutdown is coordinated
//! through a single [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use quill_mcp_json_rpc::{JsonRpcError, JsonRpcMessage};

use crate::server::McpServer;
use crate::session::ServerSession;
use crate::stdio::StdioServerTransport;
use crate::transport::Transport;
use crate::{Result, ServerError};

/// Timing knobs for the runner's units.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How long the process unit waits for an inbound message per poll
    pub pop_timeout: Duration,
    /// Pause after a transient read failure before polling again
    pub read_retry_delay: Duration,
    /// How often expired peer state is swept
    pub cleanup_interval: Duration,
    /// Peer state idle longer than this is dropped by the sweep
    pub session_max_age: Duration,
    /// How long units get to finish after shutdown is requested
    pub shutdown_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_millis(250),
            read_retry_delay: Duration::from_millis(100),
            cleanup_interval: Duration::from_secs(60),
            session_max_age: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Runs an [`McpServer`] over a [`Transport`] until shutdown.
pub struct ServerRunner {
    server: Arc<McpServer>,
    config: RunnerConfig,
    shutdown: CancellationToken,
}

impl ServerRunner {
    pub fn new(server: McpServer) -> Self {
        Self::with_config(server, RunnerConfig::default())
    }

    pub fn with_config(server: McpServer, config: RunnerConfig) -> Self {
        Self {
            server: Arc::new(server),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// A handle that stops the runner when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve over stdin/stdout until EOF or Ctrl-C.
    pub async fn run_stdio(self) -> Result<()> {
        self.run(StdioServerTransport::new()).await
    }

    /// Serve over the given transport until it ends or shutdown is
    /// requested.
    pub async fn run<T>(self, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        let transport = Arc::new(transport);
        transport.start().await?;

        let session = Arc::new(ServerSession::new(
            Arc::clone(&self.server),
            self.server.create_initialization_options(),
            transport.streams(),
        ));
        session.start()?;

        info!(server = %self.server.server_info().name, "server running");

        let mut units = JoinSet::new();

        // Read unit: transport to inbound queue
        {
            let transport = Arc::clone(&transport);
            let shutdown = self.shutdown.clone();
            let retry_delay = self.config.read_retry_delay;
            let (inbound, outbound) = transport.streams();
            units.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        read = transport.read_message() => match read {
                            Ok(Some(message)) => {
                                if !inbound.push(message, None).await {
                                    debug!("inbound queue closed, read unit exiting");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(ServerError::Codec(e)) => {
                                // Malformed input gets a structured reply and
                                // the connection stays up
                                warn!(error = %e, "rejecting malformed message");
                                let reply = JsonRpcMessage::Error(JsonRpcError::new(
                                    None,
                                    e.to_error_object(),
                                ));
                                if !outbound.push(reply, None).await {
                                    warn!("outbound queue closed, parse-error reply dropped");
                                }
                            }
                            Err(ServerError::Transport(e)) => {
                                info!(reason = %e, "transport ended, shutting down");
                                shutdown.cancel();
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "read failed");
                                tokio::time::sleep(retry_delay).await;
                            }
                        },
                    }
                }
                debug!("read unit stopped");
            });
        }

        // Write unit: outbound queue to transport
        {
            let transport = Arc::clone(&transport);
            let shutdown = self.shutdown.clone();
            let pop_timeout = self.config.pop_timeout;
            let (_, outbound) = transport.streams();
            units.spawn(async move {
                loop {
                    if shutdown.is_cancelled() {
                        // Flush whatever is already queued before exiting
                        while let Some(message) =
                            outbound.pop(Some(Duration::from_millis(10))).await
                        {
                            if let Err(e) = transport.write_message(&message).await {
                                warn!(error = %e, "write failed during shutdown");
                                break;
                            }
                        }
                        break;
                    }
                    if let Some(message) = outbound.pop(Some(pop_timeout)).await {
                        if let Err(e) = transport.write_message(&message).await {
                            warn!(error = %e, "write failed, dropping message");
                        }
                    }
                }
                debug!("write unit stopped");
            });
        }

        // Process unit: session dispatch
        {
            let session = Arc::clone(&session);
            let shutdown = self.shutdown.clone();
            let pop_timeout = self.config.pop_timeout;
            units.spawn(async move {
                loop {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    match session.process_next_message(pop_timeout).await {
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "message dispatch failed"),
                    }
                }
                debug!("process unit stopped");
            });
        }

        // Cleanup unit: sweep expired peer state
        {
            let transport = Arc::clone(&transport);
            let shutdown = self.shutdown.clone();
            let interval = self.config.cleanup_interval;
            let max_age = self.config.session_max_age;
            units.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            let swept = transport.cleanup_expired(max_age).await;
                            if swept > 0 {
                                info!(swept, "expired sessions removed");
                            }
                        }
                    }
                }
                debug!("cleanup unit stopped");
            });
        }

        // Wait for shutdown: external cancel, Ctrl-C, or transport end
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "failed to listen for shutdown signal");
                }
                info!("shutdown requested");
                self.shutdown.cancel();
            }
        }

        // Give units the grace period, then pull the plug
        let drain = async {
            while let Some(result) = units.join_next().await {
                if let Err(e) = result {
                    if !e.is_cancelled() {
                        error!(error = %e, "unit panicked");
                    }
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!("units did not stop in time, aborting");
            units.abort_all();
        }

        session.stop().await;
        transport.stop().await?;
        info!("server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.session_max_age, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_run() {
        let server = McpServer::builder().name("t").build();
        let runner = ServerRunner::new(server);
        let token = runner.shutdown_token();

        let (_client, server_io) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(server_io);
        let transport = StdioServerTransport::with_streams(read_half, write_half);

        let handle = tokio::spawn(runner.run(transport));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("runner did not stop")
            .expect("runner panicked");
        assert!(result.is_ok());
    }
}
