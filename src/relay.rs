// src/relay.rs - Persistent best-effort channel to the out-of-process notifier
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::{RelayMessage, RelaySink};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Newline-delimited JSON over TCP. Sends never block and never report
/// failure; the background task reconnects after `RECONNECT_DELAY`
/// following any disconnect, for as long as the client lives.
pub struct RelayClient {
    tx: UnboundedSender<RelayMessage>,
    task: JoinHandle<()>,
}

enum ConnectionEnd {
    Lost,
    Shutdown,
}

impl RelayClient {
    /// Must be called from within a tokio runtime.
    pub fn spawn(addr: impl Into<String>) -> Self {
        Self::with_reconnect_delay(addr, RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(addr: impl Into<String>, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(addr.into(), rx, delay));
        Self { tx, task }
    }
}

impl RelaySink for RelayClient {
    fn send(&self, message: &RelayMessage) {
        if self.tx.send(message.clone()).is_err() {
            debug!("relay task gone, message dropped");
        }
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(addr: String, mut rx: UnboundedReceiver<RelayMessage>, delay: Duration) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!(%addr, "relay connected");
                match serve(stream, &mut rx).await {
                    ConnectionEnd::Shutdown => return,
                    ConnectionEnd::Lost => warn!(%addr, "relay disconnected"),
                }
            }
            Err(e) => debug!(%addr, error = %e, "relay connect failed"),
        }

        tokio::time::sleep(delay).await;

        // Alerts raised while offline are stale by now
        loop {
            match rx.try_recv() {
                Ok(message) => debug!(?message, "dropping message queued while offline"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }
    }
}

async fn serve(stream: TcpStream, rx: &mut UnboundedReceiver<RelayMessage>) -> ConnectionEnd {
    let (read, mut write) = stream.into_split();
    let mut incoming = BufReader::new(read).lines();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    return ConnectionEnd::Shutdown;
                };
                let mut line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        debug!(error = %e, "unserializable relay message");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(e) = write.write_all(line.as_bytes()).await {
                    debug!(error = %e, "relay write failed");
                    return ConnectionEnd::Lost;
                }
            }
            line = incoming.next_line() => match line {
                Ok(Some(line)) => debug!(%line, "relay peer message"),
                Ok(None) => return ConnectionEnd::Lost,
                Err(e) => {
                    debug!(error = %e, "relay read failed");
                    return ConnectionEnd::Lost;
                }
            },
        }
    }
}
