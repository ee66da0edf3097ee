//! Outbound peer link with unlimited reconnect.
//!
//! The link runs as its own task: connect, greet with `server_hello`, then
//! pump queued outbound messages onto the socket and decoded inbound lines
//! into the node's inbound channel. On any failure the connection is torn
//! down and retried with capped exponential backoff, forever. Connect
//! failures are logged once per outage rather than once per attempt.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::codec::{self, CodecError};
use crate::protocol::{NodeId, WireMessage};

const RECONNECT_BASE: Duration = Duration::from_millis(500);
const RECONNECT_CAP: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to queue event for peer: {0}")]
    Forward(String),

    #[error("Peer connection closed")]
    Closed,

    #[error("Peer I/O error: {0}")]
    Io(std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Handle to the peer connection task.
pub struct PeerHandle {
    outbound_tx: mpsc::Sender<WireMessage>,
    connected: watch::Receiver<bool>,
}

impl PeerHandle {
    /// Spawn the connection task; the join handle goes back to the caller so
    /// shutdown can wait on it alongside the other tasks.
    pub fn spawn(
        addr: String,
        identity: NodeId,
        inbound_tx: mpsc::Sender<WireMessage>,
        token: CancellationToken,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (connected_tx, connected) = watch::channel(false);
        let task = tokio::spawn(connection_loop(
            addr,
            identity,
            outbound_rx,
            inbound_tx,
            connected_tx,
            token,
        ));
        (
            Self {
                outbound_tx,
                connected,
            },
            task,
        )
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Queue a message for the peer without waiting. A full queue counts as
    /// a send failure; the event is dropped.
    pub fn try_forward(&self, message: WireMessage) -> Result<(), TransportError> {
        self.outbound_tx
            .try_send(message)
            .map_err(|e| TransportError::Forward(e.to_string()))
    }
}

async fn connection_loop(
    addr: String,
    identity: NodeId,
    mut outbound_rx: mpsc::Receiver<WireMessage>,
    inbound_tx: mpsc::Sender<WireMessage>,
    connected_tx: watch::Sender<bool>,
    token: CancellationToken,
) {
    let mut backoff = RECONNECT_BASE;
    let mut outage_reported = false;

    loop {
        let attempt = tokio::select! {
            _ = token.cancelled() => break,
            res = TcpStream::connect(&addr) => res,
        };

        match attempt {
            Ok(stream) => {
                info!("connected to peer {}", addr);
                outage_reported = false;
                backoff = RECONNECT_BASE;
                let _ = connected_tx.send(true);

                let result =
                    drive_connection(stream, &identity, &mut outbound_rx, &inbound_tx, &token)
                        .await;
                let _ = connected_tx.send(false);
                match result {
                    Ok(()) => break, // cancelled or channels closed
                    Err(e) => warn!("peer connection lost: {}", e),
                }
            }
            Err(e) => {
                if !outage_reported {
                    warn!("peer connect to {} failed: {} (retrying with backoff)", addr, e);
                    outage_reported = true;
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(RECONNECT_CAP);
    }
    debug!("peer connection loop stopped");
}

async fn drive_connection(
    stream: TcpStream,
    identity: &NodeId,
    outbound_rx: &mut mpsc::Receiver<WireMessage>,
    inbound_tx: &mpsc::Sender<WireMessage>,
    token: &CancellationToken,
) -> Result<(), TransportError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let hello = WireMessage::ServerHello {
        server_id: identity.as_str().to_string(),
    };
    write_line(&mut writer, &hello).await?;

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            message = outbound_rx.recv() => {
                let Some(message) = message else { return Ok(()) };
                write_line(&mut writer, &message).await?;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match codec::decode_line(&line) {
                        Ok(message) => {
                            if inbound_tx.send(message).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => warn!("ignoring malformed peer payload: {}", e),
                    },
                    Ok(None) => return Err(TransportError::Closed),
                    Err(e) => return Err(TransportError::Io(e)),
                }
            }
        }
    }
}

async fn write_line<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    message: &WireMessage,
) -> Result<(), TransportError> {
    let mut line = codec::encode_line(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(TransportError::Io)
}
