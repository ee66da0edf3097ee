//! Listener for local observers.
//!
//! Observers (UIs, chained relay nodes connecting in) get every broadcast
//! message as a JSON line and may inject `gamepad_event` lines of their own;
//! injected events enter the same inbound channel as the peer's, so the
//! anti-echo check applies to them too. The first accepted connection flips
//! the start signal that moves the poller from Idle to Polling.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::codec;
use crate::protocol::WireMessage;

pub fn spawn(
    listener: TcpListener,
    broadcast_tx: broadcast::Sender<WireMessage>,
    inbound_tx: mpsc::Sender<WireMessage>,
    start_tx: watch::Sender<bool>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(accept_loop(
        listener,
        broadcast_tx,
        inbound_tx,
        start_tx,
        token,
    ))
}

async fn accept_loop(
    listener: TcpListener,
    broadcast_tx: broadcast::Sender<WireMessage>,
    inbound_tx: mpsc::Sender<WireMessage>,
    start_tx: watch::Sender<bool>,
    token: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            res = listener.accept() => res,
        };

        match accepted {
            Ok((stream, addr)) => {
                info!("observer connected from {}", addr);
                let _ = start_tx.send(true);
                tokio::spawn(serve_observer(
                    stream,
                    broadcast_tx.subscribe(),
                    inbound_tx.clone(),
                    token.child_token(),
                ));
            }
            Err(e) => {
                warn!("observer accept failed: {}", e);
            }
        }
    }
    debug!("observer listener stopped");
}

async fn serve_observer(
    stream: TcpStream,
    mut feed: broadcast::Receiver<WireMessage>,
    inbound_tx: mpsc::Sender<WireMessage>,
    token: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = feed.recv() => {
                match message {
                    Ok(message) => {
                        let Ok(mut line) = codec::encode_line(&message) else {
                            continue;
                        };
                        line.push('\n');
                        if writer.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Lossy under load; the observer just misses events.
                        warn!("observer lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match codec::decode_line(&line) {
                        Ok(message) => {
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("ignoring malformed observer payload: {}", e),
                    },
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
    debug!("observer connection closed");
}
