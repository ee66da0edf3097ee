//! Point-to-point UDP variant.
//!
//! One node runs the sender next to the physical pad, the other runs the
//! receiver next to the virtual pad. One event per datagram, best-effort:
//! no acknowledgment, no retransmission, no origin tagging (the link is one
//! direction only, so echo cannot occur).

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mapping;
use crate::protocol::codec;
use crate::protocol::RawEvent;
use crate::replay::{ReplayEngine, VirtualPad};

const RECV_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_DATAGRAM: usize = 2048;

/// Forward every raw event to the connected remote as one datagram. Send
/// failures drop the single event and keep the loop alive.
pub async fn run_sender(
    socket: UdpSocket,
    mut raw_rx: mpsc::Receiver<RawEvent>,
    token: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            _ = token.cancelled() => break,
            raw = raw_rx.recv() => raw,
        };
        let Some(raw) = raw else { break };

        let line = codec::encode_datagram(&raw);
        if let Err(e) = socket.send(line.as_bytes()).await {
            warn!("failed to send datagram: {}", e);
        }
    }
    info!("datagram sender stopped");
}

/// Drain inbound datagrams and replay them onto the virtual pad. The
/// receiving task is the sole owner of the engine, so applies are
/// serialized by construction.
pub async fn run_receiver<P: VirtualPad>(
    socket: UdpSocket,
    mut engine: ReplayEngine<P>,
    token: CancellationToken,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            res = socket.recv_from(&mut buf) => res,
        };

        let (len, from) = match received {
            Ok(received) => received,
            Err(e) => {
                warn!("datagram receive failed: {}", e);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(RECV_RETRY_DELAY) => {}
                }
                continue;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            warn!("dropping non-utf8 datagram from {}", from);
            continue;
        };
        let raw = match codec::decode_datagram(text.trim_end()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("dropping malformed datagram from {}: {}", from, e);
                continue;
            }
        };

        let Some(input) = mapping::map_raw(raw.kind, &raw.code, raw.state) else {
            debug!("dropping unmapped datagram event: {}", raw.code);
            continue;
        };
        if let Err(e) = engine.apply_input(&input) {
            warn!("replay failed: {}", e);
        }
    }
    info!("datagram receiver stopped");
}
