//! The per-node control loop.

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mapping;
use crate::protocol::{NodeId, RawEvent, WireEvent, WireMessage};
use crate::replay::{ReplayEngine, VirtualPad};

use super::peer::PeerHandle;

/// Ties the poller, the peer link, the observers and the replay engine
/// together. Exactly one node task owns the replay engine and the virtual
/// pad, so all commits are serialized here.
pub struct RelayNode<P: VirtualPad> {
    identity: NodeId,
    raw_rx: mpsc::Receiver<RawEvent>,
    inbound_rx: mpsc::Receiver<WireMessage>,
    broadcast_tx: broadcast::Sender<WireMessage>,
    peer: Option<PeerHandle>,
    engine: ReplayEngine<P>,
    token: CancellationToken,
}

impl<P: VirtualPad> RelayNode<P> {
    pub fn new(
        identity: NodeId,
        raw_rx: mpsc::Receiver<RawEvent>,
        inbound_rx: mpsc::Receiver<WireMessage>,
        broadcast_tx: broadcast::Sender<WireMessage>,
        peer: Option<PeerHandle>,
        engine: ReplayEngine<P>,
        token: CancellationToken,
    ) -> Self {
        Self {
            identity,
            raw_rx,
            inbound_rx,
            broadcast_tx,
            peer,
            engine,
            token,
        }
    }

    pub async fn run(mut self) {
        info!("relay node {} running", self.identity);
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                raw = self.raw_rx.recv() => {
                    let Some(raw) = raw else { break };
                    self.handle_local(raw);
                }
                message = self.inbound_rx.recv() => {
                    let Some(message) = message else { break };
                    self.handle_inbound(message);
                }
            }
        }
        info!("relay node stopped");
    }

    /// A raw event from the local device: stamp our identity, broadcast to
    /// observers, forward to the peer if one is connected. Locally generated
    /// events are never replayed here; the physical pad already drives this
    /// machine natively.
    fn handle_local(&mut self, raw: RawEvent) {
        let message = WireMessage::GamepadEvent(WireEvent::from_raw(raw, &self.identity));

        // No subscribers is fine.
        let _ = self.broadcast_tx.send(message.clone());

        if let Some(peer) = &self.peer {
            if peer.is_connected() {
                if let Err(e) = peer.try_forward(message) {
                    warn!("forwarding to peer failed: {}", e);
                    let _ = self.broadcast_tx.send(WireMessage::PeerError {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// A message from the peer link or an observer channel.
    fn handle_inbound(&mut self, message: WireMessage) {
        match message {
            WireMessage::GamepadEvent(event) => {
                if event.origin == self.identity {
                    // Anti-echo: we already processed this event when we
                    // generated it.
                    debug!("discarding self-originated event");
                    return;
                }

                let _ = self
                    .broadcast_tx
                    .send(WireMessage::GamepadEvent(event.clone()));

                let Some(canonical) = mapping::canonicalize(&event) else {
                    debug!("dropping unmapped remote event: {}", event.code);
                    return;
                };
                if let Err(e) = self.engine.apply(&canonical) {
                    error!("replay failed: {}", e);
                    let _ = self.broadcast_tx.send(WireMessage::GamepadError {
                        message: e.to_string(),
                    });
                }
            }
            WireMessage::ServerHello { server_id } => {
                info!("peer identified as {}", server_id);
            }
            WireMessage::GamepadError { message } | WireMessage::PeerError { message } => {
                warn!("remote diagnostic: {}", message);
            }
        }
    }
}
