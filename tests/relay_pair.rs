//! Two relay nodes wired over real sockets: events travel one hop, get
//! replayed exactly once, and never loop back onto their origin.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use padrelay::mapping::{PadButton, Stick, Trigger};
use padrelay::protocol::{EventKind, NodeId, RawEvent};
use padrelay::relay::{observers, PeerHandle, RelayNode};
use padrelay::replay::{PadError, ReplayEngine, VirtualPad};

/// Pad whose call log outlives the node that owns it.
#[derive(Clone, Default)]
struct SharedPad {
    presses: Arc<Mutex<Vec<PadButton>>>,
    sticks: Arc<Mutex<Vec<(Stick, f32, f32)>>>,
}

impl VirtualPad for SharedPad {
    fn press(&mut self, button: PadButton) {
        self.presses.lock().unwrap().push(button);
    }

    fn release(&mut self, _button: PadButton) {}

    fn set_stick(&mut self, stick: Stick, x: f32, y: f32) {
        self.sticks.lock().unwrap().push((stick, x, y));
    }

    fn set_trigger(&mut self, _trigger: Trigger, _pressure: u8) {}

    fn commit(&mut self) -> Result<(), PadError> {
        Ok(())
    }
}

struct TestNode {
    addr: std::net::SocketAddr,
    raw_tx: mpsc::Sender<RawEvent>,
    pad: SharedPad,
}

async fn spawn_node(id: &str, peer: Option<std::net::SocketAddr>, token: &CancellationToken) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let identity = NodeId::new(id);
    let pad = SharedPad::default();
    let engine = ReplayEngine::new(pad.clone());

    let (broadcast_tx, _) = broadcast::channel(64);
    let (raw_tx, raw_rx) = mpsc::channel(64);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let (start_tx, _start_rx) = watch::channel(false);

    observers::spawn(
        listener,
        broadcast_tx.clone(),
        inbound_tx.clone(),
        start_tx,
        token.child_token(),
    );

    let peer = peer.map(|peer_addr| {
        let (handle, _task) = PeerHandle::spawn(
            peer_addr.to_string(),
            identity.clone(),
            inbound_tx,
            token.child_token(),
        );
        handle
    });

    let node = RelayNode::new(
        identity,
        raw_rx,
        inbound_rx,
        broadcast_tx,
        peer,
        engine,
        token.child_token(),
    );
    tokio::spawn(node.run());

    TestNode { addr, raw_tx, pad }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_event_crosses_one_hop_without_echo() {
    let token = CancellationToken::new();

    let node_b = spawn_node("node-b", None, &token).await;
    let node_a = spawn_node("node-a", Some(node_b.addr), &token).await;

    // Give the peer link time to connect.
    settle().await;

    // A's physical pad presses south; only B's virtual pad may move.
    node_a
        .raw_tx
        .send(RawEvent {
            kind: EventKind::Key,
            code: "BTN_SOUTH".to_string(),
            state: 1,
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(*node_b.pad.presses.lock().unwrap(), vec![PadButton::South]);
    // B rebroadcasts the event back over A's peer connection; A must
    // recognize its own origin and drop it.
    assert!(node_a.pad.presses.lock().unwrap().is_empty());

    // B's local device also emits: the event reaches A as an observer of
    // B's broadcast, tagged with B's identity.
    node_b
        .raw_tx
        .send(RawEvent {
            kind: EventKind::Absolute,
            code: "ABS_HAT0Y".to_string(),
            state: 1,
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        *node_a.pad.sticks.lock().unwrap(),
        vec![(Stick::Left, 0.0, -1.0)]
    );
    assert!(node_b.pad.sticks.lock().unwrap().is_empty());

    token.cancel();
}
