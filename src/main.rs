use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use padrelay::config::{RelayConfig, RelayMode};
use padrelay::device;
use padrelay::protocol::NodeId;
use padrelay::relay::{datagram, observers, PeerHandle, PollerHandle, RelayNode};
use padrelay::replay::{ReplayEngine, UinputPad};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const RAW_BUFFER: usize = 1000;
const INBOUND_BUFFER: usize = 1000;
const BROADCAST_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = RelayConfig::from_env()?;
    let identity = match &config.server_id {
        Some(id) => NodeId::new(id.clone()),
        None => NodeId::generate(),
    };
    info!("server id: {}", identity);
    info!("mode: {:?}", config.mode);

    let token = CancellationToken::new();
    let tasks = match config.mode {
        RelayMode::Relay => start_relay(&config, identity, &token).await?,
        RelayMode::Send => start_sender(&config, &token).await?,
        RelayMode::Recv => start_receiver(&config, &token).await?,
    };

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    token.cancel();

    for task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("task did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }
    info!("bye");
    Ok(())
}

/// Socket-server variant: observer listener + optional peer + local replay.
async fn start_relay(
    config: &RelayConfig,
    identity: NodeId,
    token: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let device = device::open_device(config.device_path.as_deref())?;
    let pad = UinputPad::create("padrelay virtual pad")?;
    let engine = ReplayEngine::new(pad);

    let listener = TcpListener::bind(config.bind)
        .await
        .wrap_err_with(|| format!("cannot bind observer listener on {}", config.bind))?;
    info!("listening for observers on {}", config.bind);

    let (broadcast_tx, _) = broadcast::channel(BROADCAST_BUFFER);
    let (raw_tx, raw_rx) = mpsc::channel(RAW_BUFFER);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let (start_tx, start_rx) = watch::channel(false);

    let listener_task = observers::spawn(
        listener,
        broadcast_tx.clone(),
        inbound_tx.clone(),
        start_tx,
        token.child_token(),
    );

    let mut tasks = vec![listener_task];
    let peer = match config.peer.clone() {
        Some(addr) => {
            info!("peer configured: {}", addr);
            let (peer, peer_task) =
                PeerHandle::spawn(addr, identity.clone(), inbound_tx, token.child_token());
            tasks.push(peer_task);
            Some(peer)
        }
        None => None,
    };

    // The poller stays idle until the first observer or peer connects.
    let poller = PollerHandle::spawn(
        device,
        raw_tx,
        broadcast_tx.clone(),
        Some(start_rx),
        token.child_token(),
    )?;

    let node = RelayNode::new(
        identity,
        raw_rx,
        inbound_rx,
        broadcast_tx,
        peer,
        engine,
        token.child_token(),
    );
    tasks.push(poller.task);
    tasks.push(tokio::spawn(node.run()));

    Ok(tasks)
}

/// Point-to-point sender: poll from process start, one datagram per event.
async fn start_sender(config: &RelayConfig, token: &CancellationToken) -> Result<Vec<JoinHandle<()>>> {
    let device = device::open_device(config.device_path.as_deref())?;
    let remote = config
        .peer
        .clone()
        .ok_or_else(|| eyre!("PEER_ADDR is required in send mode"))?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .wrap_err("cannot bind datagram socket")?;
    socket
        .connect(&remote)
        .await
        .wrap_err_with(|| format!("cannot resolve remote {remote}"))?;
    info!("sending datagrams to {}", remote);

    let (raw_tx, raw_rx) = mpsc::channel(RAW_BUFFER);
    // Unobserved diagnostics channel; send errors just drop.
    let (diag_tx, _) = broadcast::channel(BROADCAST_BUFFER);

    let poller = PollerHandle::spawn(device, raw_tx, diag_tx, None, token.child_token())?;
    let sender = tokio::spawn(datagram::run_sender(socket, raw_rx, token.child_token()));

    Ok(vec![poller.task, sender])
}

/// Point-to-point receiver: replay every decoded datagram.
async fn start_receiver(
    config: &RelayConfig,
    token: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let pad = UinputPad::create("padrelay virtual pad")?;
    let engine = ReplayEngine::new(pad);

    let socket = UdpSocket::bind(config.bind)
        .await
        .wrap_err_with(|| format!("cannot bind datagram socket on {}", config.bind))?;
    info!("receiving datagrams on {}", config.bind);

    let receiver = tokio::spawn(datagram::run_receiver(socket, engine, token.child_token()));
    Ok(vec![receiver])
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
    Ok(())
}
