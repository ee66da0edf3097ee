//! Background task draining the physical device.
//!
//! The poller starts Idle and transitions to Polling either immediately (the
//! point-to-point sender) or once the first observer or peer connects (the
//! socket-server variant, mirroring the original behavior of starting the
//! loop on the first client). There is no transition back: once polling, the
//! loop runs until shutdown; disconnects do not stop it.

use std::time::Duration;

use evdev::{Device, EventStream};
use statum::{machine, state};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{self, DeviceError};
use crate::protocol::{RawEvent, WireMessage};

/// Backoff after a transient device read failure.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Idle,
    Polling,
}

#[machine]
pub struct Poller<S: PollerState> {
    stream: EventStream,
    raw_tx: mpsc::Sender<RawEvent>,
    diag_tx: broadcast::Sender<WireMessage>,
    token: CancellationToken,
}

impl Poller<Idle> {
    pub fn create(
        device: Device,
        raw_tx: mpsc::Sender<RawEvent>,
        diag_tx: broadcast::Sender<WireMessage>,
        token: CancellationToken,
    ) -> Result<Self, DeviceError> {
        let stream = device.into_event_stream().map_err(DeviceError::Stream)?;
        Ok(Self::new(stream, raw_tx, diag_tx, token))
    }

    /// Hold in Idle until the first connection is signalled.
    pub async fn wait_for_start(self, start: watch::Receiver<bool>) -> Poller<Polling> {
        match await_start(&self.token, start).await {
            StartOutcome::Started => info!("starting device poll loop"),
            StartOutcome::Cancelled => debug!("shutdown requested while idle"),
        }
        self.transition()
    }

    /// Skip the Idle phase (point-to-point variant polls from process start).
    pub fn start(self) -> Poller<Polling> {
        info!("starting device poll loop");
        self.transition()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StartOutcome {
    Started,
    Cancelled,
}

/// Block until the start signal flips or shutdown is requested. A dropped
/// signal sender counts as started so a poller is never stranded in Idle.
async fn await_start(token: &CancellationToken, mut start: watch::Receiver<bool>) -> StartOutcome {
    tokio::select! {
        _ = token.cancelled() => StartOutcome::Cancelled,
        res = start.wait_for(|started| *started) => {
            if res.is_err() {
                warn!("start signal dropped before first connection");
            }
            StartOutcome::Started
        }
    }
}

impl Poller<Polling> {
    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                _ = self.token.cancelled() => {
                    info!("device poll loop stopped");
                    return;
                }
                res = self.stream.next_event() => res,
            };

            match event {
                Ok(event) => {
                    let Some(raw) = device::raw_event(event) else {
                        continue;
                    };
                    debug!("raw event: {:?}", raw);
                    if self.raw_tx.send(raw).await.is_err() {
                        warn!("raw event channel closed, stopping poll loop");
                        return;
                    }
                }
                Err(e) => {
                    // Transient read failures are reported and retried,
                    // never fatal.
                    warn!("device read failed: {}", e);
                    let _ = self.diag_tx.send(WireMessage::GamepadError {
                        message: e.to_string(),
                    });
                    tokio::select! {
                        _ = self.token.cancelled() => return,
                        _ = tokio::time::sleep(READ_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Spawns the poller as a tokio task.
pub struct PollerHandle {
    pub task: JoinHandle<()>,
}

impl PollerHandle {
    /// With `start` the poller waits in Idle for the first connection;
    /// without it polling begins immediately.
    pub fn spawn(
        device: Device,
        raw_tx: mpsc::Sender<RawEvent>,
        diag_tx: broadcast::Sender<WireMessage>,
        start: Option<watch::Receiver<bool>>,
        token: CancellationToken,
    ) -> Result<Self, DeviceError> {
        let poller = Poller::create(device, raw_tx, diag_tx, token)?;
        let task = tokio::spawn(async move {
            let polling = match start {
                Some(start) => poller.wait_for_start(start).await,
                None => poller.start(),
            };
            polling.run().await;
        });
        Ok(Self { task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellation_while_idle_is_not_a_start() {
        let token = CancellationToken::new();
        let (_start_tx, start_rx) = watch::channel(false);
        token.cancel();

        assert_eq!(await_start(&token, start_rx).await, StartOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_first_connection_signal_starts() {
        let token = CancellationToken::new();
        let (start_tx, start_rx) = watch::channel(false);
        start_tx.send(true).unwrap();

        assert_eq!(await_start(&token, start_rx).await, StartOutcome::Started);
    }

    #[tokio::test]
    async fn test_dropped_start_signal_still_starts() {
        let token = CancellationToken::new();
        let (start_tx, start_rx) = watch::channel(false);
        drop(start_tx);

        assert_eq!(await_start(&token, start_rx).await, StartOutcome::Started);
    }
}
