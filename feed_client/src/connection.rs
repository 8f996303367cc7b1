//! The hub connection handle.
//!
//! A `HubConnection` is built once, started once per mount, and stopped on
//! unmount. Network work happens on a background worker thread (see
//! `transport`); everything the worker learns arrives on the event channel as a
//! [`HubEvent`] and is applied by the owner on its own loop. Once `stop` has
//! returned, [`HubConnection::observe`] rejects every event, so nothing that
//! arrives after teardown can reach application state.
//!
//! `stop` never blocks for longer than [`STOP_GRACE`]: a worker still stuck in
//! a connect or negotiate call after that is detached and exits on its own
//! once the call times out.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use feed_common::protocol::{Completion, HubMessage, Invocation};
use feed_common::{HubError, Result};
use log::{debug, info, warn};
use serde_json::Value;
use strum_macros::Display;

use crate::reconnect::ReconnectPolicy;
use crate::transport::Transport;

/// Send a Ping when nothing else was sent for this long.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
/// Consider the connection lost when nothing was received for this long.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);
/// Give up on the handshake after this long.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
/// Granularity at which the worker notices outbound frames and stop requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long `stop` waits for the worker before detaching it.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle state as seen by the owner of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    /// Not started, stopped, failed to start, or closed for good.
    Disconnected,
    /// Started; negotiation or handshake in progress.
    Connecting,
    /// Handshake completed; invocations are accepted.
    Connected,
    /// Lost an established connection and retrying.
    Reconnecting,
}

/// Something the worker has to tell the owner.
#[derive(Debug)]
pub enum HubEvent {
    /// The first connection attempt succeeded.
    Connected,
    /// The first connection attempt failed. No retry follows.
    StartFailed(HubError),
    /// An established connection was lost; automatic reconnect is running.
    Reconnecting(HubError),
    /// Automatic reconnect succeeded.
    Reconnected,
    /// The connection is gone for good. `None` after a requested stop.
    Closed(Option<HubError>),
    /// The server invoked a client method.
    Invocation(Invocation),
    /// The server completed one of our invocations.
    Completion(Completion),
}

/// Tunables of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Open the WebSocket directly instead of negotiating first.
    pub skip_negotiation: bool,
    /// Retry schedule after a lost connection; `None` disables reconnecting.
    pub reconnect: Option<ReconnectPolicy>,
    /// See [`DEFAULT_KEEP_ALIVE_INTERVAL`].
    pub keep_alive_interval: Duration,
    /// See [`DEFAULT_SERVER_TIMEOUT`].
    pub server_timeout: Duration,
    /// See [`DEFAULT_HANDSHAKE_TIMEOUT`].
    pub handshake_timeout: Duration,
    /// See [`DEFAULT_POLL_INTERVAL`].
    pub poll_interval: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            skip_negotiation: false,
            reconnect: None,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Builder for [`HubConnection`].
#[derive(Debug, Clone)]
pub struct HubConnectionBuilder {
    url: String,
    options: ConnectionOptions,
}

impl HubConnectionBuilder {
    /// Connection to the hub at `url` (`http`, `https`, `ws` or `wss`).
    pub fn new(url: &str) -> Self {
        HubConnectionBuilder {
            url: String::from(url),
            options: ConnectionOptions::default(),
        }
    }

    /// Reconnect on the default schedule after losing an established connection.
    pub fn with_automatic_reconnect(self) -> Self {
        self.with_reconnect_policy(ReconnectPolicy::default())
    }

    /// Reconnect on a custom schedule.
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.options.reconnect = Some(policy);
        self
    }

    /// Open the WebSocket directly, skipping the negotiate request.
    pub fn skip_negotiation(mut self, skip: bool) -> Self {
        self.options.skip_negotiation = skip;
        self
    }

    /// Override [`DEFAULT_KEEP_ALIVE_INTERVAL`].
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.options.keep_alive_interval = interval;
        self
    }

    /// Override [`DEFAULT_SERVER_TIMEOUT`].
    pub fn server_timeout(mut self, timeout: Duration) -> Self {
        self.options.server_timeout = timeout;
        self
    }

    /// Override [`DEFAULT_HANDSHAKE_TIMEOUT`].
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options.handshake_timeout = timeout;
        self
    }

    /// Build a stopped connection.
    pub fn build(self) -> HubConnection {
        let (events_tx, events_rx) = unbounded();
        HubConnection {
            url: self.url,
            options: self.options,
            state: ConnectionState::Disconnected,
            stopped: false,
            next_invocation_id: 0,
            events_tx,
            events_rx,
            outbound_tx: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
            finished: None,
        }
    }
}

/// Sink for hub method calls. Implemented by [`HubConnection`].
pub trait RemoteInvoker {
    /// Call `target` expecting a Completion; returns the invocation id.
    fn invoke(&mut self, target: &str, arguments: Vec<Value>) -> Result<String>;
}

/// Handle to one realtime connection.
pub struct HubConnection {
    url: String,
    options: ConnectionOptions,
    state: ConnectionState,
    stopped: bool,
    next_invocation_id: u64,
    events_tx: Sender<HubEvent>,
    events_rx: Receiver<HubEvent>,
    outbound_tx: Option<Sender<String>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    finished: Option<Receiver<()>>,
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        warn!("Transport worker panicked");
    }
}

impl HubConnection {
    /// Hub URL this connection was built for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Options this connection was built with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Receiving end of the event channel, for use in `select!`.
    pub fn events(&self) -> Receiver<HubEvent> {
        self.events_rx.clone()
    }

    /// Spawn the worker. The outcome arrives later as
    /// [`HubEvent::Connected`] or [`HubEvent::StartFailed`].
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() || self.state != ConnectionState::Disconnected {
            return Err(HubError::InvalidState(format!(
                "Cannot start a connection that is not in the 'Disconnected' state (current: {})",
                self.state
            )));
        }
        let (outbound_tx, outbound_rx) = unbounded();
        let (finished_tx, finished_rx) = bounded(0);
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = Transport::new(
            self.url.clone(),
            self.options.clone(),
            self.events_tx.clone(),
            outbound_rx,
            Arc::clone(&shutdown),
            finished_tx,
        );
        let worker = thread::Builder::new()
            .name(String::from("hub-transport"))
            .spawn(move || transport.run())?;

        info!("Starting connection to {}", self.url);
        self.outbound_tx = Some(outbound_tx);
        self.shutdown = shutdown;
        self.worker = Some(worker);
        self.finished = Some(finished_rx);
        self.stopped = false;
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Stop the worker and discard every undelivered event. Idempotent.
    ///
    /// Waits at most [`STOP_GRACE`] for the worker to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.outbound_tx = None;
        if let Some(worker) = self.worker.take() {
            let exited = match self.finished.take() {
                Some(finished) => {
                    !matches!(finished.recv_timeout(STOP_GRACE), Err(RecvTimeoutError::Timeout))
                }
                None => true,
            };
            if exited {
                join_worker(worker);
            } else {
                warn!(
                    "Transport worker still busy after {:?}, detaching it",
                    STOP_GRACE
                );
            }
            info!("Connection to {} stopped", self.url);
        }
        let discarded = self.events_rx.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {} undelivered events", discarded);
        }
        self.stopped = true;
        self.state = ConnectionState::Disconnected;
    }

    /// Apply `event` to the lifecycle state.
    ///
    /// Returns `false` if the event must be ignored because the connection
    /// was stopped.
    pub fn observe(&mut self, event: &HubEvent) -> bool {
        if self.stopped {
            return false;
        }
        match event {
            HubEvent::Connected | HubEvent::Reconnected => {
                self.state = ConnectionState::Connected;
            }
            HubEvent::Reconnecting(_) => {
                self.state = ConnectionState::Reconnecting;
            }
            HubEvent::StartFailed(_) | HubEvent::Closed(_) => {
                self.state = ConnectionState::Disconnected;
                self.outbound_tx = None;
                self.finished = None;
                if let Some(worker) = self.worker.take() {
                    // The worker sends its last event right before returning.
                    join_worker(worker);
                }
            }
            HubEvent::Invocation(_) | HubEvent::Completion(_) => {}
        }
        true
    }
}

impl RemoteInvoker for HubConnection {
    fn invoke(&mut self, target: &str, arguments: Vec<Value>) -> Result<String> {
        if self.state != ConnectionState::Connected {
            return Err(HubError::NotConnected(self.state.to_string()));
        }
        let outbound = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| HubError::NotConnected(self.state.to_string()))?;

        let invocation_id = self.next_invocation_id.to_string();
        let frame = HubMessage::Invocation(Invocation {
            invocation_id: Some(invocation_id.clone()),
            target: String::from(target),
            arguments,
            stream_ids: None,
        })
        .encode()?;
        outbound
            .send(frame)
            .map_err(|e| HubError::ChannelSend(e.to_string()))?;
        self.next_invocation_id += 1;
        debug!("Invoked {} (id {})", target, invocation_id);
        Ok(invocation_id)
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let connection = HubConnectionBuilder::new("http://localhost:5098/stock").build();
        assert_eq!(connection.url(), "http://localhost:5098/stock");
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(!connection.options().skip_negotiation);
        assert!(connection.options().reconnect.is_none());
        assert_eq!(connection.options().keep_alive_interval, DEFAULT_KEEP_ALIVE_INTERVAL);
        assert_eq!(connection.options().server_timeout, DEFAULT_SERVER_TIMEOUT);
    }

    #[test]
    fn automatic_reconnect_uses_default_schedule() {
        let connection = HubConnectionBuilder::new("http://localhost:5098/stock")
            .with_automatic_reconnect()
            .build();
        assert_eq!(
            connection.options().reconnect,
            Some(ReconnectPolicy::default())
        );
    }

    #[test]
    fn invoke_requires_connected_state() {
        let mut connection = HubConnectionBuilder::new("http://localhost:5098/stock").build();
        let result = connection.invoke("SubscribeToExchangeSymbol", vec![]);
        assert!(matches!(result, Err(HubError::NotConnected(state)) if state == "Disconnected"));
    }

    #[test]
    fn stopped_connection_rejects_events() {
        let mut connection = HubConnectionBuilder::new("http://localhost:5098/stock").build();
        assert!(connection.observe(&HubEvent::Reconnected));
        assert_eq!(connection.state(), ConnectionState::Connected);
        connection.stop();
        connection.stop();
        assert!(!connection.observe(&HubEvent::Connected));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn lifecycle_events_drive_state() {
        let mut connection = HubConnectionBuilder::new("http://localhost:5098/stock").build();
        connection.observe(&HubEvent::Connected);
        connection.observe(&HubEvent::Reconnecting(HubError::ConnectionClosed(String::from(
            "lost",
        ))));
        assert_eq!(connection.state(), ConnectionState::Reconnecting);
        connection.observe(&HubEvent::Closed(None));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }
}
