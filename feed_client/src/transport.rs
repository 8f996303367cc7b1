//! Background worker owning the WebSocket.
//!
//! The worker opens the socket (negotiation, TCP connect, TLS, WebSocket
//! upgrade, handshake), then loops: flush outbound frames, send a keep-alive
//! Ping when due, read with a short timeout, forward decoded messages as
//! [`HubEvent`]s. When an established session is lost it walks the reconnect
//! schedule. It never touches application state.
//!
//! The socket carries a read timeout of one poll interval from the moment it
//! is connected, so every blocking step after the TCP connect notices a stop
//! request within one poll interval.
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use feed_common::protocol::{HandshakeRequest, HandshakeResponse, HubMessage};
use feed_common::{HubError, Result};
use log::{debug, error, info, warn};
use native_tls::{TlsConnector, TlsStream};
use reqwest::Url;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, Message, WebSocket};

use crate::connection::{ConnectionOptions, HubEvent};
use crate::negotiate::{negotiate, websocket_url};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Why a session loop returned.
#[derive(Debug)]
enum SessionEnd {
    /// `stop` was requested or the owner went away.
    Stopped,
    /// The connection broke or the server closed it.
    Lost {
        error: HubError,
        allow_reconnect: bool,
    },
}

impl SessionEnd {
    fn lost(error: HubError) -> Self {
        SessionEnd::Lost {
            error,
            allow_reconnect: true,
        }
    }
}

pub(crate) struct Transport {
    url: String,
    options: ConnectionOptions,
    events: Sender<HubEvent>,
    outbound: Receiver<String>,
    shutdown: Arc<AtomicBool>,
    /// Dropped when the worker exits; the owner waits for the disconnect.
    _finished: Sender<()>,
}

fn transport_error(err: tungstenite::Error) -> HubError {
    HubError::Transport(err.to_string())
}

fn is_timeout(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e)
        if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut)
}

/// TCP connect to the first address of `url` that answers within `timeout`.
fn connect_stream(url: &Url, timeout: Duration) -> Result<TcpStream> {
    let mut last_error = None;
    for addr in url.socket_addrs(|| None)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.map_or_else(
        || HubError::Transport(format!("{} did not resolve to any address", url)),
        HubError::Io,
    ))
}

fn close_socket(socket: &mut Socket) {
    if let Err(e) = socket.close(None) {
        debug!("Close frame not sent: {}", e);
    }
    let _ = socket.flush();
}

impl Transport {
    pub(crate) fn new(
        url: String,
        options: ConnectionOptions,
        events: Sender<HubEvent>,
        outbound: Receiver<String>,
        shutdown: Arc<AtomicBool>,
        finished: Sender<()>,
    ) -> Self {
        Transport {
            url,
            options,
            events,
            outbound,
            shutdown,
            _finished: finished,
        }
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Send `event` to the owner; `false` once stopped or if nobody listens.
    fn emit(&self, event: HubEvent) -> bool {
        !self.stopping() && self.events.send(event).is_ok()
    }

    pub(crate) fn run(self) {
        let (mut socket, mut backlog) = match self.open() {
            Ok(opened) => opened,
            Err(e) => {
                self.emit(HubEvent::StartFailed(e));
                return;
            }
        };
        info!("Connected to hub at {}", self.url);
        if !self.emit(HubEvent::Connected) {
            close_socket(&mut socket);
            return;
        }

        loop {
            let end = self.session(&mut socket, backlog);
            close_socket(&mut socket);
            let (error, allow_reconnect) = match end {
                SessionEnd::Stopped => {
                    self.emit(HubEvent::Closed(None));
                    return;
                }
                SessionEnd::Lost {
                    error,
                    allow_reconnect,
                } => (error, allow_reconnect),
            };
            let discarded = self.outbound.try_iter().count();
            if discarded > 0 {
                debug!("Dropped {} frames queued for the lost connection", discarded);
            }
            if !allow_reconnect || self.options.reconnect.is_none() {
                error!("Connection to {} closed: {}", self.url, error);
                self.emit(HubEvent::Closed(Some(error)));
                return;
            }

            warn!("Connection to {} lost: {}", self.url, error);
            if !self.emit(HubEvent::Reconnecting(error)) {
                return;
            }
            match self.reconnect() {
                Ok((reopened, reopened_backlog)) => {
                    info!("Reconnected to hub at {}", self.url);
                    if !self.emit(HubEvent::Reconnected) {
                        let mut reopened = reopened;
                        close_socket(&mut reopened);
                        return;
                    }
                    socket = reopened;
                    backlog = reopened_backlog;
                }
                Err(None) => {
                    self.emit(HubEvent::Closed(None));
                    return;
                }
                Err(Some(e)) => {
                    error!("Reconnect to {} gave up: {}", self.url, e);
                    self.emit(HubEvent::Closed(Some(e)));
                    return;
                }
            }
        }
    }

    /// Walk the reconnect schedule. `Err(None)` means stop was requested.
    fn reconnect(&self) -> std::result::Result<(Socket, Vec<HubMessage>), Option<HubError>> {
        let mut policy = match self.options.reconnect.clone() {
            Some(policy) => policy,
            None => return Err(Some(HubError::ConnectionClosed(String::from("reconnect disabled")))),
        };
        policy.reset();
        let mut last_error = None;

        while let Some(delay) = policy.next_delay() {
            if !self.wait(delay) {
                return Err(None);
            }
            info!(
                "Reconnect attempt {} of {} to {}",
                policy.attempt_count(),
                policy.max_attempts(),
                self.url
            );
            match self.open() {
                Ok(opened) => return Ok(opened),
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", policy.attempt_count(), e);
                    last_error = Some(e);
                }
            }
            if self.stopping() {
                return Err(None);
            }
        }
        Err(Some(HubError::ConnectionClosed(format!(
            "Reconnect retries have been exhausted after {} attempts{}",
            policy.attempt_count(),
            last_error
                .map(|e| format!(" (last error: {})", e))
                .unwrap_or_default()
        ))))
    }

    /// Sleep for `delay` in poll-sized slices. `false` if stop was requested.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        while Instant::now() < deadline {
            if self.stopping() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            thread::sleep(left.min(self.options.poll_interval));
        }
        !self.stopping()
    }

    /// `Err` once stop was requested or `deadline` passed during `stage`.
    fn check_deadline(&self, deadline: Instant, stage: &str) -> Result<()> {
        if self.stopping() {
            return Err(HubError::ConnectionClosed(String::from(
                "The connection was stopped during negotiation.",
            )));
        }
        if Instant::now() >= deadline {
            return Err(HubError::Handshake(format!(
                "{} did not complete within {:?}.",
                stage, self.options.handshake_timeout
            )));
        }
        Ok(())
    }

    /// Negotiate, upgrade and handshake. Returns the socket and whatever hub
    /// messages arrived in the same frame as the handshake response.
    fn open(&self) -> Result<(Socket, Vec<HubMessage>)> {
        let ws_url = if self.options.skip_negotiation {
            websocket_url(&self.url, None, None)?
        } else {
            negotiate(&self.url, self.options.handshake_timeout)?
        };
        let deadline = Instant::now() + self.options.handshake_timeout;
        debug!("Opening WebSocket {}", ws_url);
        let mut socket = self.upgrade(&ws_url, deadline)?;

        socket
            .send(Message::Text(HandshakeRequest::default().encode()?))
            .map_err(transport_error)?;

        loop {
            if let Err(e) = self.check_deadline(deadline, "Handshake") {
                close_socket(&mut socket);
                return Err(e);
            }
            match socket.read() {
                Ok(Message::Text(text)) => {
                    let (response, rest) = HandshakeResponse::parse(&text)?;
                    response.into_result()?;
                    debug!("Server handshake complete");
                    let backlog = HubMessage::parse(rest)?;
                    return Ok((socket, backlog));
                }
                Ok(Message::Close(_)) => {
                    return Err(HubError::Handshake(String::from(
                        "Connection closed before a handshake response arrived.",
                    )));
                }
                Ok(_) => {}
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(transport_error(e)),
            }
        }
    }

    /// TCP connect, TLS for `wss`, then the WebSocket upgrade.
    fn upgrade(&self, url: &Url, deadline: Instant) -> Result<Socket> {
        let stream = connect_stream(url, self.options.handshake_timeout)?;
        stream.set_read_timeout(Some(self.options.poll_interval))?;
        stream.set_write_timeout(Some(self.options.handshake_timeout))?;
        let stream = match url.scheme() {
            "wss" => MaybeTlsStream::NativeTls(self.tls(url, stream, deadline)?),
            _ => MaybeTlsStream::Plain(stream),
        };

        let mut attempt = tungstenite::client(url.as_str(), stream);
        loop {
            match attempt {
                Ok((socket, _)) => return Ok(socket),
                Err(HandshakeError::Interrupted(mid)) => {
                    self.check_deadline(deadline, "WebSocket upgrade")?;
                    attempt = mid.handshake();
                }
                Err(HandshakeError::Failure(e)) => return Err(transport_error(e)),
            }
        }
    }

    fn tls(&self, url: &Url, stream: TcpStream, deadline: Instant) -> Result<TlsStream<TcpStream>> {
        let domain = url
            .host_str()
            .ok_or_else(|| HubError::Transport(format!("no host in {}", url)))?;
        let connector = TlsConnector::new().map_err(|e| HubError::Transport(e.to_string()))?;

        let mut attempt = connector.connect(domain, stream);
        loop {
            match attempt {
                Ok(tls) => return Ok(tls),
                Err(native_tls::HandshakeError::WouldBlock(mid)) => {
                    self.check_deadline(deadline, "TLS handshake")?;
                    attempt = mid.handshake();
                }
                Err(native_tls::HandshakeError::Failure(e)) => {
                    return Err(HubError::Transport(e.to_string()));
                }
            }
        }
    }

    /// Pump one established session until it ends.
    fn session(&self, socket: &mut Socket, backlog: Vec<HubMessage>) -> SessionEnd {
        for message in backlog {
            if let Some(end) = self.deliver(message) {
                return end;
            }
        }
        let mut last_sent = Instant::now();
        let mut last_received = Instant::now();

        loop {
            if self.stopping() {
                return SessionEnd::Stopped;
            }

            loop {
                match self.outbound.try_recv() {
                    Ok(frame) => {
                        if let Err(e) = socket.send(Message::Text(frame)) {
                            return SessionEnd::lost(transport_error(e));
                        }
                        last_sent = Instant::now();
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return SessionEnd::Stopped,
                }
            }

            if last_sent.elapsed() >= self.options.keep_alive_interval {
                let ping = match HubMessage::Ping.encode() {
                    Ok(ping) => ping,
                    Err(e) => return SessionEnd::lost(e),
                };
                if let Err(e) = socket.send(Message::Text(ping)) {
                    return SessionEnd::lost(transport_error(e));
                }
                debug!("Keep-alive ping sent");
                last_sent = Instant::now();
            }

            match socket.read() {
                Ok(Message::Text(text)) => {
                    last_received = Instant::now();
                    let messages = match HubMessage::parse(&text) {
                        Ok(messages) => messages,
                        Err(e) => return SessionEnd::lost(e),
                    };
                    for message in messages {
                        if let Some(end) = self.deliver(message) {
                            return end;
                        }
                    }
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| String::from("WebSocket closed by the server."));
                    return SessionEnd::lost(HubError::ConnectionClosed(reason));
                }
                Ok(Message::Binary(_)) => {
                    last_received = Instant::now();
                    warn!("Ignoring binary frame on a text protocol connection");
                }
                Ok(_) => last_received = Instant::now(),
                Err(e) if is_timeout(&e) => {}
                Err(e) => return SessionEnd::lost(transport_error(e)),
            }

            if last_received.elapsed() > self.options.server_timeout {
                return SessionEnd::lost(HubError::ConnectionClosed(format!(
                    "Server timeout elapsed without receiving a message from the server ({:?}).",
                    self.options.server_timeout
                )));
            }
        }
    }

    /// Forward one decoded message. `Some` ends the session.
    fn deliver(&self, message: HubMessage) -> Option<SessionEnd> {
        match message {
            HubMessage::Invocation(invocation) => {
                if !self.emit(HubEvent::Invocation(invocation)) {
                    return Some(SessionEnd::Stopped);
                }
            }
            HubMessage::Completion(completion) => {
                if !self.emit(HubEvent::Completion(completion)) {
                    return Some(SessionEnd::Stopped);
                }
            }
            HubMessage::Ping => debug!("Ping received"),
            HubMessage::Close(close) => {
                let reason = close.error.map_or_else(
                    || String::from("Server closed the connection."),
                    |e| format!("Server returned an error on close: {}", e),
                );
                return Some(SessionEnd::Lost {
                    error: HubError::ConnectionClosed(reason),
                    allow_reconnect: close.allow_reconnect,
                });
            }
            other => debug!("Ignoring hub message of type {}", other.message_type()),
        }
        None
    }
}
