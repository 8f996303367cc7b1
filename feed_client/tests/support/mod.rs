//! In-process stand-in for the stock hub.
//!
//! Accepts one client connection at a time. A `POST .../negotiate` request is
//! answered with connection token [`CONNECTION_TOKEN`]; anything else is taken
//! as a WebSocket upgrade. On the WebSocket it answers the handshake, records
//! every invocation and keep-alive ping it receives, and acknowledges
//! invocations according to [`Ack`]. Tests push frames to the client through
//! the control channel.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use feed_client::{App, AppConfig, ConnectionState};
use feed_common::protocol::{Close, Completion, HubMessage, Invocation};
use feed_common::time_format::DisplayZone;
use feed_common::{StockQuote, StockTrade};
use serde::Serialize;
use serde_json::json;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::{Message, WebSocket};

pub const WAIT: Duration = Duration::from_secs(5);
pub const CONNECTION_TOKEN: &str = "tok";

/// How the hub answers invocations carrying an id.
#[derive(Debug, Clone)]
pub enum Ack {
    Ok,
    Error(String),
    Silent,
}

/// How the hub answers the handshake.
#[derive(Debug, Clone)]
pub enum Handshake {
    Accept,
    Reject(String),
}

enum Control {
    Frame(String),
    DropClient,
}

/// What the hub saw, written by the accept thread.
struct Recorder {
    invocations: Sender<Invocation>,
    negotiations: Sender<String>,
    upgrades: Sender<String>,
    connections: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
}

pub struct FakeHub {
    addr: SocketAddr,
    control: Sender<Control>,
    invocations: Receiver<Invocation>,
    negotiations: Receiver<String>,
    upgrades: Receiver<String>,
    connections: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FakeHub {
    pub fn start() -> FakeHub {
        Self::start_with(Ack::Ok, Handshake::Accept)
    }

    pub fn start_with(ack: Ack, handshake: Handshake) -> FakeHub {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake hub");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");
        let (control_tx, control_rx) = unbounded();
        let (invocations_tx, invocations_rx) = unbounded();
        let (negotiations_tx, negotiations_rx) = unbounded();
        let (upgrades_tx, upgrades_rx) = unbounded();
        let connections = Arc::new(AtomicUsize::new(0));
        let pings = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let recorder = Recorder {
                invocations: invocations_tx,
                negotiations: negotiations_tx,
                upgrades: upgrades_tx,
                connections: Arc::clone(&connections),
                pings: Arc::clone(&pings),
            };
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            stream.set_nonblocking(false).expect("blocking stream");
                            if is_negotiate(&stream) {
                                answer_negotiate(stream, &recorder);
                            } else {
                                serve(stream, &ack, &handshake, &control_rx, &recorder, &stop);
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5))
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        FakeHub {
            addr,
            control: control_tx,
            invocations: invocations_rx,
            negotiations: negotiations_rx,
            upgrades: upgrades_rx,
            connections,
            pings,
            stop,
            worker: Some(worker),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/stock", self.addr)
    }

    /// Completed handshakes so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Keep-alive pings received so far.
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Request line of the next negotiate request.
    pub fn next_negotiation(&self) -> Option<String> {
        self.negotiations.recv_timeout(WAIT).ok()
    }

    /// Request URI of the next WebSocket upgrade.
    pub fn next_upgrade(&self) -> Option<String> {
        self.upgrades.recv_timeout(WAIT).ok()
    }

    pub fn push<T: Serialize>(&self, target: &str, payload: &T) {
        let frame = HubMessage::Invocation(Invocation {
            invocation_id: None,
            target: String::from(target),
            arguments: vec![serde_json::to_value(payload).expect("payload")],
            stream_ids: None,
        })
        .encode()
        .expect("encode push");
        self.control.send(Control::Frame(frame)).expect("control");
    }

    pub fn push_trade(&self, trade: &StockTrade) {
        self.push("ReceiveTradeUpdate", trade);
    }

    pub fn push_quote(&self, quote: &StockQuote) {
        self.push("ReceiveQuoteUpdate", quote);
    }

    pub fn send_close(&self, error: Option<&str>, allow_reconnect: bool) {
        let frame = HubMessage::Close(Close {
            error: error.map(String::from),
            allow_reconnect,
        })
        .encode()
        .expect("encode close");
        self.control.send(Control::Frame(frame)).expect("control");
    }

    /// Drop the TCP connection without a closing handshake.
    pub fn drop_client(&self) {
        self.control.send(Control::DropClient).expect("control");
    }

    pub fn next_invocation(&self) -> Option<Invocation> {
        self.invocations.recv_timeout(WAIT).ok()
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn is_timeout(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e)
        if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut)
}

/// Whether the connection opens with an HTTP `POST`.
fn is_negotiate(stream: &TcpStream) -> bool {
    if stream.set_read_timeout(Some(WAIT)).is_err() {
        return false;
    }
    let mut head = [0u8; 5];
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        match stream.peek(&mut head) {
            Ok(n) if n >= head.len() => return &head == b"POST ",
            Ok(0) | Err(_) => return false,
            Ok(_) => thread::sleep(Duration::from_millis(1)),
        }
    }
    false
}

/// Read one HTTP request and answer it with a version 1 negotiate response.
fn answer_negotiate(stream: TcpStream, recorder: &Recorder) {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }
    let _ = recorder
        .negotiations
        .send(String::from(request_line.trim_end()));

    let payload = json!({
        "negotiateVersion": 1,
        "connectionId": "cid",
        "connectionToken": CONNECTION_TOKEN,
        "availableTransports": [
            { "transport": "WebSockets", "transferFormats": ["Text", "Binary"] }
        ]
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        payload.len(),
        payload
    );
    let mut writer = &stream;
    let _ = writer.write_all(response.as_bytes());
    let _ = writer.flush();
}

fn serve(
    stream: TcpStream,
    ack: &Ack,
    handshake: &Handshake,
    control: &Receiver<Control>,
    recorder: &Recorder,
    stop: &AtomicBool,
) {
    let record_upgrade = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let _ = recorder.upgrades.send(request.uri().to_string());
        Ok(response)
    };
    let mut ws: WebSocket<TcpStream> = match tungstenite::accept_hdr(stream, record_upgrade) {
        Ok(ws) => ws,
        Err(_) => return,
    };
    ws.get_mut()
        .set_read_timeout(Some(Duration::from_millis(10)))
        .expect("read timeout");

    let deadline = Instant::now() + WAIT;
    loop {
        if stop.load(Ordering::SeqCst) || Instant::now() > deadline {
            return;
        }
        match ws.read() {
            Ok(Message::Text(_)) => break,
            Ok(_) => {}
            Err(e) if is_timeout(&e) => {}
            Err(_) => return,
        }
    }
    match handshake {
        Handshake::Accept => {
            if ws.send(Message::Text(String::from("{}\u{1e}"))).is_err() {
                return;
            }
        }
        Handshake::Reject(reason) => {
            let reply = format!("{}\u{1e}", serde_json::json!({ "error": reason }));
            let _ = ws.send(Message::Text(reply));
            let _ = ws.close(None);
            let _ = ws.flush();
            return;
        }
    }
    recorder.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        if stop.load(Ordering::SeqCst) {
            let _ = ws.close(None);
            let _ = ws.flush();
            return;
        }
        while let Ok(command) = control.try_recv() {
            match command {
                Control::Frame(frame) => {
                    if ws.send(Message::Text(frame)).is_err() {
                        return;
                    }
                }
                Control::DropClient => return,
            }
        }
        match ws.read() {
            Ok(Message::Text(text)) => {
                let Ok(messages) = HubMessage::parse(&text) else {
                    return;
                };
                for message in messages {
                    if message == HubMessage::Ping {
                        recorder.pings.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                    let HubMessage::Invocation(invocation) = message else {
                        continue;
                    };
                    let _ = recorder.invocations.send(invocation.clone());
                    let Some(invocation_id) = invocation.invocation_id else {
                        continue;
                    };
                    let completion = match ack {
                        Ack::Ok => Completion {
                            invocation_id,
                            result: None,
                            error: None,
                        },
                        Ack::Error(reason) => Completion {
                            invocation_id,
                            result: None,
                            error: Some(reason.clone()),
                        },
                        Ack::Silent => continue,
                    };
                    let frame = HubMessage::Completion(completion)
                        .encode()
                        .expect("encode completion");
                    if ws.send(Message::Text(frame)).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(e) if is_timeout(&e) => {}
            Err(_) => return,
        }
    }
}

pub fn config(url: &str) -> AppConfig {
    AppConfig {
        hub_url: String::from(url),
        subscribe_method: "SubscribeToTradeExchangeSymbol",
        skip_negotiation: true,
        reconnect: None,
        zone: DisplayZone::Utc,
        clear_screen: false,
    }
}

/// Step `app` until `done` holds or [`WAIT`] elapses.
pub fn wait_until<F>(app: &mut App<Vec<u8>>, mut done: F) -> bool
where
    F: FnMut(&App<Vec<u8>>) -> bool,
{
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if done(app) {
            return true;
        }
        app.step(Duration::from_millis(20));
    }
    done(app)
}

pub fn connected(app: &mut App<Vec<u8>>) -> bool {
    wait_until(app, |app| app.connection_state() == ConnectionState::Connected)
}

pub fn trade(symbol: &str, price: f64) -> StockTrade {
    StockTrade {
        market_event: Some(feed_common::MarketEvent::Trade),
        exchange: String::from("V"),
        symbol: String::from(symbol),
        price,
        size: 100.0,
        timestamp: String::from("2023-05-01T10:15:30Z"),
    }
}

pub fn quote(symbol: &str) -> StockQuote {
    StockQuote {
        market_event: Some(feed_common::MarketEvent::Quote),
        symbol: String::from(symbol),
        ask_exchange: String::from("Q"),
        ask_price: 310.25,
        ask_size: 3.0,
        bid_exchange: String::from("P"),
        bid_price: 310.2,
        bid_size: 5.0,
        timestamp: String::from("2023-05-01T10:15:30.5Z"),
    }
}
