//! The application: one event loop owning all state.
//!
//! `App` wires the connection, the typed event bindings, the subscription
//! invoker and the screen together. Hub events, console input and the Ctrl+C
//! flag are multiplexed with `crossbeam_channel::select!`; every state change
//! happens here, on the loop's thread, followed by a redraw.
//!
//! Lifecycle:
//! - `new` registers the push handlers.
//! - `mount` starts the connection and draws.
//! - `unmount` stops the connection; events still in flight are dropped.
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, select, tick};
use feed_common::Result;
use feed_common::time_format::DisplayZone;
use log::{debug, error, info, warn};

use crate::bindings::{EventBindings, QuoteUpdate, TradeUpdate};
use crate::connection::{ConnectionState, HubConnection, HubConnectionBuilder, HubEvent};
use crate::console::{ConsoleInput, HELP, UserCommand};
use crate::invoker::SubscriptionInvoker;
use crate::reconnect::ReconnectPolicy;
use crate::state::{FeedState, FormState};
use crate::view::{Screen, View};

/// How often the loop checks the Ctrl+C flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Everything needed to build an [`App`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Hub to connect to.
    pub hub_url: String,
    /// Remote method behind both subscribe buttons.
    pub subscribe_method: &'static str,
    /// Open the WebSocket without negotiating.
    pub skip_negotiation: bool,
    /// Reconnect schedule; `None` disables automatic reconnect.
    pub reconnect: Option<ReconnectPolicy>,
    /// Zone timestamps are shown in.
    pub zone: DisplayZone,
    /// Clear the terminal before each redraw.
    pub clear_screen: bool,
}

impl AppConfig {
    /// Connection builder matching this configuration.
    pub fn connection_builder(&self) -> HubConnectionBuilder {
        let builder =
            HubConnectionBuilder::new(&self.hub_url).skip_negotiation(self.skip_negotiation);
        match &self.reconnect {
            Some(policy) => builder.with_reconnect_policy(policy.clone()),
            None => builder,
        }
    }
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input.
    Continue,
    /// Unmount and leave the loop.
    Exit,
}

/// The mounted feed.
pub struct App<W: Write> {
    connection: HubConnection,
    bindings: EventBindings<FeedState>,
    invoker: SubscriptionInvoker,
    state: FeedState,
    form: FormState,
    screen: Screen<W>,
    mounted: bool,
}

impl<W: Write> App<W> {
    /// Build an unmounted application drawing to `out`.
    pub fn new(config: &AppConfig, out: W) -> Self {
        Self::with_connection(config, config.connection_builder().build(), out)
    }

    /// Build around an already configured connection.
    pub fn with_connection(config: &AppConfig, connection: HubConnection, out: W) -> Self {
        let mut bindings = EventBindings::new();
        bindings
            .on::<TradeUpdate, _>(|state: &mut FeedState, trade| state.append_trade(trade))
            .on::<QuoteUpdate, _>(|state: &mut FeedState, quote| state.append_quote(quote));
        App {
            connection,
            bindings,
            invoker: SubscriptionInvoker::new(config.subscribe_method),
            state: FeedState::default(),
            form: FormState::default(),
            screen: Screen::new(View::new(config.zone), config.clear_screen, out),
            mounted: false,
        }
    }

    /// Start connecting. The push handlers are already registered.
    ///
    /// A failure to connect is only logged once the worker reports it; the
    /// returned error covers spawning the worker.
    pub fn mount(&mut self) -> Result<()> {
        self.connection.start()?;
        self.mounted = true;
        self.redraw();
        Ok(())
    }

    /// Stop the connection. Safe to call more than once.
    pub fn unmount(&mut self) {
        if self.mounted {
            info!("Unmounting, stopping connection to {}", self.connection.url());
        }
        self.mounted = false;
        self.connection.stop();
    }

    /// Whether the app is between `mount` and `unmount`.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Current feed state.
    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Current form values.
    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribe calls still waiting for their acknowledgement.
    pub fn pending_subscriptions(&self) -> usize {
        self.invoker.pending_count()
    }

    /// The screen's writer.
    pub fn output(&self) -> &W {
        self.screen.output()
    }

    fn redraw(&mut self) {
        if let Err(e) = self.screen.draw(&self.state, &self.form) {
            warn!("Redraw failed: {}", e);
        }
    }

    fn notice(&mut self, text: &str) {
        if let Err(e) = self.screen.notice(text) {
            warn!("Output failed: {}", e);
        }
    }

    /// Apply one event from the connection.
    pub fn handle_hub_event(&mut self, event: HubEvent) {
        if !self.mounted || !self.connection.observe(&event) {
            debug!("Dropping hub event after unmount: {:?}", event);
            return;
        }
        match event {
            HubEvent::Connected => info!("Connected to hub {}", self.connection.url()),
            HubEvent::StartFailed(e) => error!("Connection failed: {}", e),
            HubEvent::Reconnecting(e) => {
                warn!("Connection lost, reconnecting: {}", e);
                self.invoker.fail_pending();
            }
            HubEvent::Reconnected => info!("Reconnected to hub {}", self.connection.url()),
            HubEvent::Closed(reason) => {
                self.invoker.fail_pending();
                match reason {
                    Some(e) => error!("Connection closed: {}", e),
                    None => info!("Connection closed"),
                }
            }
            HubEvent::Invocation(invocation) => {
                if self.bindings.dispatch(&mut self.state, &invocation) > 0 {
                    self.redraw();
                }
            }
            HubEvent::Completion(completion) => {
                if self.invoker.complete(completion, &mut self.state) {
                    self.redraw();
                }
            }
        }
    }

    /// Apply one user command.
    pub fn handle_command(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::SetExchange(value) => self.form.exchange = value,
            UserCommand::SetSymbol(value) => self.form.symbol = value,
            UserCommand::SetQuoteSymbol(value) => self.form.quote_symbol = value,
            UserCommand::SubscribeTrade(fields) => {
                if let Some((exchange, symbol)) = fields {
                    self.form.exchange = exchange;
                    self.form.symbol = symbol;
                }
                self.invoker.subscribe_trade(&mut self.connection, &self.form);
            }
            UserCommand::SubscribeQuote(symbol) => {
                if let Some(symbol) = symbol {
                    self.form.quote_symbol = symbol;
                }
                self.invoker.subscribe_quote(&mut self.connection, &self.form);
            }
            UserCommand::Show => {}
            UserCommand::Help => {
                self.notice(HELP);
                return Flow::Continue;
            }
            UserCommand::Quit => return Flow::Exit,
        }
        self.redraw();
        Flow::Continue
    }

    /// Apply one console input.
    pub fn handle_console(&mut self, input: ConsoleInput) -> Flow {
        match input {
            ConsoleInput::Command(command) => self.handle_command(command),
            ConsoleInput::Rejected(reason) => {
                self.notice(&reason);
                Flow::Continue
            }
            ConsoleInput::Closed => {
                info!("Console input closed");
                Flow::Exit
            }
        }
    }

    /// Wait up to `timeout` for one hub event and apply it. Returns whether an
    /// event was received.
    pub fn step(&mut self, timeout: Duration) -> bool {
        match self.connection.events().recv_timeout(timeout) {
            Ok(event) => {
                self.handle_hub_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Run until `quit`, end of input, or `shutdown` is raised; then unmount.
    pub fn run(&mut self, console: Receiver<ConsoleInput>, shutdown: Arc<AtomicBool>) -> Result<()> {
        let hub_events = self.connection.events();
        let ticker = tick(SHUTDOWN_POLL);

        loop {
            select! {
                recv(hub_events) -> event => if let Ok(event) = event {
                    self.handle_hub_event(event);
                },
                recv(console) -> input => match input {
                    Ok(input) => if self.handle_console(input) == Flow::Exit {
                        break;
                    },
                    Err(_) => {
                        warn!("Console reader stopped unexpectedly");
                        break;
                    }
                },
                recv(ticker) -> _ => if shutdown.load(Ordering::SeqCst) {
                    info!("Ctrl+C received. Shutting down client...");
                    break;
                },
            }
        }
        self.unmount();
        Ok(())
    }
}

impl<W: Write> Drop for App<W> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleInput;
    use crossbeam_channel::unbounded;
    use feed_common::StockTrade;
    use feed_common::protocol::Invocation;
    use serde_json::json;

    fn config() -> AppConfig {
        AppConfig {
            hub_url: String::from("http://127.0.0.1:9/stock"),
            subscribe_method: "SubscribeToExchangeSymbol",
            skip_negotiation: true,
            reconnect: None,
            zone: DisplayZone::Utc,
            clear_screen: false,
        }
    }

    fn trade_push() -> HubEvent {
        HubEvent::Invocation(Invocation {
            invocation_id: None,
            target: String::from("ReceiveTradeUpdate"),
            arguments: vec![json!({
                "exchange": "V",
                "symbol": "AAPL",
                "price": 189.5,
                "size": 100,
                "timestamp": "2023-05-01T10:15:30Z"
            })],
            stream_ids: None,
        })
    }

    #[test]
    fn events_before_mount_are_ignored() {
        let mut app = App::new(&config(), Vec::new());
        app.handle_hub_event(trade_push());
        assert!(app.state().trades.is_empty());
    }

    #[test]
    fn form_commands_update_fields() {
        let mut app = App::new(&config(), Vec::new());
        app.handle_command(UserCommand::SetExchange(String::from("V")));
        app.handle_command(UserCommand::SetSymbol(String::from("AAPL")));
        app.handle_command(UserCommand::SetQuoteSymbol(String::from("MSFT")));
        assert_eq!(
            app.form(),
            &FormState {
                exchange: String::from("V"),
                symbol: String::from("AAPL"),
                quote_symbol: String::from("MSFT"),
            }
        );
    }

    #[test]
    fn subscribe_while_disconnected_only_logs() {
        let mut app = App::new(&config(), Vec::new());
        let flow = app.handle_command(UserCommand::SubscribeTrade(Some((
            String::from("V"),
            String::from("AAPL"),
        ))));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(app.pending_subscriptions(), 0);
        assert!(app.state().subscriptions.is_empty());
        assert_eq!(app.form().symbol, "AAPL");
    }

    #[test]
    fn quit_and_closed_input_exit() {
        let mut app = App::new(&config(), Vec::new());
        assert_eq!(app.handle_command(UserCommand::Quit), Flow::Exit);
        assert_eq!(app.handle_console(ConsoleInput::Closed), Flow::Exit);
        assert_eq!(
            app.handle_console(ConsoleInput::Rejected(String::from("nope"))),
            Flow::Continue
        );
        assert!(String::from_utf8_lossy(app.output()).contains("nope"));
    }

    #[test]
    fn run_exits_on_shutdown_flag() {
        let mut app = App::new(&config(), Vec::new());
        let (_console_tx, console_rx) = unbounded::<ConsoleInput>();
        let shutdown = Arc::new(AtomicBool::new(true));
        app.run(console_rx, shutdown).unwrap();
        assert!(!app.is_mounted());
    }

    #[test]
    fn mounted_app_appends_pushes() {
        let mut app = App::new(&config(), Vec::new());
        app.mount().unwrap();
        app.handle_hub_event(trade_push());
        let expected: StockTrade = serde_json::from_value(json!({
            "exchange": "V",
            "symbol": "AAPL",
            "price": 189.5,
            "size": 100,
            "timestamp": "2023-05-01T10:15:30Z"
        }))
        .unwrap();
        assert_eq!(app.state().trades, vec![expected]);
        app.unmount();
        app.handle_hub_event(trade_push());
        assert_eq!(app.state().trades.len(), 1);
    }
}
