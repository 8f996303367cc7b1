//! Line console standing in for the subscribe form.
//!
//! A background thread reads lines, parses them into [`UserCommand`]s and
//! hands them to the event loop over a channel. End of input is reported as
//! [`ConsoleInput::Closed`].
use std::io::BufRead;
use std::str::FromStr;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use feed_common::HubError;
use log::{debug, error};

/// Help text printed by `help`.
pub const HELP: &str = "\
Commands:
  exchange <value>            set the trade form exchange
  symbol <value>              set the trade form symbol
  quote-symbol <value>        set the quote form symbol
  trade [<exchange> <symbol>] subscribe to trades
  quote [<symbol>]            subscribe to quotes
  show                        redraw the page
  help                        this text
  quit                        disconnect and exit";

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Set the trade form exchange.
    SetExchange(String),
    /// Set the trade form symbol.
    SetSymbol(String),
    /// Set the quote form symbol.
    SetQuoteSymbol(String),
    /// Press "Subscribe to Trades", optionally filling exchange and symbol first.
    SubscribeTrade(Option<(String, String)>),
    /// Press "Subscribe to Quotes", optionally filling the quote symbol first.
    SubscribeQuote(Option<String>),
    /// Redraw.
    Show,
    /// Print the command list.
    Help,
    /// Unmount and exit.
    Quit,
}

impl FromStr for UserCommand {
    type Err = HubError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let keyword = words
            .next()
            .ok_or_else(|| HubError::Command(String::from("empty line")))?
            .to_lowercase();
        let rest: Vec<&str> = words.collect();

        let command = match (keyword.as_str(), rest.as_slice()) {
            ("exchange", value) => UserCommand::SetExchange(value.join(" ")),
            ("symbol", value) => UserCommand::SetSymbol(value.join(" ")),
            ("quote-symbol" | "quotesymbol", value) => UserCommand::SetQuoteSymbol(value.join(" ")),
            ("trade", []) => UserCommand::SubscribeTrade(None),
            ("trade", [exchange, symbol]) => {
                UserCommand::SubscribeTrade(Some((exchange.to_string(), symbol.to_string())))
            }
            ("trade", _) => {
                return Err(HubError::Command(String::from(
                    "usage: trade [<exchange> <symbol>]",
                )));
            }
            ("quote", []) => UserCommand::SubscribeQuote(None),
            ("quote", [symbol]) => UserCommand::SubscribeQuote(Some(symbol.to_string())),
            ("quote", _) => return Err(HubError::Command(String::from("usage: quote [<symbol>]"))),
            ("show" | "list", []) => UserCommand::Show,
            ("help" | "?", _) => UserCommand::Help,
            ("quit" | "exit", []) => UserCommand::Quit,
            (other, _) => {
                return Err(HubError::Command(format!(
                    "unknown command '{}', type `help`",
                    other
                )));
            }
        };
        Ok(command)
    }
}

/// What the console thread hands to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// A parsed command.
    Command(UserCommand),
    /// A line that did not parse, with the reason.
    Rejected(String),
    /// Input ended.
    Closed,
}

impl ConsoleInput {
    /// Classify one input line; blank lines yield `None`.
    pub fn from_line(line: &str) -> Option<ConsoleInput> {
        if line.trim().is_empty() {
            return None;
        }
        Some(match line.parse::<UserCommand>() {
            Ok(command) => ConsoleInput::Command(command),
            Err(e) => ConsoleInput::Rejected(e.to_string()),
        })
    }
}

/// Spawn the reader thread.
pub fn spawn_reader<R>(reader: R, tx: Sender<ConsoleInput>) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name(String::from("console"))
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Console read error: {}", e);
                        break;
                    }
                };
                if let Some(input) = ConsoleInput::from_line(&line) {
                    if tx.send(input).is_err() {
                        debug!("Event loop gone, console reader stopping");
                        return;
                    }
                }
            }
            let _ = tx.send(ConsoleInput::Closed);
        })
}
