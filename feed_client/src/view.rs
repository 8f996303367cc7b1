//! Text rendering of the feed.
//!
//! `View` turns state into the page text; `Screen` writes pages to a terminal
//! (or any `Write`), optionally clearing it first.
use std::fmt::Write as _;
use std::io::{self, Write};

use feed_common::time_format::{DisplayZone, format_timestamp};
use feed_common::{StockQuote, StockTrade};

use crate::state::{FeedState, FormState};

/// ANSI: clear screen and move the cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

/// Page renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct View {
    zone: DisplayZone,
}

impl View {
    /// Renderer showing timestamps in `zone`.
    pub fn new(zone: DisplayZone) -> Self {
        View { zone }
    }

    /// `V.AAPL → Price: 189.5 | Size: 100 | Time: 01 May 2023, 10:15:30`
    pub fn trade_line(&self, trade: &StockTrade) -> String {
        format!(
            "{}.{} → Price: {} | Size: {} | Time: {}",
            trade.exchange,
            trade.symbol,
            trade.price,
            trade.size,
            format_timestamp(&trade.timestamp, self.zone)
        )
    }

    /// `MSFT → Bid: 310.2 × 5 | Ask: 310.25 × 3 | Time: 01 May 2023, 10:15:30`
    pub fn quote_line(&self, quote: &StockQuote) -> String {
        format!(
            "{} → Bid: {} × {} | Ask: {} × {} | Time: {}",
            quote.symbol,
            quote.bid_price,
            quote.bid_size,
            quote.ask_price,
            quote.ask_size,
            format_timestamp(&quote.timestamp, self.zone)
        )
    }

    /// The whole page: forms, subscriptions, trades, quotes.
    pub fn render(&self, state: &FeedState, form: &FormState) -> String {
        let mut page = String::new();
        let _ = writeln!(page, "Live Market Feed");
        let _ = writeln!(page);
        let _ = writeln!(page, "Subscribe to Trades");
        let _ = writeln!(page, "  Exchange: {}", form.exchange);
        let _ = writeln!(page, "  Symbol: {}", form.symbol);
        let _ = writeln!(page);
        let _ = writeln!(page, "Subscribe to Quotes");
        let _ = writeln!(page, "  Symbol: {}", form.quote_symbol);
        let _ = writeln!(page);

        let _ = writeln!(page, "Active Subscriptions");
        for subscription in &state.subscriptions {
            let _ = writeln!(page, "  - {}", subscription);
        }
        let _ = writeln!(page);

        let _ = writeln!(page, "Trade Updates");
        for trade in &state.trades {
            let _ = writeln!(page, "  - {}", self.trade_line(trade));
        }
        let _ = writeln!(page);

        let _ = writeln!(page, "Quote Updates");
        for quote in &state.quotes {
            let _ = writeln!(page, "  - {}", self.quote_line(quote));
        }
        page
    }
}

/// Destination of rendered pages.
pub struct Screen<W: Write> {
    view: View,
    clear: bool,
    out: W,
}

impl<W: Write> Screen<W> {
    /// Screen writing to `out`; `clear` wipes the terminal before each page.
    pub fn new(view: View, clear: bool, out: W) -> Self {
        Screen { view, clear, out }
    }

    /// Redraw the page.
    pub fn draw(&mut self, state: &FeedState, form: &FormState) -> io::Result<()> {
        if self.clear {
            self.out.write_all(CLEAR.as_bytes())?;
        }
        self.out
            .write_all(self.view.render(state, form).as_bytes())?;
        self.out.flush()
    }

    /// Print a message below the page.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    /// The underlying writer.
    pub fn output(&self) -> &W {
        &self.out
    }
}
