//! Discriminator carried by every market payload and subscription.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{Display, EnumString};

/// Kind of market data a payload or subscription refers to.
///
/// On the wire the hub sends the numeric value (`0`, `1`); a hub configured
/// with a string enum converter sends the name instead. Both are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum MarketEvent {
    /// Executed trades.
    Trade = 0,
    /// Best bid/ask quotes.
    Quote = 1,
}

impl MarketEvent {
    /// Numeric wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Self::code`].
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(MarketEvent::Trade),
            1 => Some(MarketEvent::Quote),
            _ => None,
        }
    }
}

impl Serialize for MarketEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

struct MarketEventVisitor;

impl Visitor<'_> for MarketEventVisitor {
    type Value = MarketEvent;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a market event code (0, 1) or name (Trade, Quote)")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MarketEvent, E> {
        MarketEvent::from_code(v)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MarketEvent, E> {
        u64::try_from(v)
            .ok()
            .and_then(MarketEvent::from_code)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MarketEvent, E> {
        MarketEvent::from_str(v).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for MarketEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MarketEventVisitor)
    }
}
