use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Open/high/low/close for the current session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

/// Latest market-data snapshot for a symbol
///
/// Every `market_data` event carries a complete quote; a newer quote for the
/// same symbol replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: Symbol,
    pub last_price: Price,
    pub volume: Quantity,
    pub bid: Price,
    pub ask: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ohlc: Option<Ohlc>,
    /// Absolute change since the session open
    pub change: Decimal,
    pub change_percent: Decimal,
    /// When the backend produced this quote (used for latency sampling)
    pub timestamp: Timestamp,
}

impl Quote {
    /// Create a quote with zero change and no OHLC
    pub fn new(
        symbol: impl Into<Symbol>,
        last_price: Price,
        bid: Price,
        ask: Price,
        volume: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            volume,
            bid,
            ask,
            ohlc: None,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            timestamp,
        }
    }

    /// Attach session OHLC and derive change / change percent from the open
    pub fn with_ohlc(mut self, ohlc: Ohlc) -> Self {
        self.change = self.last_price - ohlc.open;
        self.change_percent = if ohlc.open.is_zero() {
            Decimal::ZERO
        } else {
            (self.change / ohlc.open * Decimal::ONE_HUNDRED).round_dp(4)
        };
        self.ohlc = Some(ohlc);
        self
    }

    /// Bid/ask spread
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Mid price between bid and ask
    pub fn mid(&self) -> Price {
        (self.bid + self.ask) / Decimal::TWO
    }
}
