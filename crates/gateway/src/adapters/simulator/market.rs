//! Random-walk quote generation

use rand::Rng;
use rust_decimal::Decimal;
use tradedesk_core::{Ohlc, Price, Quote, Timestamp};

/// Per-symbol price path with session OHLC and cumulative volume
#[derive(Debug, Clone)]
pub struct PriceWalk {
    symbol: String,
    last: Price,
    open: Price,
    high: Price,
    low: Price,
    volume: Decimal,
}

impl PriceWalk {
    pub fn new(symbol: impl Into<String>, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            last: price,
            open: price,
            high: price,
            low: price,
            volume: Decimal::ZERO,
        }
    }

    pub fn last(&self) -> Price {
        self.last
    }

    /// Move the price by up to `max_step_bps` in either direction and quote it
    pub fn step<R: Rng>(
        &mut self,
        rng: &mut R,
        max_step_bps: i64,
        spread: Decimal,
        timestamp: Timestamp,
    ) -> Quote {
        let bound = max_step_bps.max(0);
        let step_bps = rng.gen_range(-bound..=bound);
        let next = (self.last + self.last * Decimal::new(step_bps, 4)).round_dp(2);
        // Never walk to zero or below
        self.last = if next > Decimal::ZERO { next } else { self.last };
        self.high = self.high.max(self.last);
        self.low = self.low.min(self.last);
        self.volume += Decimal::from(rng.gen_range(1..=500_i64));

        self.quote(spread, timestamp)
    }

    /// Quote the current price without moving it
    pub fn quote(&self, spread: Decimal, timestamp: Timestamp) -> Quote {
        let half = spread / Decimal::TWO;
        Quote::new(
            self.symbol.clone(),
            self.last,
            self.last - half,
            self.last + half,
            self.volume,
            timestamp,
        )
        .with_ohlc(Ohlc {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.last,
        })
    }
}
