//! In-memory candle aggregation and the last-tick price cache.
//!
//! Both structures are plain, synchronous, single-threaded collections; the
//! pipeline that owns them serializes access behind its own per-symbol
//! routing rather than sprinkling locks through this module (spec §4.1
//! "single writer per symbol").

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use core_types::{Candle, PriceTick};
use rust_decimal::Decimal;

const INTERVAL: &str = "1m";

/// Truncates a timestamp down to the start of its containing minute.
fn minute_bucket(time: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(time.year(), time.month(), time.day(), time.hour(), time.minute(), 0)
        .single()
        .expect("a valid UTC timestamp always has a valid minute-truncated form")
}

use chrono::Datelike;

/// Accumulates OHLCV bars per `(symbol, minute bucket)`. A tick belonging to
/// a bucket that has not been seen yet opens a new bar; one belonging to an
/// existing bucket updates high/low/close/volume in place (spec §3 upsert
/// semantics on `(time, exchange, symbol, interval)`).
#[derive(Default)]
pub struct CandleAggregator {
    bars: HashMap<(String, DateTime<Utc>), Candle>,
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a tick into its minute bucket's bar, creating the bar if this is
    /// the first tick seen for it.
    pub fn ingest(&mut self, tick: &PriceTick) {
        let bucket = minute_bucket(tick.time);
        let key = (tick.symbol.clone(), bucket);

        self.bars
            .entry(key)
            .and_modify(|c| {
                c.high = c.high.max(tick.price);
                c.low = c.low.min(tick.price);
                c.close = tick.price;
                c.volume += tick.volume;
            })
            .or_insert_with(|| Candle {
                time: bucket,
                exchange: tick.exchange.clone(),
                symbol: tick.symbol.clone(),
                interval: INTERVAL.to_string(),
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume: tick.volume,
            });
    }

    /// Returns every bar currently held, for a flush pass. Bars older than
    /// the current minute are dropped after being returned: once a bucket
    /// closes, further ticks for it are not expected, and retaining it would
    /// grow the map without bound across a long-running process.
    pub fn drain_for_flush(&mut self) -> Vec<Candle> {
        let current_bucket = minute_bucket(Utc::now());
        let bars: Vec<Candle> = self.bars.values().cloned().collect();
        self.bars.retain(|(_, bucket), _| *bucket >= current_bucket);
        bars
    }

    #[cfg(test)]
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }
}

/// The last known price per symbol, with an explicit staleness check (spec
/// §4.1: a tick older than one minute is stale).
#[derive(Default)]
pub struct PriceCache {
    last: HashMap<String, PriceTick>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, tick: PriceTick) {
        self.last.insert(tick.symbol.clone(), tick);
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceTick> {
        self.last.get(symbol)
    }

    /// Whether the last known tick for `symbol` is older than one minute, or
    /// there is no tick at all.
    pub fn is_stale(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        match self.last.get(symbol) {
            Some(tick) => now - tick.time > Duration::minutes(1),
            None => true,
        }
    }

    /// Every symbol this cache has ever seen a tick for, alongside its last
    /// tick time — used by the gap-detection sweep.
    pub fn last_seen_times(&self) -> Vec<(String, DateTime<Utc>)> {
        self.last.iter().map(|(symbol, tick)| (symbol.clone(), tick.time)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal, time: DateTime<Utc>) -> PriceTick {
        PriceTick { exchange: "paper".to_string(), symbol: symbol.to_string(), price, volume: dec!(1), time }
    }

    #[test]
    fn ticks_in_the_same_minute_update_one_bar() {
        let mut agg = CandleAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap();
        let t1 = t0 + Duration::seconds(20);

        agg.ingest(&tick("BTCUSDT", dec!(100), t0));
        agg.ingest(&tick("BTCUSDT", dec!(105), t1));

        assert_eq!(agg.bar_count(), 1);
        let bars = agg.drain_for_flush();
        let bar = bars.iter().find(|b| b.symbol == "BTCUSDT").unwrap();
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.high, dec!(105));
        assert_eq!(bar.close, dec!(105));
    }

    #[test]
    fn ticks_in_different_minutes_open_distinct_bars() {
        let mut agg = CandleAggregator::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap();
        let t1 = t0 + Duration::minutes(1);

        agg.ingest(&tick("BTCUSDT", dec!(100), t0));
        agg.ingest(&tick("BTCUSDT", dec!(110), t1));

        assert_eq!(agg.bar_count(), 2);
    }

    #[test]
    fn stale_when_no_tick_seen() {
        let cache = PriceCache::new();
        assert!(cache.is_stale("BTCUSDT", Utc::now()));
    }

    #[test]
    fn stale_after_one_minute() {
        let mut cache = PriceCache::new();
        let t0 = Utc::now() - Duration::minutes(2);
        cache.update(tick("BTCUSDT", dec!(100), t0));
        assert!(cache.is_stale("BTCUSDT", Utc::now()));
    }

    #[test]
    fn not_stale_within_one_minute() {
        let mut cache = PriceCache::new();
        cache.update(tick("BTCUSDT", dec!(100), Utc::now()));
        assert!(!cache.is_stale("BTCUSDT", Utc::now()));
    }
}
