//! The per-symbol rolling price buffer (spec §4.2).

use std::collections::VecDeque;

use rust_decimal::Decimal;

/// Default capacity: the spec's recommended 100, comfortably above
/// `max(sma_period, rsi_period + 1, bb_period)` for the default parameters.
pub const DEFAULT_CAPACITY: usize = 100;

/// An ordered sequence of the most recent closing prices for one symbol.
/// Exactly one task ever mutates a given symbol's buffer at a time (spec §5
/// "single writer per symbol buffer") — this type itself holds no lock,
/// leaving that guarantee to whatever routes ticks to it.
#[derive(Debug, Clone)]
pub struct PriceBuffer {
    prices: VecDeque<Decimal>,
    capacity: usize,
}

impl PriceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { prices: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends a new closing price, evicting the oldest entry if this
    /// pushes the buffer over capacity.
    pub fn push(&mut self, price: Decimal) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    /// Preloads the buffer from an ordered, chronological history (spec
    /// §4.2 "on startup, preload from `price_data` in chronological
    /// order"). Replaces whatever the buffer currently holds.
    pub fn preload(&mut self, history: impl IntoIterator<Item = Decimal>) {
        self.prices.clear();
        for price in history {
            self.push(price);
        }
    }

    /// The buffer's contents as a contiguous, oldest-first slice, the shape
    /// every indicator function in [`crate::indicators`] expects.
    pub fn as_slice(&self) -> Vec<Decimal> {
        self.prices.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn evicts_oldest_once_over_capacity() {
        let mut buf = PriceBuffer::new(3);
        buf.push(dec!(1));
        buf.push(dec!(2));
        buf.push(dec!(3));
        buf.push(dec!(4));
        assert_eq!(buf.as_slice(), vec![dec!(2), dec!(3), dec!(4)]);
    }

    #[test]
    fn preload_replaces_existing_contents() {
        let mut buf = PriceBuffer::new(5);
        buf.push(dec!(99));
        buf.preload(vec![dec!(1), dec!(2), dec!(3)]);
        assert_eq!(buf.as_slice(), vec![dec!(1), dec!(2), dec!(3)]);
    }
}
