//! Pure indicator functions over an explicit bounded price slice.
//!
//! These are deliberately *not* stateful streaming indicators: the signal
//! engine's determinism law (spec §8 — identical buffer and current price
//! must produce identical signals) and its startup behavior (preload the
//! buffer from `price_data`, then recompute) both require recomputing from
//! a plain slice rather than folding a stream one value at a time. `prices`
//! is always oldest-first, newest-last, matching the order the buffer
//! evicts from.
//!
//! Money stays `Decimal` throughout; `f64` is used only for the RSI and
//! Bollinger standard-deviation intermediates, per spec §9's floating-point
//! hygiene rule, and is converted back to `Decimal` before the result
//! leaves this module.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Arithmetic mean of the last `period` entries. Zero (undefined, per
/// spec §4.2) if the slice is shorter than `period`.
pub fn sma(prices: &[Decimal], period: usize) -> Decimal {
    if period == 0 || prices.len() < period {
        return Decimal::ZERO;
    }
    let window = &prices[prices.len() - period..];
    let sum: Decimal = window.iter().sum();
    sum / Decimal::from(period)
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// entries and then recursed forward over the rest of the slice (spec
/// §4.2). Zero if the slice is shorter than `period`.
pub fn ema(prices: &[Decimal], period: usize) -> Decimal {
    if period == 0 || prices.len() < period {
        return Decimal::ZERO;
    }

    let multiplier = Decimal::TWO / Decimal::from(period + 1);
    let mut value = sma(&prices[..period], period);

    for price in &prices[period..] {
        value = (*price - value) * multiplier + value;
    }

    value
}

/// Relative Strength Index over the last `period` intervals (spec §4.2).
/// Returns a neutral 50 if the slice has fewer than `period + 1` entries
/// (not enough intervals to compute a gain/loss average), and 100 if there
/// has been no loss at all in the window.
pub fn rsi(prices: &[Decimal], period: usize) -> Decimal {
    if period == 0 || prices.len() < period + 1 {
        return Decimal::from(50);
    }

    let window = &prices[prices.len() - (period + 1)..];
    let mut gain_sum = 0f64;
    let mut loss_sum = 0f64;

    for pair in window.windows(2) {
        let delta = (pair[1] - pair[0]).to_f64().unwrap_or(0.0);
        if delta > 0.0 {
            gain_sum += delta;
        } else {
            loss_sum += -delta;
        }
    }

    if loss_sum == 0.0 {
        return Decimal::from(100);
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;
    let rs = avg_gain / avg_loss;
    let value = 100.0 - 100.0 / (1.0 + rs);

    Decimal::from_f64(value).unwrap_or(Decimal::from(50))
}

/// Bollinger Bands: a moving mean with a volatility envelope at `k`
/// standard deviations (spec §4.2). The standard deviation uses a
/// population-style divisor of `period` rather than `period - 1`. All-zero
/// if the slice is shorter than `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerBands {
    pub middle: Decimal,
    pub upper: Decimal,
    pub lower: Decimal,
}

pub fn bollinger(prices: &[Decimal], period: usize, k: Decimal) -> BollingerBands {
    if period == 0 || prices.len() < period {
        return BollingerBands { middle: Decimal::ZERO, upper: Decimal::ZERO, lower: Decimal::ZERO };
    }

    let window = &prices[prices.len() - period..];
    let middle = sma(window, period);
    let middle_f64 = middle.to_f64().unwrap_or(0.0);

    let variance = window
        .iter()
        .map(|p| {
            let diff = p.to_f64().unwrap_or(0.0) - middle_f64;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    let std_dev = variance.sqrt();
    let std_dev_decimal = Decimal::from_f64(std_dev).unwrap_or(Decimal::ZERO);

    BollingerBands {
        middle,
        upper: middle + k * std_dev_decimal,
        lower: middle - k * std_dev_decimal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn prices(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|v| Decimal::from(*v)).collect()
    }

    #[test]
    fn sma_is_undefined_below_period() {
        assert_eq!(sma(&prices(&[1, 2]), 5), Decimal::ZERO);
    }

    #[test]
    fn sma_averages_the_trailing_window() {
        let p = prices(&[1, 2, 3, 4, 5]);
        assert_eq!(sma(&p, 3), dec!(4)); // (3+4+5)/3
    }

    #[test]
    fn rsi_is_neutral_with_insufficient_history() {
        assert_eq!(rsi(&prices(&[100, 101]), 14), dec!(50));
    }

    #[test]
    fn rsi_is_100_when_strictly_rising() {
        let rising: Vec<Decimal> = (0..15).map(|i| Decimal::from(100 + i)).collect();
        assert_eq!(rsi(&rising, 14), dec!(100));
    }

    #[test]
    fn rsi_is_low_when_strictly_falling() {
        let falling: Vec<Decimal> = (0..15).map(|i| Decimal::from(200 - i)).collect();
        let value = rsi(&falling, 14);
        assert_eq!(value, Decimal::ZERO);
    }

    #[test]
    fn bollinger_bands_are_symmetric_around_the_middle() {
        let p = prices(&[10, 12, 11, 13, 12, 11, 10, 12, 13, 11]);
        let bands = bollinger(&p, 10, dec!(2));
        let upper_spread = bands.upper - bands.middle;
        let lower_spread = bands.middle - bands.lower;
        assert_eq!(upper_spread, lower_spread);
    }

    #[test]
    fn ema_seeds_from_sma_then_recurses() {
        let p = prices(&[1, 2, 3, 4, 5]);
        let seed = sma(&p[..3], 3); // (1+2+3)/3 = 2
        assert_eq!(seed, dec!(2));
        let value = ema(&p, 3);
        // multiplier = 2/(3+1) = 0.5; step1: (4-2)*0.5+2=3; step2: (5-3)*0.5+3=4
        assert_eq!(value, dec!(4));
    }
}
