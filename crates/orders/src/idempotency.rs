use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use core_types::OrderSide;

/// Computes the deterministic idempotency key spec §4.4 requires:
/// `hex(sha256(strategy ∥ symbol ∥ side ∥ quantity ∥ price_hint))[:32]`.
///
/// `price_hint` disambiguates two signals for the same
/// (strategy, symbol, side, quantity) tuple placed at meaningfully different
/// prices; the signal engine's indicator snapshot price is used when present,
/// falling back to the stop-loss price, and finally to zero for signals that
/// carry neither (the risk gate's own max-hold-time closeouts).
pub fn client_order_id(strategy: &str, symbol: &str, side: OrderSide, quantity: Decimal, price_hint: Decimal) -> String {
    let mut hasher = Sha256::new();
    hasher.update(strategy.as_bytes());
    hasher.update(symbol.as_bytes());
    hasher.update(side.to_string().as_bytes());
    hasher.update(quantity.normalize().to_string().as_bytes());
    hasher.update(price_hint.normalize().to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn identical_inputs_produce_identical_ids() {
        let a = client_order_id("mean_reversion", "BTC-USD", OrderSide::Buy, dec!(1.5), dec!(100));
        let b = client_order_id("mean_reversion", "BTC-USD", OrderSide::Buy, dec!(1.50), dec!(100.00));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_sides_produce_different_ids() {
        let buy = client_order_id("mean_reversion", "BTC-USD", OrderSide::Buy, dec!(1.5), dec!(100));
        let sell = client_order_id("mean_reversion", "BTC-USD", OrderSide::Sell, dec!(1.5), dec!(100));
        assert_ne!(buy, sell);
    }
}
