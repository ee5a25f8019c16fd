use core_types::StrategyParams;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The application's entire runtime configuration, loaded in one shot from
/// the process environment by `envy` (see [`crate::load_settings`]).
///
/// Every field has a default so that a fresh checkout with only
/// `DATABASE_URL` set still starts up and trades with the strategy's
/// recommended parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,

    /// Comma-separated list of symbols to trade, e.g. `BTC-USD,ETH-USD`.
    pub symbols: String,

    /// Name under which this strategy's parameters are looked up in the
    /// `strategies` table; falls back to `StrategyParams::default()` when no
    /// matching row exists.
    pub strategy_name: String,

    pub exchange_name: String,

    pub paper_slippage_percent: Decimal,
    pub paper_fee_percent: Decimal,
    pub paper_seed_balance: Decimal,
    pub paper_seed_currency: String,

    pub sma_period: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std: Decimal,
    pub oversold: Decimal,
    pub overbought: Decimal,
    pub max_position_size_usd: Decimal,
    pub stop_loss_percent: Decimal,
    pub max_open_positions: u32,
    pub daily_loss_limit_percent: Decimal,
    pub max_hold_hours: i64,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or
    /// `zenith=debug,sqlx=warn`.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            symbols: "BTC-USD".to_string(),
            strategy_name: "mean_reversion".to_string(),
            exchange_name: "paper".to_string(),
            paper_slippage_percent: dec!(0.05),
            paper_fee_percent: dec!(0.10),
            paper_seed_balance: dec!(10000),
            paper_seed_currency: "USD".to_string(),
            sma_period: 20,
            rsi_period: 14,
            bb_period: 20,
            bb_std: dec!(2.0),
            oversold: dec!(30),
            overbought: dec!(70),
            max_position_size_usd: dec!(100),
            stop_loss_percent: dec!(2.0),
            max_open_positions: 1,
            daily_loss_limit_percent: dec!(2.0),
            max_hold_hours: 24,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// The configured symbols, split and trimmed.
    pub fn symbol_list(&self) -> Vec<String> {
        self.symbols.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    }

    /// The strategy's default tunables, as configured via the environment.
    /// A `strategies` row for `strategy_name`, when present, overrides these
    /// at runtime (see `database::DbRepository::get_strategy_params`).
    pub fn default_strategy_params(&self) -> StrategyParams {
        StrategyParams {
            sma_period: self.sma_period,
            rsi_period: self.rsi_period,
            bb_period: self.bb_period,
            bb_std: self.bb_std,
            oversold: self.oversold,
            overbought: self.overbought,
            max_position_size_usd: self.max_position_size_usd,
            stop_loss_percent: self.stop_loss_percent,
            max_open_positions: self.max_open_positions,
            daily_loss_limit_percent: self.daily_loss_limit_percent,
            max_hold_hours: self.max_hold_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_list_splits_and_trims() {
        let mut settings = Settings::default();
        settings.symbols = "BTC-USD, ETH-USD,SOL-USD".to_string();
        assert_eq!(settings.symbol_list(), vec!["BTC-USD", "ETH-USD", "SOL-USD"]);
    }

    #[test]
    fn default_strategy_params_matches_recommended_defaults() {
        let settings = Settings::default();
        let params = settings.default_strategy_params();
        let defaults = StrategyParams::default();
        assert_eq!(params.sma_period, defaults.sma_period);
        assert_eq!(params.oversold, defaults.oversold);
        assert_eq!(params.max_hold_hours, defaults.max_hold_hours);
    }
}
