use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Datelike, TimeZone, Utc};
use core_types::{ExitReason, KillSwitchRecord, OrderSide, OrderType, RiskEvent};
use database::DbRepository;
use events::{InProcessBus, KillSwitchPayload, RiskViolationPayload, SignalPayload, subjects};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{RejectionKind, RiskError, RiskRejection};

/// Supervision tick for `CheckOpenTrades` (spec §4.3 recommends 30s).
const SUPERVISION_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Outcome of `RiskGate::validate_trade_signal`: distinguishes an ordinary,
/// expected rejection from a failure to perform the validation at all.
#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(RiskRejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

/// The sole authority over "may this trade proceed?" and emergency-stop
/// state (spec §4.3). Every `strategy.signal` the order manager dequeues is
/// validated here before an order is ever placed.
pub struct RiskGate {
    repository: DbRepository,
    bus: Arc<InProcessBus>,
}

impl RiskGate {
    pub fn new(repository: DbRepository, bus: Arc<InProcessBus>) -> Self {
        Self { repository, bus }
    }

    /// Runs the six ordered checks from spec §4.3 against `signal`.
    /// `portfolio_value` is the account equity the daily-loss and
    /// position-size checks are evaluated against — callers source it from
    /// the exchange's balance, since the gate itself never talks to an
    /// exchange. A rejection is recorded as a `risk_event` row and published
    /// as `risk.violation` before this returns.
    pub async fn validate_trade_signal(
        &self,
        signal: &SignalPayload,
        portfolio_value: Decimal,
    ) -> Result<ValidationOutcome, RiskError> {
        let rejection = self.run_checks(signal, portfolio_value).await?;

        match rejection {
            None => Ok(ValidationOutcome::Accepted),
            Some(rejection) => {
                self.record_rejection(signal, &rejection).await?;
                Ok(ValidationOutcome::Rejected(rejection))
            }
        }
    }

    async fn run_checks(
        &self,
        signal: &SignalPayload,
        portfolio_value: Decimal,
    ) -> Result<Option<RiskRejection>, RiskError> {
        // 1. Kill-switch is not enabled.
        let kill_switch = self.repository.get_kill_switch().await?;
        if kill_switch.enabled {
            return Ok(Some(reject(
                RejectionKind::KillSwitchEnabled,
                kill_switch.reason.unwrap_or_else(|| "kill switch is enabled".to_string()),
            )));
        }

        let params = self.repository.get_strategy_params(&signal.strategy).await?;

        // 2. Per-strategy daily P&L must stay above -(portfolio_value * daily_loss_limit_percent / 100).
        let start_of_today = start_of_today_utc();
        let daily_pnl = self.repository.pnl_for_trades_entered_since(&signal.strategy, start_of_today).await?;
        let daily_loss_floor = -(portfolio_value * params.daily_loss_limit_percent / dec!(100));
        if daily_pnl <= daily_loss_floor {
            let reason = format!("Daily loss limit exceeded: {daily_pnl}");
            self.enable_kill_switch(reason.clone()).await?;
            return Ok(Some(reject(RejectionKind::DailyLossLimitExceeded, reason)));
        }

        // 3. Open trade count for the strategy is < max_open_positions.
        let open_trades = self.repository.count_open_trades(&signal.strategy).await?;
        if open_trades >= params.max_open_positions as i64 {
            return Ok(Some(reject(
                RejectionKind::MaxOpenPositionsReached,
                format!("{open_trades} open trades, max {}", params.max_open_positions),
            )));
        }

        // 4. quantity * indicators.price <= max_position_size_usd. Close
        // signals (no indicator snapshot attached) are exempt: sizing a
        // closeout against an entry-sizing limit makes no sense.
        if let Some(indicators) = signal.indicators {
            let notional = signal.quantity * indicators.price;
            if notional > params.max_position_size_usd {
                return Ok(Some(reject(
                    RejectionKind::PositionSizeTooLarge,
                    format!("notional {notional} exceeds max {}", params.max_position_size_usd),
                )));
            }
        }

        // 5. stop_loss_price is present and non-zero.
        let stop_loss_price = match signal.stop_loss_price {
            Some(price) if !price.is_zero() => price,
            _ => {
                return Ok(Some(reject(
                    RejectionKind::StopLossMissing,
                    "stop_loss_price is missing or zero".to_string(),
                )));
            }
        };

        // 6. |entry_price - stop_loss_price| / entry_price * 100 <= 2 * stop_loss_percent.
        if let Some(indicators) = signal.indicators {
            let entry_price = indicators.price;
            if !entry_price.is_zero() {
                let width_percent = (entry_price - stop_loss_price).abs() / entry_price * dec!(100);
                let max_width_percent = dec!(2) * params.stop_loss_percent;
                if width_percent > max_width_percent {
                    return Ok(Some(reject(
                        RejectionKind::StopLossTooWide,
                        format!("stop-loss width {width_percent}% exceeds max {max_width_percent}%"),
                    )));
                }
            }
        }

        Ok(None)
    }

    async fn record_rejection(&self, signal: &SignalPayload, rejection: &RiskRejection) -> Result<(), RiskError> {
        tracing::warn!(strategy = %signal.strategy, symbol = %signal.symbol, kind = rejection.kind.as_str(), detail = %rejection.detail, "signal rejected by risk gate");

        let event = RiskEvent {
            id: Uuid::new_v4(),
            strategy: Some(signal.strategy.clone()),
            event_type: rejection.kind.as_str().to_string(),
            description: rejection.detail.clone(),
            action_taken: "signal rejected".to_string(),
            metadata: json!({ "symbol": signal.symbol, "signal_id": signal.id }),
            created_at: Utc::now(),
        };
        self.repository.insert_risk_event(&event).await?;

        self.bus
            .publish(
                subjects::RISK_VIOLATION,
                RiskViolationPayload {
                    strategy: Some(signal.strategy.clone()),
                    violation_type: rejection.kind.as_str().to_string(),
                    description: rejection.detail.clone(),
                    action_taken: "signal rejected".to_string(),
                },
            )
            .await?;

        Ok(())
    }

    /// Idempotent: enabling an already-enabled kill switch updates nothing
    /// and performs no side effects.
    pub async fn enable_kill_switch(&self, reason: String) -> Result<(), RiskError> {
        let current = self.repository.get_kill_switch().await?;
        if current.enabled {
            return Ok(());
        }

        let record = KillSwitchRecord { enabled: true, reason: Some(reason.clone()), timestamp: Some(Utc::now()) };
        self.repository.set_kill_switch(&record).await?;
        let cancelled = self.repository.cancel_all_open_orders().await?;
        tracing::error!(reason = %reason, cancelled_orders = cancelled, "kill switch enabled");

        self.bus.publish(subjects::RISK_KILL_SWITCH, KillSwitchPayload { enabled: true, reason: Some(reason) }).await?;

        Ok(())
    }

    /// Idempotent and does not reopen cancelled orders.
    pub async fn disable_kill_switch(&self) -> Result<(), RiskError> {
        let current = self.repository.get_kill_switch().await?;
        if !current.enabled {
            return Ok(());
        }

        self.repository.set_kill_switch(&KillSwitchRecord::disabled()).await?;
        tracing::info!("kill switch disabled");

        self.bus.publish(subjects::RISK_KILL_SWITCH, KillSwitchPayload { enabled: false, reason: None }).await?;

        Ok(())
    }

    pub async fn get_kill_switch_status(&self) -> Result<KillSwitchRecord, RiskError> {
        Ok(self.repository.get_kill_switch().await?)
    }

    /// Scans every open trade and publishes a close `strategy.signal` for any
    /// that has exceeded its strategy's `max_hold_hours` (spec §4.3).
    pub async fn check_open_trades(&self) -> Result<(), RiskError> {
        let open_trades = self.repository.get_open_trades().await?;
        let now = Utc::now();

        for trade in open_trades {
            let params = self.repository.get_strategy_params(&trade.strategy).await?;
            let age = now - trade.entry_time;
            if age.num_hours() < params.max_hold_hours {
                continue;
            }

            tracing::info!(trade_id = %trade.id, strategy = %trade.strategy, symbol = %trade.symbol, "max hold time exceeded, emitting close signal");

            let signal = SignalPayload {
                id: Uuid::new_v4(),
                strategy: trade.strategy.clone(),
                symbol: trade.symbol.clone(),
                side: OrderSide::Sell,
                order_type: OrderType::Market,
                quantity: trade.quantity,
                stop_loss_price: None,
                reason: "max hold time exceeded".to_string(),
                exit_reason: Some(ExitReason::MaxHoldTime),
                indicators: None,
            };

            self.bus.publish(subjects::STRATEGY_SIGNAL, signal).await?;
        }

        Ok(())
    }

    /// Runs `check_open_trades` every [`SUPERVISION_INTERVAL`] until
    /// cancelled.
    pub async fn run_supervisor(self: Arc<Self>, cancel: CancellationToken) -> Result<(), RiskError> {
        let mut interval = tokio::time::interval(SUPERVISION_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("risk supervisor shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.check_open_trades().await {
                        tracing::error!(error = %e, "max-hold-time supervision pass failed");
                    }
                }
            }
        }
    }
}

fn reject(kind: RejectionKind, detail: String) -> RiskRejection {
    RiskRejection { kind, detail }
}

/// UTC midnight is treated as "local midnight" for the daily-loss window —
/// this system has no per-strategy timezone configuration, so the simplest
/// faithful reading of spec §4.3's "local midnight" is the server's own
/// reference clock, UTC (documented as a deliberate simplification).
fn start_of_today_utc() -> chrono::DateTime<Utc> {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0).single().unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_of_today_is_midnight() {
        let start = start_of_today_utc();
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
    }
}
