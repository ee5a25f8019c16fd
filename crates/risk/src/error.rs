use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("database error: {0}")]
    Database(#[from] database::DbError),

    #[error("event bus error: {0}")]
    Events(#[from] events::EventsError),
}

/// Which of the six ordered checks in spec §4.3 rejected a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    KillSwitchEnabled,
    DailyLossLimitExceeded,
    MaxOpenPositionsReached,
    PositionSizeTooLarge,
    StopLossMissing,
    StopLossTooWide,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::KillSwitchEnabled => "kill_switch_enabled",
            RejectionKind::DailyLossLimitExceeded => "daily_loss_limit_exceeded",
            RejectionKind::MaxOpenPositionsReached => "max_open_positions_reached",
            RejectionKind::PositionSizeTooLarge => "position_size_too_large",
            RejectionKind::StopLossMissing => "stop_loss_missing",
            RejectionKind::StopLossTooWide => "stop_loss_too_wide",
        }
    }
}

/// A signal rejected by `RiskGate::validate_trade_signal`. Not a `RiskError`
/// variant: a rejection is an ordinary, expected outcome of validation, not
/// a failure to perform the validation.
#[derive(Debug, Clone)]
pub struct RiskRejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for RiskRejection {}
