//! High-level, application-specific interface to Postgres (spec §3). Every
//! SQL statement this system issues lives here; no other crate touches
//! `sqlx` directly.

use chrono::{DateTime, Utc};
use core_types::{
    Balance, Candle, ExitReason, KillSwitchRecord, Order, OrderSide, OrderStatus, OrderType,
    RiskEvent, StrategyParams, StrategyRecord, Trade, TradeSide,
};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::Row;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// A thin wrapper over a `PgPool`, cheaply `Clone`-able (the pool itself is
/// reference-counted), shared by every component that needs persistence.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, DbError> {
    serde_json::from_value(JsonValue::String(raw.to_string())).map_err(DbError::Json)
}

fn to_enum_str<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    match serde_json::to_value(value)? {
        JsonValue::String(s) => Ok(s),
        other => Err(DbError::Json(serde::de::Error::custom(format!(
            "expected enum to serialize to a string, got {other}"
        )))),
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<Order, DbError> {
    Ok(Order {
        id: row.try_get("id")?,
        client_order_id: row.try_get("client_order_id")?,
        exchange_order_id: row.try_get("exchange_order_id")?,
        strategy: row.try_get("strategy")?,
        symbol: row.try_get("symbol")?,
        side: parse_enum::<OrderSide>(row.try_get::<String, _>("side")?.as_str())?,
        order_type: parse_enum::<OrderType>(row.try_get::<String, _>("order_type")?.as_str())?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        stop_loss_price: row.try_get("stop_loss_price")?,
        status: parse_enum::<OrderStatus>(row.try_get::<String, _>("status")?.as_str())?,
        filled_quantity: row.try_get("filled_quantity")?,
        average_fill_price: row.try_get("average_fill_price")?,
        fees: row.try_get("fees")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        filled_at: row.try_get("filled_at")?,
    })
}

fn row_to_trade(row: &sqlx::postgres::PgRow) -> Result<Trade, DbError> {
    let exit_reason: Option<String> = row.try_get("exit_reason")?;
    Ok(Trade {
        id: row.try_get("id")?,
        entry_order_id: row.try_get("entry_order_id")?,
        exit_order_id: row.try_get("exit_order_id")?,
        strategy: row.try_get("strategy")?,
        symbol: row.try_get("symbol")?,
        side: parse_enum::<TradeSide>(row.try_get::<String, _>("side")?.as_str())?,
        entry_price: row.try_get("entry_price")?,
        quantity: row.try_get("quantity")?,
        entry_time: row.try_get("entry_time")?,
        exit_price: row.try_get("exit_price")?,
        exit_time: row.try_get("exit_time")?,
        pnl: row.try_get("pnl")?,
        pnl_percent: row.try_get("pnl_percent")?,
        fees_total: row.try_get("fees_total")?,
        hold_duration_secs: row.try_get("hold_duration_secs")?,
        exit_reason: exit_reason.map(|s| parse_enum::<ExitReason>(&s)).transpose()?,
    })
}

fn row_to_candle(row: &sqlx::postgres::PgRow) -> Result<Candle, DbError> {
    Ok(Candle {
        time: row.try_get("time")?,
        exchange: row.try_get("exchange")?,
        symbol: row.try_get("symbol")?,
        interval: row.try_get("interval")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get("volume")?,
    })
}

fn row_to_strategy(row: &sqlx::postgres::PgRow) -> Result<StrategyRecord, DbError> {
    Ok(StrategyRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        strategy_type: row.try_get("strategy_type")?,
        config: row.try_get("config")?,
        active: row.try_get("active")?,
    })
}

/// Maps a unique-constraint violation on `orders.client_order_id` to the
/// domain-specific `DuplicateClientOrderId` error; every other `sqlx::Error`
/// passes through unchanged.
fn map_insert_order_error(err: sqlx::Error, client_order_id: &str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("orders_client_order_id_key") {
            return DbError::DuplicateClientOrderId(client_order_id.to_string());
        }
    }
    DbError::Query(err)
}

impl DbRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------

    /// Inserts a new `PENDING` order. Relies on the `orders.client_order_id`
    /// unique constraint for idempotency: a retried signal with the same
    /// deterministic id fails with `DuplicateClientOrderId` rather than
    /// creating a second order (spec §4.4).
    pub async fn insert_pending_order(&self, order: &Order) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, client_order_id, exchange_order_id, strategy, symbol, side, order_type,
                quantity, price, stop_loss_price, status, filled_quantity, average_fill_price,
                fees, created_at, updated_at, filled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.client_order_id)
        .bind(&order.exchange_order_id)
        .bind(&order.strategy)
        .bind(&order.symbol)
        .bind(to_enum_str(&order.side)?)
        .bind(to_enum_str(&order.order_type)?)
        .bind(order.quantity)
        .bind(order.price)
        .bind(order.stop_loss_price)
        .bind(to_enum_str(&order.status)?)
        .bind(order.filled_quantity)
        .bind(order.average_fill_price)
        .bind(order.fees)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.filled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_order_error(e, &order.client_order_id))?;

        Ok(())
    }

    pub async fn find_order_by_client_id(&self, client_order_id: &str) -> Result<Option<Order>, DbError> {
        let row = sqlx::query("SELECT * FROM orders WHERE client_order_id = $1")
            .bind(client_order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, DbError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;
        row_to_order(&row)
    }

    /// Applies a status transition plus whatever fill/exchange-id fields the
    /// exchange reported. Callers are expected to have already validated the
    /// transition with `OrderStatus::can_transition_to` before calling this.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_order_fill(
        &self,
        id: Uuid,
        status: OrderStatus,
        exchange_order_id: Option<&str>,
        filled_quantity: Decimal,
        average_fill_price: Option<Decimal>,
        fees: Decimal,
        filled_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE orders SET
                status = $1, exchange_order_id = $2, filled_quantity = $3,
                average_fill_price = $4, fees = $5, filled_at = $6, updated_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(to_enum_str(&status)?)
        .bind(exchange_order_id)
        .bind(filled_quantity)
        .bind(average_fill_price)
        .bind(fees)
        .bind(filled_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), DbError> {
        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(to_enum_str(&status)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_open_trades(&self, strategy: &str) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM trades WHERE strategy = $1 AND exit_time IS NULL")
            .bind(strategy)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Cancels every currently PENDING or OPEN order in a single statement —
    /// the kill switch's cancel-all side effect (spec §4.3).
    pub async fn cancel_all_open_orders(&self) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'CANCELLED', updated_at = NOW() WHERE status IN ('PENDING', 'OPEN')",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ---------------------------------------------------------------
    // Trades
    // ---------------------------------------------------------------

    pub async fn insert_trade(&self, trade: &Trade) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, entry_order_id, exit_order_id, strategy, symbol, side, entry_price,
                quantity, entry_time, exit_price, exit_time, pnl, pnl_percent, fees_total,
                hold_duration_secs, exit_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(trade.id)
        .bind(trade.entry_order_id)
        .bind(trade.exit_order_id)
        .bind(&trade.strategy)
        .bind(&trade.symbol)
        .bind(to_enum_str(&trade.side)?)
        .bind(trade.entry_price)
        .bind(trade.quantity)
        .bind(trade.entry_time)
        .bind(trade.exit_price)
        .bind(trade.exit_time)
        .bind(trade.pnl)
        .bind(trade.pnl_percent)
        .bind(trade.fees_total)
        .bind(trade.hold_duration_secs)
        .bind(trade.exit_reason.map(|r| r.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The most recently opened, still-open trade for `(strategy, symbol)` —
    /// what a SELL signal closes (spec §4.4).
    pub async fn find_open_trade(&self, strategy: &str, symbol: &str) -> Result<Option<Trade>, DbError> {
        let row = sqlx::query(
            "SELECT * FROM trades WHERE strategy = $1 AND symbol = $2 AND exit_time IS NULL ORDER BY entry_time DESC LIMIT 1",
        )
        .bind(strategy)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_trade).transpose()
    }

    pub async fn get_open_trades(&self) -> Result<Vec<Trade>, DbError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE exit_time IS NULL")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_trade).collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn close_trade(
        &self,
        trade_id: Uuid,
        exit_order_id: Uuid,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        pnl: Decimal,
        pnl_percent: Decimal,
        fees_total: Decimal,
        hold_duration_secs: i64,
        exit_reason: ExitReason,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE trades SET
                exit_order_id = $1, exit_price = $2, exit_time = $3, pnl = $4,
                pnl_percent = $5, fees_total = $6, hold_duration_secs = $7, exit_reason = $8
            WHERE id = $9
            "#,
        )
        .bind(exit_order_id)
        .bind(exit_price)
        .bind(exit_time)
        .bind(pnl)
        .bind(pnl_percent)
        .bind(fees_total)
        .bind(hold_duration_secs)
        .bind(exit_reason.to_string())
        .bind(trade_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sum of P&L for every trade of `strategy` *entered* on or after
    /// `since` — the input to the daily loss-limit check (spec §4.3 rule 2:
    /// the window is keyed on `entry_time`, not `exit_time`, so a trade
    /// opened yesterday and closed today is excluded, while one opened today
    /// counts even if it is still open).
    pub async fn pnl_for_trades_entered_since(&self, strategy: &str, since: DateTime<Utc>) -> Result<Decimal, DbError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(pnl), 0) AS total FROM trades WHERE strategy = $1 AND entry_time >= $2",
        )
        .bind(strategy)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    // ---------------------------------------------------------------
    // Candles (price_data)
    // ---------------------------------------------------------------

    /// Upserts a batch of candles within one transaction, one
    /// `ON CONFLICT DO UPDATE` statement per row, on the composite primary
    /// key `(time, exchange, symbol, interval)` (spec §3).
    pub async fn upsert_candles(&self, candles: &[Candle]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO price_data (time, exchange, symbol, interval, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (time, exchange, symbol, interval) DO UPDATE SET
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(candle.time)
            .bind(&candle.exchange)
            .bind(&candle.symbol)
            .bind(&candle.interval)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetches the most recent `limit` candles for `(symbol, interval)`, in
    /// ascending time order — the buffer preload the signal engine performs
    /// on startup (spec §4.2).
    pub async fn get_recent_candles(&self, symbol: &str, interval: &str, limit: i64) -> Result<Vec<Candle>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM price_data WHERE symbol = $1 AND interval = $2 ORDER BY time DESC LIMIT $3
            ) recent ORDER BY time ASC
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_candle).collect()
    }

    // ---------------------------------------------------------------
    // Balances
    // ---------------------------------------------------------------

    pub async fn upsert_balance(&self, exchange: &str, currency: &str, balance: Balance) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO balances (exchange, currency, available, locked, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (exchange, currency) DO UPDATE SET
                available = EXCLUDED.available, locked = EXCLUDED.locked, updated_at = NOW()
            "#,
        )
        .bind(exchange)
        .bind(currency)
        .bind(balance.available)
        .bind(balance.locked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_balances(&self, exchange: &str) -> Result<Vec<(String, Balance)>, DbError> {
        let rows = sqlx::query("SELECT currency, available, locked FROM balances WHERE exchange = $1")
            .bind(exchange)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("currency")?,
                    Balance { available: row.try_get("available")?, locked: row.try_get("locked")? },
                ))
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Risk events
    // ---------------------------------------------------------------

    pub async fn insert_risk_event(&self, event: &RiskEvent) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO risk_events (id, strategy, event_type, description, action_taken, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.strategy)
        .bind(&event.event_type)
        .bind(&event.description)
        .bind(&event.action_taken)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // System config / kill switch
    // ---------------------------------------------------------------

    pub async fn get_kill_switch(&self) -> Result<KillSwitchRecord, DbError> {
        let row = sqlx::query("SELECT value FROM system_config WHERE key = 'kill_switch'")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: JsonValue = row.try_get("value")?;
                Ok(serde_json::from_value(value)?)
            }
            None => Ok(KillSwitchRecord::disabled()),
        }
    }

    pub async fn set_kill_switch(&self, record: &KillSwitchRecord) -> Result<(), DbError> {
        let value = serde_json::to_value(record)?;
        sqlx::query(
            r#"
            INSERT INTO system_config (key, value, updated_at) VALUES ('kill_switch', $1, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Strategies
    // ---------------------------------------------------------------

    pub async fn get_strategy_by_name(&self, name: &str) -> Result<Option<StrategyRecord>, DbError> {
        let row = sqlx::query("SELECT * FROM strategies WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_strategy).transpose()
    }

    pub async fn list_active_strategies(&self) -> Result<Vec<StrategyRecord>, DbError> {
        let rows = sqlx::query("SELECT * FROM strategies WHERE active = TRUE")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_strategy).collect()
    }

    /// Resolves a strategy's tunable parameters, falling back to
    /// `StrategyParams::default()` if no row or an unparseable config blob
    /// exists — a fresh deployment should still be able to trade with sane
    /// defaults before an operator has provisioned the `strategies` table.
    pub async fn get_strategy_params(&self, name: &str) -> Result<StrategyParams, DbError> {
        match self.get_strategy_by_name(name).await? {
            Some(record) => Ok(serde_json::from_value(record.config).unwrap_or_default()),
            None => Ok(StrategyParams::default()),
        }
    }
}
