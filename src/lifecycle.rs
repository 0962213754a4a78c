//! Signal lifecycle - resolves pending signals against price movement
//!
//! Two resolution policies exist. The level-based policy is canonical and
//! tests each pending signal against its own stop/target levels. The sweep
//! policy judges signals past a minimum age by percentage moves against the
//! current price instead; it is config-gated and the runner wires exactly
//! one policy per cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::config::SweepConfig;
use crate::store::SignalStore;
use crate::types::{EngineError, Result, Signal, SignalDirection, SignalStatus};

pub struct LifecycleManager {
    store: Arc<dyn SignalStore>,
    /// Manual closes within this percent of entry become breakeven
    breakeven_tolerance_pct: f64,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn SignalStore>, breakeven_tolerance_pct: f64) -> Self {
        Self {
            store,
            breakeven_tolerance_pct,
        }
    }

    /// Level-based resolution pass for one symbol. Returns how many
    /// signals resolved.
    pub async fn resolve_pending(&self, symbol: &str, price: Decimal) -> Result<usize> {
        let pending = self.store.find_pending(symbol).await?;
        let mut resolved = 0;

        for signal in pending {
            if let Some((status, profit_loss_pct)) = check_levels(&signal, price) {
                if self.store.resolve(signal.id, status, price, profit_loss_pct).await? {
                    info!(
                        "{} {} signal resolved {:?} at {} ({:.2}%)",
                        signal.symbol,
                        signal.direction.as_str(),
                        status,
                        price,
                        profit_loss_pct,
                    );
                    resolved += 1;
                }
            }
        }

        Ok(resolved)
    }

    /// Age/percentage sweep for one symbol (alternate policy). Signals
    /// younger than the configured age are left untouched.
    pub async fn sweep_pending(
        &self,
        symbol: &str,
        price: Decimal,
        config: &SweepConfig,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let pending = self.store.find_pending(symbol).await?;
        let mut resolved = 0;

        for signal in pending {
            if signal.age(now) < config.min_age() {
                continue;
            }
            if let Some((status, profit_loss_pct)) = check_thresholds(&signal, price, config) {
                if self.store.resolve(signal.id, status, price, profit_loss_pct).await? {
                    info!(
                        "{} {} signal swept {:?} at {} ({:.2}%)",
                        signal.symbol,
                        signal.direction.as_str(),
                        status,
                        price,
                        profit_loss_pct,
                    );
                    resolved += 1;
                }
            }
        }

        Ok(resolved)
    }

    /// Manual close at a caller-supplied exit price. The only path that can
    /// produce a breakeven resolution; closing an already-resolved signal
    /// returns it unchanged.
    pub async fn close_at_price(&self, id: Uuid, exit_price: Decimal) -> Result<Signal> {
        let signal = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::SignalNotFound(id))?;

        if !signal.is_pending() {
            return Ok(signal);
        }
        if signal.entry_price <= Decimal::ZERO {
            return Err(EngineError::Store(format!(
                "signal {} has no usable entry price",
                id
            )));
        }

        let profit_loss_pct = directional_move_pct(signal.direction, signal.entry_price, exit_price);
        let tolerance = percent_decimal(self.breakeven_tolerance_pct);
        let status = if profit_loss_pct.abs() <= tolerance {
            SignalStatus::Breakeven
        } else if profit_loss_pct > Decimal::ZERO {
            SignalStatus::Won
        } else {
            SignalStatus::Lost
        };

        self.store.resolve(id, status, exit_price, profit_loss_pct).await?;
        info!(
            "{} {} signal closed manually {:?} at {} ({:.2}%)",
            signal.symbol,
            signal.direction.as_str(),
            status,
            exit_price,
            profit_loss_pct,
        );

        self.store
            .get(id)
            .await?
            .ok_or(EngineError::SignalNotFound(id))
    }
}

/// Test a pending signal against its stop/target levels. Returns the
/// resolution and realized percent, or `None` while neither level is hit.
/// Signals without attached levels are never resolved here.
pub fn check_levels(signal: &Signal, price: Decimal) -> Option<(SignalStatus, Decimal)> {
    let entry = signal.entry_price;
    if entry <= Decimal::ZERO
        || signal.stop_loss <= Decimal::ZERO
        || signal.take_profit <= Decimal::ZERO
    {
        return None;
    }

    match signal.direction {
        SignalDirection::Buy => {
            if price >= signal.take_profit {
                let pl = (signal.take_profit - entry) / entry * Decimal::ONE_HUNDRED;
                Some((SignalStatus::Won, pl))
            } else if price <= signal.stop_loss {
                let pl = (signal.stop_loss - entry) / entry * Decimal::ONE_HUNDRED;
                Some((SignalStatus::Lost, pl))
            } else {
                None
            }
        }
        SignalDirection::Sell => {
            if price <= signal.take_profit {
                let pl = (entry - signal.take_profit) / entry * Decimal::ONE_HUNDRED;
                Some((SignalStatus::Won, pl))
            } else if price >= signal.stop_loss {
                let pl = (entry - signal.stop_loss) / entry * Decimal::ONE_HUNDRED;
                Some((SignalStatus::Lost, pl))
            } else {
                None
            }
        }
    }
}

/// Sweep judgment: percentage move of current price against entry, tested
/// against the configured win/loss thresholds.
pub fn check_thresholds(
    signal: &Signal,
    price: Decimal,
    config: &SweepConfig,
) -> Option<(SignalStatus, Decimal)> {
    let entry = signal.entry_price;
    if entry <= Decimal::ZERO {
        return None;
    }

    let change_pct = (price - entry) / entry * Decimal::ONE_HUNDRED;
    let win = percent_decimal(config.win_threshold_pct);
    let loss = percent_decimal(config.loss_threshold_pct);

    match signal.direction {
        SignalDirection::Buy => {
            if change_pct >= win {
                Some((SignalStatus::Won, change_pct))
            } else if change_pct <= -loss {
                Some((SignalStatus::Lost, change_pct))
            } else {
                None
            }
        }
        SignalDirection::Sell => {
            if change_pct <= -win {
                Some((SignalStatus::Won, -change_pct))
            } else if change_pct >= loss {
                Some((SignalStatus::Lost, -change_pct))
            } else {
                None
            }
        }
    }
}

/// Realized move in percent of entry, positive when the trade direction
/// was favorable
fn directional_move_pct(direction: SignalDirection, entry: Decimal, exit: Decimal) -> Decimal {
    let raw = (exit - entry) / entry * Decimal::ONE_HUNDRED;
    match direction {
        SignalDirection::Buy => raw,
        SignalDirection::Sell => -raw,
    }
}

/// Percent threshold as a Decimal with basis-point precision
fn percent_decimal(pct: f64) -> Decimal {
    Decimal::new((pct * 100.0).round() as i64, 2)
}
