//! Signal persistence and the query surface over stored signals

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{EngineError, Result, Signal, SignalDirection, SignalStatus};

/// Filter for listing stored signals
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub symbol: Option<String>,
    pub direction: Option<SignalDirection>,
    pub status: Option<SignalStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SignalFilter {
    fn matches(&self, signal: &Signal) -> bool {
        if let Some(symbol) = &self.symbol {
            if &signal.symbol != symbol {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if signal.direction != direction {
                return false;
            }
        }
        if let Some(status) = self.status {
            if signal.status != status {
                return false;
            }
        }
        true
    }
}

/// Aggregate statistics over stored signals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStats {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
    pub wins: usize,
    pub losses: usize,
    /// Wins as a percentage of resolved signals, 2 decimal places
    pub win_rate: Decimal,
    /// Mean realized percent among winning signals
    pub avg_win_pct: Decimal,
    /// Mean realized percent among losing signals
    pub avg_loss_pct: Decimal,
    /// Sum of realized percents across all resolved signals
    pub net_pl_pct: Decimal,
}

/// Persistence contract for signals.
///
/// `create` assigns the id; `resolve` is the only mutation after creation
/// and is a no-op on anything already out of Pending.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a new signal, returning its assigned id
    async fn create(&self, signal: Signal) -> Result<Uuid>;

    async fn get(&self, id: Uuid) -> Result<Option<Signal>>;

    /// All pending signals for a symbol
    async fn find_pending(&self, symbol: &str) -> Result<Vec<Signal>>;

    /// Whether a pending signal for the symbol was created within `within`
    /// of now. Drives the generation cooldown.
    async fn has_recent_unresolved(&self, symbol: &str, within: chrono::Duration) -> Result<bool>;

    /// Apply a resolution. Returns true if the signal transitioned, false
    /// if it was already resolved.
    async fn resolve(
        &self,
        id: Uuid,
        status: SignalStatus,
        result_price: Decimal,
        profit_loss_pct: Decimal,
    ) -> Result<bool>;

    /// List signals matching the filter, newest first
    async fn query(&self, filter: &SignalFilter) -> Result<Vec<Signal>>;

    async fn stats(&self) -> Result<SignalStats>;
}

/// In-memory signal store
#[derive(Default)]
pub struct MemorySignalStore {
    signals: RwLock<HashMap<Uuid, Signal>>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn create(&self, mut signal: Signal) -> Result<Uuid> {
        if signal.id.is_nil() {
            signal.id = Uuid::new_v4();
        }
        let id = signal.id;
        let mut signals = self.signals.write().await;
        signals.insert(id, signal);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Signal>> {
        let signals = self.signals.read().await;
        Ok(signals.get(&id).cloned())
    }

    async fn find_pending(&self, symbol: &str) -> Result<Vec<Signal>> {
        let signals = self.signals.read().await;
        let mut pending: Vec<Signal> = signals
            .values()
            .filter(|s| s.symbol == symbol && s.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn has_recent_unresolved(&self, symbol: &str, within: chrono::Duration) -> Result<bool> {
        let cutoff = Utc::now() - within;
        let signals = self.signals.read().await;
        Ok(signals
            .values()
            .any(|s| s.symbol == symbol && s.is_pending() && s.created_at > cutoff))
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: SignalStatus,
        result_price: Decimal,
        profit_loss_pct: Decimal,
    ) -> Result<bool> {
        let mut signals = self.signals.write().await;
        let signal = signals.get_mut(&id).ok_or(EngineError::SignalNotFound(id))?;

        // Resolution fields are written exactly once
        if !signal.is_pending() {
            return Ok(false);
        }

        signal.status = status;
        signal.result_price = Some(result_price);
        signal.profit_loss_pct = Some(profit_loss_pct);
        signal.resolved_at = Some(Utc::now());
        Ok(true)
    }

    async fn query(&self, filter: &SignalFilter) -> Result<Vec<Signal>> {
        let signals = self.signals.read().await;
        let mut matched: Vec<Signal> = signals
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.min(matched.len());
        let mut page: Vec<Signal> = matched.split_off(offset);
        if let Some(limit) = filter.limit {
            page.truncate(limit);
        }
        Ok(page)
    }

    async fn stats(&self) -> Result<SignalStats> {
        let signals = self.signals.read().await;

        let total = signals.len();
        let mut pending = 0usize;
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut win_sum = Decimal::ZERO;
        let mut loss_sum = Decimal::ZERO;
        let mut net = Decimal::ZERO;

        for signal in signals.values() {
            match signal.status {
                SignalStatus::Pending => pending += 1,
                SignalStatus::Won => {
                    wins += 1;
                    if let Some(pl) = signal.profit_loss_pct {
                        win_sum += pl;
                        net += pl;
                    }
                }
                SignalStatus::Lost => {
                    losses += 1;
                    if let Some(pl) = signal.profit_loss_pct {
                        loss_sum += pl;
                        net += pl;
                    }
                }
                SignalStatus::Breakeven => {
                    if let Some(pl) = signal.profit_loss_pct {
                        net += pl;
                    }
                }
            }
        }

        let resolved = total - pending;
        let win_rate = if resolved > 0 {
            (Decimal::from(wins) / Decimal::from(resolved) * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let avg_win_pct = if wins > 0 {
            (win_sum / Decimal::from(wins)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let avg_loss_pct = if losses > 0 {
            (loss_sum / Decimal::from(losses)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(SignalStats {
            total,
            pending,
            resolved,
            wins,
            losses,
            win_rate,
            avg_win_pct,
            avg_loss_pct,
            net_pl_pct: net.round_dp(2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfidenceTier;
    use chrono::{DateTime, Duration, Utc};
    use tokio_test::{assert_err, assert_ok};

    fn make_signal(
        symbol: &str,
        direction: SignalDirection,
        created_at: DateTime<Utc>,
    ) -> Signal {
        Signal::new(
            symbol,
            direction,
            80,
            ConfidenceTier::Medium,
            Decimal::from(100),
            created_at,
        )
        .with_levels(
            Decimal::from(98),
            Decimal::from(105),
            "2.50:1".to_string(),
        )
    }

    #[tokio::test]
    async fn create_assigns_id() {
        let store = MemorySignalStore::new();
        let id = tokio_test::assert_ok!(
            store.create(make_signal("BTC", SignalDirection::Buy, Utc::now())).await
        );
        assert!(!id.is_nil());

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.symbol, "BTC");
        assert_eq!(stored.id, id);
    }

    #[tokio::test]
    async fn find_pending_filters_by_symbol_and_status() {
        let store = MemorySignalStore::new();
        let now = Utc::now();
        store.create(make_signal("BTC", SignalDirection::Buy, now)).await.unwrap();
        store.create(make_signal("ETH", SignalDirection::Buy, now)).await.unwrap();
        let resolved_id = store
            .create(make_signal("BTC", SignalDirection::Sell, now - Duration::hours(10)))
            .await
            .unwrap();
        store
            .resolve(resolved_id, SignalStatus::Won, Decimal::from(105), Decimal::from(5))
            .await
            .unwrap();

        let pending = store.find_pending("BTC").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn recent_unresolved_respects_the_window() {
        let store = MemorySignalStore::new();
        let window = Duration::hours(4);

        // One hour old: still inside the cooldown window
        store
            .create(make_signal("BTC", SignalDirection::Buy, Utc::now() - Duration::hours(1)))
            .await
            .unwrap();
        assert!(store.has_recent_unresolved("BTC", window).await.unwrap());

        // Five hours old: outside the window
        let store = MemorySignalStore::new();
        store
            .create(make_signal("BTC", SignalDirection::Buy, Utc::now() - Duration::hours(5)))
            .await
            .unwrap();
        assert!(!store.has_recent_unresolved("BTC", window).await.unwrap());
    }

    #[tokio::test]
    async fn resolved_signal_does_not_hold_the_cooldown() {
        let store = MemorySignalStore::new();
        let id = store
            .create(make_signal("BTC", SignalDirection::Buy, Utc::now() - Duration::minutes(30)))
            .await
            .unwrap();
        store
            .resolve(id, SignalStatus::Lost, Decimal::from(98), Decimal::from(-2))
            .await
            .unwrap();
        assert!(!store.has_recent_unresolved("BTC", Duration::hours(4)).await.unwrap());
    }

    #[tokio::test]
    async fn resolve_is_idempotent_once() {
        let store = MemorySignalStore::new();
        let id = store
            .create(make_signal("BTC", SignalDirection::Buy, Utc::now()))
            .await
            .unwrap();

        let first = store
            .resolve(id, SignalStatus::Won, Decimal::from(105), Decimal::from(5))
            .await
            .unwrap();
        assert!(first);
        let after_first = store.get(id).await.unwrap().unwrap();

        // Second attempt must change nothing
        let second = store
            .resolve(id, SignalStatus::Lost, Decimal::from(90), Decimal::from(-10))
            .await
            .unwrap();
        assert!(!second);
        let after_second = store.get(id).await.unwrap().unwrap();

        assert_eq!(after_second.status, SignalStatus::Won);
        assert_eq!(after_second.result_price, after_first.result_price);
        assert_eq!(after_second.profit_loss_pct, after_first.profit_loss_pct);
        assert_eq!(after_second.resolved_at, after_first.resolved_at);
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_an_error() {
        let store = MemorySignalStore::new();
        let err = store
            .resolve(Uuid::new_v4(), SignalStatus::Won, Decimal::from(105), Decimal::from(5))
            .await;
        tokio_test::assert_err!(err);
    }

    #[tokio::test]
    async fn query_orders_newest_first_with_pagination() {
        let store = MemorySignalStore::new();
        let base = Utc::now();
        for i in 0..5 {
            store
                .create(make_signal("BTC", SignalDirection::Buy, base - Duration::hours(i)))
                .await
                .unwrap();
        }

        let filter = SignalFilter {
            symbol: Some("BTC".to_string()),
            limit: Some(2),
            offset: 1,
            ..Default::default()
        };
        let page = store.query(&filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].created_at, base - Duration::hours(1));
        assert_eq!(page[1].created_at, base - Duration::hours(2));
    }

    #[tokio::test]
    async fn query_filters_by_direction_and_status() {
        let store = MemorySignalStore::new();
        let now = Utc::now();
        store.create(make_signal("BTC", SignalDirection::Buy, now)).await.unwrap();
        store.create(make_signal("BTC", SignalDirection::Sell, now)).await.unwrap();
        let id = store.create(make_signal("ETH", SignalDirection::Buy, now)).await.unwrap();
        store
            .resolve(id, SignalStatus::Won, Decimal::from(105), Decimal::from(5))
            .await
            .unwrap();

        let sells = store
            .query(&SignalFilter {
                direction: Some(SignalDirection::Sell),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sells.len(), 1);

        let won = store
            .query(&SignalFilter {
                status: Some(SignalStatus::Won),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(won.len(), 1);
        assert_eq!(won[0].symbol, "ETH");
    }

    #[tokio::test]
    async fn stats_compute_win_rate_and_averages() {
        let store = MemorySignalStore::new();
        let now = Utc::now();

        for _ in 0..6 {
            let id = store.create(make_signal("BTC", SignalDirection::Buy, now)).await.unwrap();
            store
                .resolve(id, SignalStatus::Won, Decimal::from(105), Decimal::from(5))
                .await
                .unwrap();
        }
        for _ in 0..4 {
            let id = store.create(make_signal("BTC", SignalDirection::Buy, now)).await.unwrap();
            store
                .resolve(id, SignalStatus::Lost, Decimal::from(98), Decimal::from(-2))
                .await
                .unwrap();
        }
        for _ in 0..2 {
            store.create(make_signal("ETH", SignalDirection::Sell, now)).await.unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 12);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.resolved, 10);
        assert_eq!(stats.wins, 6);
        assert_eq!(stats.losses, 4);
        assert_eq!(stats.win_rate, Decimal::from_str_exact("60.00").unwrap());
        assert_eq!(stats.avg_win_pct, Decimal::from_str_exact("5.00").unwrap());
        assert_eq!(stats.avg_loss_pct, Decimal::from_str_exact("-2.00").unwrap());
        assert_eq!(stats.net_pl_pct, Decimal::from_str_exact("22.00").unwrap());
    }

    #[tokio::test]
    async fn stats_on_empty_store_are_zero() {
        let store = MemorySignalStore::new();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.win_rate, Decimal::ZERO);
    }
}
