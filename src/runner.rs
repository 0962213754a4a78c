//! Signal engine - main evaluation loop

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::confluence;
use crate::feed::PriceFeed;
use crate::indicators::IndicatorSource;
use crate::lifecycle::LifecycleManager;
use crate::store::SignalStore;
use crate::synthesizer::synthesize;
use crate::types::Result;

/// Counters for one pass over the symbol universe
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub evaluated: usize,
    pub signals_created: usize,
    pub signals_resolved: usize,
}

struct SymbolOutcome {
    resolved: usize,
    created: Option<Uuid>,
}

/// Main engine loop that evaluates the symbol universe on a fixed interval
pub struct SignalRunner {
    config: EngineConfig,
    feed: Arc<dyn PriceFeed>,
    indicators: Arc<dyn IndicatorSource>,
    store: Arc<dyn SignalStore>,
    lifecycle: LifecycleManager,
}

impl SignalRunner {
    pub fn new(
        config: EngineConfig,
        feed: Arc<dyn PriceFeed>,
        indicators: Arc<dyn IndicatorSource>,
        store: Arc<dyn SignalStore>,
    ) -> Self {
        let lifecycle = LifecycleManager::new(store.clone(), config.breakeven_tolerance_pct);
        Self {
            config,
            feed,
            indicators,
            store,
            lifecycle,
        }
    }

    /// Run the engine until shutdown is signalled.
    ///
    /// The first cycle starts immediately; later cycles tick on the
    /// configured interval.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(
            "Signal engine starting: {} symbols, {}s cycle interval, {} feed",
            self.config.symbols.len(),
            self.config.cycle_interval_secs,
            self.feed.name()
        );

        let mut cycle_interval = interval(self.config.cycle_interval());

        loop {
            tokio::select! {
                _ = cycle_interval.tick() => {
                    let stats = self.run_cycle(&shutdown).await;
                    info!(
                        "Cycle complete: {} symbols evaluated, {} signals created, {} resolved",
                        stats.evaluated, stats.signals_created, stats.signals_resolved
                    );
                }
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping signal engine");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Evaluate every symbol once. A failure on one symbol never blocks
    /// the others.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleStats {
        let mut stats = CycleStats::default();

        for symbol in &self.config.symbols {
            if *shutdown.borrow() {
                info!("Shutdown requested, ending cycle early");
                break;
            }

            match self.process_symbol(symbol).await {
                Ok(outcome) => {
                    stats.evaluated += 1;
                    stats.signals_resolved += outcome.resolved;
                    if outcome.created.is_some() {
                        stats.signals_created += 1;
                    }
                }
                Err(e) => {
                    warn!("{}: skipping this cycle: {}", symbol, e);
                }
            }
        }

        stats
    }

    /// One symbol's pass: resolve what the price settles, then look for a
    /// fresh setup unless a recent pending signal holds the cooldown.
    async fn process_symbol(&self, symbol: &str) -> Result<SymbolOutcome> {
        let point = self.feed.get_price(symbol).await?;
        if point.price <= Decimal::ZERO {
            warn!(
                "{}: feed returned non-positive price {}, skipping",
                symbol, point.price
            );
            return Ok(SymbolOutcome {
                resolved: 0,
                created: None,
            });
        }

        let resolved = if self.config.sweep.enabled {
            self.lifecycle
                .sweep_pending(symbol, point.price, &self.config.sweep, Utc::now())
                .await?
        } else {
            self.lifecycle.resolve_pending(symbol, point.price).await?
        };

        if self
            .store
            .has_recent_unresolved(symbol, self.config.cooldown())
            .await?
        {
            debug!("{}: pending signal within cooldown window", symbol);
            return Ok(SymbolOutcome {
                resolved,
                created: None,
            });
        }

        let assessment = self.indicators.evaluate(symbol, point.price).await?;
        let verdict = match confluence::score(&assessment) {
            Some(verdict) => verdict,
            None => {
                debug!("{}: no confluence", symbol);
                return Ok(SymbolOutcome {
                    resolved,
                    created: None,
                });
            }
        };

        let signal = synthesize(
            &verdict,
            symbol,
            point.price,
            assessment.indicators,
            &self.config.synth,
            Utc::now(),
        );
        let direction = signal.direction;
        let strength = signal.strength;
        let tier = signal.confidence;
        let id = self.store.create(signal).await?;

        info!(
            "{}: {} signal {} at {} (strength {}, {} confidence)",
            symbol,
            direction.as_str(),
            id,
            point.price,
            strength,
            tier.as_str()
        );

        Ok(SymbolOutcome {
            resolved,
            created: Some(id),
        })
    }
}
