//! Indicator evaluation - turns candle history into the directional
//! judgments the scorer consumes

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::feed::PriceFeed;
use crate::types::{Candle, Confidence, Indicator, MarketAssessment, Result};

const WEIGHT_RSI: u32 = 20;
const WEIGHT_MACD: u32 = 20;
const WEIGHT_EMA: u32 = 18;
const WEIGHT_VOLUME: u32 = 12;
const WEIGHT_STRUCTURE: u32 = 15;
const WEIGHT_DIVERGENCE: u32 = 8;
const WEIGHT_KEY_LEVELS: u32 = 7;
const WEIGHT_LIQUIDITY: u32 = 5;

/// Candles compared per side when reading swing structure
const STRUCTURE_HALF: usize = 15;
/// Lookback for support/resistance and liquidity extremes
const LEVEL_LOOKBACK: usize = 50;
const VOLUME_LOOKBACK: usize = 20;

/// Trait for indicator sources. Implementations judge a symbol's market
/// and return the snapshot plus the two swing-structure flags.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn evaluate(&self, symbol: &str, price: Decimal) -> Result<MarketAssessment>;
}

/// Indicator source computing real technical readings over candle history.
///
/// Indicators that lack enough history are omitted from the snapshot; an
/// empty snapshot simply produces no verdict downstream.
pub struct ComputedIndicatorSource {
    feed: Arc<dyn PriceFeed>,
    candle_limit: usize,
}

impl ComputedIndicatorSource {
    pub fn new(feed: Arc<dyn PriceFeed>, candle_limit: usize) -> Self {
        Self { feed, candle_limit }
    }

    fn assess(&self, candles: &[Candle], price: Decimal) -> MarketAssessment {
        let closes: Vec<f64> = candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or(0.0))
            .collect();
        let price_f = price.to_f64().unwrap_or(0.0);

        let mut indicators = Vec::new();

        // RSI (14)
        let rsi = calculate_rsi(&closes, 14);
        if let Some(rsi) = rsi {
            let indicator = if rsi < 35.0 {
                Indicator::bullish(
                    "RSI (14)",
                    format!("{:.1} (Oversold)", rsi),
                    WEIGHT_RSI,
                    if rsi < 30.0 { Confidence::High } else { Confidence::Medium },
                )
            } else if rsi > 65.0 {
                Indicator::bearish(
                    "RSI (14)",
                    format!("{:.1} (Overbought)", rsi),
                    WEIGHT_RSI,
                    if rsi > 70.0 { Confidence::High } else { Confidence::Medium },
                )
            } else {
                Indicator::neutral(
                    "RSI (14)",
                    format!("{:.1} (Neutral)", rsi),
                    WEIGHT_RSI,
                    Confidence::Medium,
                )
            };
            indicators.push(indicator);
        }

        // MACD (12, 26, 9)
        if let Some(histogram) = calculate_macd_histogram(&closes) {
            let indicator = if histogram >= 0.0 {
                Indicator::bullish("MACD", "Bullish Crossover", WEIGHT_MACD, Confidence::High)
            } else {
                Indicator::bearish("MACD", "Bearish Crossover", WEIGHT_MACD, Confidence::High)
            };
            indicators.push(indicator);
        }

        // EMA alignment (50 vs 200)
        if let (Some(ema50), Some(ema200)) =
            (calculate_ema(&closes, 50), calculate_ema(&closes, 200))
        {
            let indicator = if ema50 > ema200 {
                Indicator::bullish(
                    "EMA Alignment",
                    "Golden Cross (50 > 200)",
                    WEIGHT_EMA,
                    Confidence::High,
                )
            } else {
                Indicator::bearish(
                    "EMA Alignment",
                    "Death Cross (50 < 200)",
                    WEIGHT_EMA,
                    Confidence::High,
                )
            };
            indicators.push(indicator);
        }

        // Volume vs recent average
        if let Some((last_volume, avg_volume)) = volume_profile(candles, VOLUME_LOOKBACK) {
            let indicator = if last_volume > avg_volume {
                let above_pct = (last_volume / avg_volume - 1.0) * 100.0;
                Indicator::bullish(
                    "Volume",
                    format!("Above Average (+{:.0}%)", above_pct),
                    WEIGHT_VOLUME,
                    Confidence::Medium,
                )
            } else {
                Indicator::neutral("Volume", "Below Average", WEIGHT_VOLUME, Confidence::Medium)
            };
            indicators.push(indicator);
        }

        // Swing structure over the last two half-windows
        let structure = read_structure(candles, STRUCTURE_HALF);
        let (higher_highs_lows, lower_highs_lows) = match &structure {
            Some(s) => (
                s.higher_highs && s.higher_lows,
                s.lower_highs && s.lower_lows,
            ),
            None => (false, false),
        };
        if structure.is_some() {
            let indicator = if higher_highs_lows {
                Indicator::bullish(
                    "Market Structure",
                    "Higher Highs + Higher Lows",
                    WEIGHT_STRUCTURE,
                    Confidence::High,
                )
            } else if lower_highs_lows {
                Indicator::bearish(
                    "Market Structure",
                    "Lower Highs + Lower Lows",
                    WEIGHT_STRUCTURE,
                    Confidence::High,
                )
            } else {
                Indicator::neutral(
                    "Market Structure",
                    "Range / Consolidation",
                    WEIGHT_STRUCTURE,
                    Confidence::Low,
                )
            };
            indicators.push(indicator);
        }

        // RSI divergence against price extremes
        if let (Some(s), Some(rsi_now)) = (&structure, rsi) {
            let older = &closes[..closes.len().saturating_sub(STRUCTURE_HALF)];
            if let Some(rsi_older) = calculate_rsi(older, 14) {
                if s.lower_lows && rsi_now > rsi_older {
                    indicators.push(Indicator::bullish(
                        "Divergence",
                        "Bullish RSI Divergence",
                        WEIGHT_DIVERGENCE,
                        Confidence::High,
                    ));
                } else if s.higher_highs && rsi_now < rsi_older {
                    indicators.push(Indicator::bearish(
                        "Divergence",
                        "Bearish RSI Divergence",
                        WEIGHT_DIVERGENCE,
                        Confidence::High,
                    ));
                }
            }
        }

        // Support/resistance placement
        if let Some((support, resistance)) = key_levels(candles, LEVEL_LOOKBACK) {
            let above_support = price_f > support * 1.02;
            let below_resistance = price_f < resistance * 0.98;
            if above_support && below_resistance {
                indicators.push(Indicator::bullish(
                    "Key Levels",
                    "Optimal Entry Zone",
                    WEIGHT_KEY_LEVELS,
                    Confidence::High,
                ));
            } else if price_f >= resistance * 0.98 {
                indicators.push(Indicator::bearish(
                    "Key Levels",
                    "Near Resistance",
                    WEIGHT_KEY_LEVELS,
                    Confidence::Medium,
                ));
            }
        }

        // Liquidity sweep of the prior extreme
        if let Some(sweep) = detect_liquidity_sweep(candles, VOLUME_LOOKBACK) {
            let indicator = match sweep {
                Sweep::Bullish => Indicator::bullish(
                    "Liquidity",
                    "Bullish Liquidity Sweep",
                    WEIGHT_LIQUIDITY,
                    Confidence::High,
                ),
                Sweep::Bearish => Indicator::bearish(
                    "Liquidity",
                    "Bearish Liquidity Sweep",
                    WEIGHT_LIQUIDITY,
                    Confidence::High,
                ),
            };
            indicators.push(indicator);
        }

        MarketAssessment::new(indicators).with_structure(higher_highs_lows, lower_highs_lows)
    }
}

#[async_trait]
impl IndicatorSource for ComputedIndicatorSource {
    async fn evaluate(&self, symbol: &str, price: Decimal) -> Result<MarketAssessment> {
        let candles = self.feed.get_candles(symbol, self.candle_limit).await?;
        Ok(self.assess(&candles, price))
    }
}

/// Scripted indicator source for test harnesses. Unscripted symbols get an
/// empty snapshot, which never produces a signal.
#[derive(Default)]
pub struct FixtureIndicatorSource {
    assessments: HashMap<String, MarketAssessment>,
}

impl FixtureIndicatorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, symbol: impl Into<String>, assessment: MarketAssessment) -> Self {
        self.assessments.insert(symbol.into(), assessment);
        self
    }
}

#[async_trait]
impl IndicatorSource for FixtureIndicatorSource {
    async fn evaluate(&self, symbol: &str, _price: Decimal) -> Result<MarketAssessment> {
        Ok(self
            .assessments
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| MarketAssessment::new(Vec::new())))
    }
}

/// Relative strength index over the last `period` closes
fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in closes.len() - period..closes.len() {
        let diff = closes[i] - closes[i - 1];
        if diff >= 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Exponential moving average seeded with the SMA of the first `period`
/// closes
fn calculate_ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period)?.last().copied()
}

fn ema_series(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if closes.len() < period || period == 0 {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(closes.len() - period + 1);
    let mut ema = seed;
    series.push(ema);
    for close in &closes[period..] {
        ema = (close - ema) * multiplier + ema;
        series.push(ema);
    }
    Some(series)
}

/// MACD(12, 26) histogram against its 9-period signal line
fn calculate_macd_histogram(closes: &[f64]) -> Option<f64> {
    let fast = ema_series(closes, 12)?;
    let slow = ema_series(closes, 26)?;

    // Align the two series on their common tail
    let len = fast.len().min(slow.len());
    let macd: Vec<f64> = fast[fast.len() - len..]
        .iter()
        .zip(&slow[slow.len() - len..])
        .map(|(f, s)| f - s)
        .collect();

    let signal = calculate_ema(&macd, 9)?;
    Some(macd.last()? - signal)
}

/// Last candle's volume against the average of the preceding window
fn volume_profile(candles: &[Candle], lookback: usize) -> Option<(f64, f64)> {
    if candles.len() < lookback + 1 {
        return None;
    }

    let last = candles.last()?.volume.to_f64()?;
    let window = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let avg = window
        .iter()
        .map(|c| c.volume.to_f64().unwrap_or(0.0))
        .sum::<f64>()
        / lookback as f64;

    if avg <= 0.0 {
        return None;
    }
    Some((last, avg))
}

struct StructureRead {
    higher_highs: bool,
    higher_lows: bool,
    lower_highs: bool,
    lower_lows: bool,
}

/// Compare swing extremes of the two most recent half-windows
fn read_structure(candles: &[Candle], half: usize) -> Option<StructureRead> {
    if candles.len() < half * 2 {
        return None;
    }

    let recent = &candles[candles.len() - half..];
    let older = &candles[candles.len() - half * 2..candles.len() - half];

    let high = |w: &[Candle]| w.iter().map(|c| c.high).max();
    let low = |w: &[Candle]| w.iter().map(|c| c.low).min();

    let recent_high = high(recent)?;
    let older_high = high(older)?;
    let recent_low = low(recent)?;
    let older_low = low(older)?;

    Some(StructureRead {
        higher_highs: recent_high > older_high,
        higher_lows: recent_low > older_low,
        lower_highs: recent_high < older_high,
        lower_lows: recent_low < older_low,
    })
}

/// Support and resistance from window extremes
fn key_levels(candles: &[Candle], lookback: usize) -> Option<(f64, f64)> {
    if candles.is_empty() {
        return None;
    }

    let window = &candles[candles.len().saturating_sub(lookback)..];
    let support = window.iter().map(|c| c.low).min()?.to_f64()?;
    let resistance = window.iter().map(|c| c.high).max()?.to_f64()?;
    Some((support, resistance))
}

enum Sweep {
    Bullish,
    Bearish,
}

/// A sweep takes out the prior window's extreme but closes back inside it
fn detect_liquidity_sweep(candles: &[Candle], lookback: usize) -> Option<Sweep> {
    if candles.len() < lookback + 1 {
        return None;
    }

    let last = candles.last()?;
    let window = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let prior_low = window.iter().map(|c| c.low).min()?;
    let prior_high = window.iter().map(|c| c.high).max()?;

    if last.low < prior_low && last.close > prior_low {
        Some(Sweep::Bullish)
    } else if last.high > prior_high && last.close < prior_high {
        Some(Sweep::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bias;
    use chrono::{Duration, Utc};

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        let now = Utc::now();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Candle {
                    timestamp: now - Duration::hours((closes.len() - i) as i64),
                    open: Decimal::try_from(open).unwrap(),
                    high: Decimal::try_from(close.max(open) * 1.005).unwrap(),
                    low: Decimal::try_from(close.min(open) * 0.995).unwrap(),
                    close: Decimal::try_from(close).unwrap(),
                    volume: Decimal::from(1_000_000),
                }
            })
            .collect()
    }

    struct StaticFeed {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl PriceFeed for StaticFeed {
        async fn get_price(&self, symbol: &str) -> Result<crate::types::PricePoint> {
            Ok(crate::types::PricePoint {
                symbol: symbol.to_string(),
                price: self.candles.last().unwrap().close,
                timestamp: Utc::now(),
            })
        }

        async fn get_candles(&self, _symbol: &str, limit: usize) -> Result<Vec<Candle>> {
            let start = self.candles.len().saturating_sub(limit);
            Ok(self.candles[start..].to_vec())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    #[test]
    fn rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(calculate_rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&falling, 14).unwrap();
        assert!(rsi < 1.0);

        assert!(calculate_rsi(&[100.0, 101.0], 14).is_none());
    }

    #[test]
    fn ema_of_constant_series_is_the_constant() {
        let closes = vec![50.0; 60];
        let ema = calculate_ema(&closes, 50).unwrap();
        assert!((ema - 50.0).abs() < 1e-9);
    }

    #[test]
    fn macd_histogram_tracks_momentum_shift() {
        // Long flat stretch then a sharp rally: MACD crosses above its
        // signal line
        let mut closes = vec![100.0; 60];
        for i in 0..15 {
            closes.push(100.0 + (i + 1) as f64 * 2.0);
        }
        let histogram = calculate_macd_histogram(&closes).unwrap();
        assert!(histogram > 0.0);
    }

    #[test]
    fn structure_reads_higher_highs_and_lows() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let structure = read_structure(&candles, STRUCTURE_HALF).unwrap();
        assert!(structure.higher_highs);
        assert!(structure.higher_lows);
        assert!(!structure.lower_lows);
    }

    #[test]
    fn liquidity_sweep_requires_a_recovered_close() {
        let mut candles = make_candles(&vec![100.0; 30]);
        let len = candles.len();

        // Wick below every prior low, close back above
        candles[len - 1].low = Decimal::from(90);
        candles[len - 1].close = Decimal::from(100);
        assert!(matches!(
            detect_liquidity_sweep(&candles, VOLUME_LOOKBACK),
            Some(Sweep::Bullish)
        ));

        // Close below the swept level: no signal
        candles[len - 1].close = Decimal::from(89);
        candles[len - 1].low = Decimal::from(88);
        assert!(detect_liquidity_sweep(&candles, VOLUME_LOOKBACK).is_none());
    }

    #[tokio::test]
    async fn oversold_downtrend_reads_bearish_structure() {
        // 250 candles falling steadily
        let closes: Vec<f64> = (0..250).map(|i| 500.0 - i as f64).collect();
        let feed = Arc::new(StaticFeed {
            candles: make_candles(&closes),
        });
        let source = ComputedIndicatorSource::new(feed, 250);

        let price = Decimal::from(251);
        let assessment = source.evaluate("BTC", price).await.unwrap();

        assert!(assessment.lower_highs_lows);
        assert!(!assessment.higher_highs_lows);

        let structure = assessment
            .indicators
            .iter()
            .find(|i| i.name == "Market Structure")
            .unwrap();
        assert_eq!(structure.direction, Bias::Bearish);

        let ema = assessment
            .indicators
            .iter()
            .find(|i| i.name == "EMA Alignment")
            .unwrap();
        assert_eq!(ema.direction, Bias::Bearish);
        assert_eq!(ema.value, "Death Cross (50 < 200)");

        let rsi = assessment.indicators.iter().find(|i| i.name == "RSI (14)").unwrap();
        assert_eq!(rsi.direction, Bias::Bullish);
        assert!(rsi.value.contains("Oversold"));
    }

    #[tokio::test]
    async fn short_history_degrades_to_a_sparse_snapshot() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let feed = Arc::new(StaticFeed {
            candles: make_candles(&closes),
        });
        let source = ComputedIndicatorSource::new(feed, 10);

        let assessment = source.evaluate("BTC", Decimal::from(110)).await.unwrap();
        // Too little history for the oscillators and structure windows
        assert!(assessment.indicators.iter().all(|i| i.name == "Key Levels"));
    }

    #[tokio::test]
    async fn fixture_source_returns_scripted_assessments() {
        let scripted = MarketAssessment::new(vec![Indicator::bullish(
            "RSI (14)",
            "28.0 (Oversold)",
            WEIGHT_RSI,
            Confidence::High,
        )])
        .with_structure(true, false);

        let source = FixtureIndicatorSource::new().script("BTC", scripted);

        let hit = source.evaluate("BTC", Decimal::from(100)).await.unwrap();
        assert_eq!(hit.indicators.len(), 1);
        assert!(hit.higher_highs_lows);

        let miss = source.evaluate("ETH", Decimal::from(100)).await.unwrap();
        assert!(miss.indicators.is_empty());
    }
}
