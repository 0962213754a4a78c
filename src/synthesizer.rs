//! Signal synthesis - turns a scorer verdict and the current price into a
//! fully populated pending signal

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::confluence::Verdict;
use crate::config::SynthConfig;
use crate::types::{Indicator, Signal, SignalDirection};

/// Build a pending signal from a directional verdict.
///
/// Stop and target distances are interpolated within the configured ranges
/// by normalized strength, so a stronger verdict stretches both levels
/// toward the wide end of its range. Fully deterministic: the caller
/// supplies the timestamp and the store assigns the id.
pub fn synthesize(
    verdict: &Verdict,
    symbol: &str,
    entry_price: Decimal,
    indicators: Vec<Indicator>,
    config: &SynthConfig,
    created_at: DateTime<Utc>,
) -> Signal {
    let t = verdict.strength as f64 / 100.0;
    let sl_pct =
        config.stop_loss_min_pct + (config.stop_loss_max_pct - config.stop_loss_min_pct) * t;
    let tp_pct =
        config.take_profit_min_pct + (config.take_profit_max_pct - config.take_profit_min_pct) * t;

    let sl_frac = pct_fraction(sl_pct);
    let tp_frac = pct_fraction(tp_pct);

    let (stop_loss, take_profit) = match verdict.direction {
        SignalDirection::Buy => (
            (entry_price * (Decimal::ONE - sl_frac)).round_dp(8),
            (entry_price * (Decimal::ONE + tp_frac)).round_dp(8),
        ),
        SignalDirection::Sell => (
            (entry_price * (Decimal::ONE + sl_frac)).round_dp(8),
            (entry_price * (Decimal::ONE - tp_frac)).round_dp(8),
        ),
    };

    let risk_reward = format!("{:.2}:1", tp_pct / sl_pct);
    let reasoning = build_reasoning(verdict);

    Signal::new(
        symbol,
        verdict.direction,
        verdict.strength,
        verdict.confidence,
        entry_price,
        created_at,
    )
    .with_levels(stop_loss, take_profit, risk_reward)
    .with_indicators(indicators)
    .with_reasoning(reasoning)
    .with_trend(verdict.trend)
}

/// Percent to fraction with basis-point precision, e.g. 2.45 -> 0.0245
fn pct_fraction(pct: f64) -> Decimal {
    Decimal::new((pct * 100.0).round() as i64, 4)
}

fn build_reasoning(verdict: &Verdict) -> String {
    let side = match verdict.direction {
        SignalDirection::Buy => "bullish",
        SignalDirection::Sell => "bearish",
    };
    format!(
        "STRONG {} SIGNAL ({} Confidence)\n\n\
         {}/{} indicators align {}\n\
         {} high-confidence {} signals\n\
         Market Structure: {}\n\
         Trend: {}\n\
         Confluence Score: {}%",
        verdict.direction.as_str(),
        verdict.confidence.as_str(),
        verdict.aligned_count(),
        verdict.total_indicators,
        side,
        verdict.aligned_high_confidence,
        side,
        verdict.trend.structure_label(),
        verdict.trend.as_str(),
        verdict.confluence_pct(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, ConfidenceTier, SignalStatus, TrendDirection};

    fn verdict(direction: SignalDirection, strength: u8) -> Verdict {
        Verdict {
            direction,
            strength,
            confidence: ConfidenceTier::Medium,
            bullish_confluence: 5,
            bearish_confluence: 0,
            bullish_weight: 99.6,
            bearish_weight: 0.0,
            aligned_high_confidence: 4,
            total_indicators: 6,
            trend: TrendDirection::Uptrend,
        }
    }

    fn sample_indicators() -> Vec<Indicator> {
        vec![Indicator::bullish("RSI", "28.4", 20, Confidence::High)]
    }

    #[test]
    fn buy_levels_are_direction_consistent() {
        let signal = synthesize(
            &verdict(SignalDirection::Buy, 95),
            "BTC",
            Decimal::from(50000),
            sample_indicators(),
            &SynthConfig::default(),
            Utc::now(),
        );
        assert!(signal.stop_loss < signal.entry_price);
        assert!(signal.entry_price < signal.take_profit);
        assert_eq!(signal.status, SignalStatus::Pending);
    }

    #[test]
    fn sell_levels_are_direction_consistent() {
        let signal = synthesize(
            &verdict(SignalDirection::Sell, 80),
            "ETH",
            Decimal::from(3000),
            sample_indicators(),
            &SynthConfig::default(),
            Utc::now(),
        );
        assert!(signal.take_profit < signal.entry_price);
        assert!(signal.entry_price < signal.stop_loss);
    }

    #[test]
    fn strength_interpolates_levels_within_configured_ranges() {
        // Strength 95 with defaults: stop 2.45%, target 5.40% of entry
        let signal = synthesize(
            &verdict(SignalDirection::Buy, 95),
            "BTC",
            Decimal::from(50000),
            sample_indicators(),
            &SynthConfig::default(),
            Utc::now(),
        );
        assert_eq!(signal.stop_loss, Decimal::from_str_exact("48775.00").unwrap());
        assert_eq!(signal.take_profit, Decimal::from_str_exact("52700.00").unwrap());
        assert_eq!(signal.risk_reward, "2.20:1");

        // Strength 0 sits at the narrow end of both ranges
        let narrow = synthesize(
            &verdict(SignalDirection::Buy, 0),
            "BTC",
            Decimal::from(10000),
            sample_indicators(),
            &SynthConfig::default(),
            Utc::now(),
        );
        assert_eq!(narrow.stop_loss, Decimal::from_str_exact("9850.00").unwrap());
        assert_eq!(narrow.take_profit, Decimal::from_str_exact("10350.00").unwrap());
    }

    #[test]
    fn synthesis_is_deterministic() {
        let created_at = Utc::now();
        let v = verdict(SignalDirection::Buy, 95);
        let first = synthesize(
            &v,
            "BTC",
            Decimal::from(50000),
            sample_indicators(),
            &SynthConfig::default(),
            created_at,
        );
        let second = synthesize(
            &v,
            "BTC",
            Decimal::from(50000),
            sample_indicators(),
            &SynthConfig::default(),
            created_at,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn reasoning_embeds_direction_confidence_and_ratio() {
        let signal = synthesize(
            &verdict(SignalDirection::Buy, 95),
            "BTC",
            Decimal::from(50000),
            sample_indicators(),
            &SynthConfig::default(),
            Utc::now(),
        );
        assert!(signal.reasoning.contains("BUY"));
        assert!(signal.reasoning.contains("Medium Confidence"));
        assert!(signal.reasoning.contains("5/6 indicators align bullish"));
        assert!(signal.reasoning.contains("Confluence Score: 100%"));
        assert!(signal.reasoning.contains("Bullish Structure"));
    }
}
