//! Confluence scoring - combines weighted indicator judgments into a
//! directional verdict

use serde::{Deserialize, Serialize};

use crate::types::{Bias, Confidence, ConfidenceTier, MarketAssessment, SignalDirection, TrendDirection};

/// Minimum aligned indicators before a verdict can fire
const MIN_CONFLUENCE: usize = 5;
/// Winning side must out-weigh the other by this factor
const WEIGHT_RATIO: f64 = 1.8;

const HIGH_TIER_CONFLUENCE: usize = 6;
const HIGH_TIER_RATIO: f64 = 2.2;
const VERY_HIGH_TIER_CONFLUENCE: usize = 7;
const VERY_HIGH_TIER_RATIO: f64 = 2.5;

/// Reported strength is capped below 100
const STRENGTH_CAP: u8 = 95;

/// Directional verdict produced when confluence is sufficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub direction: SignalDirection,
    /// Winning side's weight share of the total, 0-100, capped at 95
    pub strength: u8,
    pub confidence: ConfidenceTier,
    pub bullish_confluence: usize,
    pub bearish_confluence: usize,
    pub bullish_weight: f64,
    pub bearish_weight: f64,
    /// High-confidence indicators on the winning side
    pub aligned_high_confidence: usize,
    /// Total indicators evaluated, neutral included
    pub total_indicators: usize,
    pub trend: TrendDirection,
}

impl Verdict {
    /// Indicators aligned with the verdict direction
    pub fn aligned_count(&self) -> usize {
        match self.direction {
            SignalDirection::Buy => self.bullish_confluence,
            SignalDirection::Sell => self.bearish_confluence,
        }
    }

    /// Winning side's share of total weight in percent, uncapped
    pub fn confluence_pct(&self) -> u8 {
        let total = self.bullish_weight + self.bearish_weight;
        if total <= 0.0 {
            return 0;
        }
        let winning = match self.direction {
            SignalDirection::Buy => self.bullish_weight,
            SignalDirection::Sell => self.bearish_weight,
        };
        (winning / total * 100.0).round() as u8
    }
}

/// Score an indicator snapshot. Returns `None` when confluence is
/// insufficient to commit to a direction.
///
/// Pure and synchronous: same assessment in, same verdict out.
pub fn score(assessment: &MarketAssessment) -> Option<Verdict> {
    let indicators = &assessment.indicators;
    if indicators.is_empty() {
        return None;
    }

    let mut bullish_confluence = 0usize;
    let mut bearish_confluence = 0usize;
    let mut bullish_weight = 0.0f64;
    let mut bearish_weight = 0.0f64;
    let mut bullish_high = 0usize;
    let mut bearish_high = 0usize;

    for indicator in indicators {
        let contribution = indicator.weight as f64 * indicator.confidence.multiplier();
        match indicator.direction {
            Bias::Bullish => {
                bullish_confluence += 1;
                bullish_weight += contribution;
                if indicator.confidence == Confidence::High {
                    bullish_high += 1;
                }
            }
            Bias::Bearish => {
                bearish_confluence += 1;
                bearish_weight += contribution;
                if indicator.confidence == Confidence::High {
                    bearish_high += 1;
                }
            }
            Bias::Neutral => {}
        }
    }

    // All-neutral set: nothing to divide by, no verdict
    let total_weight = bullish_weight + bearish_weight;
    if total_weight <= 0.0 {
        return None;
    }

    // BUY is evaluated first and wins any theoretical tie
    let (direction, winning_weight, losing_weight, confluence, high_confidence) =
        if bullish_confluence >= MIN_CONFLUENCE && bullish_weight > bearish_weight * WEIGHT_RATIO {
            (
                SignalDirection::Buy,
                bullish_weight,
                bearish_weight,
                bullish_confluence,
                bullish_high,
            )
        } else if bearish_confluence >= MIN_CONFLUENCE
            && bearish_weight > bullish_weight * WEIGHT_RATIO
        {
            (
                SignalDirection::Sell,
                bearish_weight,
                bullish_weight,
                bearish_confluence,
                bearish_high,
            )
        } else {
            return None;
        };

    // Ratio tests stay multiplicative so a zero losing side passes them
    let confidence = if confluence >= VERY_HIGH_TIER_CONFLUENCE
        && winning_weight > losing_weight * VERY_HIGH_TIER_RATIO
    {
        ConfidenceTier::VeryHigh
    } else if confluence >= HIGH_TIER_CONFLUENCE && winning_weight > losing_weight * HIGH_TIER_RATIO
    {
        ConfidenceTier::High
    } else {
        ConfidenceTier::Medium
    };

    let strength = ((winning_weight / total_weight) * 100.0).round() as u8;

    Some(Verdict {
        direction,
        strength: strength.min(STRENGTH_CAP),
        confidence,
        bullish_confluence,
        bearish_confluence,
        bullish_weight,
        bearish_weight,
        aligned_high_confidence: high_confidence,
        total_indicators: indicators.len(),
        trend: assessment.trend(),
    })
}
