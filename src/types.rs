//! Domain types shared across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directional reading of a single indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

/// How firmly an indicator stands behind its reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Weight multiplier applied during confluence scoring
    pub fn multiplier(&self) -> f64 {
        match self {
            Confidence::High => 1.2,
            Confidence::Medium => 1.0,
            Confidence::Low => 0.7,
        }
    }
}

/// Overall conviction tier of an emitted signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "Low",
            ConfidenceTier::Medium => "Medium",
            ConfidenceTier::High => "High",
            ConfidenceTier::VeryHigh => "Very High",
        }
    }
}

/// Trade direction of an emitted signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    /// Enter long
    Buy,
    /// Enter short
    Sell,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
        }
    }
}

/// Lifecycle state of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Awaiting resolution against price movement
    Pending,
    /// Take profit reached
    Won,
    /// Stop loss reached
    Lost,
    /// Closed flat (manual close near entry)
    Breakeven,
}

impl SignalStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

/// Swing-structure read of the recent price action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Range,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Uptrend => "Uptrend",
            TrendDirection::Downtrend => "Downtrend",
            TrendDirection::Range => "Range",
        }
    }

    /// Human-readable structure label used in signal reasoning
    pub fn structure_label(&self) -> &'static str {
        match self {
            TrendDirection::Uptrend => "Bullish Structure",
            TrendDirection::Downtrend => "Bearish Structure",
            TrendDirection::Range => "Consolidation Range",
        }
    }
}

/// One indicator's judgment for a symbol at evaluation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Indicator name, e.g. "RSI", "MACD"
    pub name: String,
    /// Human-readable reading, e.g. "28.41" or "Bullish Cross"
    pub value: String,
    pub direction: Bias,
    /// Contribution weight in confluence scoring
    pub weight: u32,
    pub confidence: Confidence,
}

impl Indicator {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        direction: Bias,
        weight: u32,
        confidence: Confidence,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction,
            weight,
            confidence,
        }
    }

    pub fn bullish(
        name: impl Into<String>,
        value: impl Into<String>,
        weight: u32,
        confidence: Confidence,
    ) -> Self {
        Self::new(name, value, Bias::Bullish, weight, confidence)
    }

    pub fn bearish(
        name: impl Into<String>,
        value: impl Into<String>,
        weight: u32,
        confidence: Confidence,
    ) -> Self {
        Self::new(name, value, Bias::Bearish, weight, confidence)
    }

    pub fn neutral(
        name: impl Into<String>,
        value: impl Into<String>,
        weight: u32,
        confidence: Confidence,
    ) -> Self {
        Self::new(name, value, Bias::Neutral, weight, confidence)
    }
}

/// Indicator snapshot for one symbol, plus the swing-structure flags
/// read off the same candle window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAssessment {
    pub indicators: Vec<Indicator>,
    pub higher_highs_lows: bool,
    pub lower_highs_lows: bool,
}

impl MarketAssessment {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators,
            higher_highs_lows: false,
            lower_highs_lows: false,
        }
    }

    pub fn with_structure(mut self, higher_highs_lows: bool, lower_highs_lows: bool) -> Self {
        self.higher_highs_lows = higher_highs_lows;
        self.lower_highs_lows = lower_highs_lows;
        self
    }

    /// Trend read from the structure flags; higher highs/lows take precedence
    pub fn trend(&self) -> TrendDirection {
        if self.higher_highs_lows {
            TrendDirection::Uptrend
        } else if self.lower_highs_lows {
            TrendDirection::Downtrend
        } else {
            TrendDirection::Range
        }
    }
}

/// Spot price for a symbol at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// OHLCV candle for technical analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// An emitted trade signal tracked through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Assigned by the store when the signal is persisted
    pub id: Uuid,
    pub symbol: String,
    pub direction: SignalDirection,
    /// Conviction score 0-100, capped at 95
    pub strength: u8,
    pub confidence: ConfidenceTier,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Reward-to-risk ratio, e.g. "2.40:1"
    pub risk_reward: String,
    /// Indicator snapshot that produced the signal (audit trail)
    pub indicators: Vec<Indicator>,
    /// Multi-line explanation of why the signal fired
    pub reasoning: String,
    pub trend_direction: TrendDirection,
    pub status: SignalStatus,
    /// Price at which the signal resolved
    pub result_price: Option<Decimal>,
    /// Realized move in percent, positive for wins
    pub profit_loss_pct: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Create a pending signal at its entry price. Levels, indicators and
    /// reasoning are attached with the `with_*` builders.
    pub fn new(
        symbol: impl Into<String>,
        direction: SignalDirection,
        strength: u8,
        confidence: ConfidenceTier,
        entry_price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            symbol: symbol.into(),
            direction,
            strength,
            confidence,
            entry_price,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            risk_reward: String::new(),
            indicators: Vec::new(),
            reasoning: String::new(),
            trend_direction: TrendDirection::Range,
            status: SignalStatus::Pending,
            result_price: None,
            profit_loss_pct: None,
            created_at,
            resolved_at: None,
        }
    }

    /// Attach stop loss / take profit levels and the risk/reward label
    pub fn with_levels(mut self, stop_loss: Decimal, take_profit: Decimal, risk_reward: String) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self.risk_reward = risk_reward;
        self
    }

    pub fn with_indicators(mut self, indicators: Vec<Indicator>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_trend(mut self, trend: TrendDirection) -> Self {
        self.trend_direction = trend;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == SignalStatus::Pending
    }

    /// Age of the signal relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("price feed request failed: {0}")]
    Feed(String),

    #[error("rate limit exceeded for {feed}")]
    RateLimited { feed: String, retry_after: Option<u64> },

    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("signal not found: {0}")]
    SignalNotFound(Uuid),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
