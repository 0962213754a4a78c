//! Signal Engine Library
//!
//! Confluence-based trading signal generation and lifecycle tracking.

pub mod config;
pub mod confluence;
pub mod feed;
pub mod indicators;
pub mod lifecycle;
pub mod runner;
pub mod store;
pub mod synthesizer;
pub mod types;

// Re-export main types for convenience
pub use config::{EngineConfig, FeedConfig, SweepConfig, SynthConfig};
pub use confluence::Verdict;
pub use feed::{HttpPriceFeed, PriceFeed, SimulatedPriceFeed};
pub use indicators::{ComputedIndicatorSource, FixtureIndicatorSource, IndicatorSource};
pub use lifecycle::LifecycleManager;
pub use runner::{CycleStats, SignalRunner};
pub use store::{MemorySignalStore, SignalFilter, SignalStats, SignalStore};
pub use types::{
    Bias, Candle, Confidence, ConfidenceTier, EngineError, Indicator, MarketAssessment, PricePoint,
    Signal, SignalDirection, SignalStatus, TrendDirection,
};
