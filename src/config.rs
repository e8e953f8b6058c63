use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing delay charged per order when the latency queue drains.
    pub latency_ms: u64,
    /// Reported as the last trade price until the first trade.
    pub initial_price: Decimal,
}

impl EngineConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            latency_ms: 2,
            initial_price: Decimal::new(10000, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub engine: EngineConfig,
    pub duration_secs: u64,
    pub ticks_per_second: f64,
    /// Sleep between ticks. Off, the simulation runs as fast as it can.
    pub realtime: bool,
    pub seed: u64,
    /// Standard deviation of price changes, as used by the Stoikov model.
    pub volatility: f64,
    pub random_trader: RandomTraderConfig,
    pub market_maker: MarketMakerConfig,
    pub stoikov: StoikovConfig,
    pub latency_arbitrage: LatencyArbitrageConfig,
}

impl SimulationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn total_ticks(&self) -> u64 {
        (self.duration_secs as f64 * self.ticks_per_second).round() as u64
    }

    pub fn tick_interval(&self) -> Duration {
        if self.ticks_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / self.ticks_per_second)
        } else {
            Duration::from_secs(1)
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            duration_secs: 20,
            ticks_per_second: 5.0,
            realtime: true,
            seed: 42,
            volatility: 0.05,
            random_trader: RandomTraderConfig::default(),
            market_maker: MarketMakerConfig::default(),
            stoikov: StoikovConfig::default(),
            latency_arbitrage: LatencyArbitrageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomTraderConfig {
    pub count: usize,
    pub trade_chance: f64,
    pub max_quantity: u64,
}

impl Default for RandomTraderConfig {
    fn default() -> Self {
        Self {
            count: 2,
            trade_chance: 0.6,
            max_quantity: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    pub enabled: bool,
    pub spread: Decimal,
    pub order_quantity: u64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spread: Decimal::new(10, 2),
            order_quantity: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoikovConfig {
    pub enabled: bool,
    /// Gamma.
    pub risk_aversion: f64,
    /// Kappa.
    pub order_book_density: f64,
    pub order_quantity: u64,
}

impl Default for StoikovConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_aversion: 0.01,
            order_book_density: 1.5,
            order_quantity: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyArbitrageConfig {
    pub enabled: bool,
    /// Smallest pending market order worth front-running.
    pub threshold: u64,
    pub quantity: u64,
}

impl Default for LatencyArbitrageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 30,
            quantity: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"duration_secs": 2, "engine": {"latency_ms": 0}}"#).unwrap();
        assert_eq!(config.duration_secs, 2);
        assert_eq!(config.engine.latency(), Duration::ZERO);
        assert_eq!(config.engine.initial_price, Decimal::new(10000, 2));
        assert_eq!(config.total_ticks(), 10);
        assert_eq!(config.latency_arbitrage.threshold, 30);
    }

    #[test]
    fn test_tick_interval_from_rate() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
    }
}
