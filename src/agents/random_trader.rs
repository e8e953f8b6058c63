use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::info;

use super::{lock, Agent, AgentCore, MarketData};
use crate::config::RandomTraderConfig;
use crate::engine::MatchingEngine;
use crate::error::EngineError;
use crate::types::{OrderKind, OrderSide};

/// Noise trader. Places a random order on a random fraction of ticks.
pub struct RandomTrader {
    core: Arc<AgentCore>,
    config: RandomTraderConfig,
    rng: Mutex<StdRng>,
}

impl RandomTrader {
    pub fn new(name: impl Into<String>, config: RandomTraderConfig, seed: u64) -> Self {
        Self {
            core: AgentCore::new(name),
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

/// Limit price a little behind the touch, so the order rests rather than
/// crossing. `None` when that side of the book is empty.
fn passive_price(side: OrderSide, market: &MarketData) -> Option<Decimal> {
    match side {
        OrderSide::Buy => market.best_bid.map(|bid| bid * Decimal::new(999, 3)),
        OrderSide::Sell => market.best_ask.map(|ask| ask * Decimal::new(1001, 3)),
    }
    .map(|price| price.round_dp(2))
}

#[async_trait]
impl Agent for RandomTrader {
    fn core(&self) -> &Arc<AgentCore> {
        &self.core
    }

    async fn update(&self, engine: &MatchingEngine, market: &MarketData) -> Result<(), EngineError> {
        let (side, quantity, wants_limit) = {
            let mut rng = lock(&self.rng);
            if !rng.random_bool(self.config.trade_chance.clamp(0.0, 1.0)) {
                return Ok(());
            }
            let side = if rng.random_bool(0.5) {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            let quantity = rng.random_range(1..=self.config.max_quantity.max(1));
            (side, quantity, rng.random_bool(0.5))
        };

        let kind = wants_limit
            .then(|| passive_price(side, market))
            .flatten()
            .map_or(OrderKind::Market, |price| OrderKind::Limit { price });
        info!(agent = self.core.name(), ?side, ?kind, quantity, "random trader queuing order");
        self.core.place(engine, kind, side, quantity).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(best_bid: Option<i64>, best_ask: Option<i64>) -> MarketData {
        MarketData {
            tick: 0,
            best_bid: best_bid.map(Decimal::from),
            best_ask: best_ask.map(Decimal::from),
            last_price: Decimal::from(100),
            time_remaining_secs: 1.0,
        }
    }

    #[test]
    fn test_passive_price_sits_behind_touch() {
        let data = market(Some(100), Some(101));
        assert_eq!(passive_price(OrderSide::Buy, &data), Some(Decimal::new(9990, 2)));
        assert_eq!(passive_price(OrderSide::Sell, &data), Some(Decimal::new(10110, 2)));
    }

    #[test]
    fn test_passive_price_needs_a_touch() {
        let data = market(None, Some(101));
        assert_eq!(passive_price(OrderSide::Buy, &data), None);
    }
}
