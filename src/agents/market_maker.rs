use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::{Agent, AgentCore, MarketData};
use crate::config::MarketMakerConfig;
use crate::engine::MatchingEngine;
use crate::error::EngineError;
use crate::types::{OrderKind, OrderSide};

/// Quotes a fixed spread around the last trade price, replacing its quotes
/// every tick.
pub struct MarketMaker {
    core: Arc<AgentCore>,
    config: MarketMakerConfig,
}

impl MarketMaker {
    pub fn new(name: impl Into<String>, config: MarketMakerConfig) -> Self {
        Self {
            core: AgentCore::new(name),
            config,
        }
    }

    fn quotes(&self, mid: Decimal) -> (Decimal, Decimal) {
        let half = self.config.spread / Decimal::TWO;
        ((mid - half).round_dp(2), (mid + half).round_dp(2))
    }
}

#[async_trait]
impl Agent for MarketMaker {
    fn core(&self) -> &Arc<AgentCore> {
        &self.core
    }

    async fn update(&self, engine: &MatchingEngine, market: &MarketData) -> Result<(), EngineError> {
        self.core.cancel_all(engine).await;

        let (bid, ask) = self.quotes(market.last_price);
        let quantity = self.config.order_quantity;
        self.core
            .place(engine, OrderKind::Limit { price: bid }, OrderSide::Buy, quantity)
            .await?;
        self.core
            .place(engine, OrderKind::Limit { price: ask }, OrderSide::Sell, quantity)
            .await?;
        debug!(agent = self.core.name(), %bid, %ask, "market maker quoted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_straddle_mid() {
        let maker = MarketMaker::new(
            "MM",
            MarketMakerConfig {
                enabled: true,
                spread: Decimal::new(10, 2),
                order_quantity: 1,
            },
        );
        let (bid, ask) = maker.quotes(Decimal::from(100));
        assert_eq!(bid, Decimal::new(9995, 2));
        assert_eq!(ask, Decimal::new(10005, 2));
    }
}
