use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{flatten, Agent, AgentCore, MarketData};
use crate::config::StoikovConfig;
use crate::engine::MatchingEngine;
use crate::error::EngineError;
use crate::types::{OrderKind, OrderSide};

/// Avellaneda-Stoikov market maker.
///
/// Skews its quotes away from its inventory and widens them with the time
/// left in the session. Once the session is over it only flattens.
pub struct StoikovMarketMaker {
    core: Arc<AgentCore>,
    config: StoikovConfig,
    sigma_sq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Quote {
    reservation_price: f64,
    bid: f64,
    ask: f64,
}

impl StoikovMarketMaker {
    pub fn new(name: impl Into<String>, config: StoikovConfig, volatility: f64) -> Self {
        Self {
            core: AgentCore::new(name),
            config,
            sigma_sq: volatility * volatility,
        }
    }

    fn quote(&self, mid: f64, position: i64, time_remaining: f64) -> Quote {
        let gamma = self.config.risk_aversion;
        let kappa = self.config.order_book_density;
        let inventory_risk = gamma * self.sigma_sq * time_remaining;

        let reservation_price = mid - position as f64 * inventory_risk;
        let spread = inventory_risk + (2.0 / gamma) * (1.0 + gamma / kappa).ln();
        Quote {
            reservation_price,
            bid: reservation_price - spread / 2.0,
            ask: reservation_price + spread / 2.0,
        }
    }
}

fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|price| price.round_dp(2))
}

#[async_trait]
impl Agent for StoikovMarketMaker {
    fn core(&self) -> &Arc<AgentCore> {
        &self.core
    }

    async fn update(&self, engine: &MatchingEngine, market: &MarketData) -> Result<(), EngineError> {
        self.core.cancel_all(engine).await;
        let position = self.core.position();

        if market.time_remaining_secs <= 0.0 {
            if let Some((side, quantity)) = flatten(position) {
                info!(agent = self.core.name(), position, "session ended, liquidating");
                self.core.place(engine, OrderKind::Market, side, quantity).await?;
            }
            return Ok(());
        }

        let Some(mid) = market.last_price.to_f64() else {
            return Ok(());
        };
        let quote = self.quote(mid, position, market.time_remaining_secs);
        let (Some(bid), Some(ask)) = (to_price(quote.bid), to_price(quote.ask)) else {
            return Ok(());
        };
        if bid <= Decimal::ZERO || bid >= ask {
            warn!(agent = self.core.name(), %bid, %ask, "quote crossed, not quoting");
            return Ok(());
        }

        let quantity = self.config.order_quantity;
        self.core
            .place(engine, OrderKind::Limit { price: bid }, OrderSide::Buy, quantity)
            .await?;
        self.core
            .place(engine, OrderKind::Limit { price: ask }, OrderSide::Sell, quantity)
            .await?;
        info!(
            agent = self.core.name(),
            position,
            reservation_price = quote.reservation_price,
            %bid,
            %ask,
            "stoikov quoted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maker() -> StoikovMarketMaker {
        StoikovMarketMaker::new("S", StoikovConfig::default(), 0.05)
    }

    #[test]
    fn test_flat_inventory_quotes_symmetric() {
        let quote = maker().quote(100.0, 0, 20.0);
        assert_eq!(quote.reservation_price, 100.0);
        assert!((quote.ask - 100.0 - (100.0 - quote.bid)).abs() < 1e-9);
        assert!(quote.bid < quote.ask);
    }

    #[test]
    fn test_long_inventory_skews_down() {
        let maker = maker();
        let flat = maker.quote(100.0, 0, 20.0);
        let long = maker.quote(100.0, 50, 20.0);
        assert!(long.reservation_price < flat.reservation_price);
        assert!(long.ask < flat.ask);
    }

    #[test]
    fn test_to_price_rounds_to_cents() {
        assert_eq!(to_price(99.3349), Some(Decimal::new(9933, 2)));
    }
}
