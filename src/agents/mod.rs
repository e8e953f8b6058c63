//! Trading strategies that drive the engine in simulation.
//!
//! Agents only use the engine's public surface: they submit and cancel
//! orders, read market data, and learn about fills through their
//! [`AgentCore`], which is what gets registered as the fill handler.

mod latency_arbitrage;
mod market_maker;
mod random_trader;
mod stoikov;

pub use latency_arbitrage::LatencyArbitrageTrader;
pub use market_maker::MarketMaker;
pub use random_trader::RandomTrader;
pub use stoikov::StoikovMarketMaker;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::MatchingEngine;
use crate::error::{EngineError, FillError};
use crate::participant::FillHandler;
use crate::types::{Fill, Order, OrderKind, OrderSide};

/// What every agent sees at the start of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub tick: u64,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub last_price: Decimal,
    /// Simulated session time left after this tick.
    pub time_remaining_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub initial_cash: Decimal,
    pub cash: Decimal,
    pub position: i64,
}

impl Portfolio {
    pub const DEFAULT_CASH: i64 = 100_000;

    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            position: 0,
        }
    }

    pub fn apply_fill(&mut self, fill: &Fill) {
        let notional = fill.price * Decimal::from(fill.quantity);
        let quantity = fill.quantity as i64;
        match fill.side {
            OrderSide::Buy => {
                self.cash -= notional;
                self.position += quantity;
            }
            OrderSide::Sell => {
                self.cash += notional;
                self.position -= quantity;
            }
        }
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.cash - self.initial_cash
    }

    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        Decimal::from(self.position) * mark
    }

    /// Mark-to-market PnL at `mark`.
    pub fn total_pnl(&self, mark: Decimal) -> Decimal {
        self.realized_pnl() + self.unrealized_pnl(mark)
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new(Decimal::from(Self::DEFAULT_CASH))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identity, book-keeping and open orders shared by every strategy.
#[derive(Debug)]
pub struct AgentCore {
    id: Uuid,
    name: String,
    portfolio: Mutex<Portfolio>,
    open_orders: Mutex<Vec<Uuid>>,
}

impl AgentCore {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            portfolio: Mutex::new(Portfolio::default()),
            open_orders: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn portfolio(&self) -> Portfolio {
        *lock(&self.portfolio)
    }

    pub fn position(&self) -> i64 {
        lock(&self.portfolio).position
    }

    pub fn open_orders(&self) -> Vec<Uuid> {
        lock(&self.open_orders).clone()
    }

    pub async fn place(
        &self,
        engine: &MatchingEngine,
        kind: OrderKind,
        side: OrderSide,
        quantity: u64,
    ) -> Result<Uuid, EngineError> {
        let order_id = engine.submit(Order::new(self.id, kind, side, quantity)).await?;
        lock(&self.open_orders).push(order_id);
        Ok(order_id)
    }

    /// Cancels everything this agent placed. Orders that already left the
    /// book are ignored by the engine.
    pub async fn cancel_all(&self, engine: &MatchingEngine) {
        let order_ids = std::mem::take(&mut *lock(&self.open_orders));
        for order_id in order_ids {
            engine.cancel(order_id).await;
        }
    }
}

impl FillHandler for AgentCore {
    fn on_fill(&self, fill: &Fill) -> Result<(), FillError> {
        lock(&self.portfolio).apply_fill(fill);
        Ok(())
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn core(&self) -> &Arc<AgentCore>;

    /// Called once per tick before the engine drains its queue.
    async fn update(&self, engine: &MatchingEngine, market: &MarketData) -> Result<(), EngineError>;
}

/// Market order that brings `position` back to zero.
fn flatten(position: i64) -> Option<(OrderSide, u64)> {
    match position {
        0 => None,
        p if p > 0 => Some((OrderSide::Sell, p.unsigned_abs())),
        p => Some((OrderSide::Buy, p.unsigned_abs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(side: OrderSide, price: i64, quantity: u64) -> Fill {
        Fill {
            order_id: Uuid::new_v4(),
            price: Decimal::from(price),
            quantity,
            side,
        }
    }

    #[test]
    fn test_portfolio_tracks_cash_and_position() {
        let mut portfolio = Portfolio::default();
        portfolio.apply_fill(&fill(OrderSide::Buy, 100, 10));
        portfolio.apply_fill(&fill(OrderSide::Sell, 102, 4));

        assert_eq!(portfolio.position, 6);
        assert_eq!(portfolio.realized_pnl(), Decimal::from(-1000 + 408));
        assert_eq!(portfolio.total_pnl(Decimal::from(101)), Decimal::from(-592 + 606));
    }

    #[test]
    fn test_core_handles_fills() {
        let core = AgentCore::new("test");
        core.on_fill(&fill(OrderSide::Sell, 50, 2)).unwrap();
        assert_eq!(core.position(), -2);
        assert_eq!(core.portfolio().cash, Decimal::from(Portfolio::DEFAULT_CASH + 100));
    }

    #[test]
    fn test_flatten() {
        assert_eq!(flatten(0), None);
        assert_eq!(flatten(3), Some((OrderSide::Sell, 3)));
        assert_eq!(flatten(-2), Some((OrderSide::Buy, 2)));
    }
}
