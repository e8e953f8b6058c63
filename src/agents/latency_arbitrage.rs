use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{flatten, Agent, AgentCore, MarketData};
use crate::config::LatencyArbitrageConfig;
use crate::engine::MatchingEngine;
use crate::error::EngineError;
use crate::types::{Order, OrderKind, OrderType};

/// Watches the latency queue for large foreign market orders and trades in
/// the same direction, then exits on the following tick.
pub struct LatencyArbitrageTrader {
    core: Arc<AgentCore>,
    config: LatencyArbitrageConfig,
    in_position: AtomicBool,
}

impl LatencyArbitrageTrader {
    pub fn new(name: impl Into<String>, config: LatencyArbitrageConfig) -> Self {
        Self {
            core: AgentCore::new(name),
            config,
            in_position: AtomicBool::new(false),
        }
    }

    fn find_target<'a>(&self, pending: &'a [Order]) -> Option<&'a Order> {
        pending.iter().find(|order| {
            order.order_type() == OrderType::Market
                && order.quantity() >= self.config.threshold
                && order.owner != self.core.id()
        })
    }
}

#[async_trait]
impl Agent for LatencyArbitrageTrader {
    fn core(&self) -> &Arc<AgentCore> {
        &self.core
    }

    async fn update(&self, engine: &MatchingEngine, _market: &MarketData) -> Result<(), EngineError> {
        if self.in_position.swap(false, Ordering::SeqCst) {
            if let Some((side, quantity)) = flatten(self.core.position()) {
                info!(agent = self.core.name(), "latency arb exiting position");
                self.core
                    .place(engine, OrderKind::Market, side, quantity)
                    .await?;
            }
            return Ok(());
        }
        if self.core.position() != 0 {
            return Ok(());
        }

        let pending = engine.peek_pending().await;
        let Some(target) = self.find_target(&pending) else {
            return Ok(());
        };
        info!(
            agent = self.core.name(),
            side = ?target.side,
            quantity = target.quantity(),
            "large inbound market order detected, front-running"
        );
        self.core
            .place(
                engine,
                OrderKind::Market,
                target.side,
                self.config.quantity,
            )
            .await?;
        self.in_position.store(true, Ordering::SeqCst);
        Ok(())
    }
}
