use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::agents::{
    Agent, LatencyArbitrageTrader, MarketData, MarketMaker, RandomTrader, StoikovMarketMaker,
};
use crate::config::SimulationConfig;
use crate::engine::MatchingEngine;
use crate::event_store::InMemoryEventStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPnl {
    pub agent_id: Uuid,
    pub name: String,
    pub position: i64,
    pub cash_change: Decimal,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub last_price: Decimal,
    pub total_trades: usize,
    pub agents: Vec<AgentPnl>,
}

impl SimulationReport {
    pub fn log(&self) {
        info!("--- Final Profit and Loss Report ---");
        for row in &self.agents {
            info!(
                "Agent: {:<12} | Total PnL: {:>10.2} | Final Position: {:<5} | Cash Change: {:>10.2}",
                row.name, row.total_pnl, row.position, row.cash_change
            );
        }
        info!(
            "Total Trades Executed: {} | Last Price: {:.2}",
            self.total_trades, self.last_price
        );
    }
}

/// Tick driver. Each tick every agent acts on the same market data, then
/// the engine drains its latency queue and crosses the book.
pub struct Simulator {
    engine: Arc<MatchingEngine>,
    agents: Vec<Arc<dyn Agent>>,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        let engine = MatchingEngine::new(&config.engine, Box::new(InMemoryEventStore::new()));
        Self {
            engine: Arc::new(engine),
            agents: Vec::new(),
            config,
        }
    }

    /// Noise traders, an optional fixed-spread maker, a Stoikov maker and a
    /// latency arbitrageur, as enabled in the config.
    pub fn with_default_agents(config: SimulationConfig) -> Self {
        let mut simulator = Self::new(config.clone());
        for i in 0..config.random_trader.count {
            simulator.add_agent(Arc::new(RandomTrader::new(
                format!("RT{}", i + 1),
                config.random_trader.clone(),
                config.seed.wrapping_add(i as u64),
            )));
        }
        if config.market_maker.enabled {
            simulator.add_agent(Arc::new(MarketMaker::new("MM1", config.market_maker.clone())));
        }
        if config.stoikov.enabled {
            simulator.add_agent(Arc::new(StoikovMarketMaker::new(
                "StoikovMM1",
                config.stoikov.clone(),
                config.volatility,
            )));
        }
        if config.latency_arbitrage.enabled {
            simulator.add_agent(Arc::new(LatencyArbitrageTrader::new(
                "Arb1",
                config.latency_arbitrage.clone(),
            )));
        }
        simulator
    }

    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) {
        let core = Arc::clone(agent.core());
        self.engine.register_participant(core.id(), core);
        self.agents.push(agent);
    }

    pub fn engine(&self) -> &Arc<MatchingEngine> {
        &self.engine
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub async fn market_data(&self, tick: u64) -> MarketData {
        let remaining_ticks = self.config.total_ticks().saturating_sub(tick + 1);
        let time_remaining_secs = if self.config.ticks_per_second > 0.0 {
            remaining_ticks as f64 / self.config.ticks_per_second
        } else {
            0.0
        };
        MarketData {
            tick,
            best_bid: self.engine.best_bid().await,
            best_ask: self.engine.best_ask().await,
            last_price: self.engine.last_trade_price().await,
            time_remaining_secs,
        }
    }

    /// Runs one tick and returns how many trades it produced.
    pub async fn step(&self, tick: u64) -> usize {
        let market = self.market_data(tick).await;
        match (market.best_bid, market.best_ask) {
            (Some(bid), Some(ask)) => info!(
                "--- Market Tick {} | Last Price: {:.2} | Best Bid: {:.2}, Best Ask: {:.2} ---",
                tick, market.last_price, bid, ask
            ),
            _ => info!(
                "--- Market Tick {} | Last Price: {:.2} | BBO: Not available ---",
                tick, market.last_price
            ),
        }

        for agent in &self.agents {
            if let Err(err) = agent.update(&self.engine, &market).await {
                error!(agent = agent.core().name(), %err, "agent update failed");
            }
        }

        let executed = self.engine.process_pending().await.len();
        executed + self.engine.match_continuous().await.len()
    }

    pub async fn run(&self) -> SimulationReport {
        info!("--- Starting HFT Simulation ---");
        let interval = self.config.tick_interval();
        for tick in 0..self.config.total_ticks() {
            self.step(tick).await;
            if self.config.realtime {
                tokio::time::sleep(interval).await;
            }
        }
        info!("--- Simulation Ended ---");
        self.report().await
    }

    pub async fn report(&self) -> SimulationReport {
        let last_price = self.engine.last_trade_price().await;
        let agents = self
            .agents
            .iter()
            .map(|agent| {
                let core = agent.core();
                let portfolio = core.portfolio();
                AgentPnl {
                    agent_id: core.id(),
                    name: core.name().to_string(),
                    position: portfolio.position,
                    cash_change: portfolio.realized_pnl(),
                    total_pnl: portfolio.total_pnl(last_price),
                }
            })
            .collect();
        SimulationReport {
            last_price,
            total_trades: self.engine.trade_history().await.len(),
            agents,
        }
    }
}
