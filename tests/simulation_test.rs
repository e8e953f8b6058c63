use hft_matching_engine::{SimulationConfig, Simulator};
use rust_decimal::Decimal;

fn fast_config(seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.engine.latency_ms = 0;
    config.realtime = false;
    config.duration_secs = 4;
    config.seed = seed;
    config.market_maker.enabled = true;
    config
}

#[tokio::test]
async fn test_simulation_conserves_inventory_and_cash() {
    let simulator = Simulator::with_default_agents(fast_config(7));
    let report = simulator.run().await;

    assert_eq!(report.agents.len(), 5);
    let net_position: i64 = report.agents.iter().map(|a| a.position).sum();
    let net_cash: Decimal = report.agents.iter().map(|a| a.cash_change).sum();
    assert_eq!(net_position, 0);
    assert_eq!(net_cash, Decimal::ZERO);
    assert_eq!(report.total_trades, simulator.engine().trade_history().await.len());
}

#[tokio::test]
async fn test_simulation_leaves_book_uncrossed() {
    let simulator = Simulator::with_default_agents(fast_config(11));
    for tick in 0..10 {
        simulator.step(tick).await;
        let engine = simulator.engine();
        if let (Some(bid), Some(ask)) = (engine.best_bid().await, engine.best_ask().await) {
            assert!(bid < ask);
        }
        assert!(engine.peek_pending().await.is_empty());
    }
}
