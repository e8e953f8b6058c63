pub mod agents;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_store;
pub mod events;
pub mod latency;
pub mod orderbook;
pub mod participant;
pub mod simulator;
pub mod types;

pub use commands::{CancelOrderCommand, CommandOutcome, OrderCommand, PlaceOrderCommand};
pub use config::{EngineConfig, SimulationConfig};
pub use engine::MatchingEngine;
pub use error::{ConfigError, EngineError, FillError, OrderError};
pub use event_store::{EventStore, InMemoryEventStore};
pub use events::{
    MarketEvent, MarketOrderExpiredEvent, OrderAcceptedEvent, OrderCanceledEvent,
    OrderRestedEvent,
};
pub use latency::LatencyQueue;
pub use orderbook::OrderBook;
pub use participant::FillHandler;
pub use simulator::{SimulationReport, Simulator};
pub use types::{
    BookSnapshot, Fill, Order, OrderBookEntry, OrderKind, OrderSide, OrderStatus, OrderType,
    Trade,
};
