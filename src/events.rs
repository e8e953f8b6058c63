use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{OrderSide, OrderType, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    OrderAccepted(OrderAcceptedEvent),
    OrderRested(OrderRestedEvent),
    OrderCanceled(OrderCanceledEvent),
    TradeExecuted(Trade),
    MarketOrderExpired(MarketOrderExpiredEvent),
}

impl MarketEvent {
    /// Orders this event concerns. A trade concerns both of its orders.
    pub fn order_ids(&self) -> Vec<Uuid> {
        match self {
            MarketEvent::OrderAccepted(e) => vec![e.order_id],
            MarketEvent::OrderRested(e) => vec![e.order_id],
            MarketEvent::OrderCanceled(e) => vec![e.order_id],
            MarketEvent::TradeExecuted(t) => vec![t.buy_order_id, t.sell_order_id],
            MarketEvent::MarketOrderExpired(e) => vec![e.order_id],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAcceptedEvent {
    pub order_id: Uuid,
    pub owner: Uuid,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRestedEvent {
    pub order_id: Uuid,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceledEvent {
    pub order_id: Uuid,
    pub owner: Uuid,
    pub canceled_quantity: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderExpiredEvent {
    pub order_id: Uuid,
    pub owner: Uuid,
    pub side: OrderSide,
    pub unfilled_quantity: u64,
    pub timestamp: DateTime<Utc>,
}
