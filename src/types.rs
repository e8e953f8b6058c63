use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Resting,
    PartiallyFilled,
    Filled,
    Canceled,
    /// A market order whose unfilled remainder was dropped.
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired
        )
    }
}

/// What an order asks for. A limit order always carries its price, a market
/// order never does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit { price: Decimal },
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub owner: Uuid,
    pub kind: OrderKind,
    pub side: OrderSide,
    pub(crate) quantity: u64,
    /// Time-priority key. The engine stamps a fresh one on admission.
    pub(crate) sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(owner: Uuid, kind: OrderKind, side: OrderSide, quantity: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            kind,
            side,
            quantity,
            sequence: next_sequence(),
            created_at: Utc::now(),
        }
    }

    pub fn limit(owner: Uuid, side: OrderSide, quantity: u64, price: Decimal) -> Self {
        Self::new(owner, OrderKind::Limit { price }, side, quantity)
    }

    pub fn market(owner: Uuid, side: OrderSide, quantity: u64) -> Self {
        Self::new(owner, OrderKind::Market, side, quantity)
    }

    pub fn order_type(&self) -> OrderType {
        match self.kind {
            OrderKind::Limit { .. } => OrderType::Limit,
            OrderKind::Market => OrderType::Market,
        }
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        match self.kind {
            OrderKind::Limit { price } => Some(price),
            OrderKind::Market => None,
        }
    }

    /// Remaining quantity. Zero means filled or canceled.
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn restamp(&mut self) {
        self.sequence = next_sequence();
    }

    pub fn is_live(&self) -> bool {
        self.quantity > 0
    }

    /// Reduces the remaining quantity, never below zero. Returns the amount
    /// actually removed.
    pub(crate) fn reduce(&mut self, quantity: u64) -> u64 {
        let removed = quantity.min(self.quantity);
        self.quantity -= removed;
        removed
    }

    /// Price-time priority against another order of the same side.
    /// `Ordering::Less` means `self` is matched first.
    ///
    /// Market orders rank ahead of any limit order since they accept any price.
    pub fn priority_cmp(&self, other: &Order) -> Ordering {
        match (self.limit_price(), other.limit_price()) {
            (Some(a), Some(b)) => price_time_cmp(self.side, a, self.sequence, b, other.sequence),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => self.sequence.cmp(&other.sequence),
        }
    }
}

/// Bids: higher price first. Asks: lower price first. Earlier sequence
/// breaks ties on both sides.
pub(crate) fn price_time_cmp(
    side: OrderSide,
    price: Decimal,
    sequence: u64,
    other_price: Decimal,
    other_sequence: u64,
) -> Ordering {
    let by_price = match side {
        OrderSide::Buy => other_price.cmp(&price),
        OrderSide::Sell => price.cmp(&other_price),
    };
    by_price.then_with(|| sequence.cmp(&other_sequence))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub price: Decimal,
    pub quantity: u64,
    pub buyer: Uuid,
    pub seller: Uuid,
    pub buy_order_id: Uuid,
    pub sell_order_id: Uuid,
    /// Side of the order that took liquidity.
    pub aggressor_side: OrderSide,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Owner and order id on `side` of the trade.
    pub fn party(&self, side: OrderSide) -> (Uuid, Uuid) {
        match side {
            OrderSide::Buy => (self.buyer, self.buy_order_id),
            OrderSide::Sell => (self.seller, self.sell_order_id),
        }
    }

    pub fn aggressor(&self) -> (Uuid, Uuid) {
        self.party(self.aggressor_side)
    }

    /// The fill as seen by the participant on `side`.
    pub fn fill(&self, side: OrderSide) -> Fill {
        Fill {
            order_id: self.party(side).1,
            price: self.price,
            quantity: self.quantity,
            side,
        }
    }
}

/// One participant's view of a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: Uuid,
    pub price: Decimal,
    pub quantity: u64,
    pub side: OrderSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub price: Decimal,
    pub quantity: u64,
    pub order_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bids: Vec<OrderBookEntry>,
    pub asks: Vec<OrderBookEntry>,
}
