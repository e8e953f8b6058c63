use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use uuid::Uuid;

use crate::types::{price_time_cmp, BookSnapshot, Order, OrderBookEntry, OrderKind, OrderSide};

/// Heap entry for a resting order. The heap never holds the order itself,
/// only enough to rank it; liveness is looked up in the id index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PriorityKey {
    side: OrderSide,
    price: Decimal,
    sequence: u64,
    order_id: Uuid,
}

impl Ord for PriorityKey {
    // BinaryHeap is a max-heap, so the highest-priority key must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        price_time_cmp(self.side, self.price, self.sequence, other.price, other.sequence)
            .reverse()
            .then_with(|| self.order_id.cmp(&other.order_id))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-asset limit order book with lazy deletion.
///
/// Canceled and filled orders leave the id index immediately but stay in
/// the heaps until they surface at the front, where `clean` discards them.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BinaryHeap<PriorityKey>,
    asks: BinaryHeap<PriorityKey>,
    orders: HashMap<Uuid, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rests a live limit order. Market orders and empty orders are ignored.
    /// Returns whether the order was added.
    pub fn add_resting(&mut self, order: Order) -> bool {
        let OrderKind::Limit { price } = order.kind else {
            return false;
        };
        if !order.is_live() || self.orders.contains_key(&order.id) {
            return false;
        }
        let key = PriorityKey {
            side: order.side,
            price,
            sequence: order.sequence,
            order_id: order.id,
        };
        self.heap_mut(order.side).push(key);
        self.orders.insert(order.id, order);
        true
    }

    /// Tombstones a resting order. Returns it with the quantity that was
    /// still open, or `None` for unknown or already dead ids.
    pub fn cancel(&mut self, order_id: Uuid) -> Option<Order> {
        self.orders.remove(&order_id)
    }

    pub fn best_bid(&mut self) -> Option<Decimal> {
        self.best_price(OrderSide::Buy)
    }

    pub fn best_ask(&mut self) -> Option<Decimal> {
        self.best_price(OrderSide::Sell)
    }

    pub fn best_price(&mut self, side: OrderSide) -> Option<Decimal> {
        self.top(side).and_then(Order::limit_price)
    }

    /// Highest-priority live order on `side`.
    pub fn top(&mut self, side: OrderSide) -> Option<&Order> {
        self.clean(side);
        let key = self.heap(side).peek()?;
        self.orders.get(&key.order_id)
    }

    /// Takes up to `quantity` from the top live order on `side` and returns
    /// that order's state after the fill. A fully filled order leaves the
    /// book.
    pub fn fill_top(&mut self, side: OrderSide, quantity: u64) -> Option<Order> {
        let order_id = self.top(side)?.id;
        let order = self.orders.get_mut(&order_id)?;
        order.reduce(quantity);
        let after = order.clone();
        if !after.is_live() {
            self.orders.remove(&order_id);
            self.clean(side);
        }
        Some(after)
    }

    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn contains(&self, order_id: Uuid) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Number of live resting orders across both sides.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn live_quantity(&self, side: OrderSide) -> u64 {
        self.live_orders(side)
            .fold(0u64, |total, order| total.saturating_add(order.quantity()))
    }

    /// Aggregated price levels, best first.
    pub fn depth(&self, side: OrderSide, levels: usize) -> Vec<OrderBookEntry> {
        let mut by_price: BTreeMap<Decimal, OrderBookEntry> = BTreeMap::new();
        for order in self.live_orders(side) {
            let Some(price) = order.limit_price() else {
                continue;
            };
            let entry = by_price.entry(price).or_insert(OrderBookEntry {
                price,
                quantity: 0,
                order_count: 0,
            });
            entry.quantity = entry.quantity.saturating_add(order.quantity());
            entry.order_count += 1;
        }

        let entries = by_price.into_values();
        match side {
            OrderSide::Buy => entries.rev().take(levels).collect(),
            OrderSide::Sell => entries.take(levels).collect(),
        }
    }

    pub fn snapshot(&self, levels: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.depth(OrderSide::Buy, levels),
            asks: self.depth(OrderSide::Sell, levels),
        }
    }

    fn live_orders(&self, side: OrderSide) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(move |o| o.side == side && o.is_live())
    }

    /// Pops dead entries off the front of `side` until the front is live or
    /// the side is empty.
    fn clean(&mut self, side: OrderSide) {
        let Self { bids, asks, orders } = self;
        let heap = match side {
            OrderSide::Buy => bids,
            OrderSide::Sell => asks,
        };
        while let Some(key) = heap.peek() {
            if orders.get(&key.order_id).is_some_and(Order::is_live) {
                break;
            }
            heap.pop();
        }
    }

    fn heap(&self, side: OrderSide) -> &BinaryHeap<PriorityKey> {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    fn heap_mut(&mut self, side: OrderSide) -> &mut BinaryHeap<PriorityKey> {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }
}
