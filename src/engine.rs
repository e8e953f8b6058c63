use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commands::{validate_order, CommandOutcome, OrderCommand};
use crate::config::EngineConfig;
use crate::error::{EngineError, OrderError};
use crate::event_store::EventStore;
use crate::events::{
    MarketEvent, MarketOrderExpiredEvent, OrderAcceptedEvent, OrderCanceledEvent,
    OrderRestedEvent,
};
use crate::latency::LatencyQueue;
use crate::orderbook::OrderBook;
use crate::participant::FillHandler;
use crate::types::{BookSnapshot, Fill, Order, OrderKind, OrderSide, OrderStatus, Trade};

struct Ledger {
    last_price: Decimal,
    trades: Vec<Trade>,
}

/// A trade together with what it left open on each side.
struct Execution {
    trade: Trade,
    buy_remaining: u64,
    sell_remaining: u64,
}

impl Execution {
    fn new(aggressor: &Order, resting: &Order, price: Decimal, quantity: u64) -> Self {
        let (buy, sell) = match aggressor.side {
            OrderSide::Buy => (aggressor, resting),
            OrderSide::Sell => (resting, aggressor),
        };
        Self {
            trade: Trade {
                id: Uuid::new_v4(),
                price,
                quantity,
                buyer: buy.owner,
                seller: sell.owner,
                buy_order_id: buy.id,
                sell_order_id: sell.id,
                aggressor_side: aggressor.side,
                executed_at: Utc::now(),
            },
            buy_remaining: buy.quantity(),
            sell_remaining: sell.quantity(),
        }
    }
}

/// Single-asset continuous double auction.
///
/// Submissions go through the latency queue and only reach the book when the
/// driver calls [`process_pending`](Self::process_pending). The engine is the
/// only writer of the book, order quantities and the trade history.
pub struct MatchingEngine {
    book: Mutex<OrderBook>,
    queue: LatencyQueue,
    ledger: RwLock<Ledger>,
    participants: DashMap<Uuid, Arc<dyn FillHandler>>,
    statuses: DashMap<Uuid, OrderStatus>,
    event_store: Box<dyn EventStore>,
}

impl MatchingEngine {
    pub fn new(config: &EngineConfig, event_store: Box<dyn EventStore>) -> Self {
        Self {
            book: Mutex::new(OrderBook::new()),
            queue: LatencyQueue::new(config.latency()),
            ledger: RwLock::new(Ledger {
                last_price: config.initial_price,
                trades: Vec::new(),
            }),
            participants: DashMap::new(),
            statuses: DashMap::new(),
            event_store,
        }
    }

    /// Binds `owner` to the handler that receives its fills.
    pub fn register_participant(&self, owner: Uuid, handler: Arc<dyn FillHandler>) {
        self.participants.insert(owner, handler);
    }

    pub fn unregister_participant(&self, owner: Uuid) -> bool {
        self.participants.remove(&owner).is_some()
    }

    pub async fn handle_command(&self, command: OrderCommand) -> Result<CommandOutcome, EngineError> {
        match command {
            OrderCommand::PlaceOrder(cmd) => {
                let order = Order::try_from(cmd)?;
                self.submit(order).await.map(CommandOutcome::Submitted)
            }
            OrderCommand::CancelOrder(cmd) => {
                Ok(CommandOutcome::Canceled(self.cancel(cmd.order_id).await))
            }
        }
    }

    /// Admits an order into the latency queue. Never matches.
    ///
    /// The order gets a fresh time-priority stamp here, whatever it carried.
    pub async fn submit(&self, mut order: Order) -> Result<Uuid, EngineError> {
        validate_order(&order)?;
        match self.statuses.entry(order.id) {
            Entry::Occupied(_) => return Err(OrderError::DuplicateOrderId(order.id).into()),
            Entry::Vacant(slot) => {
                slot.insert(OrderStatus::Pending);
            }
        }
        order.restamp();

        let order_id = order.id;
        let accepted = OrderAcceptedEvent {
            order_id,
            owner: order.owner,
            order_type: order.order_type(),
            side: order.side,
            price: order.limit_price(),
            quantity: order.quantity(),
            timestamp: Utc::now(),
        };
        self.queue.submit(order).await;
        debug!(%order_id, "order queued");

        self.publish(vec![MarketEvent::OrderAccepted(accepted)]).await;
        Ok(order_id)
    }

    /// Cancels the open remainder of a resting order. Fills already made
    /// stand. Returns `false` for unknown, pending or terminal ids.
    pub async fn cancel(&self, order_id: Uuid) -> bool {
        let order = {
            let mut book = self.book.lock().await;
            let Some(order) = book.cancel(order_id) else {
                debug!(%order_id, "cancel ignored, order not resting");
                return false;
            };
            self.statuses.insert(order_id, OrderStatus::Canceled);
            order
        };
        info!(%order_id, remaining = order.quantity(), "order canceled");

        self.publish(vec![MarketEvent::OrderCanceled(OrderCanceledEvent {
            order_id,
            owner: order.owner,
            canceled_quantity: order.quantity(),
            timestamp: Utc::now(),
        })])
        .await;
        true
    }

    pub async fn best_bid(&self) -> Option<Decimal> {
        self.book.lock().await.best_bid()
    }

    pub async fn best_ask(&self) -> Option<Decimal> {
        self.book.lock().await.best_ask()
    }

    pub async fn last_trade_price(&self) -> Decimal {
        self.ledger.read().await.last_price
    }

    /// Snapshot of the orders still waiting in the latency queue.
    pub async fn peek_pending(&self) -> Vec<Order> {
        self.queue.peek_all().await
    }

    pub async fn trade_history(&self) -> Vec<Trade> {
        self.ledger.read().await.trades.clone()
    }

    pub async fn get_order(&self, order_id: Uuid) -> Option<Order> {
        self.book.lock().await.get(order_id).cloned()
    }

    pub fn order_status(&self, order_id: Uuid) -> Option<OrderStatus> {
        self.statuses.get(&order_id).map(|s| *s)
    }

    pub async fn book_snapshot(&self, levels: usize) -> BookSnapshot {
        self.book.lock().await.snapshot(levels)
    }

    pub fn event_store(&self) -> &dyn EventStore {
        self.event_store.as_ref()
    }

    /// Drains the latency queue in arrival order. Limit orders rest, market
    /// orders execute immediately. Returns the trades made.
    pub async fn process_pending(&self) -> Vec<Trade> {
        let mut drain = self.queue.drain().await;
        let mut trades = Vec::new();
        while let Some(order) = drain.next_order().await {
            match order.kind {
                OrderKind::Limit { price } => self.rest(order, price).await,
                OrderKind::Market => trades.extend(self.execute_market(order).await),
            }
        }
        trades
    }

    /// Crosses the book until the best bid is below the best ask or a side
    /// is empty. Of the two crossing orders, the one that rested first sets
    /// the price.
    pub async fn match_continuous(&self) -> Vec<Trade> {
        let executions = {
            let mut book = self.book.lock().await;
            let mut executions = Vec::new();
            loop {
                let (Some(bid), Some(ask)) = (
                    book.top(OrderSide::Buy).cloned(),
                    book.top(OrderSide::Sell).cloned(),
                ) else {
                    break;
                };
                let (Some(bid_price), Some(ask_price)) = (bid.limit_price(), ask.limit_price())
                else {
                    break;
                };
                if bid_price < ask_price {
                    break;
                }

                let quantity = bid.quantity().min(ask.quantity());
                let bid_first = bid.sequence() < ask.sequence();
                let price = if bid_first { bid_price } else { ask_price };
                let Some(bid_after) = book.fill_top(OrderSide::Buy, quantity) else {
                    break;
                };
                let Some(ask_after) = book.fill_top(OrderSide::Sell, quantity) else {
                    break;
                };

                let execution = if bid_first {
                    Execution::new(&ask_after, &bid_after, price, quantity)
                } else {
                    Execution::new(&bid_after, &ask_after, price, quantity)
                };
                self.mark_filled(&execution);
                executions.push(execution);
            }
            self.record(&executions).await;
            executions
        };
        self.settle(executions).await
    }

    async fn rest(&self, order: Order, price: Decimal) {
        let order_id = order.id;
        let rested = OrderRestedEvent {
            order_id,
            side: order.side,
            price,
            quantity: order.quantity(),
            timestamp: Utc::now(),
        };
        {
            let mut book = self.book.lock().await;
            if !book.add_resting(order) {
                warn!(%order_id, "limit order could not rest");
                return;
            }
            self.statuses.insert(order_id, OrderStatus::Resting);
        }
        debug!(%order_id, side = ?rested.side, %price, quantity = rested.quantity, "order resting");
        self.publish(vec![MarketEvent::OrderRested(rested)]).await;
    }

    /// Walks the opposite side until the order is filled or the side runs
    /// dry. The resting order always sets the price. Any remainder is
    /// dropped.
    async fn execute_market(&self, mut order: Order) -> Vec<Trade> {
        let contra = order.side.opposite();
        let executions = {
            let mut book = self.book.lock().await;
            let mut executions = Vec::new();
            while order.is_live() {
                let Some(resting) = book.top(contra).cloned() else {
                    break;
                };
                let Some(price) = resting.limit_price() else {
                    break;
                };
                let quantity = order.quantity().min(resting.quantity());
                let Some(resting_after) = book.fill_top(contra, quantity) else {
                    break;
                };
                order.reduce(quantity);
                let execution = Execution::new(&order, &resting_after, price, quantity);
                self.mark_filled(&execution);
                executions.push(execution);
            }
            if order.is_live() {
                self.statuses.insert(order.id, OrderStatus::Expired);
            }
            self.record(&executions).await;
            executions
        };

        let trades = self.settle(executions).await;
        if order.is_live() {
            let unfilled = order.quantity();
            info!(order_id = %order.id, side = ?order.side, unfilled, "market order remainder dropped");
            self.publish(vec![MarketEvent::MarketOrderExpired(MarketOrderExpiredEvent {
                order_id: order.id,
                owner: order.owner,
                side: order.side,
                unfilled_quantity: unfilled,
                timestamp: Utc::now(),
            })])
            .await;
        }
        trades
    }

    /// Appends to the trade history. Callers hold the book lock so the book
    /// and the history change together.
    async fn record(&self, executions: &[Execution]) {
        if executions.is_empty() {
            return;
        }
        let mut ledger = self.ledger.write().await;
        for execution in executions {
            ledger.last_price = execution.trade.price;
            ledger.trades.push(execution.trade.clone());
        }
    }

    /// Post-trade work once state is final: logs, events, then fill
    /// callbacks in trade order.
    async fn settle(&self, executions: Vec<Execution>) -> Vec<Trade> {
        let mut trades = Vec::with_capacity(executions.len());
        for execution in executions {
            let trade = execution.trade;
            info!(
                trade_id = %trade.id,
                price = %trade.price,
                quantity = trade.quantity,
                aggressor = ?trade.aggressor_side,
                "trade executed"
            );
            trades.push(trade);
        }

        self.publish(
            trades
                .iter()
                .cloned()
                .map(MarketEvent::TradeExecuted)
                .collect(),
        )
        .await;

        for trade in &trades {
            self.notify(trade);
        }
        trades
    }

    /// Callers hold the book lock, so a concurrent cancel cannot interleave.
    fn mark_filled(&self, execution: &Execution) {
        let trade = &execution.trade;
        self.update_fill_status(trade.buy_order_id, execution.buy_remaining);
        self.update_fill_status(trade.sell_order_id, execution.sell_remaining);
    }

    fn update_fill_status(&self, order_id: Uuid, remaining: u64) {
        let status = if remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.statuses.insert(order_id, status);
    }

    /// Aggressor first, then the resting side.
    fn notify(&self, trade: &Trade) {
        let (aggressor, _) = trade.aggressor();
        self.dispatch_fill(aggressor, &trade.fill(trade.aggressor_side));

        let passive_side = trade.aggressor_side.opposite();
        let (passive, _) = trade.party(passive_side);
        self.dispatch_fill(passive, &trade.fill(passive_side));
    }

    fn dispatch_fill(&self, owner: Uuid, fill: &Fill) {
        // Clone the handler out so no registry shard is locked during the call.
        let Some(handler) = self.participants.get(&owner).map(|h| Arc::clone(h.value())) else {
            warn!(%owner, order_id = %fill.order_id, "no participant registered for fill");
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_fill(fill))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%owner, order_id = %fill.order_id, %err, "fill callback failed");
            }
            Err(_) => {
                error!(%owner, order_id = %fill.order_id, "fill callback panicked");
            }
        }
    }

    async fn publish(&self, events: Vec<MarketEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(err) = self.event_store.save_events(events).await {
            error!(%err, "failed to persist market events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;

    fn engine() -> MatchingEngine {
        let config = EngineConfig {
            latency_ms: 0,
            ..EngineConfig::default()
        };
        MatchingEngine::new(&config, Box::new(InMemoryEventStore::new()))
    }

    #[tokio::test]
    async fn test_submit_does_not_touch_book() {
        let engine = engine();
        let order = Order::limit(Uuid::new_v4(), OrderSide::Buy, 10, Decimal::from(100));
        let order_id = engine.submit(order).await.unwrap();

        assert_eq!(engine.best_bid().await, None);
        assert_eq!(engine.order_status(order_id), Some(OrderStatus::Pending));
        assert_eq!(engine.peek_pending().await.len(), 1);

        engine.process_pending().await;
        assert_eq!(engine.best_bid().await, Some(Decimal::from(100)));
        assert_eq!(engine.order_status(order_id), Some(OrderStatus::Resting));
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_rejected() {
        let engine = engine();
        let order = Order::market(Uuid::new_v4(), OrderSide::Buy, 1);
        engine.submit(order.clone()).await.unwrap();

        let err = engine.submit(order.clone()).await.unwrap_err();
        assert_eq!(err, EngineError::InvalidOrder(OrderError::DuplicateOrderId(order.id)));
    }

    #[tokio::test]
    async fn test_market_order_without_liquidity_expires() {
        let engine = engine();
        let order_id = engine
            .submit(Order::market(Uuid::new_v4(), OrderSide::Sell, 4))
            .await
            .unwrap();

        assert!(engine.process_pending().await.is_empty());
        assert_eq!(engine.order_status(order_id), Some(OrderStatus::Expired));
        assert_eq!(engine.last_trade_price().await, Decimal::new(10000, 2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_submissions_admit_one() {
        let engine = Arc::new(engine());
        let order = Order::market(Uuid::new_v4(), OrderSide::Buy, 1);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let order = order.clone();
                tokio::spawn(async move { engine.submit(order).await })
            })
            .collect();
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(engine.peek_pending().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_racing_a_partial_fill_stays_canceled() {
        for _ in 0..100 {
            let engine = Arc::new(engine());
            let bid = Order::limit(Uuid::new_v4(), OrderSide::Buy, 10, Decimal::from(100));
            let bid_id = engine.submit(bid).await.unwrap();
            let ask = Order::limit(Uuid::new_v4(), OrderSide::Sell, 4, Decimal::from(100));
            engine.submit(ask).await.unwrap();
            engine.process_pending().await;

            let matcher = {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.match_continuous().await })
            };
            let canceler = {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.cancel(bid_id).await })
            };
            matcher.await.unwrap();
            assert!(canceler.await.unwrap());
            assert_eq!(engine.order_status(bid_id), Some(OrderStatus::Canceled));
        }
    }

    #[tokio::test]
    async fn test_pending_order_cannot_be_canceled() {
        let engine = engine();
        let order = Order::limit(Uuid::new_v4(), OrderSide::Sell, 1, Decimal::from(100));
        let order_id = engine.submit(order).await.unwrap();

        assert!(!engine.cancel(order_id).await);
        engine.process_pending().await;
        assert!(engine.cancel(order_id).await);
        assert_eq!(engine.order_status(order_id), Some(OrderStatus::Canceled));
    }
}
