use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::types::Order;

/// Inbound buffer between submission and the book.
///
/// Orders wait here until the next drain, which hands them out in arrival
/// order and charges a fixed processing delay per order.
#[derive(Debug)]
pub struct LatencyQueue {
    pending: Mutex<VecDeque<Order>>,
    delay: Duration,
}

impl LatencyQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn submit(&self, order: Order) {
        self.pending.lock().await.push_back(order);
    }

    /// Copies of every pending order, oldest first.
    pub async fn peek_all(&self) -> Vec<Order> {
        self.pending.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Starts draining the orders queued right now. Orders submitted while
    /// the drain is in progress wait for the next one.
    pub async fn drain(&self) -> Drain<'_> {
        let remaining = self.len().await;
        Drain {
            queue: self,
            remaining,
        }
    }
}

pub struct Drain<'a> {
    queue: &'a LatencyQueue,
    remaining: usize,
}

impl Drain<'_> {
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Pops the oldest pending order, then waits out the processing delay.
    pub async fn next_order(&mut self) -> Option<Order> {
        if self.remaining == 0 {
            return None;
        }
        let order = self.queue.pending.lock().await.pop_front();
        let Some(order) = order else {
            self.remaining = 0;
            return None;
        };
        self.remaining -= 1;
        if !self.queue.delay.is_zero() {
            tokio::time::sleep(self.queue.delay).await;
        }
        Some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSide;
    use rust_decimal::Decimal;
    use std::time::Instant;
    use uuid::Uuid;

    fn order(quantity: u64) -> Order {
        Order::limit(Uuid::new_v4(), OrderSide::Buy, quantity, Decimal::from(100))
    }

    #[tokio::test]
    async fn test_drain_is_fifo() {
        let queue = LatencyQueue::new(Duration::ZERO);
        let ids: Vec<_> = (1..=3).map(order).collect();
        for o in &ids {
            queue.submit(o.clone()).await;
        }

        let mut drain = queue.drain().await;
        let mut drained = Vec::new();
        while let Some(o) = drain.next_order().await {
            drained.push(o.id);
        }

        assert_eq!(drained, ids.iter().map(|o| o.id).collect::<Vec<_>>());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_peek_returns_detached_snapshot() {
        let queue = LatencyQueue::new(Duration::ZERO);
        queue.submit(order(5)).await;

        let snapshot = queue.peek_all().await;
        queue.submit(order(7)).await;
        let mut drain = queue.drain().await;
        while drain.next_order().await.is_some() {}

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].quantity(), 5);
        assert!(queue.peek_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_late_submissions_wait_for_next_drain() {
        let queue = LatencyQueue::new(Duration::ZERO);
        queue.submit(order(1)).await;

        let mut drain = queue.drain().await;
        queue.submit(order(2)).await;

        assert_eq!(drain.remaining(), 1);
        assert_eq!(drain.next_order().await.map(|o| o.quantity()), Some(1));
        assert!(drain.next_order().await.is_none());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_delay_is_charged_per_order() {
        let delay = Duration::from_millis(5);
        let queue = LatencyQueue::new(delay);
        queue.submit(order(1)).await;
        queue.submit(order(2)).await;

        let started = Instant::now();
        let mut drain = queue.drain().await;
        while drain.next_order().await.is_some() {}

        assert!(started.elapsed() >= delay * 2);
    }
}
