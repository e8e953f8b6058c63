use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::events::MarketEvent;

/// Observer for everything the engine does. The engine writes events only
/// after the book and trade history already reflect them.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn save_events(&self, events: Vec<MarketEvent>) -> Result<(), String>;
    async fn get_events(&self, order_id: Uuid) -> Result<Vec<MarketEvent>, String>;
    async fn get_all_events(&self) -> Result<Vec<MarketEvent>, String>;
}

#[derive(Default)]
pub struct InMemoryEventStore {
    by_order: DashMap<Uuid, Vec<MarketEvent>>,
    journal: RwLock<Vec<MarketEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_events(&self, events: Vec<MarketEvent>) -> Result<(), String> {
        for event in &events {
            for order_id in event.order_ids() {
                self.by_order
                    .entry(order_id)
                    .or_default()
                    .push(event.clone());
            }
        }
        self.journal.write().await.extend(events);
        Ok(())
    }

    async fn get_events(&self, order_id: Uuid) -> Result<Vec<MarketEvent>, String> {
        Ok(self
            .by_order
            .get(&order_id)
            .map(|events| events.clone())
            .unwrap_or_default())
    }

    async fn get_all_events(&self) -> Result<Vec<MarketEvent>, String> {
        Ok(self.journal.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::OrderCanceledEvent;
    use chrono::Utc;

    fn canceled(order_id: Uuid) -> MarketEvent {
        MarketEvent::OrderCanceled(OrderCanceledEvent {
            order_id,
            owner: Uuid::new_v4(),
            canceled_quantity: 1,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_events_indexed_by_order_and_journaled_in_order() {
        let store = InMemoryEventStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.save_events(vec![canceled(first)]).await.unwrap();
        store.save_events(vec![canceled(second)]).await.unwrap();

        assert_eq!(store.get_events(first).await.unwrap().len(), 1);
        assert!(store.get_events(Uuid::new_v4()).await.unwrap().is_empty());

        let all = store.get_all_events().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order_ids(), vec![first]);
        assert_eq!(all[1].order_ids(), vec![second]);
    }
}
