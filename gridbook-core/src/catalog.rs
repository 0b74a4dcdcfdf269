//! Event Catalog.
//!
//! Authoritative store of races, markets, and final results. Exposes read
//! queries (consumed by the Pricing Cache and Bet Ledger through the
//! [`CatalogReader`] trait) and the exactly-once result publication, whose
//! side effect is one `ResultPublished` emission per affected market into
//! the relay's ingest channel. At-least-once delivery from there on is the
//! relay's contract, not this component's.

use crate::entities::EventStatus;
use crate::entities::event::{Event, EventId, MarketId, OddsTable, OutcomeName};
use crate::events::{ResultPublished, ResultPublishedSender};
use crate::storage::{EventStore, StatusChange, StoreError};
use async_trait::async_trait;
use gridbook_sdk::objects::events::EventFilter;
use itertools::Itertools;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("market not found: {0}")]
    MarketNotFound(MarketId),

    #[error("result already published for event {0}")]
    AlreadyPublished(EventId),

    #[error("event {0} is already completed")]
    AlreadyCompleted(EventId),

    #[error("outcome {outcome} does not belong to market {market_id}")]
    InvalidOutcome {
        market_id: MarketId,
        outcome: OutcomeName,
    },

    #[error("market {0} named more than once in result publication")]
    DuplicateMarket(MarketId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The catalog query interface consumed by the Pricing Cache and Bet Ledger.
///
/// Kept as a trait so consumers can be exercised against controlled or
/// failing catalogs; [`EventCatalog`] is the storage-backed implementation.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn event(&self, id: EventId) -> Result<Event, CatalogError>;

    /// The event owning the given market.
    async fn event_for_market(&self, market_id: MarketId) -> Result<Event, CatalogError>;

    /// Authoritative current odds for a market. The slow path; callers go
    /// through the Pricing Cache.
    async fn market_odds(&self, market_id: MarketId) -> Result<OddsTable, CatalogError>;
}

/// The winning outcome declared for one market at publication.
///
/// `winning_outcome = None` voids the market (postponed/abandoned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOutcome {
    pub market_id: MarketId,
    pub winning_outcome: Option<OutcomeName>,
}

/// Authoritative event/result catalog backed by an [`EventStore`].
pub struct EventCatalog {
    store: Arc<dyn EventStore>,
    result_tx: ResultPublishedSender,
}

impl EventCatalog {
    pub fn new(store: Arc<dyn EventStore>, result_tx: ResultPublishedSender) -> Self {
        Self { store, result_tx }
    }

    /// Idempotent event seeding, used by ingestion collaborators and tests.
    /// Returns whether the event was actually inserted.
    pub async fn insert_event(&self, event: Event) -> Result<bool, CatalogError> {
        Ok(self.store.insert_if_absent(event).await?)
    }

    /// All events matching the filter, paginated manually.
    pub async fn list_events(
        &self,
        filter: &EventFilter,
        page: usize,
        size: usize,
    ) -> Result<Vec<Event>, CatalogError> {
        let events = self.store.list().await?;
        Ok(events
            .into_iter()
            .filter(|e| filter.country.as_ref().is_none_or(|c| &e.country == c))
            .filter(|e| filter.year.is_none_or(|y| e.year == y))
            .filter(|e| filter.status.is_none_or(|s| e.status == EventStatus::from(s)))
            .skip(page.saturating_mul(size))
            .take(size)
            .collect())
    }

    /// Transition an event from Scheduled to Completed, closing its markets
    /// for betting. Results can only be attached to events that went
    /// through here or are still Scheduled (back-dated historical data).
    pub async fn mark_completed(&self, id: EventId) -> Result<(), CatalogError> {
        match self
            .store
            .set_status_if(id, &[EventStatus::Scheduled], EventStatus::Completed)
            .await?
        {
            StatusChange::Applied(_) => {
                info!(event_id = id, "Event completed");
                Ok(())
            }
            StatusChange::Refused(EventStatus::ResultPublished) => {
                Err(CatalogError::AlreadyPublished(id))
            }
            StatusChange::Refused(_) => Err(CatalogError::AlreadyCompleted(id)),
            StatusChange::NotFound => Err(CatalogError::EventNotFound(id)),
        }
    }

    /// Publish the final result for an event, exactly once.
    ///
    /// Validates every declared outcome against its market's outcome set,
    /// then atomically transitions the event to ResultPublished; a
    /// concurrent or repeated publication loses the transition and gets
    /// `AlreadyPublished`. The winner emits one `ResultPublished` per
    /// affected market. Returns the affected market ids so the caller can
    /// invalidate cached odds immediately.
    pub async fn publish_result(
        &self,
        id: EventId,
        outcomes: Vec<MarketOutcome>,
    ) -> Result<Vec<MarketId>, CatalogError> {
        if let Some(dup) = outcomes.iter().map(|o| o.market_id).duplicates().next() {
            return Err(CatalogError::DuplicateMarket(dup));
        }

        let event = self
            .store
            .get(id)
            .await?
            .ok_or(CatalogError::EventNotFound(id))?;

        for declared in &outcomes {
            let market = event
                .market(declared.market_id)
                .ok_or(CatalogError::MarketNotFound(declared.market_id))?;
            if let Some(winner) = &declared.winning_outcome {
                if !market.has_outcome(winner) {
                    return Err(CatalogError::InvalidOutcome {
                        market_id: market.id,
                        outcome: winner.clone(),
                    });
                }
            }
        }

        match self
            .store
            .set_status_if(
                id,
                &[EventStatus::Scheduled, EventStatus::Completed],
                EventStatus::ResultPublished,
            )
            .await?
        {
            StatusChange::Applied(_) => {}
            StatusChange::Refused(_) => return Err(CatalogError::AlreadyPublished(id)),
            StatusChange::NotFound => return Err(CatalogError::EventNotFound(id)),
        }

        info!(event_id = id, markets = outcomes.len(), "Result published");

        let affected = outcomes.iter().map(|o| o.market_id).collect();
        for declared in outcomes {
            let emission = ResultPublished {
                event_id: id,
                market_id: declared.market_id,
                winning_outcome: declared.winning_outcome,
            };
            if let Err(e) = self.result_tx.send(emission).await {
                error!(
                    event_id = id,
                    market_id = %e.0.market_id,
                    "Failed to emit ResultPublished"
                );
            }
        }

        Ok(affected)
    }
}

#[async_trait]
impl CatalogReader for EventCatalog {
    async fn event(&self, id: EventId) -> Result<Event, CatalogError> {
        self.store
            .get(id)
            .await?
            .ok_or(CatalogError::EventNotFound(id))
    }

    async fn event_for_market(&self, market_id: MarketId) -> Result<Event, CatalogError> {
        self.store
            .by_market(market_id)
            .await?
            .ok_or(CatalogError::MarketNotFound(market_id))
    }

    async fn market_odds(&self, market_id: MarketId) -> Result<OddsTable, CatalogError> {
        let event = self.event_for_market(market_id).await?;
        let market = event
            .market(market_id)
            .ok_or(CatalogError::MarketNotFound(market_id))?;
        Ok(market.odds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::result_published_channel;
    use crate::storage::memory::MemoryEventStore;
    use crate::testutil::{scheduled_event, winner_market};

    #[tokio::test]
    async fn publish_is_exactly_once() {
        let market = winner_market(1, &["VER", "HAM"]);
        let market_id = market.id;
        let event = scheduled_event(1, vec![market]);
        let store = Arc::new(MemoryEventStore::default());
        store.insert_if_absent(event).await.unwrap();
        let (tx, mut rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        let outcomes = vec![MarketOutcome {
            market_id,
            winning_outcome: Some("VER".into()),
        }];
        let affected = catalog.publish_result(1, outcomes.clone()).await.unwrap();
        assert_eq!(affected, vec![market_id]);

        let emitted = rx.recv().await.unwrap();
        assert_eq!(emitted.event_id, 1);
        assert_eq!(emitted.winning_outcome.as_deref(), Some("VER"));

        let second = catalog.publish_result(1, outcomes).await;
        assert!(matches!(second, Err(CatalogError::AlreadyPublished(1))));
        // The losing publication must not have emitted anything.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_rejects_foreign_outcome() {
        let market = winner_market(1, &["VER", "HAM"]);
        let market_id = market.id;
        let event = scheduled_event(1, vec![market]);
        let store = Arc::new(MemoryEventStore::default());
        store.insert_if_absent(event).await.unwrap();
        let (tx, _rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        let result = catalog
            .publish_result(
                1,
                vec![MarketOutcome {
                    market_id,
                    winning_outcome: Some("LEC".into()),
                }],
            )
            .await;
        assert!(matches!(result, Err(CatalogError::InvalidOutcome { .. })));

        // Validation failure must leave the event publishable.
        let event = catalog.event(1).await.unwrap();
        assert_eq!(event.status, EventStatus::Scheduled);
    }

    #[tokio::test]
    async fn publish_rejects_duplicate_market() {
        let market = winner_market(1, &["VER", "HAM"]);
        let market_id = market.id;
        let event = scheduled_event(1, vec![market]);
        let store = Arc::new(MemoryEventStore::default());
        store.insert_if_absent(event).await.unwrap();
        let (tx, _rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        let result = catalog
            .publish_result(
                1,
                vec![
                    MarketOutcome {
                        market_id,
                        winning_outcome: Some("VER".into()),
                    },
                    MarketOutcome {
                        market_id,
                        winning_outcome: Some("HAM".into()),
                    },
                ],
            )
            .await;
        assert!(matches!(
            result,
            Err(CatalogError::DuplicateMarket(id)) if id == market_id
        ));
    }

    #[tokio::test]
    async fn voided_market_emits_no_winner() {
        let market = winner_market(1, &["VER", "HAM"]);
        let market_id = market.id;
        let event = scheduled_event(1, vec![market]);
        let store = Arc::new(MemoryEventStore::default());
        store.insert_if_absent(event).await.unwrap();
        let (tx, mut rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        catalog
            .publish_result(
                1,
                vec![MarketOutcome {
                    market_id,
                    winning_outcome: None,
                }],
            )
            .await
            .unwrap();
        let emitted = rx.recv().await.unwrap();
        assert_eq!(emitted.winning_outcome, None);
    }

    #[tokio::test]
    async fn completed_event_cannot_complete_again() {
        let event = scheduled_event(5, vec![winner_market(5, &["VER"])]);
        let store = Arc::new(MemoryEventStore::default());
        store.insert_if_absent(event).await.unwrap();
        let (tx, _rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        catalog.mark_completed(5).await.unwrap();
        assert!(matches!(
            catalog.mark_completed(5).await,
            Err(CatalogError::AlreadyCompleted(5))
        ));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = Arc::new(MemoryEventStore::default());
        for id in 1..=5 {
            let mut event = scheduled_event(id, vec![winner_market(id, &["VER"])]);
            event.year = if id <= 3 { 2021 } else { 2022 };
            store.insert_if_absent(event).await.unwrap();
        }
        let (tx, _rx) = result_published_channel();
        let catalog = EventCatalog::new(store, tx);

        let filter = EventFilter {
            year: Some(2021),
            ..EventFilter::default()
        };
        let first_page = catalog.list_events(&filter, 0, 2).await.unwrap();
        assert_eq!(
            first_page.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        let second_page = catalog.list_events(&filter, 1, 2).await.unwrap();
        assert_eq!(
            second_page.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![3]
        );
        let beyond = catalog.list_events(&filter, 2, 2).await.unwrap();
        assert!(beyond.is_empty());
    }
}
