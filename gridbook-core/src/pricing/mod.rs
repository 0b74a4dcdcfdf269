//! Pricing Cache.
//!
//! Caches current odds per market with bounded staleness and shields the
//! catalog from read load. Reads through to the catalog under the circuit
//! breaker and a bounded timeout; concurrent refreshes of the same market
//! collapse into a single upstream call. When the catalog is unavailable,
//! an existing entry (even an expired one) is served with `stale = true`
//! instead of failing the caller — an explicit policy branch, not a
//! fallback of last resort that happens to work.

pub mod breaker;

use crate::catalog::{CatalogError, CatalogReader};
use crate::config::PricingConfig;
use crate::entities::event::{MarketId, OddsTable};
use breaker::CircuitBreaker;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors surfaced by [`PricingCache::quote`].
#[derive(Debug, Error)]
pub enum PricingError {
    /// The catalog answered definitively that the market does not exist.
    #[error("market not found: {0}")]
    MarketNotFound(MarketId),

    /// The catalog is unreachable (breaker open, timeout, or upstream
    /// failure) and no cache entry exists to fall back on.
    #[error("catalog unavailable and no cached odds for market {0}")]
    CatalogUnavailable(MarketId),
}

/// A cached odds table for one market.
#[derive(Debug, Clone)]
struct CacheEntry {
    odds: OddsTable,
    generation: u64,
    fetched_at_wall: time::OffsetDateTime,
    expires_at: Instant,
}

/// The value returned to callers: the odds table plus the provenance a bet
/// snapshot needs.
#[derive(Debug, Clone)]
pub struct OddsQuote {
    pub market_id: MarketId,
    pub odds: OddsTable,
    /// Generation of the cache entry the quote was served from.
    pub generation: u64,
    /// Whether the entry had expired (or the catalog was down) when served.
    pub stale: bool,
    pub fetched_at: time::OffsetDateTime,
}

enum FetchFailure {
    MarketNotFound(MarketId),
    Unavailable,
}

pub struct PricingCache {
    catalog: Arc<dyn CatalogReader>,
    breaker: CircuitBreaker,
    config: PricingConfig,
    entries: Mutex<HashMap<MarketId, CacheEntry>>,
    /// Per-market refresh locks; never held across markets.
    refresh_locks: Mutex<HashMap<MarketId, Arc<Mutex<()>>>>,
}

impl PricingCache {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        config: PricingConfig,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            catalog,
            breaker,
            config,
            entries: Mutex::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current odds for a market: the cached value if fresh, otherwise a
    /// protected read through to the catalog.
    pub async fn quote(&self, market_id: MarketId) -> Result<OddsQuote, PricingError> {
        if let Some(quote) = self.cached_quote(market_id, false).await {
            return Ok(quote);
        }

        let refresh_lock = self.refresh_lock(market_id).await;
        let _guard = refresh_lock.lock().await;

        // Whoever held the lock before us may have refreshed the entry.
        if let Some(quote) = self.cached_quote(market_id, false).await {
            return Ok(quote);
        }

        match self.protected_fetch(market_id).await {
            Ok(odds) => Ok(self.store_entry(market_id, odds).await),
            Err(FetchFailure::MarketNotFound(id)) => Err(PricingError::MarketNotFound(id)),
            Err(FetchFailure::Unavailable) => {
                if let Some(quote) = self.cached_quote(market_id, true).await {
                    warn!(market_id = %market_id, "Catalog unavailable, serving stale odds");
                    return Ok(quote);
                }
                Err(PricingError::CatalogUnavailable(market_id))
            }
        }
    }

    /// Drop the entries for the given markets immediately, regardless of
    /// TTL. Called on result publication so no bet can be priced from a
    /// pre-publication value, not even a stale-served one.
    pub async fn invalidate_markets(&self, market_ids: &[MarketId]) {
        let mut entries = self.entries.lock().await;
        for id in market_ids {
            if entries.remove(id).is_some() {
                debug!(market_id = %id, "Cache entry invalidated");
            }
        }
    }

    /// Cached value for the market. With `allow_expired` the TTL is ignored
    /// and the quote is flagged stale; otherwise only fresh entries are
    /// returned.
    async fn cached_quote(&self, market_id: MarketId, allow_expired: bool) -> Option<OddsQuote> {
        let entries = self.entries.lock().await;
        let entry = entries.get(&market_id)?;
        let expired = Instant::now() >= entry.expires_at;
        if expired && !allow_expired {
            return None;
        }
        Some(OddsQuote {
            market_id,
            odds: entry.odds.clone(),
            generation: entry.generation,
            stale: expired,
            fetched_at: entry.fetched_at_wall,
        })
    }

    async fn refresh_lock(&self, market_id: MarketId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(market_id).or_default().clone()
    }

    /// One catalog read under the breaker and the configured timeout.
    async fn protected_fetch(&self, market_id: MarketId) -> Result<OddsTable, FetchFailure> {
        if self.breaker.try_acquire().is_err() {
            return Err(FetchFailure::Unavailable);
        }

        let outcome =
            tokio::time::timeout(self.config.catalog_timeout, self.catalog.market_odds(market_id))
                .await;
        match outcome {
            Ok(Ok(odds)) => {
                self.breaker.record_success();
                Ok(odds)
            }
            // A definitive not-found is a healthy catalog answer.
            Ok(Err(CatalogError::MarketNotFound(_) | CatalogError::EventNotFound(_))) => {
                self.breaker.record_success();
                Err(FetchFailure::MarketNotFound(market_id))
            }
            Ok(Err(error)) => {
                warn!(market_id = %market_id, error = %error, "Catalog read failed");
                self.breaker.record_failure();
                Err(FetchFailure::Unavailable)
            }
            Err(_elapsed) => {
                warn!(market_id = %market_id, "Catalog read timed out");
                self.breaker.record_failure();
                Err(FetchFailure::Unavailable)
            }
        }
    }

    async fn store_entry(&self, market_id: MarketId, odds: OddsTable) -> OddsQuote {
        let mut entries = self.entries.lock().await;
        let generation = entries.get(&market_id).map_or(1, |e| e.generation + 1);
        let entry = CacheEntry {
            odds,
            generation,
            fetched_at_wall: time::OffsetDateTime::now_utc(),
            expires_at: Instant::now() + self.config.entry_ttl,
        };
        let quote = OddsQuote {
            market_id,
            odds: entry.odds.clone(),
            generation,
            stale: false,
            fetched_at: entry.fetched_at_wall,
        };
        entries.insert(market_id, entry);
        quote
    }
}
