//! In-memory caching using moka
//!
//! Holds computed bill reviews per unit. Every write to a bill invalidates
//! its unit's entry; TTLs bound staleness from writes made outside this
//! service.

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::queries;
use crate::billing::responses::BillReviewResponse;
use crate::billing::services::build_review;
use crate::config::AppConfig;
use crate::error::AppError;

/// Current draft bills loaded per warm-up pass
const WARM_BATCH: i64 = 200;

/// Application cache holding bill reviews
#[derive(Clone)]
pub struct AppCache {
    /// Bill reviews (unit_id -> review of its current bill)
    pub reviews: Cache<Uuid, Arc<BillReviewResponse>>,
}

impl AppCache {
    /// Create a new cache instance with configured TTLs
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            reviews: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .time_to_idle(ttl / 2)
                .build(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.review_cache_max_entries,
            Duration::from_secs(config.review_cache_ttl_seconds),
        )
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            reviews_size: self.reviews.entry_count(),
        }
    }

    /// Invalidate the review of one unit
    pub async fn invalidate_unit(&self, unit_id: Uuid) {
        self.reviews.invalidate(&unit_id).await;
        info!("Cache invalidated for unit: {}", unit_id);
    }

    /// Cache a unit's review unless one is already present.
    ///
    /// `init` only runs for an absent entry, so a warm-up never replaces a
    /// review a request loaded in the meantime. Returns whether it inserted.
    pub async fn warm_review<F>(&self, unit_id: Uuid, init: F) -> Result<bool, Arc<AppError>>
    where
        F: Future<Output = Result<BillReviewResponse, AppError>>,
    {
        let entry = self
            .reviews
            .entry(unit_id)
            .or_try_insert_with(async { init.await.map(Arc::new) })
            .await?;
        Ok(entry.is_fresh())
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(5 * 60))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub reviews_size: u64,
}

/// Start background cache warmer
///
/// Warms draft bill reviews on startup and refreshes every 10 minutes.
pub async fn start_cache_warmer(cache: AppCache, db: PgPool, currency: String) {
    let mut interval = interval(Duration::from_secs(10 * 60));
    loop {
        interval.tick().await;
        warm_cache(&cache, &db, &currency).await;
    }
}

/// Warm the cache with bills awaiting landlord review
async fn warm_cache(cache: &AppCache, db: &PgPool, currency: &str) {
    info!("Starting cache warm-up...");

    let drafts = match queries::list_current_drafts(db, WARM_BATCH).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Failed to list draft bills for warm-up: {}", e);
            return;
        }
    };

    for row in &drafts {
        if let Err(e) = cache
            .warm_review(row.unit_id, build_review(db, row, currency))
            .await
        {
            warn!("Failed to warm review for unit {}: {}", row.unit_id, e);
        }
    }

    info!("Cache warm-up complete. Stats: {:?}", cache.stats());
}
