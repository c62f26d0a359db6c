//! Cache trigger service.
//!
//! Write paths call into this after their storage commit succeeds. Each call
//! resolves the invalidation plan and clears it through the tiered cache.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, instrument};

use super::policy::{InvalidationPlan, Mutation};
use super::tiered::TieredCache;

/// Cache trigger for committed writes.
///
/// # Usage
///
/// ```ignore
/// // After a like row was inserted or removed:
/// trigger.like_toggled(post_id).await;
/// ```
#[derive(Clone)]
pub struct CacheTrigger {
    cache: Arc<TieredCache>,
}

impl CacheTrigger {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Clear every pattern in `plan` concurrently. Returns the number of entries removed.
    #[instrument(skip(self, plan), fields(plan = %plan))]
    pub async fn apply(&self, plan: &InvalidationPlan) -> usize {
        let patterns: Vec<String> = plan.patterns().map(ToString::to_string).collect();
        let reports = join_all(
            patterns
                .iter()
                .map(|pattern| self.cache.delete_pattern(pattern)),
        )
        .await;

        let removed: usize = reports.iter().map(|report| report.total()).sum();
        let primary_failures = reports.iter().filter(|report| report.primary_failed).count();

        info!(
            patterns = plan.len(),
            removed, primary_failures, "Cache invalidation applied"
        );
        removed
    }

    async fn invalidate(&self, mutation: Mutation) -> usize {
        let plan = InvalidationPlan::for_mutation(mutation);
        info!(mutation = mutation.kind(), "Invalidating caches after commit");
        self.apply(&plan).await
    }

    pub async fn post_created(&self, author_id: i64) -> usize {
        self.invalidate(Mutation::PostCreated { author_id }).await
    }

    pub async fn post_updated(&self, post_id: i64, author_id: i64) -> usize {
        self.invalidate(Mutation::PostUpdated { post_id, author_id })
            .await
    }

    pub async fn post_deleted(&self, post_id: i64, author_id: i64) -> usize {
        self.invalidate(Mutation::PostDeleted { post_id, author_id })
            .await
    }

    pub async fn like_toggled(&self, post_id: i64) -> usize {
        self.invalidate(Mutation::LikeToggled { post_id }).await
    }

    pub async fn save_toggled(&self, post_id: i64) -> usize {
        self.invalidate(Mutation::SaveToggled { post_id }).await
    }

    pub async fn comment_added(&self, post_id: i64) -> usize {
        self.invalidate(Mutation::CommentAdded { post_id }).await
    }
}
