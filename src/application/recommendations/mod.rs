//! Recommendation selector.
//!
//! Users without any like, save or comment get the most recent posts by
//! others. Everyone else gets unseen posts from the categories of posts they
//! interacted with, topped up with recent posts when that runs short. Any
//! failure that leaves nothing to show yields a single static placeholder.

mod profile;

pub use profile::{InteractionProfileBuilder, ProfileOutcome};

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::posts::PostReader;
use crate::application::repos::{PostQuery, PostsRepo, RepoError};
use crate::cache::{CacheKey, TieredCache};
use crate::domain::interactions::InteractionProfile;
use crate::domain::posts::{PostAggregate, RecommendationReason, RecommendedPost};

pub const DEFAULT_RECOMMENDATION_LIMIT: u32 = 10;
pub const MAX_RECOMMENDATION_LIMIT: u32 = 50;
/// Categories considered for the personalized path, in query order.
pub const MAX_PREFERRED_CATEGORIES: usize = 3;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("failed to load preferred categories: {0}")]
    Categories(#[source] RepoError),
    #[error("failed to load candidate posts: {0}")]
    Candidates(#[source] RepoError),
}

/// Which branch produced a computed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    NewUser,
    Personalized,
    /// Personalized selection failed; served the new-user list instead.
    PersonalizedFallback,
}

#[derive(Debug)]
pub enum RecommendationOutcome {
    Cached(Vec<RecommendedPost>),
    Computed {
        path: SelectionPath,
        posts: Vec<RecommendedPost>,
    },
    Placeholder {
        error: SelectionError,
    },
}

impl RecommendationOutcome {
    pub fn into_posts(self) -> Vec<RecommendedPost> {
        match self {
            RecommendationOutcome::Cached(posts) | RecommendationOutcome::Computed { posts, .. } => {
                posts
            }
            RecommendationOutcome::Placeholder { .. } => vec![RecommendedPost::placeholder()],
        }
    }
}

#[derive(Clone)]
pub struct RecommendationSelector {
    posts: Arc<dyn PostsRepo>,
    profiles: InteractionProfileBuilder,
    reader: PostReader,
    cache: Arc<TieredCache>,
}

impl RecommendationSelector {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        profiles: InteractionProfileBuilder,
        reader: PostReader,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            posts,
            profiles,
            reader,
            cache,
        }
    }

    /// Ranked recommendations for `user_id`. Never fails.
    pub async fn recommend(&self, user_id: i64, limit: u32) -> Vec<RecommendedPost> {
        self.recommend_outcome(user_id, limit).await.into_posts()
    }

    #[instrument(skip(self))]
    pub async fn recommend_outcome(&self, user_id: i64, limit: u32) -> RecommendationOutcome {
        let limit = limit.clamp(1, MAX_RECOMMENDATION_LIMIT);
        let key = CacheKey::recommendations(user_id, limit);
        if let Some(cached) = self.cache.get_json::<Vec<RecommendedPost>>(&key).await {
            return RecommendationOutcome::Cached(cached);
        }

        let profile = self.profiles.build(user_id).await.into_profile();

        let (path, posts) = match self.select(user_id, &profile, limit).await {
            Ok(selection) => selection,
            Err(error) => {
                warn!(user_id, error = %error, "Recommendations unavailable; serving placeholder");
                return RecommendationOutcome::Placeholder { error };
            }
        };

        let posts = self.with_viewer_flags(posts, user_id).await;
        if !posts.is_empty() {
            self.cache
                .set_json(&key, &posts, self.cache.config().recommendations_ttl())
                .await;
        }

        info!(user_id, ?path, count = posts.len(), "Recommendations computed");
        RecommendationOutcome::Computed { path, posts }
    }

    async fn select(
        &self,
        user_id: i64,
        profile: &InteractionProfile,
        limit: u32,
    ) -> Result<(SelectionPath, Vec<RecommendedPost>), SelectionError> {
        if !profile.has_any_interaction() {
            let posts = self.recent_by_others(user_id, limit).await?;
            return Ok((SelectionPath::NewUser, posts));
        }

        match self.personalized(user_id, profile, limit).await {
            Ok(posts) => Ok((SelectionPath::Personalized, posts)),
            Err(err) => {
                warn!(user_id, error = %err, "Personalized selection failed; using recent posts");
                let posts = self.recent_by_others(user_id, limit).await?;
                Ok((SelectionPath::PersonalizedFallback, posts))
            }
        }
    }

    /// The new-user list: most recent active posts not written by the user.
    async fn recent_by_others(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<RecommendedPost>, SelectionError> {
        let query = PostQuery {
            exclude_author_id: Some(user_id),
            limit,
            ..PostQuery::default()
        };
        let details = self
            .posts
            .list_posts(&query)
            .await
            .map_err(SelectionError::Candidates)?;

        Ok(details
            .into_iter()
            .map(|detail| {
                RecommendedPost::new(
                    PostAggregate::anonymous(detail),
                    RecommendationReason::PopularRecent,
                )
            })
            .collect())
    }

    async fn personalized(
        &self,
        user_id: i64,
        profile: &InteractionProfile,
        limit: u32,
    ) -> Result<Vec<RecommendedPost>, SelectionError> {
        let interacted = profile.interacted_post_ids();
        let category_ids: Vec<i64> = self
            .posts
            .categories_for_posts(&interacted)
            .await
            .map_err(SelectionError::Categories)?
            .into_iter()
            .take(MAX_PREFERRED_CATEGORIES)
            .map(|category| category.id)
            .collect();

        let mut picks = Vec::new();
        if !category_ids.is_empty() {
            let query = PostQuery {
                exclude_author_id: Some(user_id),
                category_ids,
                exclude_post_ids: interacted,
                limit,
                ..PostQuery::default()
            };
            picks = self
                .posts
                .list_posts(&query)
                .await
                .map_err(SelectionError::Candidates)?
                .into_iter()
                .map(|detail| {
                    RecommendedPost::new(
                        PostAggregate::anonymous(detail),
                        RecommendationReason::Interests,
                    )
                })
                .collect();
        }

        let limit = limit as usize;
        if picks.len() < limit {
            let mut seen: HashSet<i64> = picks.iter().map(|pick| pick.post.id).collect();
            for candidate in self.recent_by_others(user_id, limit as u32).await? {
                if picks.len() >= limit {
                    break;
                }
                if seen.insert(candidate.post.id) {
                    picks.push(RecommendedPost::new(
                        candidate.post,
                        RecommendationReason::Trending,
                    ));
                }
            }
        }

        picks.truncate(limit);
        Ok(picks)
    }

    async fn with_viewer_flags(
        &self,
        posts: Vec<RecommendedPost>,
        user_id: i64,
    ) -> Vec<RecommendedPost> {
        let (aggregates, reasons): (Vec<PostAggregate>, Vec<RecommendationReason>) = posts
            .into_iter()
            .map(|rec| (rec.post, rec.recommendation_reason))
            .unzip();

        self.reader
            .merge_viewer_flags(aggregates, Some(user_id))
            .await
            .into_iter()
            .zip(reasons)
            .map(|(post, reason)| RecommendedPost::new(post, reason))
            .collect()
    }
}
