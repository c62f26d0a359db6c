//! Post aggregate reader.
//!
//! Cache-aside reads over the posts repository. List entries are shared by
//! every viewer and stored without viewer flags; the flags for the requesting
//! viewer are looked up and merged after each read. Single-post entries are
//! keyed per viewer and stored with the flags in place.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::error::AppError;
use crate::application::pagination::{MAX_PAGE_SIZE, PageRequest, PaginationError};
use crate::application::repos::{InteractionsRepo, PostQuery, PostsRepo, RepoError};
use crate::cache::{CacheKey, TieredCache};
use crate::domain::entities::PostComment;
use crate::domain::posts::{PostAggregate, SavedPostAggregate};

#[derive(Debug, Error)]
pub enum PostReadError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<PostReadError> for AppError {
    fn from(err: PostReadError) -> Self {
        match err {
            PostReadError::Pagination(err) => AppError::validation(err.to_string()),
            PostReadError::Repo(err) => AppError::Repo(err),
        }
    }
}

/// Parameters of the global post list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostListParams {
    pub page: PageRequest,
    /// Restrict to one author's posts.
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
}

#[derive(Clone)]
pub struct PostReader {
    posts: Arc<dyn PostsRepo>,
    interactions: Arc<dyn InteractionsRepo>,
    cache: Arc<TieredCache>,
}

impl PostReader {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        interactions: Arc<dyn InteractionsRepo>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            posts,
            interactions,
            cache,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_post(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<Option<PostAggregate>, PostReadError> {
        let key = CacheKey::post(post_id, viewer_id);
        if let Some(cached) = self.cache.get_json::<PostAggregate>(&key).await {
            return Ok(Some(cached));
        }

        let Some(detail) = self.posts.find_post(post_id).await? else {
            debug!(post_id, "Post not found");
            return Ok(None);
        };

        let (liked, saved, degraded) = match viewer_id {
            Some(viewer_id) => match self.viewer_flags(viewer_id, &[post_id]).await {
                Ok((liked, saved)) => (liked.contains(&post_id), saved.contains(&post_id), false),
                Err(err) => {
                    warn!(post_id, viewer_id, error = %err, "Viewer flags unavailable; serving cleared flags");
                    (false, false, true)
                }
            },
            None => (false, false, false),
        };

        let aggregate = PostAggregate::from_detail(detail, liked, saved);
        // Degraded flags are never cached.
        if !degraded {
            self.cache
                .set_json(&key, &aggregate, self.cache.config().post_ttl())
                .await;
        }
        Ok(Some(aggregate))
    }

    #[instrument(skip(self))]
    pub async fn get_posts(
        &self,
        params: PostListParams,
        viewer_id: Option<i64>,
    ) -> Result<Vec<PostAggregate>, PostReadError> {
        let page = params.page.validated(MAX_PAGE_SIZE)?;
        let key = CacheKey::post_list(page.skip, page.limit, params.author_id, params.category_id);

        let posts = match self.cache.get_json::<Vec<PostAggregate>>(&key).await {
            Some(cached) => cached,
            None => {
                let query = PostQuery {
                    author_id: params.author_id,
                    category_ids: params.category_id.into_iter().collect(),
                    offset: page.skip,
                    limit: page.limit,
                    ..PostQuery::default()
                };
                let posts: Vec<PostAggregate> = self
                    .posts
                    .list_posts(&query)
                    .await?
                    .into_iter()
                    .map(PostAggregate::anonymous)
                    .collect();
                self.cache
                    .set_json(&key, &posts, self.cache.config().posts_ttl())
                    .await;
                posts
            }
        };

        Ok(self.merge_viewer_flags(posts, viewer_id).await)
    }

    /// An author's own timeline. Carries no viewer flags.
    #[instrument(skip(self))]
    pub async fn get_user_posts(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Vec<PostAggregate>, PostReadError> {
        let page = page.validated(MAX_PAGE_SIZE)?;
        let key = CacheKey::user_posts(user_id, page.skip, page.limit);
        if let Some(cached) = self.cache.get_json::<Vec<PostAggregate>>(&key).await {
            return Ok(cached);
        }

        let query = PostQuery {
            author_id: Some(user_id),
            offset: page.skip,
            limit: page.limit,
            ..PostQuery::default()
        };
        let posts: Vec<PostAggregate> = self
            .posts
            .list_posts(&query)
            .await?
            .into_iter()
            .map(PostAggregate::anonymous)
            .collect();
        self.cache
            .set_json(&key, &posts, self.cache.config().user_posts_ttl())
            .await;
        Ok(posts)
    }

    /// Bookmarks, most recent first. Not cached.
    #[instrument(skip(self))]
    pub async fn get_saved_posts(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Vec<SavedPostAggregate>, PostReadError> {
        let page = page.validated(MAX_PAGE_SIZE)?;
        let saved: Vec<SavedPostAggregate> = self
            .posts
            .list_saved_posts(user_id, page.skip, page.limit)
            .await?
            .into_iter()
            .map(SavedPostAggregate::from)
            .collect();

        let ids: Vec<i64> = saved.iter().map(|entry| entry.post.id).collect();
        let liked = match self.interactions.liked_among(user_id, &ids).await {
            Ok(liked) => liked,
            Err(err) => {
                warn!(user_id, error = %err, "Like flags unavailable for saved posts");
                BTreeSet::new()
            }
        };

        Ok(saved
            .into_iter()
            .map(|mut entry| {
                entry.post.is_liked_by_user = liked.contains(&entry.post.id);
                entry
            })
            .collect())
    }

    /// Comments on a post, oldest first. Not cached.
    pub async fn get_post_comments(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<Vec<PostComment>, PostReadError> {
        let page = page.validated(MAX_PAGE_SIZE)?;
        Ok(self
            .posts
            .list_comments(post_id, page.skip, page.limit)
            .await?)
    }

    async fn viewer_flags(
        &self,
        viewer_id: i64,
        post_ids: &[i64],
    ) -> Result<(BTreeSet<i64>, BTreeSet<i64>), RepoError> {
        tokio::try_join!(
            self.interactions.liked_among(viewer_id, post_ids),
            self.interactions.saved_among(viewer_id, post_ids),
        )
    }

    /// Overwrite the flags of `posts` with the viewer's own state.
    ///
    /// Anonymous viewers and flag lookup failures both yield cleared flags.
    pub async fn merge_viewer_flags(
        &self,
        posts: Vec<PostAggregate>,
        viewer_id: Option<i64>,
    ) -> Vec<PostAggregate> {
        let (liked, saved) = match viewer_id {
            Some(viewer_id) if !posts.is_empty() => {
                let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
                match self.viewer_flags(viewer_id, &ids).await {
                    Ok(flags) => flags,
                    Err(err) => {
                        warn!(viewer_id, error = %err, "Viewer flags unavailable; serving cleared flags");
                        (BTreeSet::new(), BTreeSet::new())
                    }
                }
            }
            _ => (BTreeSet::new(), BTreeSet::new()),
        };

        posts
            .into_iter()
            .map(|post| {
                let id = post.id;
                post.with_viewer_flags(liked.contains(&id), saved.contains(&id))
            })
            .collect()
    }
}
