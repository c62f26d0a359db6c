//! Write paths for posts and interactions.
//!
//! Every command validates, writes through the repository, and only once the
//! write has committed asks the cache trigger to clear stale entries. A
//! failed or rejected write leaves the cache untouched.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::error::AppError;
use crate::application::repos::{
    CreateCommentParams, CreatePostParams, PostsRepo, PostsWriteRepo, UpdatePostParams,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::error::DomainError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_IMAGE_URL_CHARS: usize = 255;

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Clone)]
pub struct PostCommands {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    trigger: CacheTrigger,
}

impl PostCommands {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        trigger: CacheTrigger,
    ) -> Self {
        Self {
            posts,
            writes,
            trigger,
        }
    }

    #[instrument(skip(self, post), fields(title = %post.title))]
    pub async fn create_post(&self, author_id: i64, post: NewPost) -> Result<PostRecord, AppError> {
        validate_title(&post.title)?;
        validate_content("content", &post.content)?;
        validate_image_url(post.image_url.as_deref())?;

        let record = self
            .writes
            .create_post(CreatePostParams {
                author_id,
                title: post.title.trim().to_string(),
                content: post.content,
                image_url: post.image_url,
                category_ids: post.category_ids,
            })
            .await?;

        self.trigger.post_created(author_id).await;
        info!(post_id = record.id, author_id, "Post created");
        Ok(record)
    }

    /// `Ok(None)` when the post is missing or `actor_id` is not its author.
    #[instrument(skip(self, update))]
    pub async fn update_post(
        &self,
        post_id: i64,
        actor_id: i64,
        update: PostUpdate,
    ) -> Result<Option<PostRecord>, AppError> {
        if let Some(title) = update.title.as_deref() {
            validate_title(title)?;
        }
        if let Some(content) = update.content.as_deref() {
            validate_content("content", content)?;
        }
        validate_image_url(update.image_url.as_deref())?;

        let updated = self
            .writes
            .update_post(UpdatePostParams {
                post_id,
                author_id: actor_id,
                title: update.title.map(|title| title.trim().to_string()),
                content: update.content,
                image_url: update.image_url,
                category_ids: update.category_ids,
            })
            .await?;

        if let Some(record) = updated.as_ref() {
            self.trigger.post_updated(post_id, record.author_id).await;
        }
        Ok(updated)
    }

    /// Soft delete. `Ok(false)` when the post is missing or not owned by `actor_id`.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, post_id: i64, actor_id: i64) -> Result<bool, AppError> {
        let deleted = self.writes.deactivate_post(post_id, actor_id).await?;
        if deleted {
            self.trigger.post_deleted(post_id, actor_id).await;
        }
        Ok(deleted)
    }

    /// Returns whether the post is liked afterwards.
    #[instrument(skip(self))]
    pub async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.ensure_active(post_id).await?;
        let liked = self.writes.toggle_like(post_id, user_id).await?;
        self.trigger.like_toggled(post_id).await;
        Ok(liked)
    }

    /// Returns whether the post is saved afterwards.
    #[instrument(skip(self))]
    pub async fn toggle_save(&self, post_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.ensure_active(post_id).await?;
        let saved = self.writes.toggle_save(post_id, user_id).await?;
        self.trigger.save_toggled(post_id).await;
        Ok(saved)
    }

    #[instrument(skip(self, content))]
    pub async fn add_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: String,
    ) -> Result<CommentRecord, AppError> {
        validate_content("comment", &content)?;
        self.ensure_active(post_id).await?;

        let comment = self
            .writes
            .create_comment(CreateCommentParams {
                post_id,
                user_id,
                content,
            })
            .await?;

        self.trigger.comment_added(post_id).await;
        Ok(comment)
    }

    async fn ensure_active(&self, post_id: i64) -> Result<(), AppError> {
        match self.posts.find_post(post_id).await? {
            Some(detail) if detail.post.is_active => Ok(()),
            _ => Err(AppError::Domain(DomainError::not_found("post", post_id))),
        }
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    if length > MAX_TITLE_CHARS {
        return Err(DomainError::validation(
            "title",
            format!("must be at most {MAX_TITLE_CHARS} characters"),
        ));
    }
    Ok(())
}

fn validate_content(field: &'static str, content: &str) -> Result<(), DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn validate_image_url(image_url: Option<&str>) -> Result<(), DomainError> {
    match image_url {
        Some(url) if url.chars().count() > MAX_IMAGE_URL_CHARS => Err(DomainError::validation(
            "image_url",
            format!("must be at most {MAX_IMAGE_URL_CHARS} characters"),
        )),
        _ => Ok(()),
    }
}
