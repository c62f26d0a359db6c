//! Repository traits describing persistence adapters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    CategoryRecord, CommentRecord, PostComment, PostDetailRecord, PostRecord, SavedPostRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filter for active posts, newest first (ties broken by descending id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub author_id: Option<i64>,
    pub exclude_author_id: Option<i64>,
    /// Matches posts attached to any of these categories.
    pub category_ids: Vec<i64>,
    pub exclude_post_ids: Vec<i64>,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub category_ids: Vec<i64>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub post_id: i64,
    pub author_id: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Looks up by id regardless of `is_active`.
    async fn find_post(&self, id: i64) -> Result<Option<PostDetailRecord>, RepoError>;

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostDetailRecord>, RepoError>;

    /// Distinct categories attached to any of `post_ids`, ascending by id.
    async fn categories_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<CategoryRecord>, RepoError>;

    /// Most recently saved first.
    async fn list_saved_posts(
        &self,
        user_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SavedPostRecord>, RepoError>;

    /// Oldest first.
    async fn list_comments(
        &self,
        post_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<PostComment>, RepoError>;
}

#[async_trait]
pub trait InteractionsRepo: Send + Sync {
    async fn liked_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError>;

    async fn saved_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError>;

    async fn commented_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError>;

    /// Subset of `post_ids` the user has liked.
    async fn liked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError>;

    /// Subset of `post_ids` the user has saved.
    async fn saved_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// `None` when the post is missing or not owned by `params.author_id`.
    async fn update_post(&self, params: UpdatePostParams) -> Result<Option<PostRecord>, RepoError>;

    /// Soft delete. `false` when the post is missing or not owned by `author_id`.
    async fn deactivate_post(&self, post_id: i64, author_id: i64) -> Result<bool, RepoError>;

    /// Returns whether the post is liked after the toggle.
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError>;

    /// Returns whether the post is saved after the toggle.
    async fn toggle_save(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}
