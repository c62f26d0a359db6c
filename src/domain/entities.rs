//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Public projection of a user embedded in post payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: i64,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// A post joined with everything the feed needs to render it, minus viewer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetailRecord {
    pub post: PostRecord,
    pub author: AuthorSummary,
    pub categories: Vec<CategoryRecord>,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostComment {
    #[serde(flatten)]
    pub comment: CommentRecord,
    pub user: AuthorSummary,
}

/// A post the user bookmarked, with the bookmark timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPostRecord {
    pub detail: PostDetailRecord,
    pub saved_at: OffsetDateTime,
}
