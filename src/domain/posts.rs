//! Post payloads served to readers and stored in the cache.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::datetime};

use crate::domain::entities::{AuthorSummary, CategoryRecord, PostDetailRecord, SavedPostRecord};

/// Fully denormalized post as returned by the read paths.
///
/// Entries shared between viewers are stored with both viewer flags cleared;
/// the reader merges the requesting viewer's flags after retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAggregate {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub author: AuthorSummary,
    pub categories: Vec<CategoryRecord>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked_by_user: bool,
    pub is_saved_by_user: bool,
}

impl PostAggregate {
    pub fn from_detail(detail: PostDetailRecord, liked: bool, saved: bool) -> Self {
        let PostDetailRecord {
            post,
            author,
            categories,
            likes_count,
            comments_count,
        } = detail;

        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            author_id: post.author_id,
            created_at: post.created_at,
            updated_at: post.updated_at,
            is_active: post.is_active,
            author,
            categories,
            likes_count,
            comments_count,
            is_liked_by_user: liked,
            is_saved_by_user: saved,
        }
    }

    /// Shared form with no viewer-private state.
    pub fn anonymous(detail: PostDetailRecord) -> Self {
        Self::from_detail(detail, false, false)
    }

    pub fn with_viewer_flags(mut self, liked: bool, saved: bool) -> Self {
        self.is_liked_by_user = liked;
        self.is_saved_by_user = saved;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPostAggregate {
    #[serde(flatten)]
    pub post: PostAggregate,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

impl From<SavedPostRecord> for SavedPostAggregate {
    fn from(record: SavedPostRecord) -> Self {
        Self {
            post: PostAggregate::from_detail(record.detail, false, true),
            saved_at: record.saved_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationReason {
    #[serde(rename = "Popular recent post")]
    PopularRecent,
    #[serde(rename = "Based on your interests")]
    Interests,
    #[serde(rename = "Trending post")]
    Trending,
    #[serde(rename = "System message")]
    System,
}

impl RecommendationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationReason::PopularRecent => "Popular recent post",
            RecommendationReason::Interests => "Based on your interests",
            RecommendationReason::Trending => "Trending post",
            RecommendationReason::System => "System message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedPost {
    #[serde(flatten)]
    pub post: PostAggregate,
    pub recommendation_reason: RecommendationReason,
}

pub const PLACEHOLDER_POST_ID: i64 = 0;
const PLACEHOLDER_TITLE: &str = "Welcome to Simple Social!";
const PLACEHOLDER_CONTENT: &str =
    "No recommendations available right now. Try creating some posts and interacting with others!";

impl RecommendedPost {
    pub fn new(post: PostAggregate, reason: RecommendationReason) -> Self {
        Self {
            post,
            recommendation_reason: reason,
        }
    }

    /// Static entry returned when no recommendation could be produced.
    pub fn placeholder() -> Self {
        let created_at = datetime!(2025-01-01 00:00 UTC);
        let post = PostAggregate {
            id: PLACEHOLDER_POST_ID,
            title: PLACEHOLDER_TITLE.to_string(),
            content: PLACEHOLDER_CONTENT.to_string(),
            image_url: None,
            author_id: 0,
            created_at,
            updated_at: None,
            is_active: true,
            author: AuthorSummary {
                id: 0,
                username: "system".to_string(),
                full_name: Some("System".to_string()),
                profile_picture: None,
            },
            categories: Vec::new(),
            likes_count: 0,
            comments_count: 0,
            is_liked_by_user: false,
            is_saved_by_user: false,
        };

        Self::new(post, RecommendationReason::System)
    }

    pub fn is_placeholder(&self) -> bool {
        self.post.id == PLACEHOLDER_POST_ID
            && self.recommendation_reason == RecommendationReason::System
    }
}
