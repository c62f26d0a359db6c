use time::OffsetDateTime;

use crate::domain::entities::{
    AuthorSummary, CategoryRecord, CommentRecord, PostComment, PostDetailRecord, PostRecord,
};

/// Column list matching [`PostDetailRow`]; expects `posts p` joined to `users u`.
pub(crate) const POST_DETAIL_COLUMNS: &str = "p.id, p.title, p.content, p.image_url, \
     p.author_id, p.is_active, p.created_at, p.updated_at, \
     u.username AS author_username, u.full_name AS author_full_name, \
     u.profile_picture AS author_profile_picture, \
     (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS likes_count, \
     (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comments_count";

pub(crate) const POST_COLUMNS: &str =
    "id, title, content, image_url, author_id, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) image_url: Option<String>,
    pub(crate) author_id: i64,
    pub(crate) is_active: bool,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: Option<OffsetDateTime>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            image_url: row.image_url,
            author_id: row.author_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostDetailRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) author_username: String,
    pub(crate) author_full_name: Option<String>,
    pub(crate) author_profile_picture: Option<String>,
    pub(crate) likes_count: i64,
    pub(crate) comments_count: i64,
}

impl PostDetailRow {
    pub(crate) fn into_record(self, categories: Vec<CategoryRecord>) -> PostDetailRecord {
        let author = AuthorSummary {
            id: self.post.author_id,
            username: self.author_username,
            full_name: self.author_full_name,
            profile_picture: self.author_profile_picture,
        };
        PostDetailRecord {
            post: PostRecord::from(self.post),
            author,
            categories,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SavedPostRow {
    #[sqlx(flatten)]
    pub(crate) detail: PostDetailRow,
    pub(crate) saved_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostCategoryRow {
    pub(crate) post_id: i64,
    #[sqlx(flatten)]
    pub(crate) category: CategoryRow,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: i64,
    pub(crate) content: String,
    pub(crate) post_id: i64,
    pub(crate) user_id: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: Option<OffsetDateTime>,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            post_id: row.post_id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PostCommentRow {
    #[sqlx(flatten)]
    pub(crate) comment: CommentRow,
    pub(crate) username: String,
    pub(crate) full_name: Option<String>,
    pub(crate) profile_picture: Option<String>,
}

impl From<PostCommentRow> for PostComment {
    fn from(row: PostCommentRow) -> Self {
        let user = AuthorSummary {
            id: row.comment.user_id,
            username: row.username,
            full_name: row.full_name,
            profile_picture: row.profile_picture,
        };
        Self {
            comment: CommentRecord::from(row.comment),
            user,
        }
    }
}
