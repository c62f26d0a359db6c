use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::application::repos::{
    CreateCommentParams, CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord};

use super::types::{CommentRow, POST_COLUMNS, PostRow};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!(
            "INSERT INTO posts (title, content, image_url, author_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&params.title)
            .bind(&params.content)
            .bind(params.image_url.as_deref())
            .bind(params.author_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        replace_categories(&mut tx, row.id, &params.category_ids).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<Option<PostRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let owner: Option<i64> = sqlx::query_scalar(
            "SELECT author_id FROM posts WHERE id = $1 AND is_active = TRUE FOR UPDATE",
        )
        .bind(params.post_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if owner != Some(params.author_id) {
            return Ok(None);
        }

        let sql = format!(
            "UPDATE posts SET \
                 title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 image_url = COALESCE($4, image_url), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(params.post_id)
            .bind(params.title.as_deref())
            .bind(params.content.as_deref())
            .bind(params.image_url.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(category_ids) = params.category_ids.as_deref() {
            sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
                .bind(params.post_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            replace_categories(&mut tx, params.post_id, category_ids).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(Some(PostRecord::from(row)))
    }

    async fn deactivate_post(&self, post_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE posts SET is_active = FALSE, updated_at = now() \
             WHERE id = $1 AND author_id = $2 AND is_active = TRUE",
        )
        .bind(post_id)
        .bind(author_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError> {
        toggle_membership(self, "post_likes", post_id, user_id).await
    }

    async fn toggle_save(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError> {
        toggle_membership(self, "saved_posts", post_id, user_id).await
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "INSERT INTO comments (content, post_id, user_id) \
             VALUES ($1, $2, $3) \
             RETURNING id, content, post_id, user_id, created_at, updated_at",
        )
        .bind(&params.content)
        .bind(params.post_id)
        .bind(params.user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord::from(row))
    }
}

/// Unknown category ids are skipped.
async fn replace_categories(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    category_ids: &[i64],
) -> Result<(), RepoError> {
    if category_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO post_categories (post_id, category_id) \
         SELECT $1, c.id FROM categories c WHERE c.id = ANY($2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(category_ids)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

/// Removes the `(post_id, user_id)` row from `table`, inserting it instead
/// when nothing was removed. Returns whether the row exists afterwards.
///
/// A concurrent toggle that inserts the same row first wins; ours becomes a
/// no-op and the row still exists.
async fn toggle_membership(
    repo: &PostgresRepositories,
    table: &'static str,
    post_id: i64,
    user_id: i64,
) -> Result<bool, RepoError> {
    let mut tx = repo.begin().await.map_err(map_sqlx_error)?;

    let delete = format!("DELETE FROM {table} WHERE post_id = $1 AND user_id = $2");
    let removed = sqlx::query(&delete)
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

    if removed == 0 {
        let insert = format!(
            "INSERT INTO {table} (post_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (post_id, user_id) DO NOTHING"
        );
        sqlx::query(&insert)
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(removed == 0)
}
