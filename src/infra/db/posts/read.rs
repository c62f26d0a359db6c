use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::{PostQuery, PostsRepo, RepoError};
use crate::domain::entities::{CategoryRecord, PostComment, PostDetailRecord, SavedPostRecord};

use super::types::{
    CategoryRow, POST_DETAIL_COLUMNS, PostCommentRow, PostDetailRow, SavedPostRow,
};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, id: i64) -> Result<Option<PostDetailRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_DETAIL_COLUMNS} \
             FROM posts p \
             INNER JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1"
        );
        let row = sqlx::query_as::<_, PostDetailRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(self.attach_categories(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostDetailRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(POST_DETAIL_COLUMNS);
        qb.push(
            " FROM posts p \
              INNER JOIN users u ON u.id = p.author_id \
              WHERE p.is_active = TRUE",
        );
        Self::apply_post_query(&mut qb, query);

        let rows = qb
            .build_query_as::<PostDetailRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        self.attach_categories(rows).await
    }

    async fn categories_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<CategoryRecord>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT DISTINCT c.id, c.name, c.description, c.created_at \
             FROM categories c \
             INNER JOIN post_categories pc ON pc.category_id = c.id \
             WHERE pc.post_id = ANY($1) \
             ORDER BY c.id",
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn list_saved_posts(
        &self,
        user_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SavedPostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_DETAIL_COLUMNS}, sp.created_at AS saved_at \
             FROM saved_posts sp \
             INNER JOIN posts p ON p.id = sp.post_id \
             INNER JOIN users u ON u.id = p.author_id \
             WHERE sp.user_id = $1 AND p.is_active = TRUE \
             ORDER BY sp.created_at DESC, p.id DESC \
             OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query_as::<_, SavedPostRow>(&sql)
            .bind(user_id)
            .bind(i64::from(offset))
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let (details, saved_at): (Vec<PostDetailRow>, Vec<_>) = rows
            .into_iter()
            .map(|row| (row.detail, row.saved_at))
            .unzip();
        let details = self.attach_categories(details).await?;

        Ok(details
            .into_iter()
            .zip(saved_at)
            .map(|(detail, saved_at)| SavedPostRecord { detail, saved_at })
            .collect())
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<PostComment>, RepoError> {
        let rows = sqlx::query_as::<_, PostCommentRow>(
            "SELECT c.id, c.content, c.post_id, c.user_id, c.created_at, c.updated_at, \
                    u.username, u.full_name, u.profile_picture \
             FROM comments c \
             INNER JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC \
             OFFSET $2 LIMIT $3",
        )
        .bind(post_id)
        .bind(i64::from(offset))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostComment::from).collect())
    }
}
