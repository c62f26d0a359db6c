use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::application::repos::{InteractionsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    async fn post_ids_from(&self, sql: &str, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        let ids: Vec<i64> = sqlx::query_scalar(sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(ids.into_iter().collect())
    }

    async fn post_ids_among(
        &self,
        sql: &str,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError> {
        if post_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let ids: Vec<i64> = sqlx::query_scalar(sql)
            .bind(user_id)
            .bind(post_ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl InteractionsRepo for PostgresRepositories {
    async fn liked_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        self.post_ids_from("SELECT post_id FROM post_likes WHERE user_id = $1", user_id)
            .await
    }

    async fn saved_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        self.post_ids_from("SELECT post_id FROM saved_posts WHERE user_id = $1", user_id)
            .await
    }

    async fn commented_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        self.post_ids_from(
            "SELECT DISTINCT post_id FROM comments WHERE user_id = $1",
            user_id,
        )
        .await
    }

    async fn liked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError> {
        self.post_ids_among(
            "SELECT post_id FROM post_likes WHERE user_id = $1 AND post_id = ANY($2)",
            user_id,
            post_ids,
        )
        .await
    }

    async fn saved_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError> {
        self.post_ids_among(
            "SELECT post_id FROM saved_posts WHERE user_id = $1 AND post_id = ANY($2)",
            user_id,
            post_ids,
        )
        .await
    }
}
