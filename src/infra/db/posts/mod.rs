mod read;
mod types;
mod write;

use std::collections::HashMap;

use crate::application::repos::RepoError;
use crate::domain::entities::{CategoryRecord, PostDetailRecord};

use super::{PostgresRepositories, map_sqlx_error};
use types::{PostCategoryRow, PostDetailRow};

impl PostgresRepositories {
    /// Load the categories of every row in one round trip and attach them.
    async fn attach_categories(
        &self,
        rows: Vec<PostDetailRow>,
    ) -> Result<Vec<PostDetailRecord>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = rows.iter().map(|row| row.post.id).collect();
        let category_rows = sqlx::query_as::<_, PostCategoryRow>(
            "SELECT pc.post_id, c.id, c.name, c.description, c.created_at \
             FROM post_categories pc \
             INNER JOIN categories c ON c.id = pc.category_id \
             WHERE pc.post_id = ANY($1) \
             ORDER BY c.id",
        )
        .bind(&post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut by_post: HashMap<i64, Vec<CategoryRecord>> = HashMap::new();
        for row in category_rows {
            by_post
                .entry(row.post_id)
                .or_default()
                .push(CategoryRecord::from(row.category));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let categories = by_post.remove(&row.post.id).unwrap_or_default();
                row.into_record(categories)
            })
            .collect())
    }
}
