//! Postgres-backed repository implementations.

mod interactions;
mod posts;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::repos::PostQuery;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    /// Appends the `WHERE` conditions for `query`; the builder must already
    /// hold `... FROM posts p ... WHERE p.is_active = TRUE`.
    fn apply_post_query<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q PostQuery) {
        if let Some(author_id) = query.author_id {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author_id);
        }

        if let Some(excluded) = query.exclude_author_id {
            qb.push(" AND p.author_id <> ");
            qb.push_bind(excluded);
        }

        if !query.category_ids.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_categories pc WHERE pc.post_id = p.id AND pc.category_id = ANY(",
            );
            qb.push_bind(&query.category_ids);
            qb.push("))");
        }

        if !query.exclude_post_ids.is_empty() {
            qb.push(" AND p.id <> ALL(");
            qb.push_bind(&query.exclude_post_ids);
            qb.push(")");
        }

        qb.push(" ORDER BY p.created_at DESC, p.id DESC OFFSET ");
        qb.push_bind(i64::from(query.offset));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.limit));
    }
}
