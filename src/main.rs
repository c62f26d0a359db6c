use std::{process, sync::Arc};

use serde::Serialize;
use socialfeed::{
    application::{
        error::AppError,
        pagination::PageRequest,
        posts::{PostListParams, PostReader},
        recommendations::{InteractionProfileBuilder, RecommendationSelector},
        repos::{InteractionsRepo, PostsRepo},
    },
    cache::{CacheConfig, TieredCache},
    config,
    infra::{db::PostgresRepositories, error::InfraError, redis::RedisPrimary, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?error.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::CacheStats(_) => run_cache_stats(&settings).await,
        config::Command::CachePurge(args) => run_cache_purge(&settings, args).await,
        config::Command::Posts(args) => run_posts(&settings, args).await,
        config::Command::Recommend(args) => run_recommend(&settings, args).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_cache_stats(settings: &config::Settings) -> Result<(), AppError> {
    let cache = init_cache(settings).await;
    let result = print_json(&cache.stats());
    cache.disconnect();
    result
}

async fn run_cache_purge(
    settings: &config::Settings,
    args: config::CachePurgeArgs,
) -> Result<(), AppError> {
    let pattern = args.pattern.trim();
    if pattern.is_empty() {
        return Err(AppError::validation("cache-purge requires a non-empty pattern"));
    }

    let cache = init_cache(settings).await;
    let report = cache.delete_pattern(pattern).await;
    info!(
        pattern,
        primary_deleted = report.primary_deleted,
        local_deleted = report.local_deleted,
        primary_failed = report.primary_failed,
        "Cache purge finished"
    );
    let result = print_json(&report);
    cache.disconnect();
    result
}

async fn run_posts(settings: &config::Settings, args: config::PostsArgs) -> Result<(), AppError> {
    let context = build_read_context(settings).await?;
    let sweeper = context.cache.spawn_local_sweeper();

    let params = PostListParams {
        page: PageRequest::new(args.skip, args.limit),
        author_id: args.author,
        category_id: args.category,
    };
    let result = match context.reader.get_posts(params, args.viewer).await {
        Ok(posts) => print_json(&posts),
        Err(err) => Err(AppError::from(err)),
    };

    shutdown(context, sweeper).await;
    result
}

async fn run_recommend(
    settings: &config::Settings,
    args: config::RecommendArgs,
) -> Result<(), AppError> {
    let context = build_read_context(settings).await?;
    let sweeper = context.cache.spawn_local_sweeper();

    let recommendations = context.selector.recommend(args.user, args.limit).await;
    let result = print_json(&recommendations);

    shutdown(context, sweeper).await;
    result
}

struct ReadContext {
    cache: Arc<TieredCache>,
    reader: PostReader,
    selector: RecommendationSelector,
}

async fn build_read_context(settings: &config::Settings) -> Result<ReadContext, AppError> {
    let pool = connect_pool(settings).await?;
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let cache = init_cache(settings).await;

    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let interactions_repo: Arc<dyn InteractionsRepo> = repositories;

    let reader = PostReader::new(
        posts_repo.clone(),
        interactions_repo.clone(),
        cache.clone(),
    );
    let selector = RecommendationSelector::new(
        posts_repo,
        InteractionProfileBuilder::new(interactions_repo),
        reader.clone(),
        cache.clone(),
    );

    Ok(ReadContext {
        cache,
        reader,
        selector,
    })
}

async fn shutdown(context: ReadContext, sweeper: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }
    context.cache.disconnect();
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

/// Always succeeds; without a reachable primary the cache runs on the local tier.
async fn init_cache(settings: &config::Settings) -> Arc<TieredCache> {
    let cache = Arc::new(TieredCache::new(CacheConfig::from(&settings.cache)));
    if !settings.cache.enable_primary {
        info!("Primary cache disabled; using local store only");
        return cache;
    }

    match RedisPrimary::connect(&settings.cache.redis_url).await {
        Ok(primary) => {
            cache.connect(Arc::new(primary)).await;
        }
        Err(err) => warn!(error = %err, "Redis unavailable; using local store only"),
    }
    cache
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
