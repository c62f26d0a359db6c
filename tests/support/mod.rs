//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use socialfeed::application::commands::PostCommands;
use socialfeed::application::posts::PostReader;
use socialfeed::application::recommendations::{InteractionProfileBuilder, RecommendationSelector};
use socialfeed::application::repos::{
    CreateCommentParams, CreatePostParams, InteractionsRepo, PostQuery, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams,
};
use socialfeed::cache::{CacheConfig, CacheTrigger, PrimaryCache, PrimaryCacheError, TieredCache};
use socialfeed::domain::entities::{
    AuthorSummary, CategoryRecord, CommentRecord, PostComment, PostDetailRecord, PostRecord,
    SavedPostRecord,
};
use time::OffsetDateTime;
use time::macros::datetime;

const EPOCH: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

fn at_minute(minute: i64) -> OffsetDateTime {
    EPOCH + time::Duration::minutes(minute)
}

struct StoredPost {
    record: PostRecord,
    category_ids: BTreeSet<i64>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<i64, AuthorSummary>,
    categories: BTreeMap<i64, CategoryRecord>,
    posts: BTreeMap<i64, StoredPost>,
    likes: BTreeSet<(i64, i64)>,
    saves: BTreeMap<(i64, i64), OffsetDateTime>,
    comments: Vec<CommentRecord>,
    ticks: i64,
}

impl State {
    fn tick(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        at_minute(self.ticks)
    }

    fn detail(&self, stored: &StoredPost) -> PostDetailRecord {
        let post = &stored.record;
        let author = self
            .users
            .get(&post.author_id)
            .cloned()
            .unwrap_or_else(|| AuthorSummary {
                id: post.author_id,
                username: format!("user{}", post.author_id),
                full_name: None,
                profile_picture: None,
            });
        let categories = stored
            .category_ids
            .iter()
            .filter_map(|id| self.categories.get(id).cloned())
            .collect();

        PostDetailRecord {
            post: post.clone(),
            author,
            categories,
            likes_count: self.likes.iter().filter(|(p, _)| *p == post.id).count() as i64,
            comments_count: self
                .comments
                .iter()
                .filter(|comment| comment.post_id == post.id)
                .count() as i64,
        }
    }
}

/// Posts, interactions and writes over one shared in-memory state.
///
/// Each repository surface can be told to fail, and read calls are counted
/// so tests can tell cache hits from storage reads.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    pub fail_list_posts: AtomicBool,
    pub fail_category_filtered_lists: AtomicBool,
    pub fail_categories: AtomicBool,
    pub fail_interactions: AtomicBool,
    pub fail_writes: AtomicBool,
    pub find_post_calls: AtomicUsize,
    pub list_posts_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }

    pub fn seed_user(&self, id: i64, username: &str) {
        self.state().users.insert(
            id,
            AuthorSummary {
                id,
                username: username.to_string(),
                full_name: Some(username.to_uppercase()),
                profile_picture: None,
            },
        );
    }

    pub fn seed_category(&self, id: i64, name: &str) {
        let mut state = self.state();
        let created_at = state.tick();
        state.categories.insert(
            id,
            CategoryRecord {
                id,
                name: name.to_string(),
                description: None,
                created_at,
            },
        );
    }

    /// Inserts an active post; later seeds are newer.
    pub fn seed_post(&self, id: i64, author_id: i64, title: &str, category_ids: &[i64]) {
        let mut state = self.state();
        let created_at = state.tick();
        state.posts.insert(
            id,
            StoredPost {
                record: PostRecord {
                    id,
                    title: title.to_string(),
                    content: format!("{title} body"),
                    image_url: None,
                    author_id,
                    is_active: true,
                    created_at,
                    updated_at: None,
                },
                category_ids: category_ids.iter().copied().collect(),
            },
        );
    }

    pub fn like(&self, user_id: i64, post_id: i64) {
        self.state().likes.insert((post_id, user_id));
    }

    pub fn save(&self, user_id: i64, post_id: i64) {
        let mut state = self.state();
        let saved_at = state.tick();
        state.saves.insert((post_id, user_id), saved_at);
    }

    pub fn comment(&self, user_id: i64, post_id: i64, content: &str) {
        let mut state = self.state();
        let created_at = state.tick();
        let id = state.comments.len() as i64 + 1;
        state.comments.push(CommentRecord {
            id,
            content: content.to_string(),
            post_id,
            user_id,
            created_at,
            updated_at: None,
        });
    }

    pub fn find_post_calls(&self) -> usize {
        self.find_post_calls.load(Ordering::SeqCst)
    }

    pub fn list_posts_calls(&self) -> usize {
        self.list_posts_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepoError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn find_post(&self, id: i64) -> Result<Option<PostDetailRecord>, RepoError> {
        self.find_post_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        Ok(state.posts.get(&id).map(|stored| state.detail(stored)))
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostDetailRecord>, RepoError> {
        self.list_posts_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_list_posts, "posts")?;
        if !query.category_ids.is_empty() {
            Self::check(&self.fail_category_filtered_lists, "category posts")?;
        }

        let state = self.state();
        let mut matches: Vec<&StoredPost> = state
            .posts
            .values()
            .filter(|stored| stored.record.is_active)
            .filter(|stored| query.author_id.is_none_or(|id| stored.record.author_id == id))
            .filter(|stored| {
                query
                    .exclude_author_id
                    .is_none_or(|id| stored.record.author_id != id)
            })
            .filter(|stored| {
                query.category_ids.is_empty()
                    || query
                        .category_ids
                        .iter()
                        .any(|id| stored.category_ids.contains(id))
            })
            .filter(|stored| !query.exclude_post_ids.contains(&stored.record.id))
            .collect();

        matches.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.record.id.cmp(&a.record.id))
        });

        Ok(matches
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|stored| state.detail(stored))
            .collect())
    }

    async fn categories_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<CategoryRecord>, RepoError> {
        Self::check(&self.fail_categories, "categories")?;
        let state = self.state();
        let ids: BTreeSet<i64> = post_ids
            .iter()
            .filter_map(|id| state.posts.get(id))
            .flat_map(|stored| stored.category_ids.iter().copied())
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.categories.get(&id).cloned())
            .collect())
    }

    async fn list_saved_posts(
        &self,
        user_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SavedPostRecord>, RepoError> {
        let state = self.state();
        let mut saved: Vec<(OffsetDateTime, i64)> = state
            .saves
            .iter()
            .filter(|((_, user), _)| *user == user_id)
            .map(|((post, _), saved_at)| (*saved_at, *post))
            .collect();
        saved.sort_by(|a, b| b.cmp(a));

        Ok(saved
            .into_iter()
            .filter_map(|(saved_at, post_id)| {
                let stored = state.posts.get(&post_id)?;
                stored.record.is_active.then(|| SavedPostRecord {
                    detail: state.detail(stored),
                    saved_at,
                })
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<PostComment>, RepoError> {
        let state = self.state();
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .skip(offset as usize)
            .take(limit as usize)
            .map(|comment| PostComment {
                comment: comment.clone(),
                user: state
                    .users
                    .get(&comment.user_id)
                    .cloned()
                    .unwrap_or_else(|| AuthorSummary {
                        id: comment.user_id,
                        username: format!("user{}", comment.user_id),
                        full_name: None,
                        profile_picture: None,
                    }),
            })
            .collect())
    }
}

#[async_trait]
impl InteractionsRepo for MemoryStore {
    async fn liked_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        Self::check(&self.fail_interactions, "likes")?;
        Ok(self
            .state()
            .likes
            .iter()
            .filter(|(_, user)| *user == user_id)
            .map(|(post, _)| *post)
            .collect())
    }

    async fn saved_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        Self::check(&self.fail_interactions, "saves")?;
        Ok(self
            .state()
            .saves
            .keys()
            .filter(|(_, user)| *user == user_id)
            .map(|(post, _)| *post)
            .collect())
    }

    async fn commented_post_ids(&self, user_id: i64) -> Result<BTreeSet<i64>, RepoError> {
        Self::check(&self.fail_interactions, "comments")?;
        Ok(self
            .state()
            .comments
            .iter()
            .filter(|comment| comment.user_id == user_id)
            .map(|comment| comment.post_id)
            .collect())
    }

    async fn liked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError> {
        let liked = self.liked_post_ids(user_id).await?;
        Ok(post_ids
            .iter()
            .copied()
            .filter(|id| liked.contains(id))
            .collect())
    }

    async fn saved_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<BTreeSet<i64>, RepoError> {
        let saved = self.saved_post_ids(user_id).await?;
        Ok(post_ids
            .iter()
            .copied()
            .filter(|id| saved.contains(id))
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        let created_at = state.tick();
        let id = state.posts.keys().next_back().copied().unwrap_or(0) + 1;
        let record = PostRecord {
            id,
            title: params.title,
            content: params.content,
            image_url: params.image_url,
            author_id: params.author_id,
            is_active: true,
            created_at,
            updated_at: None,
        };
        let category_ids = params
            .category_ids
            .into_iter()
            .filter(|id| state.categories.contains_key(id))
            .collect();
        state.posts.insert(
            id,
            StoredPost {
                record: record.clone(),
                category_ids,
            },
        );
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<Option<PostRecord>, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        let updated_at = state.tick();
        let Some(stored) = state.posts.get_mut(&params.post_id) else {
            return Ok(None);
        };
        if stored.record.author_id != params.author_id || !stored.record.is_active {
            return Ok(None);
        }
        if let Some(title) = params.title {
            stored.record.title = title;
        }
        if let Some(content) = params.content {
            stored.record.content = content;
        }
        if let Some(image_url) = params.image_url {
            stored.record.image_url = Some(image_url);
        }
        if let Some(category_ids) = params.category_ids {
            stored.category_ids = category_ids.into_iter().collect();
        }
        stored.record.updated_at = Some(updated_at);
        Ok(Some(stored.record.clone()))
    }

    async fn deactivate_post(&self, post_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        match state.posts.get_mut(&post_id) {
            Some(stored) if stored.record.author_id == author_id && stored.record.is_active => {
                stored.record.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        if state.likes.remove(&(post_id, user_id)) {
            return Ok(false);
        }
        state.likes.insert((post_id, user_id));
        Ok(true)
    }

    async fn toggle_save(&self, post_id: i64, user_id: i64) -> Result<bool, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        if state.saves.remove(&(post_id, user_id)).is_some() {
            return Ok(false);
        }
        let saved_at = state.tick();
        state.saves.insert((post_id, user_id), saved_at);
        Ok(true)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        Self::check(&self.fail_writes, "writes")?;
        let mut state = self.state();
        let created_at = state.tick();
        let comment = CommentRecord {
            id: state.comments.len() as i64 + 1,
            content: params.content,
            post_id: params.post_id,
            user_id: params.user_id,
            created_at,
            updated_at: None,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

/// Glob matching with `*` as the only wildcard, as used by `KEYS`.
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, rest) = parts.split_first().expect("split yields at least one part");
    let Some(mut remaining) = key.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = rest.split_last().expect("pattern contains a wildcard");
    for part in middle {
        match remaining.find(part) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

/// In-memory stand-in for Redis that can be switched off or slowed down.
#[derive(Default)]
pub struct MemoryPrimary {
    entries: Mutex<HashMap<String, String>>,
    pub down: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

impl MemoryPrimary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().expect("delay lock") = delay;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().expect("entries lock").contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("entries lock").get(key).cloned()
    }

    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .expect("entries lock")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    async fn enter(&self, command: &'static str) -> Result<(), PrimaryCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(PrimaryCacheError::Command {
                command,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PrimaryCache for MemoryPrimary {
    fn backend(&self) -> &'static str {
        "memory-primary"
    }

    async fn ping(&self) -> Result<(), PrimaryCacheError> {
        self.enter("PING").await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PrimaryCacheError> {
        self.enter("GET").await?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), PrimaryCacheError> {
        self.enter("SETEX").await?;
        self.entries
            .lock()
            .expect("entries lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PrimaryCacheError> {
        self.enter("DEL").await?;
        self.entries.lock().expect("entries lock").remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, PrimaryCacheError> {
        self.enter("KEYS").await?;
        Ok(self
            .stored_keys()
            .into_iter()
            .filter(|key| glob_matches(pattern, key))
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, PrimaryCacheError> {
        self.enter("DEL").await?;
        let mut entries = self.entries.lock().expect("entries lock");
        Ok(keys.iter().filter(|key| entries.remove(key.as_str()).is_some()).count())
    }
}

/// Everything the read and write paths need, wired over one [`MemoryStore`].
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<TieredCache>,
    pub reader: PostReader,
    pub selector: RecommendationSelector,
    pub commands: PostCommands,
}

impl Harness {
    /// Local tier only.
    pub fn degraded() -> Self {
        Self::with_cache(Arc::new(TieredCache::new(CacheConfig::default())))
    }

    pub async fn with_primary(primary: Arc<MemoryPrimary>) -> Self {
        let cache = Arc::new(TieredCache::new(CacheConfig::default()));
        assert!(cache.connect(primary).await, "memory primary should attach");
        Self::with_cache(cache)
    }

    fn with_cache(cache: Arc<TieredCache>) -> Self {
        let store = MemoryStore::new();
        let posts: Arc<dyn PostsRepo> = store.clone();
        let interactions: Arc<dyn InteractionsRepo> = store.clone();
        let writes: Arc<dyn PostsWriteRepo> = store.clone();

        let reader = PostReader::new(posts.clone(), interactions.clone(), cache.clone());
        let selector = RecommendationSelector::new(
            posts.clone(),
            InteractionProfileBuilder::new(interactions),
            reader.clone(),
            cache.clone(),
        );
        let commands = PostCommands::new(posts, writes, CacheTrigger::new(cache.clone()));

        Self {
            store,
            cache,
            reader,
            selector,
            commands,
        }
    }

    /// Users 1..=3, categories 1..=3, no posts.
    pub fn seed_people(&self) {
        self.store.seed_user(1, "alice");
        self.store.seed_user(2, "bob");
        self.store.seed_user(3, "carol");
        self.store.seed_category(1, "Technology");
        self.store.seed_category(2, "Travel");
        self.store.seed_category(3, "Food");
    }
}

pub fn flag(value: &AtomicBool, on: bool) {
    value.store(on, Ordering::SeqCst);
}
