mod support;

use socialfeed::application::pagination::{PageRequest, PaginationError};
use socialfeed::application::posts::{PostListParams, PostReadError};
use support::{Harness, MemoryPrimary, flag};

fn seeded() -> Harness {
    let harness = Harness::degraded();
    harness.seed_people();
    harness.store.seed_post(1, 1, "First", &[1]);
    harness.store.seed_post(2, 2, "Second", &[2]);
    harness.store.seed_post(3, 1, "Third", &[1, 3]);
    harness
}

fn ids(posts: &[socialfeed::domain::posts::PostAggregate]) -> Vec<i64> {
    posts.iter().map(|post| post.id).collect()
}

#[tokio::test]
async fn single_post_is_cached_per_viewer() {
    let harness = seeded();
    harness.store.like(2, 1);

    let for_bob = harness
        .reader
        .get_post(1, Some(2))
        .await
        .expect("read")
        .expect("post");
    let for_carol = harness
        .reader
        .get_post(1, Some(3))
        .await
        .expect("read")
        .expect("post");
    let anonymous = harness
        .reader
        .get_post(1, None)
        .await
        .expect("read")
        .expect("post");

    assert!(for_bob.is_liked_by_user);
    assert!(!for_carol.is_liked_by_user);
    assert!(!anonymous.is_liked_by_user);
    assert_eq!(for_bob.likes_count, 1);
    assert_eq!(
        harness.cache.stats().local.keys,
        vec![
            "post:1:2".to_string(),
            "post:1:3".to_string(),
            "post:1:anonymous".to_string(),
        ]
    );

    let calls = harness.store.find_post_calls();
    let again = harness
        .reader
        .get_post(1, Some(2))
        .await
        .expect("read")
        .expect("post");
    assert_eq!(again, for_bob);
    assert_eq!(harness.store.find_post_calls(), calls);
}

#[tokio::test]
async fn missing_post_is_not_cached() {
    let harness = seeded();

    assert!(harness.reader.get_post(42, None).await.expect("read").is_none());
    assert!(harness.reader.get_post(42, None).await.expect("read").is_none());

    assert_eq!(harness.store.find_post_calls(), 2);
    assert!(harness.cache.local().is_empty());
}

#[tokio::test]
async fn deactivated_post_stays_readable_by_id() {
    let harness = seeded();
    assert!(harness.commands.delete_post(2, 2).await.expect("delete"));

    let post = harness
        .reader
        .get_post(2, None)
        .await
        .expect("read")
        .expect("still addressable");
    assert!(!post.is_active);
}

#[tokio::test]
async fn shared_list_cache_carries_each_viewers_flags() {
    let harness = seeded();
    harness.store.like(2, 3);
    harness.store.save(3, 1);

    let for_bob = harness
        .reader
        .get_posts(PostListParams::default(), Some(2))
        .await
        .expect("feed");
    let for_carol = harness
        .reader
        .get_posts(PostListParams::default(), Some(3))
        .await
        .expect("feed");
    let anonymous = harness
        .reader
        .get_posts(PostListParams::default(), None)
        .await
        .expect("feed");

    assert_eq!(ids(&for_bob), vec![3, 2, 1]);
    assert_eq!(harness.store.list_posts_calls(), 1);
    assert_eq!(
        harness.cache.stats().local.keys,
        vec!["posts:0:20:all:all".to_string()]
    );

    let liked: Vec<bool> = for_bob.iter().map(|post| post.is_liked_by_user).collect();
    assert_eq!(liked, vec![true, false, false]);
    let saved: Vec<bool> = for_carol.iter().map(|post| post.is_saved_by_user).collect();
    assert_eq!(saved, vec![false, false, true]);
    assert!(for_carol.iter().all(|post| !post.is_liked_by_user));
    assert!(
        anonymous
            .iter()
            .all(|post| !post.is_liked_by_user && !post.is_saved_by_user)
    );
}

#[tokio::test]
async fn cached_list_entry_has_no_viewer_flags() {
    let primary = MemoryPrimary::new();
    let harness = Harness::with_primary(primary.clone()).await;
    harness.seed_people();
    harness.store.seed_post(1, 1, "First", &[1]);
    harness.store.like(2, 1);

    let feed = harness
        .reader
        .get_posts(PostListParams::default(), Some(2))
        .await
        .expect("feed");
    assert!(feed[0].is_liked_by_user);

    let raw = primary.raw("posts:0:20:all:all").expect("list cached");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(stored[0]["is_liked_by_user"], serde_json::Value::Bool(false));
    assert_eq!(stored[0]["author"]["username"], "alice");
}

#[tokio::test]
async fn list_filters_select_their_own_entries() {
    let harness = seeded();

    let by_alice = harness
        .reader
        .get_posts(
            PostListParams {
                author_id: Some(1),
                ..PostListParams::default()
            },
            None,
        )
        .await
        .expect("feed");
    let food = harness
        .reader
        .get_posts(
            PostListParams {
                category_id: Some(3),
                page: PageRequest::new(0, 5),
                ..PostListParams::default()
            },
            None,
        )
        .await
        .expect("feed");

    assert_eq!(ids(&by_alice), vec![3, 1]);
    assert_eq!(ids(&food), vec![3]);
    assert_eq!(
        harness.cache.stats().local.keys,
        vec![
            "posts:0:20:1:all".to_string(),
            "posts:0:5:all:3".to_string(),
        ]
    );
}

#[tokio::test]
async fn empty_page_is_cached_too() {
    let harness = seeded();

    let page = PostListParams {
        page: PageRequest::new(40, 20),
        ..PostListParams::default()
    };
    assert!(harness.reader.get_posts(page, None).await.expect("feed").is_empty());
    assert!(harness.reader.get_posts(page, None).await.expect("feed").is_empty());

    assert_eq!(harness.store.list_posts_calls(), 1);
}

#[tokio::test]
async fn invalid_limits_are_rejected_before_any_read() {
    let harness = seeded();

    for limit in [0, 101] {
        let err = harness
            .reader
            .get_posts(
                PostListParams {
                    page: PageRequest::new(0, limit),
                    ..PostListParams::default()
                },
                None,
            )
            .await
            .expect_err("limit out of range");
        assert!(matches!(
            err,
            PostReadError::Pagination(PaginationError::InvalidLimit { max: 100, .. })
        ));
    }
    assert_eq!(harness.store.list_posts_calls(), 0);
}

#[tokio::test]
async fn flag_lookup_failure_serves_cleared_flags() {
    let harness = seeded();
    harness.store.like(2, 1);
    flag(&harness.store.fail_interactions, true);

    let feed = harness
        .reader
        .get_posts(PostListParams::default(), Some(2))
        .await
        .expect("feed still served");

    assert_eq!(feed.len(), 3);
    assert!(feed.iter().all(|post| !post.is_liked_by_user));
}

#[tokio::test]
async fn single_post_flag_failure_serves_cleared_flags_uncached() {
    let harness = seeded();
    harness.store.like(2, 1);
    harness.store.save(2, 1);
    flag(&harness.store.fail_interactions, true);

    let post = harness
        .reader
        .get_post(1, Some(2))
        .await
        .expect("post still served")
        .expect("post");

    assert_eq!(post.id, 1);
    assert!(!post.is_liked_by_user);
    assert!(!post.is_saved_by_user);
    assert!(harness.cache.local().get("post:1:2").is_none());

    flag(&harness.store.fail_interactions, false);
    let recovered = harness
        .reader
        .get_post(1, Some(2))
        .await
        .expect("read")
        .expect("post");
    assert!(recovered.is_liked_by_user);
    assert!(recovered.is_saved_by_user);
}

#[tokio::test]
async fn storage_failure_surfaces_on_uncached_list() {
    let harness = seeded();
    flag(&harness.store.fail_list_posts, true);

    let err = harness
        .reader
        .get_posts(PostListParams::default(), None)
        .await
        .expect_err("storage down");
    assert!(matches!(err, PostReadError::Repo(_)));
    assert!(harness.cache.local().is_empty());
}

#[tokio::test]
async fn user_timeline_is_cached_without_flags() {
    let harness = seeded();
    harness.store.like(1, 3);

    let timeline = harness
        .reader
        .get_user_posts(1, PageRequest::default())
        .await
        .expect("timeline");

    assert_eq!(ids(&timeline), vec![3, 1]);
    assert!(timeline.iter().all(|post| !post.is_liked_by_user));
    assert_eq!(
        harness.cache.stats().local.keys,
        vec!["user_posts:1:0:20".to_string()]
    );
}

#[tokio::test]
async fn saved_posts_are_newest_save_first_and_not_cached() {
    let harness = seeded();
    harness.store.save(3, 1);
    harness.store.save(3, 2);
    harness.store.like(3, 2);

    let saved = harness
        .reader
        .get_saved_posts(3, PageRequest::default())
        .await
        .expect("saved");

    assert_eq!(
        saved.iter().map(|entry| entry.post.id).collect::<Vec<_>>(),
        vec![2, 1]
    );
    assert!(saved.iter().all(|entry| entry.post.is_saved_by_user));
    assert!(saved[0].post.is_liked_by_user);
    assert!(!saved[1].post.is_liked_by_user);
    assert!(harness.cache.local().is_empty());
}

#[tokio::test]
async fn feed_reflects_writes_end_to_end() {
    let harness = seeded();

    let before = harness
        .reader
        .get_posts(PostListParams::default(), Some(3))
        .await
        .expect("feed");
    assert_eq!(before[0].likes_count, 0);

    assert!(harness.commands.toggle_like(3, 3).await.expect("like"));
    harness
        .commands
        .add_comment(3, 2, "Nice".to_string())
        .await
        .expect("comment");

    let after = harness
        .reader
        .get_posts(PostListParams::default(), Some(3))
        .await
        .expect("feed");
    assert_eq!(after[0].id, 3);
    assert_eq!(after[0].likes_count, 1);
    assert_eq!(after[0].comments_count, 1);
    assert!(after[0].is_liked_by_user);

    assert!(!harness.commands.toggle_like(3, 3).await.expect("unlike"));
    let post = harness
        .reader
        .get_post(3, Some(3))
        .await
        .expect("read")
        .expect("post");
    assert_eq!(post.likes_count, 0);
    assert!(!post.is_liked_by_user);
}
