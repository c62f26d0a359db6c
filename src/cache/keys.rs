//! Cache key definitions.
//!
//! `CacheKey` names a concrete entry; `KeyPattern` names a family of entries
//! cleared together on invalidation.

use std::fmt;

pub const ANONYMOUS_VIEWER: &str = "anonymous";
const UNFILTERED: &str = "all";

/// Concrete cache entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `post:{post_id}:{viewer_id|anonymous}`
    Post { post_id: i64, viewer_id: Option<i64> },
    /// `posts:{skip}:{limit}:{author|all}:{category|all}`
    PostList {
        skip: u32,
        limit: u32,
        author_id: Option<i64>,
        category_id: Option<i64>,
    },
    /// `user_posts:{user_id}:{skip}:{limit}`
    UserPosts { user_id: i64, skip: u32, limit: u32 },
    /// `recommendations:{user_id}:{limit}`
    Recommendations { user_id: i64, limit: u32 },
}

impl CacheKey {
    pub fn post(post_id: i64, viewer_id: Option<i64>) -> Self {
        Self::Post { post_id, viewer_id }
    }

    pub fn post_list(
        skip: u32,
        limit: u32,
        author_id: Option<i64>,
        category_id: Option<i64>,
    ) -> Self {
        Self::PostList {
            skip,
            limit,
            author_id,
            category_id,
        }
    }

    pub fn user_posts(user_id: i64, skip: u32, limit: u32) -> Self {
        Self::UserPosts {
            user_id,
            skip,
            limit,
        }
    }

    pub fn recommendations(user_id: i64, limit: u32) -> Self {
        Self::Recommendations { user_id, limit }
    }
}

struct Segment(Option<i64>, &'static str);

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str(self.1),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Post { post_id, viewer_id } => {
                write!(f, "post:{post_id}:{}", Segment(*viewer_id, ANONYMOUS_VIEWER))
            }
            CacheKey::PostList {
                skip,
                limit,
                author_id,
                category_id,
            } => write!(
                f,
                "posts:{skip}:{limit}:{}:{}",
                Segment(*author_id, UNFILTERED),
                Segment(*category_id, UNFILTERED)
            ),
            CacheKey::UserPosts {
                user_id,
                skip,
                limit,
            } => write!(f, "user_posts:{user_id}:{skip}:{limit}"),
            CacheKey::Recommendations { user_id, limit } => {
                write!(f, "recommendations:{user_id}:{limit}")
            }
        }
    }
}

/// Wildcard key family.
///
/// Rendered as a Redis glob. The local store strips the `*` and matches by
/// substring containment, so `posts:*` also reaches `user_posts:` entries
/// there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPattern {
    /// `post:{post_id}:*`
    PostViews(i64),
    /// `posts:*`
    AllPostLists,
    /// `user_posts:{user_id}:*`
    UserPosts(i64),
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::PostViews(post_id) => write!(f, "post:{post_id}:*"),
            KeyPattern::AllPostLists => f.write_str("posts:*"),
            KeyPattern::UserPosts(user_id) => write!(f, "user_posts:{user_id}:*"),
        }
    }
}
