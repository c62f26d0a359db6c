//! Invalidation policy.
//!
//! Maps each committed write to the key families it can make stale. Lists
//! are cleared wholesale rather than per entry; their TTLs are short.

use std::collections::BTreeSet;
use std::fmt;

use super::keys::KeyPattern;

/// A committed write that can change cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    PostCreated { author_id: i64 },
    PostUpdated { post_id: i64, author_id: i64 },
    PostDeleted { post_id: i64, author_id: i64 },
    LikeToggled { post_id: i64 },
    SaveToggled { post_id: i64 },
    CommentAdded { post_id: i64 },
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::PostCreated { .. } => "post_created",
            Mutation::PostUpdated { .. } => "post_updated",
            Mutation::PostDeleted { .. } => "post_deleted",
            Mutation::LikeToggled { .. } => "like_toggled",
            Mutation::SaveToggled { .. } => "save_toggled",
            Mutation::CommentAdded { .. } => "comment_added",
        }
    }

    pub fn patterns(&self) -> Vec<KeyPattern> {
        match *self {
            Mutation::PostCreated { author_id } => vec![
                KeyPattern::AllPostLists,
                KeyPattern::UserPosts(author_id),
            ],
            Mutation::PostUpdated { post_id, author_id }
            | Mutation::PostDeleted { post_id, author_id } => vec![
                KeyPattern::PostViews(post_id),
                KeyPattern::UserPosts(author_id),
                KeyPattern::AllPostLists,
            ],
            Mutation::LikeToggled { post_id } | Mutation::CommentAdded { post_id } => vec![
                KeyPattern::PostViews(post_id),
                KeyPattern::AllPostLists,
            ],
            Mutation::SaveToggled { post_id } => vec![KeyPattern::PostViews(post_id)],
        }
    }
}

/// Deduplicated set of patterns to clear for one or more mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    patterns: BTreeSet<KeyPattern>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvalidationPlan [")?;
        for (idx, pattern) in self.patterns.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{pattern}")?;
        }
        f.write_str("]")
    }
}

impl InvalidationPlan {
    pub fn for_mutation(mutation: Mutation) -> Self {
        Self::from_mutations([mutation])
    }

    /// Merge several mutations, e.g. a batch of writes committed together.
    pub fn from_mutations(mutations: impl IntoIterator<Item = Mutation>) -> Self {
        let patterns = mutations
            .into_iter()
            .flat_map(|mutation| mutation.patterns())
            .collect();
        Self { patterns }
    }

    pub fn patterns(&self) -> impl Iterator<Item = &KeyPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
