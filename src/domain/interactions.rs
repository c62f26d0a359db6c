use std::collections::BTreeSet;

/// A user's engagement history, reduced to post id sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionProfile {
    pub liked_post_ids: BTreeSet<i64>,
    pub saved_post_ids: BTreeSet<i64>,
    pub commented_post_ids: BTreeSet<i64>,
}

impl InteractionProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_any_interaction(&self) -> bool {
        !(self.liked_post_ids.is_empty()
            && self.saved_post_ids.is_empty()
            && self.commented_post_ids.is_empty())
    }

    /// Union of every post the user touched, ascending.
    pub fn interacted_post_ids(&self) -> Vec<i64> {
        self.liked_post_ids
            .iter()
            .chain(&self.saved_post_ids)
            .chain(&self.commented_post_ids)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
