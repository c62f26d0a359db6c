use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::repos::{InteractionsRepo, RepoError};
use crate::domain::interactions::InteractionProfile;

/// Result of reading a user's interaction history.
#[derive(Debug)]
pub enum ProfileOutcome {
    Complete(InteractionProfile),
    /// Storage failed; callers proceed as if the user had no history.
    Degraded { error: RepoError },
}

impl ProfileOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ProfileOutcome::Degraded { .. })
    }

    pub fn into_profile(self) -> InteractionProfile {
        match self {
            ProfileOutcome::Complete(profile) => profile,
            ProfileOutcome::Degraded { .. } => InteractionProfile::empty(),
        }
    }
}

#[derive(Clone)]
pub struct InteractionProfileBuilder {
    interactions: Arc<dyn InteractionsRepo>,
}

impl InteractionProfileBuilder {
    pub fn new(interactions: Arc<dyn InteractionsRepo>) -> Self {
        Self { interactions }
    }

    pub async fn build(&self, user_id: i64) -> ProfileOutcome {
        let loaded = tokio::try_join!(
            self.interactions.liked_post_ids(user_id),
            self.interactions.saved_post_ids(user_id),
            self.interactions.commented_post_ids(user_id),
        );

        match loaded {
            Ok((liked_post_ids, saved_post_ids, commented_post_ids)) => {
                let profile = InteractionProfile {
                    liked_post_ids,
                    saved_post_ids,
                    commented_post_ids,
                };
                debug!(
                    user_id,
                    liked = profile.liked_post_ids.len(),
                    saved = profile.saved_post_ids.len(),
                    commented = profile.commented_post_ids.len(),
                    "Interaction profile built"
                );
                ProfileOutcome::Complete(profile)
            }
            Err(error) => {
                warn!(user_id, error = %error, "Interaction profile degraded to empty");
                ProfileOutcome::Degraded { error }
            }
        }
    }
}
