//! crates/garden_core/src/services/progress.rs
//!
//! Achievement progress tracking. Counters only move up, except the friend
//! counter which is decremented by one when a friendship ends. Crossing a
//! level publishes a single feed entry per (type, level).

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::achievements::{achievement_activity_id, AchievementDefinition};
use crate::domain::{ActivityKind, AchievementType, GardenActivity};
use crate::ports::{AchievementRepository, Clock, PortError, PortResult, ProfileRepository};
use crate::services::feed::ActivityFeed;

/// Progress of one achievement as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementStatus {
    pub achievement_type: AchievementType,
    pub value: i64,
    pub level: u32,
    pub next_threshold: Option<i64>,
}

pub struct AchievementTracker {
    achievements: Arc<dyn AchievementRepository>,
    profiles: Arc<dyn ProfileRepository>,
    feed: Arc<ActivityFeed>,
    clock: Arc<dyn Clock>,
}

impl AchievementTracker {
    pub fn new(
        achievements: Arc<dyn AchievementRepository>,
        profiles: Arc<dyn ProfileRepository>,
        feed: Arc<ActivityFeed>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            achievements,
            profiles,
            feed,
            clock,
        }
    }

    /// Reports a new counter value. Returns the level reached when the report
    /// moved the user to a higher level.
    pub async fn report(
        &self,
        user_id: Uuid,
        achievement_type: AchievementType,
        value: i64,
    ) -> PortResult<Option<u32>> {
        let Some(previous) = self
            .achievements
            .store_if_greater(user_id, achievement_type, value)
            .await?
        else {
            return Ok(None);
        };

        let definition = AchievementDefinition::builtin(achievement_type);
        let before = definition.compute_level(previous);
        let after = definition.compute_level(value);
        if after <= before {
            return Ok(None);
        }

        info!(
            "User {} reached level {} of {} ({} -> {})",
            user_id, after, achievement_type, previous, value
        );
        self.publish_level_up(user_id, achievement_type, after).await?;
        Ok(Some(after))
    }

    async fn publish_level_up(
        &self,
        user_id: Uuid,
        achievement_type: AchievementType,
        level: u32,
    ) -> PortResult<()> {
        let pseudo = match self.profiles.get_profile(user_id).await {
            Ok(profile) if !profile.pseudo.trim().is_empty() => profile.pseudo,
            Ok(_) | Err(PortError::NotFound(_)) => {
                warn!("No pseudo for user {}, level-up activity skipped", user_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let activity = GardenActivity {
            id: achievement_activity_id(achievement_type, level),
            user_id,
            pseudo,
            created_at: self.clock.now(),
            kind: ActivityKind::Achievement {
                achievement_type,
                level,
            },
        };
        self.feed.record(activity).await
    }

    /// Decrements the friend counter after a friendship ends.
    pub async fn decrement_friends(&self, user_id: Uuid) -> PortResult<i64> {
        self.achievements
            .decrement(user_id, AchievementType::FriendsNumber)
            .await
    }

    /// Every achievement of a user with its level, including untouched ones.
    pub async fn summary(&self, user_id: Uuid) -> PortResult<Vec<AchievementStatus>> {
        let stored = self.achievements.list_progress(user_id).await?;
        Ok(AchievementType::ALL
            .iter()
            .map(|kind| {
                let value = stored
                    .iter()
                    .find(|p| p.achievement_type == *kind)
                    .map_or(0, |p| p.value);
                let definition = AchievementDefinition::builtin(*kind);
                AchievementStatus {
                    achievement_type: *kind,
                    value,
                    level: definition.compute_level(value),
                    next_threshold: definition.next_threshold(value),
                }
            })
            .collect())
    }
}
