//! crates/garden_core/src/achievements.rs
//!
//! Achievement levels: a monotonic counter is discretized into levels
//! `1..=ACHIEVEMENTS_LEVEL_NUMBER` through a fixed threshold table per type.

use crate::domain::AchievementType;

pub const ACHIEVEMENTS_LEVEL_NUMBER: u32 = 10;

const PLANTS_NUMBER_THRESHOLDS: [i64; 9] = [1, 3, 5, 10, 15, 20, 30, 40, 50];
const FRIENDS_NUMBER_THRESHOLDS: [i64; 9] = [1, 3, 5, 10, 15, 20, 25, 30, 40];
const HEALTHY_STREAK_THRESHOLDS: [i64; 9] = [1, 3, 5, 7, 10, 20, 30, 40, 50];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AchievementError {
    #[error("{achievement_type} needs {expected} thresholds, got {actual}")]
    InvalidThresholdCount {
        achievement_type: AchievementType,
        expected: usize,
        actual: usize,
    },
}

/// Threshold table of one achievement type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementDefinition {
    achievement_type: AchievementType,
    thresholds: Vec<i64>,
}

impl AchievementDefinition {
    /// Builds a definition, rejecting tables that do not describe exactly
    /// `ACHIEVEMENTS_LEVEL_NUMBER` levels.
    pub fn new(
        achievement_type: AchievementType,
        thresholds: Vec<i64>,
    ) -> Result<Self, AchievementError> {
        let expected = (ACHIEVEMENTS_LEVEL_NUMBER - 1) as usize;
        if thresholds.len() != expected {
            return Err(AchievementError::InvalidThresholdCount {
                achievement_type,
                expected,
                actual: thresholds.len(),
            });
        }
        Ok(Self {
            achievement_type,
            thresholds,
        })
    }

    /// The built-in table for `achievement_type`.
    pub fn builtin(achievement_type: AchievementType) -> Self {
        let thresholds = match achievement_type {
            AchievementType::PlantsNumber => PLANTS_NUMBER_THRESHOLDS,
            AchievementType::FriendsNumber => FRIENDS_NUMBER_THRESHOLDS,
            AchievementType::HealthyStreak => HEALTHY_STREAK_THRESHOLDS,
        };
        Self {
            achievement_type,
            thresholds: thresholds.to_vec(),
        }
    }

    pub fn achievement_type(&self) -> AchievementType {
        self.achievement_type
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    /// Level reached with `value`: one plus the number of thresholds already met.
    pub fn compute_level(&self, value: i64) -> u32 {
        let met = self.thresholds.iter().filter(|t| **t <= value).count() as u32;
        1 + met
    }

    /// Value needed for the next level, `None` at the maximum level.
    pub fn next_threshold(&self, value: i64) -> Option<i64> {
        self.thresholds.iter().copied().filter(|t| *t > value).min()
    }
}

/// Deterministic id of the feed entry announcing `level` for `achievement_type`,
/// so that replays of the same level-up overwrite instead of duplicating.
pub fn achievement_activity_id(achievement_type: AchievementType, level: u32) -> String {
    format!("ACHIEVEMENT_{}_LEVEL_{}", achievement_type.as_str(), level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_threshold_count() {
        let err = AchievementDefinition::new(AchievementType::PlantsNumber, vec![1, 3, 5])
            .unwrap_err();
        assert_eq!(
            err,
            AchievementError::InvalidThresholdCount {
                achievement_type: AchievementType::PlantsNumber,
                expected: 9,
                actual: 3,
            }
        );
        assert!(AchievementDefinition::new(AchievementType::FriendsNumber, vec![1; 10]).is_err());
        assert!(AchievementDefinition::new(AchievementType::HealthyStreak, vec![1; 9]).is_ok());
    }

    #[test]
    fn zero_is_level_one_for_every_type() {
        for kind in AchievementType::ALL {
            assert_eq!(AchievementDefinition::builtin(kind).compute_level(0), 1);
        }
    }

    #[test]
    fn levels_follow_threshold_boundaries() {
        let plants = AchievementDefinition::builtin(AchievementType::PlantsNumber);
        assert_eq!(plants.compute_level(1), 2);
        assert_eq!(plants.compute_level(2), 2);
        assert_eq!(plants.compute_level(3), 3);
        assert_eq!(plants.compute_level(4), 3);
        assert_eq!(plants.compute_level(49), 9);
        assert_eq!(plants.compute_level(50), ACHIEVEMENTS_LEVEL_NUMBER);
        assert_eq!(plants.compute_level(500), ACHIEVEMENTS_LEVEL_NUMBER);
    }

    #[test]
    fn next_threshold_stops_at_max_level() {
        let friends = AchievementDefinition::builtin(AchievementType::FriendsNumber);
        assert_eq!(friends.next_threshold(0), Some(1));
        assert_eq!(friends.next_threshold(26), Some(30));
        assert_eq!(friends.next_threshold(40), None);
    }

    #[test]
    fn activity_id_is_deterministic() {
        assert_eq!(
            achievement_activity_id(AchievementType::PlantsNumber, 3),
            "ACHIEVEMENT_PLANTS_NUMBER_LEVEL_3"
        );
        assert_eq!(
            achievement_activity_id(AchievementType::HealthyStreak, 10),
            "ACHIEVEMENT_HEALTHY_STREAK_LEVEL_10"
        );
    }
}
