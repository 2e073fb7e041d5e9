//! crates/garden_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; serde derives only fix the
//! wire names shared with the mobile client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Plants
//=========================================================================================

/// Discrete health buckets, ordered from the wettest to the driest state.
/// `Unknown` sorts last and is used when the inputs are unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlantHealthStatus {
    SeverelyOverwatered,
    Overwatered,
    Healthy,
    SlightlyDry,
    NeedsWater,
    SeverelyDry,
    Unknown,
}

impl PlantHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeverelyOverwatered => "SEVERELY_OVERWATERED",
            Self::Overwatered => "OVERWATERED",
            Self::Healthy => "HEALTHY",
            Self::SlightlyDry => "SLIGHTLY_DRY",
            Self::NeedsWater => "NEEDS_WATER",
            Self::SeverelyDry => "SEVERELY_DRY",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parses a stored status. Anything unrecognised maps to `Unknown`.
    pub fn parse_lossy(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for PlantHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlantHealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEVERELY_OVERWATERED" => Ok(Self::SeverelyOverwatered),
            "OVERWATERED" => Ok(Self::Overwatered),
            "HEALTHY" => Ok(Self::Healthy),
            "SLIGHTLY_DRY" => Ok(Self::SlightlyDry),
            "NEEDS_WATER" => Ok(Self::NeedsWater),
            "SEVERELY_DRY" => Ok(Self::SeverelyDry),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown plant health status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlantLocation {
    #[default]
    Indoor,
    Outdoor,
}

impl PlantLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indoor => "INDOOR",
            Self::Outdoor => "OUTDOOR",
        }
    }
}

impl FromStr for PlantLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDOOR" => Ok(Self::Indoor),
            "OUTDOOR" => Ok(Self::Outdoor),
            other => Err(format!("unknown plant location '{}'", other)),
        }
    }
}

/// Static species information, produced by identification or manual entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub name: String,
    pub latin_name: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Days between two waterings.
    pub watering_frequency: i32,
    pub light_exposure: String,
    pub location: PlantLocation,
    pub health_status: PlantHealthStatus,
}

/// A plant living in a user's garden, with its watering history.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedPlant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plant: Plant,
    pub last_watered: DateTime<Utc>,
    pub previous_last_watered: Option<DateTime<Utc>>,
    /// Start of the current healthy streak, `None` when the plant is not healthy.
    pub healthy_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Users
//=========================================================================================

/// A user's own, editable profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub pseudo: String,
    pub garden_name: String,
    pub avatar: Option<String>,
    pub fcm_token: Option<String>,
}

impl Profile {
    pub fn public(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            pseudo: self.pseudo.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// The projection of a profile other users are allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub pseudo: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Social
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Refused,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Refused => "REFUSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for FriendRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REFUSED" => Ok(Self::Refused),
            other => Err(format!("unknown friend request status '{}'", other)),
        }
    }
}

/// A friend request. Each request is stored once per participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendRequest {
    pub fn pending(from_user_id: Uuid, to_user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            from_user_id,
            to_user_id,
            status: FriendRequestStatus::Pending,
            created_at,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }
}

//=========================================================================================
// Achievements
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementType {
    PlantsNumber,
    FriendsNumber,
    HealthyStreak,
}

impl AchievementType {
    pub const ALL: [AchievementType; 3] = [
        AchievementType::PlantsNumber,
        AchievementType::FriendsNumber,
        AchievementType::HealthyStreak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlantsNumber => "PLANTS_NUMBER",
            Self::FriendsNumber => "FRIENDS_NUMBER",
            Self::HealthyStreak => "HEALTHY_STREAK",
        }
    }
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANTS_NUMBER" => Ok(Self::PlantsNumber),
            "FRIENDS_NUMBER" => Ok(Self::FriendsNumber),
            "HEALTHY_STREAK" => Ok(Self::HealthyStreak),
            other => Err(format!("unknown achievement type '{}'", other)),
        }
    }
}

/// The stored counter behind one achievement of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementProgress {
    pub user_id: Uuid,
    pub achievement_type: AchievementType,
    pub value: i64,
}

//=========================================================================================
// Activity feed
//=========================================================================================

/// The payload of a feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    AddedPlant {
        plant_name: String,
    },
    AddFriend {
        friend_id: Uuid,
        friend_pseudo: String,
    },
    Achievement {
        achievement_type: AchievementType,
        level: u32,
    },
    WaterPlant {
        plant_name: String,
    },
}

impl ActivityKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AddedPlant { .. } => "ADDED_PLANT",
            Self::AddFriend { .. } => "ADD_FRIEND",
            Self::Achievement { .. } => "ACHIEVEMENT",
            Self::WaterPlant { .. } => "WATER_PLANT",
        }
    }
}

/// An append-only event shown in the feed of the user and their friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenActivity {
    pub id: String,
    pub user_id: Uuid,
    pub pseudo: String,
    pub created_at: DateTime<Utc>,
    pub kind: ActivityKind,
}

impl GardenActivity {
    /// Builds an activity with a fresh random id.
    pub fn new(user_id: Uuid, pseudo: &str, created_at: DateTime<Utc>, kind: ActivityKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            pseudo: pseudo.to_string(),
            created_at,
            kind,
        }
    }
}
