//! crates/garden_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    AchievementProgress, AchievementType, FriendRequest, GardenActivity, OwnedPlant,
    PlantHealthStatus, Profile, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports
//=========================================================================================

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of a live session, `Unauthorized` if unknown or expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    /// Removes an account and everything that belongs to it.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn create_profile(&self, profile: &Profile) -> PortResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn update_profile(&self, profile: &Profile) -> PortResult<()>;

    async fn find_by_pseudo(&self, pseudo: &str) -> PortResult<Option<Profile>>;

    /// Stores or clears the push token of a user.
    async fn set_fcm_token(&self, user_id: Uuid, token: Option<&str>) -> PortResult<()>;

    async fn list_user_ids(&self) -> PortResult<Vec<Uuid>>;
}

#[async_trait]
pub trait PlantRepository: Send + Sync {
    async fn insert_plant(&self, plant: &OwnedPlant) -> PortResult<()>;

    async fn get_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<OwnedPlant>;

    /// All plants of a user, oldest first.
    async fn list_plants(&self, owner_id: Uuid) -> PortResult<Vec<OwnedPlant>>;

    async fn update_plant(&self, plant: &OwnedPlant) -> PortResult<()>;

    async fn delete_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<()>;

    async fn count_plants(&self, owner_id: Uuid) -> PortResult<i64>;

    /// Persists the outcome of a health refresh without touching other fields.
    async fn update_health(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        status: PlantHealthStatus,
        healthy_since: Option<DateTime<Utc>>,
    ) -> PortResult<()>;
}

/// What [`FriendRepository::send_or_accept_request`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestWrite {
    /// A new PENDING request now sits in both mirrors.
    Created(FriendRequest),
    /// The same request was already pending and was left untouched.
    AlreadyPending(FriendRequest),
    /// The receiver had a pending request towards the sender, which is now
    /// accepted together with the friendship.
    AcceptedReverse,
}

/// Friend requests are mirrored: every write lands atomically in the copy of
/// both participants, and `list_requests` reads only the caller's copy.
///
/// Every transition checks the current state and writes in the same atomic
/// step. A transition out of PENDING fails with `NotFound` when the request
/// does not exist and `InvalidState` when it is no longer pending.
#[async_trait]
pub trait FriendRepository: Send + Sync {
    /// Sends a request from `from_user_id` to `to_user_id`, or accepts the
    /// reverse request when one is pending. `InvalidState` if both users are
    /// already friends.
    async fn send_or_accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<RequestWrite>;

    async fn get_request(&self, from_user_id: Uuid, to_user_id: Uuid)
        -> PortResult<Option<FriendRequest>>;

    async fn list_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>>;

    /// PENDING -> REFUSED in both mirrors.
    async fn refuse_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()>;

    /// Deletes a PENDING request from both mirrors.
    async fn cancel_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()>;

    /// PENDING -> ACCEPTED in both mirrors, and the friendship in both
    /// directions, as one atomic write.
    async fn accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<Uuid>>;

    async fn are_friends(&self, user_id: Uuid, other_id: Uuid) -> PortResult<bool>;

    /// Removes the friendship in both directions atomically.
    async fn remove_friendship(&self, user_id: Uuid, other_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Stored counter, 0 when nothing was recorded yet.
    async fn get_value(&self, user_id: Uuid, achievement_type: AchievementType)
        -> PortResult<i64>;

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<AchievementProgress>>;

    /// Stores `value` only if it is greater than the stored counter.
    /// Returns the previous counter when the store happened.
    async fn store_if_greater(
        &self,
        user_id: Uuid,
        achievement_type: AchievementType,
        value: i64,
    ) -> PortResult<Option<i64>>;

    /// Decrements the counter by exactly one. `InvalidState` when it is already 0.
    async fn decrement(&self, user_id: Uuid, achievement_type: AchievementType)
        -> PortResult<i64>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Inserts the activity, or overwrites the one of the same user with the same id.
    async fn upsert_activity(&self, activity: &GardenActivity) -> PortResult<()>;

    /// Activities of the given users, newest first.
    async fn list_activities(&self, user_ids: &[Uuid], limit: usize)
        -> PortResult<Vec<GardenActivity>>;
}

//=========================================================================================
// External Service Ports
//=========================================================================================

/// One species guess returned by the identification service.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentificationCandidate {
    pub latin_name: String,
    pub common_names: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

#[async_trait]
pub trait PlantIdentificationService: Send + Sync {
    /// Identifies the species in a photograph.
    async fn identify(&self, image: &[u8], mime_type: &str)
        -> PortResult<Vec<IdentificationCandidate>>;
}

#[async_trait]
pub trait PlantDescriptionService: Send + Sync {
    /// Asks a generative model for a JSON description of a species.
    async fn describe_plant(&self, latin_name: &str) -> PortResult<String>;
}

/// A push notification addressed to one device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The device token is no longer valid.
    #[error("Unregistered push token")]
    Unregistered,
    /// Quota or transient server failure; the send may be retried.
    #[error("Retryable push failure: {0}")]
    Retryable(String),
    #[error("Push failure: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait PushService: Send + Sync {
    /// Sends a message, returning the provider's message id.
    async fn send(&self, message: &PushMessage) -> Result<String, PushError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
