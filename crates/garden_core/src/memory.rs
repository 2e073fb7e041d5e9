//! crates/garden_core/src/memory.rs
//!
//! An in-memory implementation of every repository port, used by tests and
//! local runs without a database. A single lock guards all collections so the
//! mirrored writes are atomic, like a transaction in the SQL adapter.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AchievementProgress, AchievementType, AuthSession, FriendRequest, FriendRequestStatus,
    GardenActivity, OwnedPlant, PlantHealthStatus, Profile, User, UserCredentials,
};
use crate::ports::{
    AccountRepository, AchievementRepository, ActivityRepository, Clock, FriendRepository,
    PlantRepository, PortError, PortResult, ProfileRepository, RequestWrite,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, UserCredentials>,
    sessions: HashMap<String, AuthSession>,
    profiles: BTreeMap<Uuid, Profile>,
    plants: HashMap<Uuid, BTreeMap<Uuid, OwnedPlant>>,
    // owner -> (from, to) -> request
    friend_requests: HashMap<Uuid, HashMap<(Uuid, Uuid), FriendRequest>>,
    friends: HashMap<Uuid, BTreeMap<Uuid, DateTime<Utc>>>,
    achievements: HashMap<(Uuid, AchievementType), i64>,
    // (user, activity id) -> activity
    activities: HashMap<(Uuid, String), GardenActivity>,
}

impl Inner {
    fn mirror_mut(&mut self, owner: Uuid) -> &mut HashMap<(Uuid, Uuid), FriendRequest> {
        self.friend_requests.entry(owner).or_default()
    }

    fn request(&self, from: Uuid, to: Uuid) -> Option<&FriendRequest> {
        self.friend_requests.get(&from).and_then(|mirror| mirror.get(&(from, to)))
    }

    fn require_pending(&self, from: Uuid, to: Uuid) -> PortResult<()> {
        match self.request(from, to) {
            Some(request) if request.status == FriendRequestStatus::Pending => Ok(()),
            Some(_) => Err(PortError::InvalidState(format!(
                "No pending friend request from {} to {}",
                from, to
            ))),
            None => Err(PortError::NotFound(format!(
                "Friend request from {} to {} not found",
                from, to
            ))),
        }
    }

    fn set_status(&mut self, from: Uuid, to: Uuid, status: FriendRequestStatus) {
        for owner in [from, to] {
            if let Some(request) = self.mirror_mut(owner).get_mut(&(from, to)) {
                request.status = status;
            }
        }
    }

    fn accept_pending(&mut self, from: Uuid, to: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        self.require_pending(from, to)?;
        self.set_status(from, to, FriendRequestStatus::Accepted);
        self.friends.entry(from).or_default().insert(to, at);
        self.friends.entry(to).or_default().insert(from, at);
        Ok(())
    }
}

/// Thread-safe in-memory store implementing all repository ports.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut inner = self.inner.write().await;
        if inner.accounts.contains_key(email) {
            return Err(PortError::InvalidState(format!(
                "Email {} is already registered",
                email
            )));
        }
        let user_id = Uuid::new_v4();
        inner.accounts.insert(
            email.to_string(),
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner
            .read()
            .await
            .accounts
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner.write().await.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let inner = self.inner.read().await;
        match inner.sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        inner.accounts.retain(|_, account| account.user_id != user_id);
        inner.sessions.retain(|_, session| session.user_id != user_id);
        inner.profiles.remove(&user_id);
        inner.plants.remove(&user_id);
        inner.friend_requests.remove(&user_id);
        for mirror in inner.friend_requests.values_mut() {
            mirror.retain(|(from, to), _| *from != user_id && *to != user_id);
        }
        inner.friends.remove(&user_id);
        for friends in inner.friends.values_mut() {
            friends.remove(&user_id);
        }
        inner.achievements.retain(|(owner, _), _| *owner != user_id);
        inner.activities.retain(|(owner, _), _| *owner != user_id);
        Ok(())
    }
}

//=========================================================================================
// Profiles
//=========================================================================================

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn create_profile(&self, profile: &Profile) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        if inner.profiles.contains_key(&profile.user_id) {
            return Err(PortError::InvalidState(format!(
                "Profile {} already exists",
                profile.user_id
            )));
        }
        if inner.profiles.values().any(|p| p.pseudo == profile.pseudo) {
            return Err(PortError::InvalidState(format!(
                "Pseudo '{}' is already taken",
                profile.pseudo
            )));
        }
        inner.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.inner
            .read()
            .await
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn update_profile(&self, profile: &Profile) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .profiles
            .get_mut(&profile.user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", profile.user_id)))?;
        *stored = profile.clone();
        Ok(())
    }

    async fn find_by_pseudo(&self, pseudo: &str) -> PortResult<Option<Profile>> {
        Ok(self
            .inner
            .read()
            .await
            .profiles
            .values()
            .find(|p| p.pseudo == pseudo)
            .cloned())
    }

    async fn set_fcm_token(&self, user_id: Uuid, token: Option<&str>) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        profile.fcm_token = token.map(str::to_string);
        Ok(())
    }

    async fn list_user_ids(&self) -> PortResult<Vec<Uuid>> {
        Ok(self.inner.read().await.profiles.keys().copied().collect())
    }
}

//=========================================================================================
// Plants
//=========================================================================================

fn plant_not_found(plant_id: Uuid) -> PortError {
    PortError::NotFound(format!("Plant {} not found", plant_id))
}

#[async_trait]
impl PlantRepository for InMemoryStore {
    async fn insert_plant(&self, plant: &OwnedPlant) -> PortResult<()> {
        self.inner
            .write()
            .await
            .plants
            .entry(plant.owner_id)
            .or_default()
            .insert(plant.id, plant.clone());
        Ok(())
    }

    async fn get_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<OwnedPlant> {
        self.inner
            .read()
            .await
            .plants
            .get(&owner_id)
            .and_then(|garden| garden.get(&plant_id))
            .cloned()
            .ok_or_else(|| plant_not_found(plant_id))
    }

    async fn list_plants(&self, owner_id: Uuid) -> PortResult<Vec<OwnedPlant>> {
        let inner = self.inner.read().await;
        let mut plants: Vec<OwnedPlant> = inner
            .plants
            .get(&owner_id)
            .map(|garden| garden.values().cloned().collect())
            .unwrap_or_default();
        plants.sort_by_key(|p| p.created_at);
        Ok(plants)
    }

    async fn update_plant(&self, plant: &OwnedPlant) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .plants
            .get_mut(&plant.owner_id)
            .and_then(|garden| garden.get_mut(&plant.id))
            .ok_or_else(|| plant_not_found(plant.id))?;
        *stored = plant.clone();
        Ok(())
    }

    async fn delete_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<()> {
        self.inner
            .write()
            .await
            .plants
            .get_mut(&owner_id)
            .and_then(|garden| garden.remove(&plant_id))
            .map(|_| ())
            .ok_or_else(|| plant_not_found(plant_id))
    }

    async fn count_plants(&self, owner_id: Uuid) -> PortResult<i64> {
        Ok(self
            .inner
            .read()
            .await
            .plants
            .get(&owner_id)
            .map_or(0, |garden| garden.len() as i64))
    }

    async fn update_health(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        status: PlantHealthStatus,
        healthy_since: Option<DateTime<Utc>>,
    ) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .plants
            .get_mut(&owner_id)
            .and_then(|garden| garden.get_mut(&plant_id))
            .ok_or_else(|| plant_not_found(plant_id))?;
        stored.plant.health_status = status;
        stored.healthy_since = healthy_since;
        Ok(())
    }
}

//=========================================================================================
// Friends
//=========================================================================================

#[async_trait]
impl FriendRepository for InMemoryStore {
    async fn send_or_accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<RequestWrite> {
        let mut inner = self.inner.write().await;
        if inner
            .friends
            .get(&from_user_id)
            .is_some_and(|friends| friends.contains_key(&to_user_id))
        {
            return Err(PortError::InvalidState("Already friends".to_string()));
        }
        if inner.require_pending(to_user_id, from_user_id).is_ok() {
            inner.accept_pending(to_user_id, from_user_id, at)?;
            return Ok(RequestWrite::AcceptedReverse);
        }
        if let Some(existing) = inner.request(from_user_id, to_user_id) {
            if existing.status == FriendRequestStatus::Pending {
                return Ok(RequestWrite::AlreadyPending(existing.clone()));
            }
        }
        let request = FriendRequest::pending(from_user_id, to_user_id, at);
        let key = (from_user_id, to_user_id);
        inner.mirror_mut(from_user_id).insert(key, request.clone());
        inner.mirror_mut(to_user_id).insert(key, request.clone());
        Ok(RequestWrite::Created(request))
    }

    async fn get_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> PortResult<Option<FriendRequest>> {
        Ok(self
            .inner
            .read()
            .await
            .request(from_user_id, to_user_id)
            .cloned())
    }

    async fn list_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>> {
        let inner = self.inner.read().await;
        let mut requests: Vec<FriendRequest> = inner
            .friend_requests
            .get(&user_id)
            .map(|mirror| mirror.values().cloned().collect())
            .unwrap_or_default();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn refuse_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_pending(from_user_id, to_user_id)?;
        inner.set_status(from_user_id, to_user_id, FriendRequestStatus::Refused);
        Ok(())
    }

    async fn cancel_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_pending(from_user_id, to_user_id)?;
        let key = (from_user_id, to_user_id);
        inner.mirror_mut(from_user_id).remove(&key);
        inner.mirror_mut(to_user_id).remove(&key);
        Ok(())
    }

    async fn accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .write()
            .await
            .accept_pending(from_user_id, to_user_id, at)
    }

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .await
            .friends
            .get(&user_id)
            .map(|friends| friends.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn are_friends(&self, user_id: Uuid, other_id: Uuid) -> PortResult<bool> {
        Ok(self
            .inner
            .read()
            .await
            .friends
            .get(&user_id)
            .is_some_and(|friends| friends.contains_key(&other_id)))
    }

    async fn remove_friendship(&self, user_id: Uuid, other_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(friends) = inner.friends.get_mut(&user_id) {
            friends.remove(&other_id);
        }
        if let Some(friends) = inner.friends.get_mut(&other_id) {
            friends.remove(&user_id);
        }
        Ok(())
    }
}

//=========================================================================================
// Achievements
//=========================================================================================

#[async_trait]
impl AchievementRepository for InMemoryStore {
    async fn get_value(&self, user_id: Uuid, achievement_type: AchievementType) -> PortResult<i64> {
        Ok(self
            .inner
            .read()
            .await
            .achievements
            .get(&(user_id, achievement_type))
            .copied()
            .unwrap_or(0))
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<AchievementProgress>> {
        let inner = self.inner.read().await;
        Ok(AchievementType::ALL
            .iter()
            .filter_map(|kind| {
                inner
                    .achievements
                    .get(&(user_id, *kind))
                    .map(|value| AchievementProgress {
                        user_id,
                        achievement_type: *kind,
                        value: *value,
                    })
            })
            .collect())
    }

    async fn store_if_greater(
        &self,
        user_id: Uuid,
        achievement_type: AchievementType,
        value: i64,
    ) -> PortResult<Option<i64>> {
        let mut inner = self.inner.write().await;
        let stored = inner.achievements.entry((user_id, achievement_type)).or_insert(0);
        if value > *stored {
            let previous = *stored;
            *stored = value;
            Ok(Some(previous))
        } else {
            Ok(None)
        }
    }

    async fn decrement(&self, user_id: Uuid, achievement_type: AchievementType) -> PortResult<i64> {
        let mut inner = self.inner.write().await;
        match inner.achievements.get_mut(&(user_id, achievement_type)) {
            Some(value) if *value > 0 => {
                *value -= 1;
                Ok(*value)
            }
            _ => Err(PortError::InvalidState(format!(
                "{} counter of {} is already 0",
                achievement_type, user_id
            ))),
        }
    }
}

//=========================================================================================
// Activities
//=========================================================================================

#[async_trait]
impl ActivityRepository for InMemoryStore {
    async fn upsert_activity(&self, activity: &GardenActivity) -> PortResult<()> {
        self.inner
            .write()
            .await
            .activities
            .insert((activity.user_id, activity.id.clone()), activity.clone());
        Ok(())
    }

    async fn list_activities(
        &self,
        user_ids: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<GardenActivity>> {
        let inner = self.inner.read().await;
        let mut activities: Vec<GardenActivity> = inner
            .activities
            .values()
            .filter(|a| user_ids.contains(&a.user_id))
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        activities.truncate(limit);
        Ok(activities)
    }
}

//=========================================================================================
// Test clock
//=========================================================================================

/// A clock frozen at a settable instant (millisecond precision).
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}
