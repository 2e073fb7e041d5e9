//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! repository ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`. Mirrored writes run in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garden_core::domain::{
    AchievementProgress, AchievementType, ActivityKind, FriendRequest, FriendRequestStatus,
    GardenActivity, OwnedPlant, Plant, PlantHealthStatus, PlantLocation, Profile, User,
    UserCredentials,
};
use garden_core::ports::{
    AccountRepository, AchievementRepository, ActivityRepository, FriendRepository,
    PlantRepository, PortError, PortResult, ProfileRepository, RequestWrite,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    pseudo: String,
    garden_name: String,
    avatar: Option<String>,
    fcm_token: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            pseudo: self.pseudo,
            garden_name: self.garden_name,
            avatar: self.avatar,
            fcm_token: self.fcm_token,
        }
    }
}

#[derive(FromRow)]
struct PlantRecord {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    latin_name: String,
    description: String,
    image_url: Option<String>,
    watering_frequency: i32,
    light_exposure: String,
    location: String,
    health_status: String,
    last_watered: DateTime<Utc>,
    previous_last_watered: Option<DateTime<Utc>>,
    healthy_since: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl PlantRecord {
    fn to_domain(self) -> OwnedPlant {
        let location = self.location.parse::<PlantLocation>().unwrap_or_else(|e| {
            warn!("Plant {}: {}", self.id, e);
            PlantLocation::default()
        });
        OwnedPlant {
            id: self.id,
            owner_id: self.owner_id,
            plant: Plant {
                name: self.name,
                latin_name: self.latin_name,
                description: self.description,
                image_url: self.image_url,
                watering_frequency: self.watering_frequency,
                light_exposure: self.light_exposure,
                location,
                health_status: PlantHealthStatus::parse_lossy(&self.health_status),
            },
            last_watered: self.last_watered,
            previous_last_watered: self.previous_last_watered,
            healthy_since: self.healthy_since,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct FriendRequestRecord {
    from_user_id: Uuid,
    to_user_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}
impl FriendRequestRecord {
    fn to_domain(self) -> PortResult<FriendRequest> {
        Ok(FriendRequest {
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AchievementRecord {
    user_id: Uuid,
    achievement_type: String,
    value: i64,
}
impl AchievementRecord {
    fn to_domain(self) -> PortResult<AchievementProgress> {
        Ok(AchievementProgress {
            user_id: self.user_id,
            achievement_type: self.achievement_type.parse().map_err(PortError::Unexpected)?,
            value: self.value,
        })
    }
}

#[derive(FromRow)]
struct ActivityRecord {
    id: String,
    user_id: Uuid,
    pseudo: String,
    created_at: DateTime<Utc>,
    kind: Json<ActivityKind>,
}
impl ActivityRecord {
    fn to_domain(self) -> GardenActivity {
        GardenActivity {
            id: self.id,
            user_id: self.user_id,
            pseudo: self.pseudo,
            created_at: self.created_at,
            kind: self.kind.0,
        }
    }
}

const PLANT_COLUMNS: &str = "id, owner_id, name, latin_name, description, image_url, \
     watering_frequency, light_exposure, location, health_status, last_watered, \
     previous_last_watered, healthy_since, created_at";

const PROFILE_COLUMNS: &str =
    "user_id, first_name, last_name, pseudo, garden_name, avatar, fcm_token";

//=========================================================================================
// Accounts
//=========================================================================================

#[async_trait]
impl AccountRepository for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(email)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::InvalidState(format!("Email {} is already registered", email))
                } else {
                    unexpected(e)
                }
            })?;
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        // Every table references users with ON DELETE CASCADE.
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// Profiles
//=========================================================================================

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn create_profile(&self, profile: &Profile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, first_name, last_name, pseudo, garden_name, avatar, fcm_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.pseudo)
        .bind(&profile.garden_name)
        .bind(&profile.avatar)
        .bind(&profile.fcm_token)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::InvalidState(format!("Pseudo '{}' is already taken", profile.pseudo))
            } else {
                unexpected(e)
            }
        })?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Profile {} not found", user_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, profile: &Profile) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET first_name = $2, last_name = $3, pseudo = $4, garden_name = $5, avatar = $6 \
             WHERE user_id = $1",
        )
        .bind(profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.pseudo)
        .bind(&profile.garden_name)
        .bind(&profile.avatar)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::InvalidState(format!("Pseudo '{}' is already taken", profile.pseudo))
            } else {
                unexpected(e)
            }
        })?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Profile {} not found",
                profile.user_id
            )));
        }
        Ok(())
    }

    async fn find_by_pseudo(&self, pseudo: &str) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE pseudo = $1",
            PROFILE_COLUMNS
        ))
        .bind(pseudo)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn set_fcm_token(&self, user_id: Uuid, token: Option<&str>) -> PortResult<()> {
        let result = sqlx::query("UPDATE profiles SET fcm_token = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", user_id)));
        }
        Ok(())
    }

    async fn list_user_ids(&self) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM profiles ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)
    }
}

//=========================================================================================
// Plants
//=========================================================================================

fn plant_not_found(plant_id: Uuid) -> PortError {
    PortError::NotFound(format!("Plant {} not found", plant_id))
}

#[async_trait]
impl PlantRepository for DbAdapter {
    async fn insert_plant(&self, owned: &OwnedPlant) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO plants ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            PLANT_COLUMNS
        ))
        .bind(owned.id)
        .bind(owned.owner_id)
        .bind(&owned.plant.name)
        .bind(&owned.plant.latin_name)
        .bind(&owned.plant.description)
        .bind(&owned.plant.image_url)
        .bind(owned.plant.watering_frequency)
        .bind(&owned.plant.light_exposure)
        .bind(owned.plant.location.as_str())
        .bind(owned.plant.health_status.as_str())
        .bind(owned.last_watered)
        .bind(owned.previous_last_watered)
        .bind(owned.healthy_since)
        .bind(owned.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<OwnedPlant> {
        let record = sqlx::query_as::<_, PlantRecord>(&format!(
            "SELECT {} FROM plants WHERE owner_id = $1 AND id = $2",
            PLANT_COLUMNS
        ))
        .bind(owner_id)
        .bind(plant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => plant_not_found(plant_id),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_plants(&self, owner_id: Uuid) -> PortResult<Vec<OwnedPlant>> {
        let records = sqlx::query_as::<_, PlantRecord>(&format!(
            "SELECT {} FROM plants WHERE owner_id = $1 ORDER BY created_at ASC",
            PLANT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_plant(&self, owned: &OwnedPlant) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE plants SET name = $3, latin_name = $4, description = $5, image_url = $6, \
             watering_frequency = $7, light_exposure = $8, location = $9, health_status = $10, \
             last_watered = $11, previous_last_watered = $12, healthy_since = $13 \
             WHERE owner_id = $1 AND id = $2",
        )
        .bind(owned.owner_id)
        .bind(owned.id)
        .bind(&owned.plant.name)
        .bind(&owned.plant.latin_name)
        .bind(&owned.plant.description)
        .bind(&owned.plant.image_url)
        .bind(owned.plant.watering_frequency)
        .bind(&owned.plant.light_exposure)
        .bind(owned.plant.location.as_str())
        .bind(owned.plant.health_status.as_str())
        .bind(owned.last_watered)
        .bind(owned.previous_last_watered)
        .bind(owned.healthy_since)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(plant_not_found(owned.id));
        }
        Ok(())
    }

    async fn delete_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM plants WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(plant_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(plant_not_found(plant_id));
        }
        Ok(())
    }

    async fn count_plants(&self, owner_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plants WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn update_health(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        status: PlantHealthStatus,
        healthy_since: Option<DateTime<Utc>>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE plants SET health_status = $3, healthy_since = $4 WHERE owner_id = $1 AND id = $2",
        )
        .bind(owner_id)
        .bind(plant_id)
        .bind(status.as_str())
        .bind(healthy_since)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(plant_not_found(plant_id));
        }
        Ok(())
    }
}

//=========================================================================================
// Friends
//=========================================================================================

fn request_not_found(from_user_id: Uuid, to_user_id: Uuid) -> PortError {
    PortError::NotFound(format!(
        "Friend request from {} to {} not found",
        from_user_id, to_user_id
    ))
}

fn require_pending(
    request: Option<&FriendRequest>,
    from_user_id: Uuid,
    to_user_id: Uuid,
) -> PortResult<()> {
    match request {
        Some(r) if r.status == FriendRequestStatus::Pending => Ok(()),
        Some(_) => Err(PortError::InvalidState(format!(
            "No pending friend request from {} to {}",
            from_user_id, to_user_id
        ))),
        None => Err(request_not_found(from_user_id, to_user_id)),
    }
}

/// Serialises every request write between two users, in either direction,
/// until the transaction ends.
async fn lock_pair(conn: &mut PgConnection, a: Uuid, b: Uuid) -> PortResult<()> {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("{}:{}", low, high))
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    Ok(())
}

/// Reads the sender's copy of a request and locks it for the transaction.
async fn lock_request(
    conn: &mut PgConnection,
    from_user_id: Uuid,
    to_user_id: Uuid,
) -> PortResult<Option<FriendRequest>> {
    sqlx::query_as::<_, FriendRequestRecord>(
        "SELECT from_user_id, to_user_id, status, created_at FROM friend_requests \
         WHERE owner_id = $1 AND from_user_id = $1 AND to_user_id = $2 FOR UPDATE",
    )
    .bind(from_user_id)
    .bind(to_user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unexpected)?
    .map(FriendRequestRecord::to_domain)
    .transpose()
}

async fn set_status(
    conn: &mut PgConnection,
    from_user_id: Uuid,
    to_user_id: Uuid,
    status: FriendRequestStatus,
) -> PortResult<()> {
    sqlx::query(
        "UPDATE friend_requests SET status = $3 \
         WHERE from_user_id = $1 AND to_user_id = $2 AND status = $4",
    )
    .bind(from_user_id)
    .bind(to_user_id)
    .bind(status.as_str())
    .bind(FriendRequestStatus::Pending.as_str())
    .execute(&mut *conn)
    .await
    .map_err(unexpected)?;
    Ok(())
}

async fn accept_locked(
    conn: &mut PgConnection,
    from_user_id: Uuid,
    to_user_id: Uuid,
    at: DateTime<Utc>,
) -> PortResult<()> {
    set_status(conn, from_user_id, to_user_id, FriendRequestStatus::Accepted).await?;
    for (user_id, friend_id) in [(from_user_id, to_user_id), (to_user_id, from_user_id)] {
        sqlx::query(
            "INSERT INTO friendships (user_id, friend_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, friend_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(friend_id)
        .bind(at)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    }
    Ok(())
}

#[async_trait]
impl FriendRepository for DbAdapter {
    async fn send_or_accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<RequestWrite> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_pair(&mut tx, from_user_id, to_user_id).await?;

        let already_friends = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM friendships WHERE user_id = $1 AND friend_id = $2)",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        if already_friends {
            return Err(PortError::InvalidState("Already friends".to_string()));
        }

        let reverse = lock_request(&mut tx, to_user_id, from_user_id).await?;
        if require_pending(reverse.as_ref(), to_user_id, from_user_id).is_ok() {
            accept_locked(&mut tx, to_user_id, from_user_id, at).await?;
            tx.commit().await.map_err(unexpected)?;
            return Ok(RequestWrite::AcceptedReverse);
        }

        if let Some(existing) = lock_request(&mut tx, from_user_id, to_user_id).await? {
            if existing.status == FriendRequestStatus::Pending {
                return Ok(RequestWrite::AlreadyPending(existing));
            }
        }

        let request = FriendRequest::pending(from_user_id, to_user_id, at);
        for owner in [from_user_id, to_user_id] {
            sqlx::query(
                "INSERT INTO friend_requests (owner_id, from_user_id, to_user_id, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (owner_id, from_user_id, to_user_id) \
                 DO UPDATE SET status = EXCLUDED.status, created_at = EXCLUDED.created_at",
            )
            .bind(owner)
            .bind(request.from_user_id)
            .bind(request.to_user_id)
            .bind(request.status.as_str())
            .bind(request.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(RequestWrite::Created(request))
    }

    async fn get_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> PortResult<Option<FriendRequest>> {
        sqlx::query_as::<_, FriendRequestRecord>(
            "SELECT from_user_id, to_user_id, status, created_at FROM friend_requests \
             WHERE owner_id = $1 AND from_user_id = $1 AND to_user_id = $2",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(FriendRequestRecord::to_domain)
        .transpose()
    }

    async fn list_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>> {
        sqlx::query_as::<_, FriendRequestRecord>(
            "SELECT from_user_id, to_user_id, status, created_at FROM friend_requests \
             WHERE owner_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(FriendRequestRecord::to_domain)
        .collect()
    }

    async fn refuse_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_pair(&mut tx, from_user_id, to_user_id).await?;
        let request = lock_request(&mut tx, from_user_id, to_user_id).await?;
        require_pending(request.as_ref(), from_user_id, to_user_id)?;
        set_status(&mut tx, from_user_id, to_user_id, FriendRequestStatus::Refused).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn cancel_request(&self, from_user_id: Uuid, to_user_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_pair(&mut tx, from_user_id, to_user_id).await?;
        let request = lock_request(&mut tx, from_user_id, to_user_id).await?;
        require_pending(request.as_ref(), from_user_id, to_user_id)?;
        sqlx::query(
            "DELETE FROM friend_requests \
             WHERE from_user_id = $1 AND to_user_id = $2 AND status = $3",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(FriendRequestStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)
    }

    async fn accept_request(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_pair(&mut tx, from_user_id, to_user_id).await?;
        let request = lock_request(&mut tx, from_user_id, to_user_id).await?;
        require_pending(request.as_ref(), from_user_id, to_user_id)?;
        accept_locked(&mut tx, from_user_id, to_user_id, at).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT friend_id FROM friendships WHERE user_id = $1 ORDER BY friend_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn are_friends(&self, user_id: Uuid, other_id: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM friendships WHERE user_id = $1 AND friend_id = $2)",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn remove_friendship(&self, user_id: Uuid, other_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM friendships WHERE (user_id = $1 AND friend_id = $2) \
             OR (user_id = $2 AND friend_id = $1)",
        )
        .bind(user_id)
        .bind(other_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// Achievements
//=========================================================================================

#[async_trait]
impl AchievementRepository for DbAdapter {
    async fn get_value(&self, user_id: Uuid, achievement_type: AchievementType) -> PortResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM achievements WHERE user_id = $1 AND achievement_type = $2",
        )
        .bind(user_id)
        .bind(achievement_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(value.unwrap_or(0))
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<AchievementProgress>> {
        sqlx::query_as::<_, AchievementRecord>(
            "SELECT user_id, achievement_type, value FROM achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(AchievementRecord::to_domain)
        .collect()
    }

    async fn store_if_greater(
        &self,
        user_id: Uuid,
        achievement_type: AchievementType,
        value: i64,
    ) -> PortResult<Option<i64>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO achievements (user_id, achievement_type, value) VALUES ($1, $2, 0) \
             ON CONFLICT (user_id, achievement_type) DO NOTHING",
        )
        .bind(user_id)
        .bind(achievement_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let previous = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM achievements WHERE user_id = $1 AND achievement_type = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(achievement_type.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        if value <= previous {
            tx.commit().await.map_err(unexpected)?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE achievements SET value = $3 WHERE user_id = $1 AND achievement_type = $2",
        )
        .bind(user_id)
        .bind(achievement_type.as_str())
        .bind(value)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(previous))
    }

    async fn decrement(&self, user_id: Uuid, achievement_type: AchievementType) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE achievements SET value = value - 1 \
             WHERE user_id = $1 AND achievement_type = $2 AND value > 0 RETURNING value",
        )
        .bind(user_id)
        .bind(achievement_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| {
            PortError::InvalidState(format!(
                "{} counter of {} is already 0",
                achievement_type, user_id
            ))
        })
    }
}

//=========================================================================================
// Activities
//=========================================================================================

#[async_trait]
impl ActivityRepository for DbAdapter {
    async fn upsert_activity(&self, activity: &GardenActivity) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO activities (user_id, id, pseudo, created_at, kind) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, id) DO UPDATE \
             SET pseudo = EXCLUDED.pseudo, created_at = EXCLUDED.created_at, kind = EXCLUDED.kind",
        )
        .bind(activity.user_id)
        .bind(&activity.id)
        .bind(&activity.pseudo)
        .bind(activity.created_at)
        .bind(Json(&activity.kind))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_activities(
        &self,
        user_ids: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<GardenActivity>> {
        let records = sqlx::query_as::<_, ActivityRecord>(
            "SELECT id, user_id, pseudo, created_at, kind FROM activities \
             WHERE user_id = ANY($1) ORDER BY created_at DESC, id ASC LIMIT $2",
        )
        .bind(user_ids)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
