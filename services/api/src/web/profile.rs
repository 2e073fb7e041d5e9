//! services/api/src/web/profile.rs
//!
//! Profile and achievement endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use garden_core::domain::{Profile, UserProfile};
use garden_core::services::{AchievementStatus, ProfileDraft};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{rest::port_error, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub pseudo: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub garden_name: String,
    pub avatar: Option<String>,
}

/// The caller's own profile.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub pseudo: String,
    pub first_name: String,
    pub last_name: String,
    pub garden_name: String,
    pub avatar: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            pseudo: p.pseudo,
            first_name: p.first_name,
            last_name: p.last_name,
            garden_name: p.garden_name,
            avatar: p.avatar,
        }
    }
}

/// What other gardeners see of a user.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserProfileResponse {
    pub user_id: Uuid,
    pub pseudo: String,
    pub avatar: Option<String>,
}

impl From<UserProfile> for UserProfileResponse {
    fn from(p: UserProfile) -> Self {
        Self {
            user_id: p.user_id,
            pseudo: p.pseudo,
            avatar: p.avatar,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct FcmTokenRequest {
    pub token: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AchievementResponse {
    /// PLANTS_NUMBER, FRIENDS_NUMBER or HEALTHY_STREAK.
    pub achievement_type: String,
    pub value: i64,
    pub level: u32,
    pub next_threshold: Option<i64>,
}

impl From<AchievementStatus> for AchievementResponse {
    fn from(s: AchievementStatus) -> Self {
        Self {
            achievement_type: s.achievement_type.to_string(),
            value: s.value,
            level: s.level,
            next_threshold: s.next_threshold,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /profile - The caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(port_error)?;
    Ok(Json(ProfileResponse::from(profile)))
}

/// PUT /profile - Edit the caller's profile
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid pseudo"),
        (status = 409, description = "Pseudo already taken")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = ProfileDraft {
        first_name: req.first_name,
        last_name: req.last_name,
        pseudo: req.pseudo,
        garden_name: req.garden_name,
        avatar: req.avatar,
    };
    let profile = state
        .profiles
        .update_profile(user_id, draft)
        .await
        .map_err(port_error)?;
    Ok(Json(ProfileResponse::from(profile)))
}

/// PUT /profile/fcm-token - Register the device push token
#[utoipa::path(
    put,
    path = "/profile/fcm-token",
    request_body = FcmTokenRequest,
    responses(
        (status = 204, description = "Token stored"),
        (status = 400, description = "Empty token")
    )
)]
pub async fn register_fcm_token_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<FcmTokenRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .profiles
        .register_fcm_token(user_id, &req.token)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{user_id}/profile - Another user's public profile
#[utoipa::path(
    get,
    path = "/users/{user_id}/profile",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Public profile", body = UserProfileResponse),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn public_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .profiles
        .public_profile(user_id)
        .await
        .map_err(port_error)?;
    Ok(Json(UserProfileResponse::from(profile)))
}

/// GET /achievements - The caller's achievement progress
#[utoipa::path(
    get,
    path = "/achievements",
    responses(
        (status = 200, description = "Every achievement with its level", body = Vec<AchievementResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summary = state
        .achievements
        .summary(user_id)
        .await
        .map_err(port_error)?;
    let response: Vec<AchievementResponse> = summary.into_iter().map(Into::into).collect();
    Ok(Json(response))
}
