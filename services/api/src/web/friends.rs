//! services/api/src/web/friends.rs
//!
//! Friend request and friendship endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use garden_core::domain::FriendRequest;
use garden_core::services::FriendRequestOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{profile::UserProfileResponse, rest::port_error, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Names the user to befriend, by id or by pseudo.
#[derive(Deserialize, ToSchema)]
pub struct AskFriendRequest {
    pub user_id: Option<Uuid>,
    pub pseudo: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct FriendRequestResponse {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    /// PENDING, ACCEPTED or REFUSED.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<FriendRequest> for FriendRequestResponse {
    fn from(r: FriendRequest) -> Self {
        Self {
            from_user_id: r.from_user_id,
            to_user_id: r.to_user_id,
            status: r.status.as_str().to_string(),
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AskFriendResponse {
    /// True when the other user had already asked and both are now friends.
    pub accepted: bool,
    pub request: Option<FriendRequestResponse>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /friends/requests - Pending requests sent to the caller
#[utoipa::path(
    get,
    path = "/friends/requests",
    responses(
        (status = 200, description = "Incoming requests", body = Vec<FriendRequestResponse>)
    )
)]
pub async fn incoming_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let requests = state.friends.incoming(user_id).await.map_err(port_error)?;
    let response: Vec<FriendRequestResponse> = requests.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// GET /friends/requests/outgoing - Pending requests sent by the caller
#[utoipa::path(
    get,
    path = "/friends/requests/outgoing",
    responses(
        (status = 200, description = "Outgoing requests", body = Vec<FriendRequestResponse>)
    )
)]
pub async fn outgoing_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let requests = state.friends.outgoing(user_id).await.map_err(port_error)?;
    let response: Vec<FriendRequestResponse> = requests.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// POST /friends/requests - Ask another user to be friends
#[utoipa::path(
    post,
    path = "/friends/requests",
    request_body = AskFriendRequest,
    responses(
        (status = 201, description = "Request sent", body = AskFriendResponse),
        (status = 200, description = "The other user had already asked, now friends", body = AskFriendResponse),
        (status = 400, description = "Invalid target"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Already friends")
    )
)]
pub async fn ask_friend_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AskFriendRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Resolve the target
    let target = match (req.user_id, req.pseudo) {
        (Some(id), _) => id,
        (None, Some(pseudo)) => {
            state
                .profiles
                .find_by_pseudo(&pseudo)
                .await
                .map_err(port_error)?
                .user_id
        }
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Either user_id or pseudo is required".to_string(),
            ))
        }
    };

    // 2. Ask
    let outcome = state
        .friends
        .ask_friend(user_id, target)
        .await
        .map_err(port_error)?;

    Ok(match outcome {
        FriendRequestOutcome::Pending(request) => (
            StatusCode::CREATED,
            Json(AskFriendResponse {
                accepted: false,
                request: Some(request.into()),
            }),
        ),
        FriendRequestOutcome::Accepted => (
            StatusCode::OK,
            Json(AskFriendResponse {
                accepted: true,
                request: None,
            }),
        ),
    })
}

/// POST /friends/requests/{user_id}/accept - Accept a pending request
#[utoipa::path(
    post,
    path = "/friends/requests/{user_id}/accept",
    params(("user_id" = Uuid, Path, description = "Sender of the request")),
    responses(
        (status = 204, description = "Now friends"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn accept_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(from_user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .friends
        .accept(user_id, from_user_id)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /friends/requests/{user_id}/refuse - Refuse a pending request
#[utoipa::path(
    post,
    path = "/friends/requests/{user_id}/refuse",
    params(("user_id" = Uuid, Path, description = "Sender of the request")),
    responses(
        (status = 204, description = "Request refused"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn refuse_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(from_user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .friends
        .refuse(user_id, from_user_id)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /friends/requests/{user_id} - Cancel a request the caller sent
#[utoipa::path(
    delete,
    path = "/friends/requests/{user_id}",
    params(("user_id" = Uuid, Path, description = "Recipient of the request")),
    responses(
        (status = 204, description = "Request cancelled"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn cancel_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(to_user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .friends
        .cancel(user_id, to_user_id)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /friends - The caller's friends, sorted by pseudo
#[utoipa::path(
    get,
    path = "/friends",
    responses(
        (status = 200, description = "Friends", body = Vec<UserProfileResponse>)
    )
)]
pub async fn list_friends_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let friends = state
        .friends
        .list_friends(user_id)
        .await
        .map_err(port_error)?;
    let response: Vec<UserProfileResponse> = friends.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// DELETE /friends/{friend_id} - End a friendship
#[utoipa::path(
    delete,
    path = "/friends/{friend_id}",
    params(("friend_id" = Uuid, Path, description = "Friend to remove")),
    responses(
        (status = 204, description = "Friendship ended"),
        (status = 404, description = "Not friends")
    )
)]
pub async fn remove_friend_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(friend_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .friends
        .remove_friend(user_id, friend_id)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}
