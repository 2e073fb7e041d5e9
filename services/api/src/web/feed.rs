//! services/api/src/web/feed.rs
//!
//! The REST side of the activity feed.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use garden_core::domain::{ActivityKind, GardenActivity};
use garden_core::services::DEFAULT_FEED_LIMIT;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::{rest::port_error, state::AppState};

pub const MAX_FEED_LIMIT: usize = 200;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    /// Maximum number of activities, newest first.
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ActivityResponse {
    pub id: String,
    pub user_id: Uuid,
    pub pseudo: String,
    pub created_at: DateTime<Utc>,
    /// Tagged by `type`: ADDED_PLANT, ADD_FRIEND, ACHIEVEMENT or WATER_PLANT.
    #[schema(value_type = Object)]
    pub kind: ActivityKind,
}

impl From<GardenActivity> for ActivityResponse {
    fn from(a: GardenActivity) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            pseudo: a.pseudo,
            created_at: a.created_at,
            kind: a.kind,
        }
    }
}

/// GET /feed - Activities of the caller and their friends
#[utoipa::path(
    get,
    path = "/feed",
    params(FeedQuery),
    responses(
        (status = 200, description = "Newest first", body = Vec<ActivityResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn feed_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
    let activities = state
        .feed
        .feed_for(user_id, limit)
        .await
        .map_err(port_error)?;
    let response: Vec<ActivityResponse> = activities.into_iter().map(Into::into).collect();
    Ok(Json(response))
}
