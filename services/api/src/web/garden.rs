//! services/api/src/web/garden.rs
//!
//! Garden endpoints: identifying a photographed plant, managing the plants of
//! the caller's garden and logging waterings.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use garden_core::domain::{OwnedPlant, Plant, PlantHealthStatus, PlantLocation};
use garden_core::services::PlantEdit;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{rest::port_error, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PlantRequest {
    pub name: String,
    #[serde(default)]
    pub latin_name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub watering_frequency: i32,
    #[serde(default)]
    pub light_exposure: String,
    /// INDOOR (default) or OUTDOOR.
    pub location: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EditPlantRequest {
    pub name: String,
    #[serde(default)]
    pub latin_name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub watering_frequency: i32,
    #[serde(default)]
    pub light_exposure: String,
    pub location: Option<String>,
    /// Corrects the date of the last watering.
    pub last_watered: Option<DateTime<Utc>>,
}

/// Species information, as returned by identification.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct PlantResponse {
    pub name: String,
    pub latin_name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub watering_frequency: i32,
    pub light_exposure: String,
    pub location: String,
    pub health_status: String,
}

impl From<Plant> for PlantResponse {
    fn from(p: Plant) -> Self {
        Self {
            name: p.name,
            latin_name: p.latin_name,
            description: p.description,
            image_url: p.image_url,
            watering_frequency: p.watering_frequency,
            light_exposure: p.light_exposure,
            location: p.location.as_str().to_string(),
            health_status: p.health_status.to_string(),
        }
    }
}

/// A plant of the caller's garden.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct OwnedPlantResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plant: PlantResponse,
    pub last_watered: DateTime<Utc>,
    pub previous_last_watered: Option<DateTime<Utc>>,
    pub healthy_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<OwnedPlant> for OwnedPlantResponse {
    fn from(o: OwnedPlant) -> Self {
        Self {
            id: o.id,
            owner_id: o.owner_id,
            plant: o.plant.into(),
            last_watered: o.last_watered,
            previous_last_watered: o.previous_last_watered,
            healthy_since: o.healthy_since,
            created_at: o.created_at,
        }
    }
}

fn parse_location(raw: Option<&str>) -> Result<PlantLocation, (StatusCode, String)> {
    match raw {
        None => Ok(PlantLocation::default()),
        Some(raw) => raw
            .trim()
            .to_uppercase()
            .parse()
            .map_err(|e: String| (StatusCode::BAD_REQUEST, e)),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /plants/identify - Identify the plant on a photograph
///
/// Expects a `multipart/form-data` body with an `image` file field.
#[utoipa::path(
    post,
    path = "/plants/identify",
    responses(
        (status = 200, description = "Best guess, or the unknown plant", body = PlantResponse),
        (status = 400, description = "Missing or empty image")
    )
)]
pub async fn identify_plant_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Find the image field
    let mut image: Option<(Bytes, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let mime_type = field.content_type().unwrap_or("image/jpeg").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        image = Some((data, mime_type));
    }
    let (data, mime_type) = image.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing 'image' field".to_string(),
    ))?;

    // 2. Identify and describe
    let plant = state
        .identifier
        .identify_plant(&data, &mime_type)
        .await
        .map_err(port_error)?;
    info!("Identified plant as '{}'", plant.name);

    Ok(Json(PlantResponse::from(plant)))
}

/// GET /garden - List the caller's plants
#[utoipa::path(
    get,
    path = "/garden",
    responses(
        (status = 200, description = "Plants of the garden", body = Vec<OwnedPlantResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_garden_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plants = state
        .garden
        .list_garden(user_id)
        .await
        .map_err(port_error)?;
    let response: Vec<OwnedPlantResponse> = plants.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// POST /garden - Add a plant, considered watered now
#[utoipa::path(
    post,
    path = "/garden",
    request_body = PlantRequest,
    responses(
        (status = 201, description = "Plant added", body = OwnedPlantResponse),
        (status = 400, description = "Invalid plant")
    )
)]
pub async fn add_plant_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PlantRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plant = Plant {
        name: req.name,
        latin_name: req.latin_name,
        description: req.description,
        image_url: req.image_url,
        watering_frequency: req.watering_frequency,
        light_exposure: req.light_exposure,
        location: parse_location(req.location.as_deref())?,
        health_status: PlantHealthStatus::Unknown,
    };
    let owned = state
        .garden
        .add_plant(user_id, plant)
        .await
        .map_err(port_error)?;
    Ok((StatusCode::CREATED, Json(OwnedPlantResponse::from(owned))))
}

/// GET /garden/{plant_id} - One plant of the caller's garden
#[utoipa::path(
    get,
    path = "/garden/{plant_id}",
    params(("plant_id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Plant", body = OwnedPlantResponse),
        (status = 404, description = "Plant not found")
    )
)]
pub async fn get_plant_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(plant_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let owned = state
        .garden
        .get_plant(user_id, plant_id)
        .await
        .map_err(port_error)?;
    Ok(Json(OwnedPlantResponse::from(owned)))
}

/// PUT /garden/{plant_id} - Edit a plant
#[utoipa::path(
    put,
    path = "/garden/{plant_id}",
    params(("plant_id" = Uuid, Path, description = "Plant ID")),
    request_body = EditPlantRequest,
    responses(
        (status = 200, description = "Plant updated", body = OwnedPlantResponse),
        (status = 400, description = "Invalid plant"),
        (status = 404, description = "Plant not found")
    )
)]
pub async fn edit_plant_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(plant_id): Path<Uuid>,
    Json(req): Json<EditPlantRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let edit = PlantEdit {
        location: parse_location(req.location.as_deref())?,
        name: req.name,
        latin_name: req.latin_name,
        description: req.description,
        image_url: req.image_url,
        watering_frequency: req.watering_frequency,
        light_exposure: req.light_exposure,
        last_watered: req.last_watered,
    };
    let owned = state
        .garden
        .edit_plant(user_id, plant_id, edit)
        .await
        .map_err(port_error)?;
    Ok(Json(OwnedPlantResponse::from(owned)))
}

/// DELETE /garden/{plant_id} - Remove a plant
#[utoipa::path(
    delete,
    path = "/garden/{plant_id}",
    params(("plant_id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 204, description = "Plant removed"),
        (status = 404, description = "Plant not found")
    )
)]
pub async fn delete_plant_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(plant_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .garden
        .delete_plant(user_id, plant_id)
        .await
        .map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /garden/{plant_id}/water - Log a watering now
#[utoipa::path(
    post,
    path = "/garden/{plant_id}/water",
    params(("plant_id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Watering logged", body = OwnedPlantResponse),
        (status = 404, description = "Plant not found")
    )
)]
pub async fn water_plant_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(plant_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let owned = state
        .garden
        .water_plant(user_id, plant_id)
        .await
        .map_err(port_error)?;
    Ok(Json(OwnedPlantResponse::from(owned)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_default_to_indoor_and_ignore_case() {
        assert_eq!(parse_location(None).unwrap(), PlantLocation::Indoor);
        assert_eq!(parse_location(Some("outdoor")).unwrap(), PlantLocation::Outdoor);
        assert_eq!(
            parse_location(Some("balcony")).unwrap_err().0,
            StatusCode::BAD_REQUEST
        );
    }
}
