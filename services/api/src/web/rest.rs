//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification and the mapping from
//! core errors to HTTP responses shared by every REST handler.

use axum::http::StatusCode;
use garden_core::ports::PortError;
use tracing::error;
use utoipa::OpenApi;

use crate::web::{auth, feed, friends, garden, profile};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::register_fcm_token_handler,
        profile::public_profile_handler,
        profile::achievements_handler,
        garden::identify_plant_handler,
        garden::list_garden_handler,
        garden::add_plant_handler,
        garden::get_plant_handler,
        garden::edit_plant_handler,
        garden::delete_plant_handler,
        garden::water_plant_handler,
        friends::incoming_requests_handler,
        friends::outgoing_requests_handler,
        friends::ask_friend_handler,
        friends::accept_request_handler,
        friends::refuse_request_handler,
        friends::cancel_request_handler,
        friends::list_friends_handler,
        friends::remove_friend_handler,
        feed::feed_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            profile::ProfileRequest,
            profile::ProfileResponse,
            profile::UserProfileResponse,
            profile::FcmTokenRequest,
            profile::AchievementResponse,
            garden::PlantRequest,
            garden::EditPlantRequest,
            garden::PlantResponse,
            garden::OwnedPlantResponse,
            friends::AskFriendRequest,
            friends::AskFriendResponse,
            friends::FriendRequestResponse,
            feed::ActivityResponse,
        )
    ),
    tags(
        (name = "MyGarden API", description = "Garden, friends and activity feed endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Converts a core error into the `(status, message)` pair returned by handlers.
pub fn port_error(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::InvalidArgument(message) => (StatusCode::BAD_REQUEST, message),
        PortError::InvalidState(message) => (StatusCode::CONFLICT, message),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(message) => {
            error!("Unexpected error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_statuses() {
        assert_eq!(
            port_error(PortError::NotFound("plant".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            port_error(PortError::InvalidArgument("name".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            port_error(PortError::InvalidState("pending".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(port_error(PortError::Unauthorized).0, StatusCode::UNAUTHORIZED);

        let (status, message) = port_error(PortError::Unexpected("db down".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("db down"));
    }

    #[test]
    fn openapi_document_lists_the_garden_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/garden"));
        assert!(doc.paths.paths.contains_key("/garden/{plant_id}/water"));
        assert!(doc.paths.paths.contains_key("/friends/requests"));
    }
}
