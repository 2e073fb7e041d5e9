pub mod auth;
pub mod feed;
pub mod friends;
pub mod garden;
pub mod middleware;
pub mod profile;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::{AppState, Ports, ServiceSettings};
pub use ws_handler::ws_handler;

/// Photographs are uploaded whole.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the API router: public auth routes plus everything behind `require_auth`.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(profile::get_profile_handler).put(profile::update_profile_handler),
        )
        .route("/profile/fcm-token", put(profile::register_fcm_token_handler))
        .route("/users/{user_id}/profile", get(profile::public_profile_handler))
        .route("/achievements", get(profile::achievements_handler))
        .route("/plants/identify", post(garden::identify_plant_handler))
        .route(
            "/garden",
            get(garden::list_garden_handler).post(garden::add_plant_handler),
        )
        .route(
            "/garden/{plant_id}",
            get(garden::get_plant_handler)
                .put(garden::edit_plant_handler)
                .delete(garden::delete_plant_handler),
        )
        .route("/garden/{plant_id}/water", post(garden::water_plant_handler))
        .route(
            "/friends/requests",
            get(friends::incoming_requests_handler).post(friends::ask_friend_handler),
        )
        .route(
            "/friends/requests/outgoing",
            get(friends::outgoing_requests_handler),
        )
        .route(
            "/friends/requests/{user_id}/accept",
            post(friends::accept_request_handler),
        )
        .route(
            "/friends/requests/{user_id}/refuse",
            post(friends::refuse_request_handler),
        )
        .route(
            "/friends/requests/{user_id}",
            delete(friends::cancel_request_handler),
        )
        .route("/friends", get(friends::list_friends_handler))
        .route(
            "/friends/{friend_id}",
            delete(friends::remove_friend_handler),
        )
        .route("/feed", get(feed::feed_handler))
        .route("/feed/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
