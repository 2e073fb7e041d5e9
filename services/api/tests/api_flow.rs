//! services/api/tests/api_flow.rs
//!
//! Drives the whole router against the in-memory store.

mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use common::{test_app, test_app_with};
use garden_core::ports::{PortResult, ProfileRepository};
use garden_core::{InMemoryStore, Profile};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// Fakes
//=========================================================================================

/// Never finds a pseudo, as if another signup took it right after the check.
struct LatePseudoCheck {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl ProfileRepository for LatePseudoCheck {
    async fn create_profile(&self, profile: &Profile) -> PortResult<()> {
        self.store.create_profile(profile).await
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.store.get_profile(user_id).await
    }

    async fn update_profile(&self, profile: &Profile) -> PortResult<()> {
        self.store.update_profile(profile).await
    }

    async fn find_by_pseudo(&self, _pseudo: &str) -> PortResult<Option<Profile>> {
        Ok(None)
    }

    async fn set_fcm_token(&self, user_id: Uuid, token: Option<&str>) -> PortResult<()> {
        self.store.set_fcm_token(user_id, token).await
    }

    async fn list_user_ids(&self) -> PortResult<Vec<Uuid>> {
        self.store.list_user_ids().await
    }
}

fn feed_types(feed: &Value) -> Vec<String> {
    feed.as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"]["type"].as_str().unwrap().to_string())
        .collect()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = test_app();

    let reply = app.call("GET", "/garden", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .call("GET", "/garden", Some("session=not-a-session"), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_creates_a_profile_and_rejects_duplicates() {
    let app = test_app();
    let (user_id, cookie) = app.signup("Ada").await;

    let profile = app.call("GET", "/profile", Some(&cookie), None).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["user_id"], user_id.as_str());
    assert_eq!(profile.body["pseudo"], "Ada");

    let same_email = app
        .call(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": "ada@example.com", "password": "another password", "pseudo": "Ada2" })),
        )
        .await;
    assert_eq!(same_email.status, StatusCode::CONFLICT);

    let same_pseudo = app
        .call(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": "other@example.com", "password": "another password", "pseudo": "Ada" })),
        )
        .await;
    assert_eq!(same_pseudo.status, StatusCode::CONFLICT);

    let short_password = app
        .call(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": "bo@example.com", "password": "short", "pseudo": "Bo" })),
        )
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_profile_creation_removes_the_account() {
    let store = Arc::new(InMemoryStore::new());
    let app = test_app_with(
        store.clone(),
        Arc::new(LatePseudoCheck {
            store: store.clone(),
        }),
    );
    app.signup("Ada").await;

    let late = app
        .call(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": "late@example.com", "password": "another password", "pseudo": "Ada" })),
        )
        .await;
    assert_eq!(late.status, StatusCode::CONFLICT);

    let login = app
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "late@example.com", "password": "another password" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);

    let retry = app
        .call(
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "email": "late@example.com", "password": "another password", "pseudo": "Grace" })),
        )
        .await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn login_and_logout_manage_the_session() {
    let app = test_app();
    app.signup("Ada").await;

    let wrong = app
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = app
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "correct horse battery" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let cookie = login.cookie.unwrap();

    let logout = app.call("POST", "/auth/logout", Some(&cookie), None).await;
    assert_eq!(logout.status, StatusCode::OK);

    let after = app.call("GET", "/profile", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garden_flow_updates_achievements_and_feed() {
    let app = test_app();
    let (_, cookie) = app.signup("Ada").await;

    // 1. Add a plant
    let added = app
        .call(
            "POST",
            "/garden",
            Some(&cookie),
            Some(json!({ "name": "Fern", "latin_name": "Nephrolepis exaltata", "watering_frequency": 7 })),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["plant"]["health_status"], "HEALTHY");
    assert_eq!(added.body["plant"]["location"], "INDOOR");
    let plant_id = added.body["id"].as_str().unwrap().to_string();

    let garden = app.call("GET", "/garden", Some(&cookie), None).await;
    assert_eq!(garden.body.as_array().unwrap().len(), 1);
    assert_eq!(garden.body[0]["plant"]["latin_name"], "Nephrolepis exaltata");

    // 2. Water it a week later
    app.clock.advance(Duration::days(7));
    let watered = app
        .call("POST", &format!("/garden/{}/water", plant_id), Some(&cookie), None)
        .await;
    assert_eq!(watered.status, StatusCode::OK);
    assert!(watered.body["previous_last_watered"].is_string());

    // 3. Achievements and feed reflect both actions
    let achievements = app.call("GET", "/achievements", Some(&cookie), None).await;
    let plants = achievements
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["achievement_type"] == "PLANTS_NUMBER")
        .unwrap()
        .clone();
    assert_eq!(plants["value"], 1);
    assert_eq!(plants["level"], 2);

    let feed = app.call("GET", "/feed", Some(&cookie), None).await;
    let types = feed_types(&feed.body);
    assert!(types.contains(&"ADDED_PLANT".to_string()));
    assert!(types.contains(&"WATER_PLANT".to_string()));
    assert!(types.contains(&"ACHIEVEMENT".to_string()));

    // 4. Invalid plants and unknown ids
    let invalid = app
        .call(
            "POST",
            "/garden",
            Some(&cookie),
            Some(json!({ "name": "Fern", "watering_frequency": 0 })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let deleted = app
        .call("DELETE", &format!("/garden/{}", plant_id), Some(&cookie), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let missing = app
        .call("GET", &format!("/garden/{}", plant_id), Some(&cookie), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn friends_see_each_others_activities() {
    let app = test_app();
    let (ada_id, ada) = app.signup("Ada").await;
    let (bob_id, bob) = app.signup("Bob").await;

    // 1. Ada asks Bob by pseudo
    let asked = app
        .call("POST", "/friends/requests", Some(&ada), Some(json!({ "pseudo": "Bob" })))
        .await;
    assert_eq!(asked.status, StatusCode::CREATED);
    assert_eq!(asked.body["request"]["status"], "PENDING");

    let outgoing = app
        .call("GET", "/friends/requests/outgoing", Some(&ada), None)
        .await;
    assert_eq!(outgoing.body.as_array().unwrap().len(), 1);

    let incoming = app.call("GET", "/friends/requests", Some(&bob), None).await;
    assert_eq!(incoming.body[0]["from_user_id"], ada_id.as_str());

    // 2. Bob accepts
    let accepted = app
        .call(
            "POST",
            &format!("/friends/requests/{}/accept", ada_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(accepted.status, StatusCode::NO_CONTENT);

    let friends = app.call("GET", "/friends", Some(&ada), None).await;
    assert_eq!(friends.body[0]["user_id"], bob_id.as_str());
    assert_eq!(friends.body[0]["pseudo"], "Bob");

    // 3. Accepting twice is a conflict
    let again = app
        .call(
            "POST",
            &format!("/friends/requests/{}/accept", ada_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    // 4. Ada's garden shows up in Bob's feed
    app.call(
        "POST",
        "/garden",
        Some(&ada),
        Some(json!({ "name": "Ficus", "watering_frequency": 10 })),
    )
    .await;
    let feed = app.call("GET", "/feed", Some(&bob), None).await;
    assert!(feed
        .body
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a["pseudo"] == "Ada" && a["kind"]["type"] == "ADDED_PLANT"));

    // 5. Ending the friendship
    let removed = app
        .call("DELETE", &format!("/friends/{}", ada_id), Some(&bob), None)
        .await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let friends = app.call("GET", "/friends", Some(&ada), None).await;
    assert!(friends.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn photographs_are_identified() {
    let app = test_app();
    let (_, cookie) = app.signup("Ada").await;

    let boundary = "garden-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"leaf.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\nfake-jpeg-bytes\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/plants/identify")
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["name"], "Monstera");
    assert_eq!(reply.body["latin_name"], "Monstera deliciosa");
    assert_eq!(reply.body["watering_frequency"], 7);
}
