//! services/api/tests/common/mod.rs
//!
//! Shared fakes and the router harness for the integration tests.
#![allow(dead_code)]

use api_lib::web::{self, AppState, Ports, ServiceSettings};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use garden_core::ports::{
    IdentificationCandidate, PlantDescriptionService, PlantIdentificationService, PortResult,
    ProfileRepository, PushError, PushMessage, PushService,
};
use garden_core::services::RetryPolicy;
use garden_core::{FixedClock, InMemoryStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

//=========================================================================================
// Fakes
//=========================================================================================

pub struct FakeIdentification;

#[async_trait]
impl PlantIdentificationService for FakeIdentification {
    async fn identify(
        &self,
        _image: &[u8],
        _mime_type: &str,
    ) -> PortResult<Vec<IdentificationCandidate>> {
        Ok(vec![IdentificationCandidate {
            latin_name: "Monstera deliciosa".to_string(),
            common_names: vec!["Swiss cheese plant".to_string()],
            score: 0.92,
        }])
    }
}

pub struct FakeDescription;

#[async_trait]
impl PlantDescriptionService for FakeDescription {
    async fn describe_plant(&self, _latin_name: &str) -> PortResult<String> {
        Ok(r#"{"name": "Monstera", "latinName": "Monstera deliciosa",
               "description": "A climbing aroid with split leaves.",
               "wateringFrequency": 7, "lightExposure": "Bright indirect light"}"#
            .to_string())
    }
}

pub struct NoPush;

#[async_trait]
impl PushService for NoPush {
    async fn send(&self, _message: &PushMessage) -> Result<String, PushError> {
        Err(PushError::Fatal("disabled in tests".to_string()))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<FixedClock>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    test_app_with(store.clone(), store)
}

pub fn test_app_with(store: Arc<InMemoryStore>, profiles: Arc<dyn ProfileRepository>) -> TestApp {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let ports = Ports {
        accounts: store.clone(),
        profiles,
        plants: store.clone(),
        friends: store.clone(),
        achievements: store.clone(),
        activities: store,
        identification: Arc::new(FakeIdentification),
        description: Arc::new(FakeDescription),
        push: Arc::new(NoPush),
        clock: clock.clone(),
    };
    let settings = ServiceSettings {
        identification_min_score: 0.3,
        push_retry: RetryPolicy {
            max_attempts: 1,
            base_backoff: std::time::Duration::ZERO,
            max_backoff: std::time::Duration::ZERO,
        },
    };
    TestApp {
        router: web::router(Arc::new(AppState::new(ports, settings))),
        clock,
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<String>,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            body,
            cookie,
        }
    }

    pub async fn call(&self, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Signs a gardener up and returns (user id, session cookie).
    pub async fn signup(&self, pseudo: &str) -> (String, String) {
        let reply = self
            .call(
                "POST",
                "/auth/signup",
                None,
                Some(json!({
                    "email": format!("{}@example.com", pseudo.to_lowercase()),
                    "password": "correct horse battery",
                    "pseudo": pseudo,
                    "garden_name": format!("{}'s garden", pseudo),
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        let user_id = reply.body["user_id"].as_str().unwrap().to_string();
        (user_id, reply.cookie.unwrap())
    }
}
