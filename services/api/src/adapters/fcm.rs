//! services/api/src/adapters/fcm.rs
//!
//! This module contains the adapters for push delivery. `FcmAdapter` sends
//! messages through the Firebase Cloud Messaging HTTP v1 API; `DisabledPush`
//! stands in when no FCM credentials are configured.

use async_trait::async_trait;
use garden_core::ports::{PushError, PushMessage, PushService};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PushService` over the FCM HTTP v1 API.
#[derive(Clone)]
pub struct FcmAdapter {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl FcmAdapter {
    /// Creates a new `FcmAdapter` for `project_id`, authenticating with an
    /// OAuth2 bearer token.
    ///
    /// The token is never refreshed. Once it expires FCM answers 401 and
    /// every send fails with a fatal error naming `FCM_ACCESS_TOKEN`.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        project_id: &str,
        access_token: String,
    ) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            access_token,
        }
    }
}

/// Sorts an FCM error answer into the retry categories of the core.
fn classify(status: StatusCode, body: &str) -> PushError {
    if status == StatusCode::NOT_FOUND || body.contains("UNREGISTERED") {
        PushError::Unregistered
    } else if status == StatusCode::UNAUTHORIZED {
        error!("FCM rejected the access token, FCM_ACCESS_TOKEN must be renewed");
        PushError::Fatal("FCM access token expired or invalid".to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PushError::Retryable(format!("FCM returned {}", status))
    } else {
        PushError::Fatal(format!("FCM returned {}: {}", status, body))
    }
}

//=========================================================================================
// `PushService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PushService for FcmAdapter {
    async fn send(&self, message: &PushMessage) -> Result<String, PushError> {
        let request = SendRequest {
            message: FcmMessage {
                token: &message.token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PushError::Retryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, &body));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| PushError::Fatal(format!("Invalid FCM response: {}", e)))?;
        debug!("FCM accepted message {}", sent.name);
        Ok(sent.name)
    }
}

/// A `PushService` used when push delivery is not configured.
#[derive(Clone, Copy, Default)]
pub struct DisabledPush;

#[async_trait]
impl PushService for DisabledPush {
    async fn send(&self, _message: &PushMessage) -> Result<String, PushError> {
        Err(PushError::Fatal("Push notifications are not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const SEND_PATH: &str = "/v1/projects/my-garden/messages:send";

    fn adapter(server: &MockServer) -> FcmAdapter {
        FcmAdapter::new(
            reqwest::Client::new(),
            &server.base_url(),
            "my-garden",
            "access-token".to_string(),
        )
    }

    fn message() -> PushMessage {
        PushMessage {
            token: "device-token".to_string(),
            title: "Time to give your plant a drink 🌱".to_string(),
            body: "Fern needs water!".to_string(),
            data: HashMap::from([
                ("type".to_string(), "WATER_PLANT".to_string()),
                ("plantId".to_string(), "plant-1".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn message_is_posted_with_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("authorization", "Bearer access-token")
                .json_body(json!({
                    "message": {
                        "token": "device-token",
                        "notification": {
                            "title": "Time to give your plant a drink 🌱",
                            "body": "Fern needs water!"
                        },
                        "data": { "type": "WATER_PLANT", "plantId": "plant-1" }
                    }
                }));
            then.status(200)
                .json_body(json!({ "name": "projects/my-garden/messages/42" }));
        });

        let id = adapter(&server).send(&message()).await.unwrap();
        mock.assert();
        assert_eq!(id, "projects/my-garden/messages/42");
    }

    #[tokio::test]
    async fn unregistered_tokens_are_recognised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(404).json_body(json!({
                "error": { "status": "NOT_FOUND", "details": [{ "errorCode": "UNREGISTERED" }] }
            }));
        });

        let err = adapter(&server).send(&message()).await.unwrap_err();
        assert_eq!(err, PushError::Unregistered);
    }

    #[test]
    fn quota_and_server_errors_are_retryable() {
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, ""),
            PushError::Retryable(_)
        ));
        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE, ""),
            PushError::Retryable(_)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            PushError::Fatal(_)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_fatal_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(401).json_body(json!({
                "error": { "status": "UNAUTHENTICATED" }
            }));
        });

        let err = adapter(&server).send(&message()).await.unwrap_err();
        mock.assert_hits(1);
        assert_eq!(
            err,
            PushError::Fatal("FCM access token expired or invalid".to_string())
        );
    }
}
