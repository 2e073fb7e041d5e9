//! services/api/src/adapters/plantnet.rs
//!
//! This module contains the adapter for the Pl@ntNet identification API.
//! It implements the `PlantIdentificationService` port from the `core` crate.

use async_trait::async_trait;
use garden_core::ports::{
    IdentificationCandidate, PlantIdentificationService, PortError, PortResult,
};
use reqwest::{multipart, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    results: Vec<IdentifyResult>,
}

#[derive(Debug, Deserialize)]
struct IdentifyResult {
    score: f64,
    species: Species,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Species {
    scientific_name_without_author: String,
    #[serde(default)]
    common_names: Vec<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PlantIdentificationService` over the Pl@ntNet REST API.
#[derive(Clone)]
pub struct PlantNetAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlantNetAdapter {
    /// Creates a new `PlantNetAdapter` targeting `base_url` (no trailing slash).
    pub fn new(client: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

//=========================================================================================
// `PlantIdentificationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlantIdentificationService for PlantNetAdapter {
    /// Uploads the photograph and returns every species guess with its score.
    async fn identify(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> PortResult<Vec<IdentificationCandidate>> {
        let part = multipart::Part::bytes(image.to_vec())
            .file_name("plant")
            .mime_str(mime_type)
            .map_err(|e| PortError::InvalidArgument(format!("Invalid image type: {}", e)))?;
        let form = multipart::Form::new()
            .part("images", part)
            .text("organs", "auto");

        let response = self
            .client
            .post(format!("{}/v2/identify/all", self.base_url))
            .query(&[("api-key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Pl@ntNet request failed: {}", e)))?;

        // Pl@ntNet answers 404 when no species matches the image.
        if response.status() == StatusCode::NOT_FOUND {
            info!("Pl@ntNet found no matching species");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Pl@ntNet returned {}: {}",
                status, body
            )));
        }

        let parsed: IdentifyResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid Pl@ntNet response: {}", e)))?;
        debug!("Pl@ntNet returned {} candidates", parsed.results.len());

        Ok(parsed
            .results
            .into_iter()
            .map(|r| IdentificationCandidate {
                latin_name: r.species.scientific_name_without_author,
                common_names: r.species.common_names,
                score: r.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn adapter(server: &MockServer) -> PlantNetAdapter {
        PlantNetAdapter::new(reqwest::Client::new(), &server.base_url(), "secret".to_string())
    }

    #[tokio::test]
    async fn candidates_are_parsed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/identify/all")
                .query_param("api-key", "secret");
            then.status(200).json_body(json!({
                "query": { "project": "all" },
                "results": [
                    {
                        "score": 0.91,
                        "species": {
                            "scientificNameWithoutAuthor": "Monstera deliciosa",
                            "commonNames": ["Swiss cheese plant", "Monstera"]
                        }
                    },
                    {
                        "score": 0.04,
                        "species": { "scientificNameWithoutAuthor": "Philodendron" }
                    }
                ]
            }));
        });

        let candidates = adapter(&server)
            .identify(b"fake-jpeg", "image/jpeg")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].latin_name, "Monstera deliciosa");
        assert_eq!(candidates[0].common_names[0], "Swiss cheese plant");
        assert!((candidates[0].score - 0.91).abs() < f64::EPSILON);
        assert!(candidates[1].common_names.is_empty());
    }

    #[tokio::test]
    async fn no_match_is_an_empty_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v2/identify/all");
            then.status(404).json_body(json!({ "message": "Species not found" }));
        });

        let candidates = adapter(&server)
            .identify(b"fake-jpeg", "image/jpeg")
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v2/identify/all");
            then.status(401).body("Invalid API key");
        });

        let err = adapter(&server)
            .identify(b"fake-jpeg", "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(msg) if msg.contains("401")));
    }
}
