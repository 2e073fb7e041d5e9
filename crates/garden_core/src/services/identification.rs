//! crates/garden_core/src/services/identification.rs
//!
//! Turns a photograph into a `Plant` template: the image service names the
//! species, the description service fills in the care information. Both calls
//! are single-shot and degrade to placeholder values when they fail.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Plant, PlantHealthStatus, PlantLocation};
use crate::ports::{
    IdentificationCandidate, PlantDescriptionService, PlantIdentificationService, PortError,
    PortResult,
};

pub const DEFAULT_MIN_SCORE: f64 = 0.3;
pub const UNKNOWN_PLANT_NAME: &str = "Unknown plant";
pub const UNKNOWN_PLANT_DESCRIPTION: &str =
    "We could not recognize this plant. You can fill in its details yourself.";
pub const MISSING_DESCRIPTION: &str = "No description available for this plant yet.";
pub const DEFAULT_WATERING_FREQUENCY: i32 = 7;
pub const DEFAULT_LIGHT_EXPOSURE: &str = "Bright indirect light";

/// The JSON object the description model is asked to produce.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribedPlant {
    name: String,
    latin_name: Option<String>,
    description: String,
    watering_frequency: i32,
    #[serde(default)]
    light_exposure: Option<String>,
}

/// Extracts the first JSON object of a model answer, tolerating prose or code
/// fences around it.
fn parse_description(raw: &str) -> Option<DescribedPlant> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<DescribedPlant>(&raw[start..=end]) {
        Ok(described) if described.watering_frequency > 0 && !described.name.trim().is_empty() => {
            Some(described)
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Unparseable plant description: {}", e);
            None
        }
    }
}

pub fn unknown_plant() -> Plant {
    Plant {
        name: UNKNOWN_PLANT_NAME.to_string(),
        latin_name: String::new(),
        description: UNKNOWN_PLANT_DESCRIPTION.to_string(),
        image_url: None,
        watering_frequency: DEFAULT_WATERING_FREQUENCY,
        light_exposure: DEFAULT_LIGHT_EXPOSURE.to_string(),
        location: PlantLocation::Indoor,
        health_status: PlantHealthStatus::Unknown,
    }
}

pub struct PlantIdentifier {
    identification: Arc<dyn PlantIdentificationService>,
    description: Arc<dyn PlantDescriptionService>,
    min_score: f64,
}

impl PlantIdentifier {
    pub fn new(
        identification: Arc<dyn PlantIdentificationService>,
        description: Arc<dyn PlantDescriptionService>,
        min_score: f64,
    ) -> Self {
        Self {
            identification,
            description,
            min_score,
        }
    }

    /// Identifies the plant in `image`. Only an empty image is an error; any
    /// upstream failure yields the unknown plant.
    pub async fn identify_plant(&self, image: &[u8], mime_type: &str) -> PortResult<Plant> {
        if image.is_empty() {
            return Err(PortError::InvalidArgument("Image is empty".to_string()));
        }

        let candidates = match self.identification.identify(image, mime_type).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Plant identification failed: {}", e);
                return Ok(unknown_plant());
            }
        };

        let Some(best) = self.best_candidate(candidates) else {
            info!("No candidate above score {}", self.min_score);
            return Ok(unknown_plant());
        };
        info!(
            "Identified {} with score {:.2}",
            best.latin_name, best.score
        );

        Ok(self.describe(best).await)
    }

    fn best_candidate(
        &self,
        candidates: Vec<IdentificationCandidate>,
    ) -> Option<IdentificationCandidate> {
        candidates
            .into_iter()
            .filter(|c| c.score >= self.min_score && !c.latin_name.trim().is_empty())
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    async fn describe(&self, candidate: IdentificationCandidate) -> Plant {
        let common_name = candidate
            .common_names
            .first()
            .cloned()
            .unwrap_or_else(|| candidate.latin_name.clone());

        let described = match self.description.describe_plant(&candidate.latin_name).await {
            Ok(raw) => parse_description(&raw),
            Err(e) => {
                warn!("Description of {} failed: {}", candidate.latin_name, e);
                None
            }
        };

        match described {
            Some(d) => Plant {
                name: d.name.trim().to_string(),
                latin_name: d
                    .latin_name
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or(candidate.latin_name),
                description: d.description,
                image_url: None,
                watering_frequency: d.watering_frequency,
                light_exposure: d
                    .light_exposure
                    .unwrap_or_else(|| DEFAULT_LIGHT_EXPOSURE.to_string()),
                location: PlantLocation::Indoor,
                health_status: PlantHealthStatus::Unknown,
            },
            None => Plant {
                name: common_name,
                latin_name: candidate.latin_name,
                description: MISSING_DESCRIPTION.to_string(),
                ..unknown_plant()
            },
        }
    }
}
