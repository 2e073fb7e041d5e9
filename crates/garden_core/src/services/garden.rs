//! crates/garden_core/src/services/garden.rs
//!
//! Garden use cases: adding, editing, watering and removing owned plants.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    ActivityKind, AchievementType, GardenActivity, OwnedPlant, Plant, PlantLocation,
};
use crate::health::{compute_health_status, healthy_since_after_transition, is_healthy};
use crate::ports::{Clock, PlantRepository, PortError, PortResult, ProfileRepository};
use crate::services::feed::ActivityFeed;
use crate::services::progress::AchievementTracker;

/// Fields a user may change on one of their plants.
#[derive(Debug, Clone)]
pub struct PlantEdit {
    pub name: String,
    pub latin_name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub watering_frequency: i32,
    pub light_exposure: String,
    pub location: PlantLocation,
    /// Corrects the last watering date, e.g. when the user forgot to log it.
    pub last_watered: Option<DateTime<Utc>>,
}

pub struct GardenService {
    plants: Arc<dyn PlantRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tracker: Arc<AchievementTracker>,
    feed: Arc<ActivityFeed>,
    clock: Arc<dyn Clock>,
}

fn validate(name: &str, watering_frequency: i32) -> PortResult<()> {
    if name.trim().is_empty() {
        return Err(PortError::InvalidArgument("Plant name must not be blank".to_string()));
    }
    if watering_frequency <= 0 {
        return Err(PortError::InvalidArgument(
            "Watering frequency must be a positive number of days".to_string(),
        ));
    }
    Ok(())
}

impl GardenService {
    pub fn new(
        plants: Arc<dyn PlantRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tracker: Arc<AchievementTracker>,
        feed: Arc<ActivityFeed>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plants,
            profiles,
            tracker,
            feed,
            clock,
        }
    }

    /// Adds a plant to the owner's garden, considered watered right now.
    pub async fn add_plant(&self, owner_id: Uuid, plant: Plant) -> PortResult<OwnedPlant> {
        validate(&plant.name, plant.watering_frequency)?;
        let now = self.clock.now();
        let status = compute_health_status(now, None, plant.watering_frequency, now);

        let owned = OwnedPlant {
            id: Uuid::new_v4(),
            owner_id,
            plant: Plant {
                name: plant.name.trim().to_string(),
                health_status: status,
                ..plant
            },
            last_watered: now,
            previous_last_watered: None,
            healthy_since: is_healthy(status).then_some(now),
            created_at: now,
        };
        self.plants.insert_plant(&owned).await?;
        info!("User {} added plant {} ({})", owner_id, owned.id, owned.plant.name);

        match self.plants.count_plants(owner_id).await {
            Ok(count) => {
                if let Err(e) = self
                    .tracker
                    .report(owner_id, AchievementType::PlantsNumber, count)
                    .await
                {
                    warn!("Failed to update plant achievement of {}: {}", owner_id, e);
                }
            }
            Err(e) => warn!("Failed to count plants of {}: {}", owner_id, e),
        }

        self.publish(
            owner_id,
            ActivityKind::AddedPlant {
                plant_name: owned.plant.name.clone(),
            },
        )
        .await;
        Ok(owned)
    }

    pub async fn get_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<OwnedPlant> {
        self.plants.get_plant(owner_id, plant_id).await
    }

    pub async fn list_garden(&self, owner_id: Uuid) -> PortResult<Vec<OwnedPlant>> {
        self.plants.list_plants(owner_id).await
    }

    pub async fn edit_plant(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        edit: PlantEdit,
    ) -> PortResult<OwnedPlant> {
        validate(&edit.name, edit.watering_frequency)?;
        let mut owned = self.plants.get_plant(owner_id, plant_id).await?;
        let now = self.clock.now();

        if let Some(last_watered) = edit.last_watered {
            if last_watered > now {
                return Err(PortError::InvalidArgument(
                    "Last watering date cannot be in the future".to_string(),
                ));
            }
            owned.last_watered = last_watered;
        }

        let old_status = owned.plant.health_status;
        owned.plant = Plant {
            name: edit.name.trim().to_string(),
            latin_name: edit.latin_name,
            description: edit.description,
            image_url: edit.image_url,
            watering_frequency: edit.watering_frequency,
            light_exposure: edit.light_exposure,
            location: edit.location,
            health_status: old_status,
        };
        self.refresh_status(&mut owned, now);

        self.plants.update_plant(&owned).await?;
        Ok(owned)
    }

    pub async fn delete_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<()> {
        self.plants.delete_plant(owner_id, plant_id).await?;
        info!("User {} removed plant {}", owner_id, plant_id);
        Ok(())
    }

    /// Logs a watering now; the previous watering is kept to detect overwatering.
    pub async fn water_plant(&self, owner_id: Uuid, plant_id: Uuid) -> PortResult<OwnedPlant> {
        let mut owned = self.plants.get_plant(owner_id, plant_id).await?;
        let now = self.clock.now();

        owned.previous_last_watered = Some(owned.last_watered);
        owned.last_watered = now;
        self.refresh_status(&mut owned, now);

        self.plants.update_plant(&owned).await?;
        self.publish(
            owner_id,
            ActivityKind::WaterPlant {
                plant_name: owned.plant.name.clone(),
            },
        )
        .await;
        Ok(owned)
    }

    fn refresh_status(&self, owned: &mut OwnedPlant, now: DateTime<Utc>) {
        let old_status = owned.plant.health_status;
        let new_status = compute_health_status(
            owned.last_watered,
            owned.previous_last_watered,
            owned.plant.watering_frequency,
            now,
        );
        owned.healthy_since =
            healthy_since_after_transition(old_status, new_status, owned.healthy_since, now);
        owned.plant.health_status = new_status;
    }

    async fn publish(&self, user_id: Uuid, kind: ActivityKind) {
        let pseudo = match self.profiles.get_profile(user_id).await {
            Ok(profile) => profile.pseudo,
            Err(e) => {
                warn!("No profile for user {}, activity skipped: {}", user_id, e);
                return;
            }
        };
        let activity = GardenActivity::new(user_id, &pseudo, self.clock.now(), kind);
        if let Err(e) = self.feed.record(activity).await {
            warn!("Failed to record activity for {}: {}", user_id, e);
        }
    }
}
