//! crates/garden_core/src/services/health_job.rs
//!
//! Periodic refresh of every plant's health status.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{AchievementType, OwnedPlant};
use crate::health::{
    compute_health_status, days_between, healthy_since_after_transition, needs_attention,
};
use crate::ports::{Clock, PlantRepository, PortResult, ProfileRepository};
use crate::services::notifications::Notifier;
use crate::services::progress::AchievementTracker;

/// What one refresh pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub plants_scanned: usize,
    pub plants_updated: usize,
    pub notifications_sent: usize,
}

pub struct HealthRefreshJob {
    plants: Arc<dyn PlantRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tracker: Arc<AchievementTracker>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
}

/// Outcome of refreshing a single plant.
#[derive(Default)]
struct PlantRefresh {
    updated: bool,
    notified: bool,
}

impl HealthRefreshJob {
    pub fn new(
        plants: Arc<dyn PlantRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tracker: Arc<AchievementTracker>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plants,
            profiles,
            tracker,
            notifier,
            clock,
        }
    }

    /// Recomputes the status of every plant of every user. A failure on one
    /// plant is logged and does not stop the pass.
    pub async fn run_once(&self) -> PortResult<RefreshReport> {
        let now = self.clock.now();
        let mut report = RefreshReport::default();

        for user_id in self.profiles.list_user_ids().await? {
            let plants = match self.plants.list_plants(user_id).await {
                Ok(plants) => plants,
                Err(e) => {
                    error!("[health refresh] uid={} | error={}", user_id, e);
                    continue;
                }
            };

            for plant in plants {
                report.plants_scanned += 1;
                match self.refresh_plant(user_id, &plant, now).await {
                    Ok(outcome) => {
                        report.plants_updated += usize::from(outcome.updated);
                        report.notifications_sent += usize::from(outcome.notified);
                    }
                    Err(e) => error!(
                        "[health refresh] uid={} | plant={} | error={}",
                        user_id, plant.id, e
                    ),
                }
            }
        }

        info!(
            "Health refresh done: {} scanned, {} updated, {} notified",
            report.plants_scanned, report.plants_updated, report.notifications_sent
        );
        Ok(report)
    }

    async fn refresh_plant(
        &self,
        user_id: Uuid,
        owned: &OwnedPlant,
        now: DateTime<Utc>,
    ) -> PortResult<PlantRefresh> {
        let old_status = owned.plant.health_status;
        let new_status = compute_health_status(
            owned.last_watered,
            owned.previous_last_watered,
            owned.plant.watering_frequency,
            now,
        );

        if let Some(since) = owned.healthy_since {
            let streak = days_between(since, now).floor() as i64;
            self.tracker
                .report(user_id, AchievementType::HealthyStreak, streak)
                .await?;
        }

        let mut outcome = PlantRefresh::default();
        if old_status == new_status {
            return Ok(outcome);
        }

        let healthy_since =
            healthy_since_after_transition(old_status, new_status, owned.healthy_since, now);
        self.plants
            .update_health(user_id, owned.id, new_status, healthy_since)
            .await?;
        outcome.updated = true;

        if needs_attention(new_status) && !owned.plant.name.is_empty() {
            outcome.notified = self
                .notifier
                .send_water_notification(user_id, owned.id, &owned.plant.name, new_status)
                .await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Plant, PlantHealthStatus, PlantLocation, Profile};
    use crate::memory::{FixedClock, InMemoryStore};
    use crate::ports::{AchievementRepository, PushError, PushMessage, PushService};
    use crate::services::feed::ActivityFeed;
    use crate::services::notifications::RetryPolicy;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingPush {
        sent: Mutex<Vec<PushMessage>>,
    }

    #[async_trait]
    impl PushService for RecordingPush {
        async fn send(&self, message: &PushMessage) -> Result<String, PushError> {
            self.sent.lock().await.push(message.clone());
            Ok("mock-message-id".to_string())
        }
    }

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 10, 0, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        push: Arc<RecordingPush>,
        job: HealthRefreshJob,
        user: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let push = Arc::new(RecordingPush::default());
        let clock = Arc::new(FixedClock::new(test_now()));
        let feed = Arc::new(ActivityFeed::new(store.clone(), store.clone()));
        let tracker = Arc::new(AchievementTracker::new(
            store.clone(),
            store.clone(),
            feed,
            clock.clone(),
        ));
        let notifier = Arc::new(Notifier::new(push.clone(), store.clone(), RetryPolicy::default()));
        let job = HealthRefreshJob::new(store.clone(), store.clone(), tracker, notifier, clock);

        let user = Uuid::new_v4();
        store
            .create_profile(&Profile {
                user_id: user,
                first_name: "Alice".to_string(),
                last_name: String::new(),
                pseudo: "alice".to_string(),
                garden_name: String::new(),
                avatar: None,
                fcm_token: Some("fake-token-123".to_string()),
            })
            .await
            .unwrap();
        Fixture {
            store,
            push,
            job,
            user,
        }
    }

    /// Seeds a plant; `order` keeps the listing order deterministic.
    #[allow(clippy::too_many_arguments)]
    async fn seed(
        f: &Fixture,
        order: i64,
        name: &str,
        frequency: i32,
        last_watered_days_ago: i64,
        previous_days_ago: Option<i64>,
        status: PlantHealthStatus,
        healthy_since_days_ago: Option<i64>,
    ) -> Uuid {
        let now = test_now();
        let id = Uuid::new_v4();
        f.store
            .insert_plant(&OwnedPlant {
                id,
                owner_id: f.user,
                plant: Plant {
                    name: name.to_string(),
                    latin_name: String::new(),
                    description: String::new(),
                    image_url: None,
                    watering_frequency: frequency,
                    light_exposure: String::new(),
                    location: PlantLocation::Indoor,
                    health_status: status,
                },
                last_watered: now - Duration::days(last_watered_days_ago),
                previous_last_watered: previous_days_ago.map(|d| now - Duration::days(d)),
                healthy_since: healthy_since_days_ago.map(|d| now - Duration::days(d)),
                created_at: now - Duration::days(100) + Duration::minutes(order),
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn refresh_updates_statuses_and_notifies_in_order() {
        let f = fixture().await;
        let ok = seed(&f, 0, "Ficus", 7, 3, None, PlantHealthStatus::Healthy, None).await;
        let dry = seed(&f, 1, "Fern", 5, 20, Some(30), PlantHealthStatus::NeedsWater, None).await;
        let thirsty = seed(&f, 2, "Rose", 7, 8, None, PlantHealthStatus::Healthy, None).await;

        let report = f.job.run_once().await.unwrap();

        for (id, expected) in [
            (ok, PlantHealthStatus::Healthy),
            (dry, PlantHealthStatus::SeverelyDry),
            (thirsty, PlantHealthStatus::NeedsWater),
        ] {
            let stored = f.store.get_plant(f.user, id).await.unwrap();
            assert_eq!(stored.plant.health_status, expected, "{}", stored.plant.name);
        }

        assert_eq!(
            report,
            RefreshReport {
                plants_scanned: 3,
                plants_updated: 2,
                notifications_sent: 2,
            }
        );

        let sent = f.push.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.token == "fake-token-123"));
        assert!(sent.iter().all(|m| m.data["type"] == "WATER_PLANT"));
        assert_eq!(sent[0].data["plantId"], dry.to_string());
        assert_eq!(sent[1].data["plantId"], thirsty.to_string());
    }

    #[tokio::test]
    async fn leaving_healthy_clears_healthy_since() {
        let f = fixture().await;
        let rose = seed(&f, 0, "Rose", 7, 8, None, PlantHealthStatus::Healthy, Some(8)).await;

        f.job.run_once().await.unwrap();

        let stored = f.store.get_plant(f.user, rose).await.unwrap();
        assert_eq!(stored.plant.health_status, PlantHealthStatus::NeedsWater);
        assert_eq!(stored.healthy_since, None);
        // The streak observed before leaving still counts.
        assert_eq!(
            f.store
                .get_value(f.user, AchievementType::HealthyStreak)
                .await
                .unwrap(),
            8
        );
    }

    #[tokio::test]
    async fn entering_healthy_starts_a_streak() {
        let f = fixture().await;
        // Overwatered 6 days ago with a 10 day frequency, now recovered.
        let fern = seed(
            &f,
            0,
            "Fern",
            10,
            6,
            Some(7),
            PlantHealthStatus::SeverelyOverwatered,
            None,
        )
        .await;

        let report = f.job.run_once().await.unwrap();

        let stored = f.store.get_plant(f.user, fern).await.unwrap();
        assert_eq!(stored.plant.health_status, PlantHealthStatus::Healthy);
        assert_eq!(stored.healthy_since, Some(test_now()));
        assert_eq!(report.notifications_sent, 0);
    }

    #[tokio::test]
    async fn unchanged_status_writes_nothing() {
        let f = fixture().await;
        seed(&f, 0, "Ficus", 7, 1, None, PlantHealthStatus::Healthy, Some(30)).await;

        let report = f.job.run_once().await.unwrap();
        assert_eq!(report.plants_updated, 0);
        assert!(f.push.sent.lock().await.is_empty());
        assert_eq!(
            f.store
                .get_value(f.user, AchievementType::HealthyStreak)
                .await
                .unwrap(),
            30
        );
    }
}
