//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how the core services are wired
//! from the adapters.

use garden_core::ports::{
    AccountRepository, AchievementRepository, ActivityRepository, Clock, FriendRepository,
    PlantDescriptionService, PlantIdentificationService, PlantRepository, ProfileRepository,
    PushService,
};
use garden_core::services::{
    AchievementTracker, ActivityFeed, FriendService, GardenService, HealthRefreshJob, Notifier,
    PlantIdentifier, ProfileService, RetryPolicy,
};
use std::sync::Arc;

//=========================================================================================
// Ports (what the binary or a test plugs in)
//=========================================================================================

/// Every adapter the application needs.
#[derive(Clone)]
pub struct Ports {
    pub accounts: Arc<dyn AccountRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub plants: Arc<dyn PlantRepository>,
    pub friends: Arc<dyn FriendRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub identification: Arc<dyn PlantIdentificationService>,
    pub description: Arc<dyn PlantDescriptionService>,
    pub push: Arc<dyn PushService>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables that are not adapters.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub identification_min_score: f64,
    pub push_retry: RetryPolicy,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub profiles: Arc<ProfileService>,
    pub garden: Arc<GardenService>,
    pub friends: Arc<FriendService>,
    pub achievements: Arc<AchievementTracker>,
    pub feed: Arc<ActivityFeed>,
    pub identifier: Arc<PlantIdentifier>,
    pub health_job: Arc<HealthRefreshJob>,
}

impl AppState {
    /// Builds every core service on top of the given adapters.
    pub fn new(ports: Ports, settings: ServiceSettings) -> Self {
        let feed = Arc::new(ActivityFeed::new(
            ports.activities.clone(),
            ports.friends.clone(),
        ));
        let tracker = Arc::new(AchievementTracker::new(
            ports.achievements.clone(),
            ports.profiles.clone(),
            feed.clone(),
            ports.clock.clone(),
        ));
        let notifier = Arc::new(Notifier::new(
            ports.push.clone(),
            ports.profiles.clone(),
            settings.push_retry,
        ));

        let garden = Arc::new(GardenService::new(
            ports.plants.clone(),
            ports.profiles.clone(),
            tracker.clone(),
            feed.clone(),
            ports.clock.clone(),
        ));
        let friends = Arc::new(FriendService::new(
            ports.friends.clone(),
            ports.profiles.clone(),
            tracker.clone(),
            feed.clone(),
            notifier.clone(),
            ports.clock.clone(),
        ));
        let health_job = Arc::new(HealthRefreshJob::new(
            ports.plants.clone(),
            ports.profiles.clone(),
            tracker.clone(),
            notifier,
            ports.clock.clone(),
        ));
        let identifier = Arc::new(PlantIdentifier::new(
            ports.identification.clone(),
            ports.description.clone(),
            settings.identification_min_score,
        ));

        Self {
            accounts: ports.accounts,
            profiles: Arc::new(ProfileService::new(ports.profiles)),
            garden,
            friends,
            achievements: tracker,
            feed,
            identifier,
            health_job,
        }
    }
}
