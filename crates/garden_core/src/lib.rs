pub mod achievements;
pub mod domain;
pub mod health;
pub mod memory;
pub mod ports;
pub mod services;

pub use achievements::{AchievementDefinition, AchievementError, ACHIEVEMENTS_LEVEL_NUMBER};
pub use domain::{
    AchievementProgress, AchievementType, ActivityKind, AuthSession, FriendRequest,
    FriendRequestStatus, GardenActivity, OwnedPlant, Plant, PlantHealthStatus, PlantLocation,
    Profile, User, UserCredentials, UserProfile,
};
pub use health::compute_health_status;
pub use memory::{FixedClock, InMemoryStore};
pub use ports::{
    AccountRepository, AchievementRepository, ActivityRepository, Clock, FriendRepository,
    IdentificationCandidate, PlantDescriptionService, PlantIdentificationService,
    PlantRepository, PortError, PortResult, ProfileRepository, PushError, PushMessage,
    PushService, RequestWrite, SystemClock,
};
