//! crates/garden_core/src/services/mod.rs
//!
//! Use cases built on top of the ports.

pub mod feed;
pub mod friends;
pub mod garden;
pub mod health_job;
pub mod identification;
pub mod notifications;
pub mod profiles;
pub mod progress;

pub use feed::{ActivityFeed, ActivityStream, DEFAULT_FEED_LIMIT};
pub use friends::{FriendRequestOutcome, FriendService};
pub use garden::{GardenService, PlantEdit};
pub use health_job::{HealthRefreshJob, RefreshReport};
pub use identification::{PlantIdentifier, DEFAULT_MIN_SCORE};
pub use notifications::{Notifier, RetryPolicy};
pub use profiles::{ProfileDraft, ProfileService};
pub use progress::{AchievementStatus, AchievementTracker};
