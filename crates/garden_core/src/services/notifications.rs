//! crates/garden_core/src/services/notifications.rs
//!
//! Push notifications sent to a user's registered device.

use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::PlantHealthStatus;
use crate::ports::{PortResult, ProfileRepository, PushError, PushMessage, PushService};

pub const NEED_WATER_TITLES: [&str; 10] = [
    "Time to give your plant a drink 🌱",
    "Your plant is feeling a bit thirsty 🌿",
    "Hey, your green friend needs some water 🌱",
    "Don't forget to water your plant today 🌿",
    "A little hydration goes a long way 🌱",
    "Your plant could use a refreshing sip 🌿",
    "It's watering time for your plant 🌱",
    "Your plant's leaves are calling for water 🌿",
    "Keep your plant happy — water it now 🌱",
    "Looks like your plant needs a bit of care 🌿",
];

pub const CRITICALLY_DRY_TITLES: [&str; 4] = [
    "Your plant is really thirsty ⚠️",
    "Emergency hydration needed 🚨",
    "Your plant is drying out fast ⚠️",
    "Uh oh...your plant needs water ASAP 🚨",
];

pub const FRIEND_REQUEST_TITLE: &str = "New Friend Request 🤝";

/// Retry schedule for transient push failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

pub struct Notifier {
    push: Arc<dyn PushService>,
    profiles: Arc<dyn ProfileRepository>,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn new(
        push: Arc<dyn PushService>,
        profiles: Arc<dyn ProfileRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            push,
            profiles,
            retry,
        }
    }

    /// Tells the owner of a plant that it needs water. Returns whether a
    /// message was delivered.
    pub async fn send_water_notification(
        &self,
        user_id: Uuid,
        plant_id: Uuid,
        plant_name: &str,
        status: PlantHealthStatus,
    ) -> PortResult<bool> {
        let (titles, body): (&[&str], String) = if status == PlantHealthStatus::NeedsWater {
            (&NEED_WATER_TITLES, format!("{} needs water!", plant_name))
        } else {
            (
                &CRITICALLY_DRY_TITLES,
                format!(
                    "{} is severely dry and needs immediate watering to recover!",
                    plant_name
                ),
            )
        };
        let title = titles
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(NEED_WATER_TITLES[0]);

        let data = HashMap::from([
            ("type".to_string(), "WATER_PLANT".to_string()),
            ("plantId".to_string(), plant_id.to_string()),
        ]);
        self.deliver(user_id, title, body, data).await
    }

    /// Tells `target_user_id` that `from_pseudo` wants to be their friend.
    pub async fn send_friend_request_notification(
        &self,
        target_user_id: Uuid,
        from_pseudo: &str,
    ) -> PortResult<bool> {
        let data = HashMap::from([
            ("type".to_string(), "FRIEND_REQUEST".to_string()),
            ("fromPseudo".to_string(), from_pseudo.to_string()),
        ]);
        self.deliver(
            target_user_id,
            FRIEND_REQUEST_TITLE,
            format!("{} wants to be your friend!", from_pseudo),
            data,
        )
        .await
    }

    async fn deliver(
        &self,
        user_id: Uuid,
        title: &str,
        body: String,
        data: HashMap<String, String>,
    ) -> PortResult<bool> {
        let profile = self.profiles.get_profile(user_id).await?;
        let Some(token) = profile.fcm_token.filter(|t| !t.is_empty()) else {
            info!("No valid FCM token for user {}. No notification sent.", user_id);
            return Ok(false);
        };

        let message = PushMessage {
            token,
            title: title.to_string(),
            body,
            data,
        };

        for attempt in 1..=self.retry.max_attempts {
            match self.push.send(&message).await {
                Ok(response) => {
                    info!(
                        "Notification sent to user {} on attempt {} | response={}",
                        user_id, attempt, response
                    );
                    return Ok(true);
                }
                Err(PushError::Unregistered) => {
                    warn!("Token for user {} is no longer valid, clearing it", user_id);
                    self.profiles.set_fcm_token(user_id, None).await?;
                    return Ok(false);
                }
                Err(PushError::Retryable(e)) if attempt < self.retry.max_attempts => {
                    warn!(
                        "Failed to send notification to user {}: {} | retry {}/{}",
                        user_id, e, attempt, self.retry.max_attempts
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                }
                Err(e) => {
                    error!(
                        "Failed to send notification to user {} after {} attempt(s) | {}",
                        user_id, attempt, e
                    );
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }
}
