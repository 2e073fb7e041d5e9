//! crates/garden_core/src/services/feed.rs
//!
//! The activity feed: persists activities and fans them out to live subscribers.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::GardenActivity;
use crate::ports::{ActivityRepository, FriendRepository, PortResult};

pub const DEFAULT_FEED_LIMIT: usize = 50;
const BROADCAST_CAPACITY: usize = 256;

/// A live stream of every recorded activity.
pub type ActivityStream = Pin<Box<dyn Stream<Item = GardenActivity> + Send>>;

pub struct ActivityFeed {
    activities: Arc<dyn ActivityRepository>,
    friends: Arc<dyn FriendRepository>,
    sender: broadcast::Sender<GardenActivity>,
}

impl ActivityFeed {
    pub fn new(activities: Arc<dyn ActivityRepository>, friends: Arc<dyn FriendRepository>) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            activities,
            friends,
            sender,
        }
    }

    /// Stores an activity and pushes it to subscribers.
    pub async fn record(&self, activity: GardenActivity) -> PortResult<()> {
        self.activities.upsert_activity(&activity).await?;
        debug!(
            "Recorded {} activity {} for user {}",
            activity.kind.tag(),
            activity.id,
            activity.user_id
        );
        // Having no live subscriber is fine.
        let _ = self.sender.send(activity);
        Ok(())
    }

    /// The users whose activities appear in `user_id`'s feed: themselves and their friends.
    pub async fn audience(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        let mut users = self.friends.list_friends(user_id).await?;
        users.push(user_id);
        Ok(users)
    }

    /// Whether `activity` belongs in the feed of `user_id`.
    pub async fn is_visible_to(&self, activity: &GardenActivity, user_id: Uuid) -> PortResult<bool> {
        if activity.user_id == user_id {
            return Ok(true);
        }
        self.friends.are_friends(user_id, activity.user_id).await
    }

    /// Newest-first feed of `user_id`.
    pub async fn feed_for(&self, user_id: Uuid, limit: usize) -> PortResult<Vec<GardenActivity>> {
        let audience = self.audience(user_id).await?;
        self.activities.list_activities(&audience, limit).await
    }

    /// Subscribes to activities recorded from now on. Dropping the stream
    /// unsubscribes.
    pub fn subscribe(&self) -> ActivityStream {
        let mut receiver = self.sender.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(activity) => yield activity,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Feed subscriber lagged, {} activities skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityKind;
    use crate::memory::InMemoryStore;
    use crate::ports::FriendRepository;
    use chrono::{Duration, Utc};
    use futures::StreamExt;

    fn watered(user: Uuid, pseudo: &str, minutes_ago: i64) -> GardenActivity {
        GardenActivity::new(
            user,
            pseudo,
            Utc::now() - Duration::minutes(minutes_ago),
            ActivityKind::WaterPlant {
                plant_name: "Monstera".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn feed_shows_own_and_friends_activities_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        let feed = ActivityFeed::new(store.clone(), store.clone());
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store
            .send_or_accept_request(alice, bob, Utc::now())
            .await
            .unwrap();
        store.accept_request(alice, bob, Utc::now()).await.unwrap();

        feed.record(watered(alice, "alice", 10)).await.unwrap();
        feed.record(watered(bob, "bob", 5)).await.unwrap();
        feed.record(watered(carol, "carol", 1)).await.unwrap();

        let entries = feed.feed_for(alice, DEFAULT_FEED_LIMIT).await.unwrap();
        let pseudos: Vec<&str> = entries.iter().map(|a| a.pseudo.as_str()).collect();
        assert_eq!(pseudos, vec!["bob", "alice"]);

        let limited = feed.feed_for(alice, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert!(feed.is_visible_to(&watered(bob, "bob", 0), alice).await.unwrap());
        assert!(!feed.is_visible_to(&watered(carol, "carol", 0), alice).await.unwrap());
    }

    #[tokio::test]
    async fn subscribers_receive_recorded_activities() {
        let store = Arc::new(InMemoryStore::new());
        let feed = ActivityFeed::new(store.clone(), store);
        let mut stream = feed.subscribe();

        let activity = watered(Uuid::new_v4(), "dana", 0);
        feed.record(activity.clone()).await.unwrap();

        assert_eq!(stream.next().await, Some(activity));
    }
}
