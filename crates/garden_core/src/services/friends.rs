//! crates/garden_core/src/services/friends.rs
//!
//! Friend requests and friendships.
//!
//! A request goes PENDING -> ACCEPTED | REFUSED. Both participants hold a
//! mirrored copy of every request, so each side can list it from its own
//! collection. Asking someone who already asked you accepts their request.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    ActivityKind, AchievementType, FriendRequest, FriendRequestStatus, GardenActivity, UserProfile,
};
use crate::ports::{
    Clock, FriendRepository, PortError, PortResult, ProfileRepository, RequestWrite,
};
use crate::services::feed::ActivityFeed;
use crate::services::notifications::Notifier;
use crate::services::progress::AchievementTracker;

/// Result of asking someone to be a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendRequestOutcome {
    /// The request is waiting for the other user.
    Pending(FriendRequest),
    /// The other user had already asked; both are now friends.
    Accepted,
}

pub struct FriendService {
    friends: Arc<dyn FriendRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tracker: Arc<AchievementTracker>,
    feed: Arc<ActivityFeed>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
}

impl FriendService {
    pub fn new(
        friends: Arc<dyn FriendRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tracker: Arc<AchievementTracker>,
        feed: Arc<ActivityFeed>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            friends,
            profiles,
            tracker,
            feed,
            notifier,
            clock,
        }
    }

    /// Sends a friend request, or accepts the reverse one if it is pending.
    ///
    /// The push to the receiver runs on its own task so retries never hold
    /// up the caller.
    pub async fn ask_friend(&self, from: Uuid, to: Uuid) -> PortResult<FriendRequestOutcome> {
        if from == to {
            return Err(PortError::InvalidArgument(
                "Cannot send a friend request to yourself".to_string(),
            ));
        }
        // The target must exist before anything is written.
        self.profiles.get_profile(to).await?;

        let now = self.clock.now();
        let request = match self.friends.send_or_accept_request(from, to, now).await? {
            RequestWrite::AcceptedReverse => {
                info!("Mutual friend request between {} and {}, accepted", from, to);
                self.after_accept(from, to, now).await;
                return Ok(FriendRequestOutcome::Accepted);
            }
            RequestWrite::AlreadyPending(existing) => {
                return Ok(FriendRequestOutcome::Pending(existing))
            }
            RequestWrite::Created(request) => request,
        };
        info!("Friend request sent from {} to {}", from, to);

        match self.profiles.get_profile(from).await {
            Ok(sender) => {
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier
                        .send_friend_request_notification(to, &sender.pseudo)
                        .await
                    {
                        warn!("Friend request notification to {} failed: {}", to, e);
                    }
                });
            }
            Err(e) => warn!("No profile for sender {}, notification skipped: {}", from, e),
        }

        Ok(FriendRequestOutcome::Pending(request))
    }

    /// `user` accepts the pending request sent by `from`.
    pub async fn accept(&self, user: Uuid, from: Uuid) -> PortResult<()> {
        let now = self.clock.now();
        self.friends.accept_request(from, user, now).await?;
        info!("User {} accepted the friend request of {}", user, from);
        self.after_accept(user, from, now).await;
        Ok(())
    }

    /// `user` refuses the pending request sent by `from`.
    pub async fn refuse(&self, user: Uuid, from: Uuid) -> PortResult<()> {
        self.friends.refuse_request(from, user).await?;
        info!("User {} refused the friend request of {}", user, from);
        Ok(())
    }

    /// The sender withdraws a request that is still pending.
    pub async fn cancel(&self, from: Uuid, to: Uuid) -> PortResult<()> {
        self.friends.cancel_request(from, to).await?;
        info!("User {} cancelled the friend request to {}", from, to);
        Ok(())
    }

    pub async fn remove_friend(&self, user: Uuid, friend: Uuid) -> PortResult<()> {
        if !self.friends.are_friends(user, friend).await? {
            return Err(PortError::NotFound(format!("{} is not a friend", friend)));
        }
        self.friends.remove_friendship(user, friend).await?;
        info!("Friendship between {} and {} removed", user, friend);

        for member in [user, friend] {
            match self.tracker.decrement_friends(member).await {
                Ok(_) => {}
                Err(PortError::InvalidState(e)) => {
                    warn!("Friend counter of {} not decremented: {}", member, e)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Pending requests other users sent to `user`.
    pub async fn incoming(&self, user: Uuid) -> PortResult<Vec<FriendRequest>> {
        Ok(self
            .friends
            .list_requests(user)
            .await?
            .into_iter()
            .filter(|r| r.to_user_id == user && r.status == FriendRequestStatus::Pending)
            .collect())
    }

    /// Pending requests `user` sent.
    pub async fn outgoing(&self, user: Uuid) -> PortResult<Vec<FriendRequest>> {
        Ok(self
            .friends
            .list_requests(user)
            .await?
            .into_iter()
            .filter(|r| r.from_user_id == user && r.status == FriendRequestStatus::Pending)
            .collect())
    }

    pub async fn list_friends(&self, user: Uuid) -> PortResult<Vec<UserProfile>> {
        let mut friends = Vec::new();
        for friend_id in self.friends.list_friends(user).await? {
            match self.profiles.get_profile(friend_id).await {
                Ok(profile) => friends.push(profile.public()),
                Err(PortError::NotFound(_)) => {
                    warn!("Friend {} of {} has no profile", friend_id, user)
                }
                Err(e) => return Err(e),
            }
        }
        friends.sort_by(|a, b| a.pseudo.cmp(&b.pseudo));
        Ok(friends)
    }

    /// Side effects of a new friendship, once `user` accepted `from`.
    async fn after_accept(&self, user: Uuid, from: Uuid, now: DateTime<Utc>) {
        for member in [user, from] {
            let count = match self.friends.list_friends(member).await {
                Ok(friends) => friends.len() as i64,
                Err(e) => {
                    warn!("Failed to count the friends of {}: {}", member, e);
                    continue;
                }
            };
            if let Err(e) = self
                .tracker
                .report(member, AchievementType::FriendsNumber, count)
                .await
            {
                warn!("Failed to update friend achievement of {}: {}", member, e);
            }
        }

        match (
            self.profiles.get_profile(user).await,
            self.profiles.get_profile(from).await,
        ) {
            (Ok(me), Ok(friend)) => {
                let activity = GardenActivity::new(
                    user,
                    &me.pseudo,
                    now,
                    ActivityKind::AddFriend {
                        friend_id: from,
                        friend_pseudo: friend.pseudo,
                    },
                );
                if let Err(e) = self.feed.record(activity).await {
                    warn!("Failed to record friendship activity for {}: {}", user, e);
                }
            }
            _ => warn!("Missing profile, friendship activity of {} skipped", user),
        }
    }
}
