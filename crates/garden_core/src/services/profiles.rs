//! crates/garden_core/src/services/profiles.rs
//!
//! Profile creation and editing.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Profile, UserProfile};
use crate::ports::{PortError, PortResult, ProfileRepository};

pub const MAX_PSEUDO_LENGTH: usize = 30;

/// Editable profile fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    pub first_name: String,
    pub last_name: String,
    pub pseudo: String,
    pub garden_name: String,
    pub avatar: Option<String>,
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    pub async fn create_profile(&self, user_id: Uuid, draft: ProfileDraft) -> PortResult<Profile> {
        let pseudo = self.validate_pseudo(Some(user_id), &draft.pseudo).await?;
        let profile = Profile {
            user_id,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            pseudo,
            garden_name: draft.garden_name.trim().to_string(),
            avatar: draft.avatar,
            fcm_token: None,
        };
        self.profiles.create_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.profiles.get_profile(user_id).await
    }

    /// What other users may see of `user_id`.
    pub async fn public_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        Ok(self.profiles.get_profile(user_id).await?.public())
    }

    pub async fn update_profile(&self, user_id: Uuid, draft: ProfileDraft) -> PortResult<Profile> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        profile.pseudo = self.validate_pseudo(Some(user_id), &draft.pseudo).await?;
        profile.first_name = draft.first_name.trim().to_string();
        profile.last_name = draft.last_name.trim().to_string();
        profile.garden_name = draft.garden_name.trim().to_string();
        profile.avatar = draft.avatar;
        self.profiles.update_profile(&profile).await?;
        Ok(profile)
    }

    /// Checks the pseudo of an account that is about to be created.
    pub async fn check_new_pseudo(&self, pseudo: &str) -> PortResult<()> {
        self.validate_pseudo(None, pseudo).await.map(|_| ())
    }

    pub async fn find_by_pseudo(&self, pseudo: &str) -> PortResult<UserProfile> {
        self.profiles
            .find_by_pseudo(pseudo.trim())
            .await?
            .map(|profile| profile.public())
            .ok_or_else(|| PortError::NotFound(format!("No user with pseudo '{}'", pseudo.trim())))
    }

    pub async fn register_fcm_token(&self, user_id: Uuid, token: &str) -> PortResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PortError::InvalidArgument("FCM token must not be empty".to_string()));
        }
        self.profiles.set_fcm_token(user_id, Some(token)).await
    }

    async fn validate_pseudo(&self, user_id: Option<Uuid>, pseudo: &str) -> PortResult<String> {
        let pseudo = pseudo.trim();
        if pseudo.is_empty() {
            return Err(PortError::InvalidArgument("Pseudo must not be blank".to_string()));
        }
        if pseudo.chars().count() > MAX_PSEUDO_LENGTH {
            return Err(PortError::InvalidArgument(format!(
                "Pseudo must be at most {} characters",
                MAX_PSEUDO_LENGTH
            )));
        }
        match self.profiles.find_by_pseudo(pseudo).await? {
            Some(other) if Some(other.user_id) != user_id => Err(PortError::InvalidState(format!(
                "Pseudo '{}' is already taken",
                pseudo
            ))),
            _ => Ok(pseudo.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn draft(pseudo: &str) -> ProfileDraft {
        ProfileDraft {
            first_name: " Ada ".to_string(),
            last_name: "Green".to_string(),
            pseudo: pseudo.to_string(),
            garden_name: "Jungle".to_string(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn create_trims_and_projects_publicly() {
        let service = ProfileService::new(Arc::new(InMemoryStore::new()));
        let user = Uuid::new_v4();

        let profile = service.create_profile(user, draft("  ada  ")).await.unwrap();
        assert_eq!(profile.pseudo, "ada");
        assert_eq!(profile.first_name, "Ada");

        let public = service.public_profile(user).await.unwrap();
        assert_eq!(public.pseudo, "ada");
        assert_eq!(public.user_id, user);
    }

    #[tokio::test]
    async fn pseudo_must_be_present_and_unique() {
        let service = ProfileService::new(Arc::new(InMemoryStore::new()));
        let (ada, bob) = (Uuid::new_v4(), Uuid::new_v4());
        service.create_profile(ada, draft("ada")).await.unwrap();

        assert!(matches!(
            service.create_profile(bob, draft("   ")).await,
            Err(PortError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.create_profile(bob, draft("ada")).await,
            Err(PortError::InvalidState(_))
        ));
        // Keeping one's own pseudo on update is fine.
        assert!(service.update_profile(ada, draft("ada")).await.is_ok());

        assert!(service.check_new_pseudo("ada").await.is_err());
        assert!(service.check_new_pseudo("bob").await.is_ok());
        assert_eq!(service.find_by_pseudo(" ada ").await.unwrap().user_id, ada);
        assert!(matches!(
            service.find_by_pseudo("nobody").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fcm_token_registration() {
        let service = ProfileService::new(Arc::new(InMemoryStore::new()));
        let user = Uuid::new_v4();
        service.create_profile(user, draft("ada")).await.unwrap();

        assert!(service.register_fcm_token(user, " ").await.is_err());
        service.register_fcm_token(user, "token-1").await.unwrap();
        assert_eq!(
            service.get_profile(user).await.unwrap().fcm_token.as_deref(),
            Some("token-1")
        );
    }
}
