//! Profile use case. Resolves roles for permission checks and manages display names.

use crate::domain::{Author, Authored, DomainError, Profile, Role};
use crate::ports::ProfileRepoPort;
use crate::usecases::live::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct ProfileService {
    repo: Arc<dyn ProfileRepoPort>,
    feed: ChangeFeed,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepoPort>, feed: ChangeFeed) -> Self {
        Self { repo, feed }
    }

    /// Stored profile, or a student profile for users who never saved one.
    pub async fn resolve(&self, user_id: &str) -> Result<Profile, DomainError> {
        Ok(self
            .repo
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::default_for(user_id)))
    }

    /// Attach each row's poster profile, with one storage lookup for the whole batch.
    pub async fn attach_authors<T: Authored>(
        &self,
        mut items: Vec<T>,
    ) -> Result<Vec<T>, DomainError> {
        let mut ids: Vec<String> = items.iter().map(|i| i.author_id().to_string()).collect();
        ids.sort();
        ids.dedup();
        let known: HashMap<String, Author> = self
            .repo
            .get_profiles(&ids)
            .await?
            .iter()
            .map(|p| (p.id.clone(), Author::from(p)))
            .collect();

        for item in &mut items {
            let author = known
                .get(item.author_id())
                .cloned()
                .unwrap_or_else(|| Author::from(&Profile::default_for(item.author_id())));
            item.set_author(author);
        }
        Ok(items)
    }

    pub async fn attach_author<T: Authored>(&self, mut item: T) -> Result<T, DomainError> {
        let profile = self.resolve(item.author_id()).await?;
        item.set_author(Author::from(&profile));
        Ok(item)
    }

    /// Set or clear the caller's display name. Role is left untouched.
    pub async fn update_display_name(
        &self,
        user_id: &str,
        display_name: Option<String>,
    ) -> Result<Profile, DomainError> {
        let mut profile = self.resolve(user_id).await?;
        profile.display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.save(&profile, ChangeKind::Update).await?;
        Ok(profile)
    }

    /// Change another user's role. Only admins may do this.
    pub async fn set_role(
        &self,
        caller_id: &str,
        target_id: &str,
        role: Role,
    ) -> Result<Profile, DomainError> {
        let caller = self.resolve(caller_id).await?;
        if caller.role != Role::Admin {
            return Err(DomainError::Forbidden(
                "only admins can change roles".to_string(),
            ));
        }
        let mut profile = self.resolve(target_id).await?;
        profile.role = role;
        self.save(&profile, ChangeKind::Update).await?;
        info!(caller = %caller_id, target = %target_id, role = role.as_str(), "role changed");
        Ok(profile)
    }

    /// Make sure every configured admin id has the admin role.
    pub async fn seed_admins(&self, ids: &[String]) -> Result<(), DomainError> {
        for id in ids {
            let mut profile = self.resolve(id).await?;
            if profile.role != Role::Admin {
                profile.role = Role::Admin;
                self.repo.upsert_profile(&profile).await?;
                info!(user_id = %id, "seeded admin profile");
            }
        }
        Ok(())
    }

    async fn save(&self, profile: &Profile, kind: ChangeKind) -> Result<(), DomainError> {
        self.repo.upsert_profile(profile).await?;
        self.feed
            .publish(ChangeEvent::row(Table::Profiles, kind, &profile.id, profile));
        Ok(())
    }
}
