//! Announcement use case. Instructors and admins publish; everyone reads the active set.

use crate::domain::{Announcement, AnnouncementUpdate, DomainError, NewAnnouncement};
use crate::ports::AnnouncementRepoPort;
use crate::usecases::live::{ChangeEvent, ChangeFeed, ChangeKind, LiveCollection, Table};
use crate::usecases::profile_service::ProfileService;
use crate::usecases::question_service::{ensure_owner_or_admin, required};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Pinned first, then newest.
fn pinned_then_newest(a: &Announcement, b: &Announcement) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepoPort>,
    profiles: Arc<ProfileService>,
    feed: ChangeFeed,
    cache: LiveCollection<Announcement>,
}

impl AnnouncementService {
    pub fn new(
        repo: Arc<dyn AnnouncementRepoPort>,
        profiles: Arc<ProfileService>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            repo,
            profiles,
            feed,
            cache: LiveCollection::new(pinned_then_newest),
        }
    }

    pub async fn warm(&self) -> Result<usize, DomainError> {
        let all = self.repo.list_announcements().await?;
        let count = all.len();
        self.cache.replace_all(all).await;
        info!(count, "announcement cache warmed");
        Ok(count)
    }

    pub async fn create(
        &self,
        user_id: &str,
        new: NewAnnouncement,
    ) -> Result<Announcement, DomainError> {
        let caller = self.profiles.resolve(user_id).await?;
        if !caller.role.can_announce() {
            return Err(DomainError::Forbidden(
                "only instructors and admins can post announcements".to_string(),
            ));
        }
        let now = Utc::now();
        let announcement = Announcement {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            author: None,
            title: required(&new.title, "title")?,
            content: required(&new.content, "content")?,
            priority: new.priority,
            target_audience: new.target_audience,
            is_pinned: new.is_pinned,
            expires_at: new.expires_at,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert_announcement(&announcement).await?;
        info!(
            announcement_id = %announcement.id,
            user_id,
            priority = announcement.priority.as_str(),
            "announcement posted"
        );
        let announcement = self.profiles.attach_author(announcement).await?;
        self.commit(announcement.clone(), ChangeKind::Insert).await;
        Ok(announcement)
    }

    /// Announcements that have not expired at `now`, pinned first then newest.
    pub async fn list_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Announcement>, DomainError> {
        let active = self
            .cache
            .snapshot()
            .await
            .into_iter()
            .filter(|a| a.is_active(now))
            .collect();
        self.profiles.attach_authors(active).await
    }

    pub async fn get(&self, id: &str) -> Result<Announcement, DomainError> {
        let announcement = self.load(id).await?;
        self.profiles.attach_author(announcement).await
    }

    async fn load(&self, id: &str) -> Result<Announcement, DomainError> {
        if let Some(a) = self.cache.get(id).await {
            return Ok(a);
        }
        self.repo
            .get_announcement(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("announcement {}", id)))
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        update: AnnouncementUpdate,
    ) -> Result<Announcement, DomainError> {
        let mut announcement = self.load(id).await?;
        let caller = self.profiles.resolve(user_id).await?;
        ensure_owner_or_admin(&caller, &announcement.user_id)?;

        if let Some(title) = update.title {
            announcement.title = required(&title, "title")?;
        }
        if let Some(content) = update.content {
            announcement.content = required(&content, "content")?;
        }
        if let Some(priority) = update.priority {
            announcement.priority = priority;
        }
        if let Some(audience) = update.target_audience {
            announcement.target_audience = audience;
        }
        if let Some(pinned) = update.is_pinned {
            announcement.is_pinned = pinned;
        }
        if let Some(expires_at) = update.expires_at {
            announcement.expires_at = expires_at;
        }
        announcement.updated_at = Utc::now();

        let stored = self
            .repo
            .update_announcement(&announcement)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("announcement {}", id)))?;
        let stored = self.profiles.attach_author(stored).await?;
        self.commit(stored.clone(), ChangeKind::Update).await;
        Ok(stored)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), DomainError> {
        let announcement = self.load(id).await?;
        let caller = self.profiles.resolve(user_id).await?;
        ensure_owner_or_admin(&caller, &announcement.user_id)?;

        if !self.repo.delete_announcement(id).await? {
            return Err(DomainError::NotFound(format!("announcement {}", id)));
        }
        self.cache.remove(id).await;
        self.feed.publish(ChangeEvent::deleted(Table::Announcements, id));
        info!(announcement_id = %id, user_id, "announcement deleted");
        Ok(())
    }

    async fn commit(&self, announcement: Announcement, kind: ChangeKind) {
        let event = ChangeEvent::row(Table::Announcements, kind, &announcement.id, &announcement);
        self.cache.upsert(announcement).await;
        self.feed.publish(event);
    }
}
