//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Announcement, Answer, CompletionRequest, DashboardStats, DomainError, Profile, Question,
    VoteType,
};
use chrono::{DateTime, Utc};

/// External chat-completion provider.
#[async_trait::async_trait]
pub trait ChatCompletionPort: Send + Sync {
    /// Send one chat request and return the generated text of the first choice.
    ///
    /// Any failure to obtain that text (missing credential, transport error,
    /// non-success status, malformed envelope, timeout) is an `Err`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError>;
}

/// Question and answer storage.
#[async_trait::async_trait]
pub trait QuestionRepoPort: Send + Sync {
    async fn insert_question(&self, question: &Question) -> Result<(), DomainError>;

    async fn get_question(&self, id: &str) -> Result<Option<Question>, DomainError>;

    /// All questions, newest first.
    async fn list_questions(&self) -> Result<Vec<Question>, DomainError>;

    /// Overwrite editable fields. Storage bumps `version`; returns the stored row.
    async fn update_question(&self, question: &Question) -> Result<Option<Question>, DomainError>;

    /// Delete a question and its answers. Returns false when it did not exist.
    async fn delete_question(&self, id: &str) -> Result<bool, DomainError>;

    /// Atomically increment the up- or down-vote counter. `None` if the question is gone.
    async fn record_vote(&self, id: &str, vote: VoteType)
    -> Result<Option<Question>, DomainError>;

    /// Insert an answer and atomically bump the parent's `answer_count`.
    /// Returns the updated parent, or `None` if it does not exist.
    async fn insert_answer(&self, answer: &Answer) -> Result<Option<Question>, DomainError>;

    /// Answers to a question, oldest first.
    async fn list_answers(&self, question_id: &str) -> Result<Vec<Answer>, DomainError>;
}

/// Announcement storage.
#[async_trait::async_trait]
pub trait AnnouncementRepoPort: Send + Sync {
    async fn insert_announcement(&self, announcement: &Announcement) -> Result<(), DomainError>;

    async fn get_announcement(&self, id: &str) -> Result<Option<Announcement>, DomainError>;

    /// All announcements including expired ones.
    async fn list_announcements(&self) -> Result<Vec<Announcement>, DomainError>;

    async fn update_announcement(
        &self,
        announcement: &Announcement,
    ) -> Result<Option<Announcement>, DomainError>;

    async fn delete_announcement(&self, id: &str) -> Result<bool, DomainError>;
}

/// User profiles (display name and role).
#[async_trait::async_trait]
pub trait ProfileRepoPort: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DomainError>;

    /// Stored profiles among `user_ids`. Ids without a profile are skipped.
    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>, DomainError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DomainError>;
}

/// Aggregate counts for the dashboard.
#[async_trait::async_trait]
pub trait StatsPort: Send + Sync {
    /// Totals plus per-user counts and activity created at or after `since`.
    async fn dashboard_stats(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<DashboardStats, DomainError>;
}
