//! Dashboard statistics for the signed-in user.

use crate::domain::{DashboardStats, DomainError};
use crate::ports::StatsPort;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Window counted as "recent activity".
pub const RECENT_WINDOW_DAYS: i64 = 7;

pub struct DashboardService {
    stats: Arc<dyn StatsPort>,
}

impl DashboardService {
    pub fn new(stats: Arc<dyn StatsPort>) -> Self {
        Self { stats }
    }

    pub async fn stats_for(&self, user_id: &str) -> Result<DashboardStats, DomainError> {
        let since = Utc::now() - Duration::days(RECENT_WINDOW_DAYS);
        self.stats.dashboard_stats(user_id, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteRepo;
    use crate::domain::{Difficulty, NewQuestion};
    use crate::usecases::{ChangeFeed, ProfileService, QuestionService};

    #[tokio::test]
    async fn test_stats_reflect_user_activity() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepo::connect(dir.path()).await.unwrap());
        let feed = ChangeFeed::new(16);
        let profiles = Arc::new(ProfileService::new(repo.clone(), feed.clone()));
        let questions = QuestionService::new(repo.clone(), profiles, feed);
        let dashboard = DashboardService::new(repo);

        let q = questions
            .create(
                "alice",
                NewQuestion {
                    title: "Why?".into(),
                    content: "Because.".into(),
                    subject: String::new(),
                    difficulty: Difficulty::Easy,
                    tags: Vec::new(),
                },
            )
            .await
            .unwrap();
        questions.answer("bob", &q.id, "Indeed.").await.unwrap();

        let alice = dashboard.stats_for("alice").await.unwrap();
        assert_eq!(alice.total_questions, 1);
        assert_eq!(alice.total_answers, 1);
        assert_eq!(alice.user_questions, 1);
        assert_eq!(alice.user_answers, 0);
        assert_eq!(alice.recent_activity.questions, 1);

        let bob = dashboard.stats_for("bob").await.unwrap();
        assert_eq!(bob.user_questions, 0);
        assert_eq!(bob.user_answers, 1);
    }
}
