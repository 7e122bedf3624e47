//! Question use case. Creation, editing, voting, answers and filtered listing.
//!
//! Reads are served from a live cache primed at startup; every committed write
//! is applied to the cache and published on the change feed.

use crate::domain::{
    Answer, DomainError, NewQuestion, Profile, Question, QuestionQuery, QuestionUpdate, Role,
    VoteType, normalize_tags,
};
use crate::ports::QuestionRepoPort;
use crate::usecases::live::{ChangeEvent, ChangeFeed, ChangeKind, LiveCollection, Table};
use crate::usecases::profile_service::ProfileService;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

fn newest_first(a: &Question, b: &Question) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at)
}

pub struct QuestionService {
    repo: Arc<dyn QuestionRepoPort>,
    profiles: Arc<ProfileService>,
    feed: ChangeFeed,
    cache: LiveCollection<Question>,
}

impl QuestionService {
    pub fn new(
        repo: Arc<dyn QuestionRepoPort>,
        profiles: Arc<ProfileService>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            repo,
            profiles,
            feed,
            cache: LiveCollection::new(newest_first),
        }
    }

    /// Load every question into the cache. Call once at startup.
    pub async fn warm(&self) -> Result<usize, DomainError> {
        let all = self.repo.list_questions().await?;
        let count = all.len();
        self.cache.replace_all(all).await;
        info!(count, "question cache warmed");
        Ok(count)
    }

    pub async fn create(&self, user_id: &str, new: NewQuestion) -> Result<Question, DomainError> {
        let title = required(&new.title, "title")?;
        let content = required(&new.content, "content")?;
        let now = Utc::now();

        let question = Question {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            author: None,
            title,
            content,
            subject: new.subject.trim().to_string(),
            difficulty: new.difficulty,
            tags: normalize_tags(new.tags),
            upvotes: 0,
            downvotes: 0,
            answer_count: 0,
            is_resolved: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert_question(&question).await?;
        info!(question_id = %question.id, user_id, "question created");
        let question = self.profiles.attach_author(question).await?;
        self.commit(question.clone(), ChangeKind::Insert).await;
        Ok(question)
    }

    /// One question with its author.
    pub async fn get(&self, id: &str) -> Result<Question, DomainError> {
        let question = self.load(id).await?;
        self.profiles.attach_author(question).await
    }

    pub async fn list(&self, query: &QuestionQuery) -> Result<Vec<Question>, DomainError> {
        let rows = query.apply(self.cache.snapshot().await);
        self.profiles.attach_authors(rows).await
    }

    async fn load(&self, id: &str) -> Result<Question, DomainError> {
        if let Some(q) = self.cache.get(id).await {
            return Ok(q);
        }
        self.repo
            .get_question(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("question {}", id)))
    }

    /// Edit a question. Owner or admin only; counters are never touched here.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        update: QuestionUpdate,
    ) -> Result<Question, DomainError> {
        let mut question = self.load(id).await?;
        let caller = self.profiles.resolve(user_id).await?;
        ensure_owner_or_admin(&caller, &question.user_id)?;

        if let Some(title) = update.title {
            question.title = required(&title, "title")?;
        }
        if let Some(content) = update.content {
            question.content = required(&content, "content")?;
        }
        if let Some(subject) = update.subject {
            question.subject = subject.trim().to_string();
        }
        if let Some(difficulty) = update.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(tags) = update.tags {
            question.tags = normalize_tags(tags);
        }
        if let Some(resolved) = update.is_resolved {
            question.is_resolved = resolved;
        }
        question.updated_at = Utc::now();

        let stored = self
            .repo
            .update_question(&question)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("question {}", id)))?;
        info!(question_id = %id, version = stored.version, "question updated");
        let stored = self.profiles.attach_author(stored).await?;
        self.commit(stored.clone(), ChangeKind::Update).await;
        Ok(stored)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), DomainError> {
        let question = self.load(id).await?;
        let caller = self.profiles.resolve(user_id).await?;
        ensure_owner_or_admin(&caller, &question.user_id)?;

        if !self.repo.delete_question(id).await? {
            return Err(DomainError::NotFound(format!("question {}", id)));
        }
        self.cache.remove(id).await;
        self.feed.publish(ChangeEvent::deleted(Table::Questions, id));
        info!(question_id = %id, user_id, "question deleted");
        Ok(())
    }

    /// Count one vote. The increment happens in storage, so concurrent votes are not lost.
    pub async fn vote(&self, id: &str, vote: VoteType) -> Result<Question, DomainError> {
        let stored = self
            .repo
            .record_vote(id, vote)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("question {}", id)))?;
        let stored = self.profiles.attach_author(stored).await?;
        self.commit(stored.clone(), ChangeKind::Update).await;
        Ok(stored)
    }

    pub async fn answer(
        &self,
        user_id: &str,
        question_id: &str,
        content: &str,
    ) -> Result<Answer, DomainError> {
        let answer = Answer {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            user_id: user_id.to_string(),
            content: required(content, "content")?,
            created_at: Utc::now(),
        };

        let parent = self
            .repo
            .insert_answer(&answer)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("question {}", question_id)))?;
        info!(question_id, answer_id = %answer.id, "answer posted");

        self.feed.publish(ChangeEvent::row(
            Table::Answers,
            ChangeKind::Insert,
            &answer.id,
            &answer,
        ));
        self.commit(parent, ChangeKind::Update).await;
        Ok(answer)
    }

    pub async fn answers(&self, question_id: &str) -> Result<Vec<Answer>, DomainError> {
        self.load(question_id).await?;
        self.repo.list_answers(question_id).await
    }

    async fn commit(&self, question: Question, kind: ChangeKind) {
        let event = ChangeEvent::row(Table::Questions, kind, &question.id, &question);
        self.cache.upsert(question).await;
        self.feed.publish(event);
    }
}

pub(crate) fn required(value: &str, field: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn ensure_owner_or_admin(caller: &Profile, owner_id: &str) -> Result<(), DomainError> {
    if caller.id == owner_id || caller.role == Role::Admin {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "only the author or an admin can modify this".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteRepo;
    use crate::domain::{Difficulty, SortOrder};

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: Arc<SqliteRepo>,
        feed: ChangeFeed,
        questions: Arc<QuestionService>,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepo::connect(dir.path()).await.unwrap());
        let feed = ChangeFeed::new(64);
        let profiles = Arc::new(ProfileService::new(repo.clone(), feed.clone()));
        profiles.seed_admins(&["admin".to_string()]).await.unwrap();
        let questions = Arc::new(QuestionService::new(repo.clone(), profiles, feed.clone()));
        Fixture {
            _dir: dir,
            repo,
            feed,
            questions,
        }
    }

    fn new_question(title: &str) -> NewQuestion {
        NewQuestion {
            title: title.to_string(),
            content: "Body text".to_string(),
            subject: " Math ".to_string(),
            difficulty: Difficulty::Hard,
            tags: vec!["Calculus".into(), "calculus".into(), " ".into()],
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_publishes() {
        let f = fixture().await;
        let mut rx = f.feed.subscribe();

        let q = f.questions.create("alice", new_question("  Limits  ")).await.unwrap();

        assert_eq!(q.title, "Limits");
        assert_eq!(q.subject, "Math");
        assert_eq!(q.tags, vec!["Calculus"]);
        assert_eq!(q.version, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.id, q.id);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let f = fixture().await;
        let err = f.questions.create("alice", new_question("   ")).await;
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_votes_are_not_lost() {
        let f = fixture().await;
        let q = f.questions.create("alice", new_question("Votes")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let questions = f.questions.clone();
            let id = q.id.clone();
            handles.push(tokio::spawn(async move {
                questions.vote(&id, VoteType::Up).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        f.questions.vote(&q.id, VoteType::Down).await.unwrap();

        let stored = f.repo.get_question(&q.id).await.unwrap().unwrap();
        assert_eq!(stored.upvotes, 20);
        assert_eq!(stored.downvotes, 1);
        let cached = f.questions.get(&q.id).await.unwrap();
        assert_eq!(cached.upvotes, 20);
        assert_eq!(cached.version, stored.version);
    }

    #[tokio::test]
    async fn test_update_requires_owner_or_admin() {
        let f = fixture().await;
        let q = f.questions.create("alice", new_question("Mine")).await.unwrap();

        let denied = f
            .questions
            .update("bob", &q.id, QuestionUpdate::default())
            .await;
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));

        let resolved = f
            .questions
            .update(
                "admin",
                &q.id,
                QuestionUpdate {
                    is_resolved: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.version, 2);
    }

    #[tokio::test]
    async fn test_answers_bump_count_and_unanswered_filter() {
        let f = fixture().await;
        let answered = f.questions.create("alice", new_question("A")).await.unwrap();
        let open = f.questions.create("alice", new_question("B")).await.unwrap();

        f.questions.answer("bob", &answered.id, "Use substitution.").await.unwrap();
        f.questions.answer("carol", &answered.id, "Or parts.").await.unwrap();

        let answers = f.questions.answers(&answered.id).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].content, "Use substitution.");
        assert_eq!(f.questions.get(&answered.id).await.unwrap().answer_count, 2);

        let unanswered = f
            .questions
            .list(&QuestionQuery {
                sort: SortOrder::Unanswered,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unanswered.len(), 1);
        assert_eq!(unanswered[0].id, open.id);
    }

    #[tokio::test]
    async fn test_answer_to_missing_question_is_not_found() {
        let f = fixture().await;
        let err = f.questions.answer("bob", "missing", "hello").await;
        assert!(matches!(err, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_from_cache_and_storage() {
        let f = fixture().await;
        let q = f.questions.create("alice", new_question("Gone")).await.unwrap();
        f.questions.answer("bob", &q.id, "reply").await.unwrap();

        assert!(matches!(
            f.questions.delete("bob", &q.id).await,
            Err(DomainError::Forbidden(_))
        ));
        f.questions.delete("alice", &q.id).await.unwrap();

        assert!(
            f.questions
                .list(&QuestionQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(f.repo.get_question(&q.id).await.unwrap().is_none());
        assert!(f.repo.list_answers(&q.id).await.unwrap().is_empty());
        assert!(matches!(
            f.questions.vote(&q.id, VoteType::Up).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_carry_current_author_profile() {
        let f = fixture().await;
        let q = f.questions.create("alice", new_question("Who?")).await.unwrap();
        assert_eq!(q.author.as_ref().unwrap().role, Role::Student);

        f.questions
            .profiles
            .update_display_name("alice", Some("Alice".into()))
            .await
            .unwrap();

        let listed = f.questions.list(&QuestionQuery::default()).await.unwrap();
        let author = listed[0].author.clone().unwrap();
        assert_eq!(author.display_name.as_deref(), Some("Alice"));
        assert_eq!(author.role, Role::Student);

        let one = f.questions.get(&q.id).await.unwrap();
        assert_eq!(one.author, listed[0].author);
    }

    #[tokio::test]
    async fn test_warm_loads_existing_rows() {
        let f = fixture().await;
        f.questions.create("alice", new_question("One")).await.unwrap();

        let profiles = Arc::new(ProfileService::new(f.repo.clone(), f.feed.clone()));
        let fresh = QuestionService::new(f.repo.clone(), profiles, f.feed.clone());
        assert_eq!(fresh.warm().await.unwrap(), 1);
        assert_eq!(fresh.list(&QuestionQuery::default()).await.unwrap().len(), 1);
    }
}
