//! SQLite-backed repository via libsql. Implements the question, announcement,
//! profile and stats ports.
//!
//! One database file (data/learn_assist.db). Timestamps are stored as Unix
//! milliseconds, tags as a JSON array, booleans as 0/1. Counters and `version`
//! are only ever changed with in-place `x = x + 1` updates so concurrent
//! writers cannot lose increments.

use crate::domain::{
    Announcement, Answer, DashboardStats, DomainError, Profile, Question, RecentActivity,
    VoteType,
};
use crate::ports::{AnnouncementRepoPort, ProfileRepoPort, QuestionRepoPort, StatsPort};
use chrono::{DateTime, Utc};
use libsql::params::{IntoParams, Params};
use libsql::{Connection, Database, Row, params};
use std::path::{Path, PathBuf};
use tracing::info;

const QUESTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    difficulty TEXT NOT NULL DEFAULT 'medium',
    tags_json TEXT NOT NULL DEFAULT '[]',
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    answer_count INTEGER NOT NULL DEFAULT 0,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)"#;
const QUESTIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_questions_created ON questions (created_at DESC)";

const ANSWERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS answers (
    id TEXT PRIMARY KEY,
    question_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
)"#;
const ANSWERS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_answers_question ON answers (question_id, created_at)";

const ANNOUNCEMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS announcements (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    target_audience TEXT NOT NULL DEFAULT 'all',
    is_pinned INTEGER NOT NULL DEFAULT 0,
    expires_at INTEGER,
    version INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)"#;

const PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    role TEXT NOT NULL DEFAULT 'student'
)"#;

const QUESTION_COLUMNS: &str = "id, user_id, title, content, subject, difficulty, tags_json, \
     upvotes, downvotes, answer_count, is_resolved, version, created_at, updated_at";
const ANNOUNCEMENT_COLUMNS: &str = "id, user_id, title, content, priority, target_audience, \
     is_pinned, expires_at, version, created_at, updated_at";

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5000;

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DomainError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| DomainError::Repo(format!("invalid timestamp {}", ms)))
}

/// SQLite repository. Safe to share via Arc; each call opens its own connection.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup.
    ///
    /// Sets WAL mode and synchronous=NORMAL for concurrent read/write.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join("learn_assist.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;

        let repo = Self { db, db_path };
        let conn = repo.conn().await?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        Self::pragma(&conn, "PRAGMA journal_mode=WAL").await?;
        Self::pragma(&conn, "PRAGMA synchronous=NORMAL").await?;

        for ddl in [
            QUESTIONS_TABLE,
            QUESTIONS_INDEX,
            ANSWERS_TABLE,
            ANSWERS_INDEX,
            ANNOUNCEMENTS_TABLE,
            PROFILES_TABLE,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %repo.db_path.display(), "SQLite connected with WAL mode");
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn pragma(conn: &Connection, sql: &str) -> Result<(), DomainError> {
        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| DomainError::Repo(format!("{} failed: {}", sql, e)))?;
        while rows.next().await.map_err(repo_err)?.is_some() {}
        Ok(())
    }

    /// New connection that waits instead of failing when another writer holds the lock.
    async fn conn(&self) -> Result<Connection, DomainError> {
        let conn = self.db.connect().map_err(repo_err)?;
        Self::pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS)).await?;
        Ok(conn)
    }

    async fn count(
        conn: &Connection,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<u64, DomainError> {
        let mut rows = conn.query(sql, params).await.map_err(repo_err)?;
        let n = match rows.next().await.map_err(repo_err)? {
            Some(row) => row.get::<i64>(0).map_err(repo_err)?,
            None => 0,
        };
        Ok(n.max(0) as u64)
    }

    fn row_to_question(row: &Row) -> Result<Question, DomainError> {
        let tags_json: String = row.get(6).map_err(repo_err)?;
        let difficulty: String = row.get(5).map_err(repo_err)?;
        Ok(Question {
            id: row.get(0).map_err(repo_err)?,
            user_id: row.get(1).map_err(repo_err)?,
            author: None,
            title: row.get(2).map_err(repo_err)?,
            content: row.get(3).map_err(repo_err)?,
            subject: row.get(4).map_err(repo_err)?,
            difficulty: difficulty.parse().map_err(DomainError::Repo)?,
            tags: serde_json::from_str(&tags_json)
                .map_err(|e| DomainError::Repo(format!("corrupt tags_json: {}", e)))?,
            upvotes: row.get(7).map_err(repo_err)?,
            downvotes: row.get(8).map_err(repo_err)?,
            answer_count: row.get(9).map_err(repo_err)?,
            is_resolved: row.get::<i64>(10).map_err(repo_err)? != 0,
            version: row.get(11).map_err(repo_err)?,
            created_at: from_millis(row.get(12).map_err(repo_err)?)?,
            updated_at: from_millis(row.get(13).map_err(repo_err)?)?,
        })
    }

    fn row_to_answer(row: &Row) -> Result<Answer, DomainError> {
        Ok(Answer {
            id: row.get(0).map_err(repo_err)?,
            question_id: row.get(1).map_err(repo_err)?,
            user_id: row.get(2).map_err(repo_err)?,
            content: row.get(3).map_err(repo_err)?,
            created_at: from_millis(row.get(4).map_err(repo_err)?)?,
        })
    }

    fn row_to_profile(row: &Row) -> Result<Profile, DomainError> {
        let role: String = row.get(2).map_err(repo_err)?;
        Ok(Profile {
            id: row.get(0).map_err(repo_err)?,
            display_name: row.get::<String>(1).ok(),
            role: role.parse().map_err(DomainError::Repo)?,
        })
    }

    fn row_to_announcement(row: &Row) -> Result<Announcement, DomainError> {
        let priority: String = row.get(4).map_err(repo_err)?;
        let audience: String = row.get(5).map_err(repo_err)?;
        let expires_at: Option<i64> = row.get(7).ok();
        Ok(Announcement {
            id: row.get(0).map_err(repo_err)?,
            user_id: row.get(1).map_err(repo_err)?,
            author: None,
            title: row.get(2).map_err(repo_err)?,
            content: row.get(3).map_err(repo_err)?,
            priority: priority.parse().map_err(DomainError::Repo)?,
            target_audience: audience.parse().map_err(DomainError::Repo)?,
            is_pinned: row.get::<i64>(6).map_err(repo_err)? != 0,
            expires_at: expires_at.map(from_millis).transpose()?,
            version: row.get(8).map_err(repo_err)?,
            created_at: from_millis(row.get(9).map_err(repo_err)?)?,
            updated_at: from_millis(row.get(10).map_err(repo_err)?)?,
        })
    }

    async fn fetch_question(
        conn: &Connection,
        id: &str,
    ) -> Result<Option<Question>, DomainError> {
        let sql = format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS);
        let mut rows = conn.query(&sql, params![id]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(Self::row_to_question(&row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_announcement(
        conn: &Connection,
        id: &str,
    ) -> Result<Option<Announcement>, DomainError> {
        let sql = format!(
            "SELECT {} FROM announcements WHERE id = ?1",
            ANNOUNCEMENT_COLUMNS
        );
        let mut rows = conn.query(&sql, params![id]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(Self::row_to_announcement(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl QuestionRepoPort for SqliteRepo {
    async fn insert_question(&self, q: &Question) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        let tags_json = serde_json::to_string(&q.tags).map_err(repo_err)?;
        conn.execute(
            r#"
            INSERT INTO questions (id, user_id, title, content, subject, difficulty, tags_json,
                upvotes, downvotes, answer_count, is_resolved, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                q.id.as_str(),
                q.user_id.as_str(),
                q.title.as_str(),
                q.content.as_str(),
                q.subject.as_str(),
                q.difficulty.as_str(),
                tags_json,
                q.upvotes,
                q.downvotes,
                q.answer_count,
                i64::from(q.is_resolved),
                q.version,
                to_millis(q.created_at),
                to_millis(q.updated_at)
            ],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>, DomainError> {
        let conn = self.conn().await?;
        Self::fetch_question(&conn, id).await
    }

    async fn list_questions(&self) -> Result<Vec<Question>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM questions ORDER BY created_at DESC",
            QUESTION_COLUMNS
        );
        let mut rows = conn.query(&sql, ()).await.map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Self::row_to_question(&row)?);
        }
        Ok(out)
    }

    async fn update_question(&self, q: &Question) -> Result<Option<Question>, DomainError> {
        let conn = self.conn().await?;
        let tags_json = serde_json::to_string(&q.tags).map_err(repo_err)?;
        let changed = conn
            .execute(
                r#"
                UPDATE questions SET
                    title = ?2, content = ?3, subject = ?4, difficulty = ?5, tags_json = ?6,
                    is_resolved = ?7, updated_at = ?8, version = version + 1
                WHERE id = ?1
                "#,
                params![
                    q.id.as_str(),
                    q.title.as_str(),
                    q.content.as_str(),
                    q.subject.as_str(),
                    q.difficulty.as_str(),
                    tags_json,
                    i64::from(q.is_resolved),
                    to_millis(q.updated_at)
                ],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch_question(&conn, &q.id).await
    }

    async fn delete_question(&self, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute("DELETE FROM answers WHERE question_id = ?1", params![id])
            .await
            .map_err(repo_err)?;
        let deleted = tx
            .execute("DELETE FROM questions WHERE id = ?1", params![id])
            .await
            .map_err(repo_err)?;
        tx.commit().await.map_err(repo_err)?;
        Ok(deleted > 0)
    }

    async fn record_vote(
        &self,
        id: &str,
        vote: VoteType,
    ) -> Result<Option<Question>, DomainError> {
        let conn = self.conn().await?;
        let sql = match vote {
            VoteType::Up => {
                "UPDATE questions SET upvotes = upvotes + 1, version = version + 1 WHERE id = ?1"
            }
            VoteType::Down => {
                "UPDATE questions SET downvotes = downvotes + 1, version = version + 1 WHERE id = ?1"
            }
        };
        let changed = conn.execute(sql, params![id]).await.map_err(repo_err)?;
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch_question(&conn, id).await
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<Option<Question>, DomainError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        let bumped = tx
            .execute(
                "UPDATE questions SET answer_count = answer_count + 1, version = version + 1 WHERE id = ?1",
                params![answer.question_id.as_str()],
            )
            .await
            .map_err(repo_err)?;
        if bumped == 0 {
            tx.rollback().await.map_err(repo_err)?;
            return Ok(None);
        }
        tx.execute(
            "INSERT INTO answers (id, question_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                answer.id.as_str(),
                answer.question_id.as_str(),
                answer.user_id.as_str(),
                answer.content.as_str(),
                to_millis(answer.created_at)
            ],
        )
        .await
        .map_err(repo_err)?;
        tx.commit().await.map_err(repo_err)?;
        Self::fetch_question(&conn, &answer.question_id).await
    }

    async fn list_answers(&self, question_id: &str) -> Result<Vec<Answer>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, question_id, user_id, content, created_at
                FROM answers
                WHERE question_id = ?1
                ORDER BY created_at ASC, rowid ASC
                "#,
                params![question_id],
            )
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Self::row_to_answer(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl AnnouncementRepoPort for SqliteRepo {
    async fn insert_announcement(&self, a: &Announcement) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO announcements (id, user_id, title, content, priority, target_audience,
                is_pinned, expires_at, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                a.id.as_str(),
                a.user_id.as_str(),
                a.title.as_str(),
                a.content.as_str(),
                a.priority.as_str(),
                a.target_audience.as_str(),
                i64::from(a.is_pinned),
                a.expires_at.map(to_millis),
                a.version,
                to_millis(a.created_at),
                to_millis(a.updated_at)
            ],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }

    async fn get_announcement(&self, id: &str) -> Result<Option<Announcement>, DomainError> {
        let conn = self.conn().await?;
        Self::fetch_announcement(&conn, id).await
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>, DomainError> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM announcements ORDER BY is_pinned DESC, created_at DESC",
            ANNOUNCEMENT_COLUMNS
        );
        let mut rows = conn.query(&sql, ()).await.map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Self::row_to_announcement(&row)?);
        }
        Ok(out)
    }

    async fn update_announcement(
        &self,
        a: &Announcement,
    ) -> Result<Option<Announcement>, DomainError> {
        let conn = self.conn().await?;
        let changed = conn
            .execute(
                r#"
                UPDATE announcements SET
                    title = ?2, content = ?3, priority = ?4, target_audience = ?5,
                    is_pinned = ?6, expires_at = ?7, updated_at = ?8, version = version + 1
                WHERE id = ?1
                "#,
                params![
                    a.id.as_str(),
                    a.title.as_str(),
                    a.content.as_str(),
                    a.priority.as_str(),
                    a.target_audience.as_str(),
                    i64::from(a.is_pinned),
                    a.expires_at.map(to_millis),
                    to_millis(a.updated_at)
                ],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch_announcement(&conn, &a.id).await
    }

    async fn delete_announcement(&self, id: &str) -> Result<bool, DomainError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM announcements WHERE id = ?1", params![id])
            .await
            .map_err(repo_err)?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl ProfileRepoPort for SqliteRepo {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DomainError> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, display_name, role FROM profiles WHERE id = ?1",
                params![user_id],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(Self::row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>, DomainError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn().await?;
        let placeholders = (1..=user_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, display_name, role FROM profiles WHERE id IN ({})",
            placeholders
        );
        let values: Vec<libsql::Value> = user_ids
            .iter()
            .map(|id| libsql::Value::Text(id.clone()))
            .collect();
        let mut rows = conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Self::row_to_profile(&row)?);
        }
        Ok(out)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), DomainError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO profiles (id, display_name, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role
            "#,
            params![
                profile.id.as_str(),
                profile.display_name.clone(),
                profile.role.as_str()
            ],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatsPort for SqliteRepo {
    async fn dashboard_stats(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<DashboardStats, DomainError> {
        let conn = self.conn().await?;
        let since = to_millis(since);
        Ok(DashboardStats {
            total_questions: Self::count(&conn, "SELECT COUNT(*) FROM questions", ()).await?,
            total_answers: Self::count(&conn, "SELECT COUNT(*) FROM answers", ()).await?,
            total_announcements: Self::count(&conn, "SELECT COUNT(*) FROM announcements", ())
                .await?,
            user_questions: Self::count(
                &conn,
                "SELECT COUNT(*) FROM questions WHERE user_id = ?1",
                params![user_id],
            )
            .await?,
            user_answers: Self::count(
                &conn,
                "SELECT COUNT(*) FROM answers WHERE user_id = ?1",
                params![user_id],
            )
            .await?,
            resolved_questions: Self::count(
                &conn,
                "SELECT COUNT(*) FROM questions WHERE is_resolved = 1",
                (),
            )
            .await?,
            recent_activity: RecentActivity {
                questions: Self::count(
                    &conn,
                    "SELECT COUNT(*) FROM questions WHERE created_at >= ?1",
                    params![since],
                )
                .await?,
                announcements: Self::count(
                    &conn,
                    "SELECT COUNT(*) FROM announcements WHERE created_at >= ?1",
                    params![since],
                )
                .await?,
            },
        })
    }
}
