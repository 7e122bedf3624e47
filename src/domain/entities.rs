//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; adapters map into and out of these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Question difficulty as chosen by the asker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    /// Instructors and admins may publish announcements.
    pub fn can_announce(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Who an announcement is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    All,
    Students,
    Instructors,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Students => "students",
            Audience::Instructors => "instructors",
        }
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Audience::All),
            "students" => Ok(Audience::Students),
            "instructors" => Ok(Audience::Instructors),
            other => Err(format!("unknown audience '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

// ─────────────────────────────────────────────────────────────────────────────
// AI assistant
// ─────────────────────────────────────────────────────────────────────────────

/// A student's question to be reviewed by the enhancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementRequest {
    pub question_text: String,
    pub subject: String,
    pub difficulty: Difficulty,
}

/// Enhancer output. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementResult {
    pub analysis: String,
    pub suggestions: Vec<String>,
    pub improved_question: String,
    pub additional_tips: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyAssistantRequest {
    pub question: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyAssistantResult {
    pub response: String,
}

/// One role-tagged message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Provider-agnostic chat-completion call. The model id is adapter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Questions & answers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub user_id: String,
    /// Poster's public profile. Filled on read, never stored with the row.
    #[serde(default)]
    pub author: Option<Author>,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub answer_count: i64,
    pub is_resolved: bool,
    /// Monotonic row revision. Bumped by every storage-side mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub tags: Option<Vec<String>>,
    pub is_resolved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Announcements
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub author: Option<Author>,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub target_audience: Audience,
    pub is_pinned: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub target_audience: Audience,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub target_audience: Option<Audience>,
    pub is_pinned: Option<bool>,
    /// `Some(None)` clears the expiry.
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(de).map(Some)
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles & dashboard
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl Profile {
    /// Profile assumed for a user who never saved one.
    pub fn default_for(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            display_name: None,
            role: Role::Student,
        }
    }
}

/// Public part of a poster's profile, shown next to their posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub display_name: Option<String>,
    pub role: Role,
}

impl From<&Profile> for Author {
    fn from(p: &Profile) -> Self {
        Self {
            display_name: p.display_name.clone(),
            role: p.role,
        }
    }
}

/// Rows that carry their poster's profile.
pub trait Authored {
    fn author_id(&self) -> &str;
    fn set_author(&mut self, author: Author);
}

impl Authored for Question {
    fn author_id(&self) -> &str {
        &self.user_id
    }

    fn set_author(&mut self, author: Author) {
        self.author = Some(author);
    }
}

impl Authored for Announcement {
    fn author_id(&self) -> &str {
        &self.user_id
    }

    fn set_author(&mut self, author: Author) {
        self.author = Some(author);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_questions: u64,
    pub total_answers: u64,
    pub total_announcements: u64,
    pub user_questions: u64,
    pub user_answers: u64,
    pub resolved_questions: u64,
    pub recent_activity: RecentActivity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub questions: u64,
    pub announcements: u64,
}
