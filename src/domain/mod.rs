//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod query;

pub use entities::{
    Announcement, AnnouncementUpdate, Answer, Audience, Author, Authored, ChatMessage,
    CompletionRequest, DashboardStats, Difficulty, EnhancementRequest, EnhancementResult,
    NewAnnouncement, NewQuestion, Priority, Profile, Question, QuestionUpdate, RecentActivity,
    Role, StudyAssistantRequest, StudyAssistantResult, VoteType,
};
pub use errors::DomainError;
pub use query::{QuestionQuery, SortOrder, normalize_tags};
