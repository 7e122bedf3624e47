//! Port traits. API boundaries for the hexagon.
//!
//! Outbound: called by the application into infrastructure (LLM provider, storage).
//! The inbound side is the HTTP adapter calling use-case services directly.

pub mod outbound;

pub use outbound::{
    AnnouncementRepoPort, ChatCompletionPort, ProfileRepoPort, QuestionRepoPort, StatsPort,
};
