//! Application use cases. Orchestrate domain logic via ports.

pub mod announcement_service;
pub mod assistant_service;
pub mod dashboard_service;
pub mod live;
pub mod normalizer;
pub mod profile_service;
pub mod question_service;

pub use announcement_service::AnnouncementService;
pub use assistant_service::{AssistantOutcome, AssistantService};
pub use dashboard_service::DashboardService;
pub use live::{ChangeEvent, ChangeFeed, ChangeKind, LiveCollection, Table};
pub use profile_service::ProfileService;
pub use question_service::QuestionService;
