//! HTTP adapter. axum router exposing the use cases.

pub mod ai;
pub mod announcements;
pub mod error;
pub mod identity;
pub mod profiles;
pub mod questions;
pub mod realtime;

use crate::domain::DomainError;
use crate::ports::{
    AnnouncementRepoPort, ChatCompletionPort, ProfileRepoPort, QuestionRepoPort, StatsPort,
};
use crate::usecases::{
    AnnouncementService, AssistantService, ChangeFeed, DashboardService, ProfileService,
    QuestionService,
};
use axum::{
    Json, Router,
    http::{HeaderName, header},
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::AppError;
pub use identity::{Identity, USER_ID_HEADER};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<AssistantService>,
    pub questions: Arc<QuestionService>,
    pub announcements: Arc<AnnouncementService>,
    pub profiles: Arc<ProfileService>,
    pub dashboard: Arc<DashboardService>,
    pub feed: ChangeFeed,
}

impl AppState {
    /// Wire every service over one storage backend and one chat provider.
    pub fn new<R>(chat: Arc<dyn ChatCompletionPort>, repo: Arc<R>, feed: ChangeFeed) -> Self
    where
        R: QuestionRepoPort + AnnouncementRepoPort + ProfileRepoPort + StatsPort + 'static,
    {
        let profiles = Arc::new(ProfileService::new(repo.clone(), feed.clone()));
        Self {
            assistant: Arc::new(AssistantService::new(chat)),
            questions: Arc::new(QuestionService::new(
                repo.clone(),
                profiles.clone(),
                feed.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(
                repo.clone(),
                profiles.clone(),
                feed.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(repo)),
            profiles,
            feed,
        }
    }

    /// Prime the live caches from storage.
    pub async fn warm(&self) -> Result<(), DomainError> {
        let questions = self.questions.warm().await?;
        let announcements = self.announcements.warm().await?;
        info!(questions, announcements, "caches ready");
        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// Any origin; preflight requests are answered by the layer itself.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static(USER_ID_HEADER),
        ])
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ai-question-enhancer", post(ai::question_enhancer))
        .route("/ai-study-assistant", post(ai::study_assistant))
        .route("/questions", get(questions::list).post(questions::create))
        .route(
            "/questions/{id}",
            get(questions::get_one)
                .patch(questions::update)
                .delete(questions::delete),
        )
        .route("/questions/{id}/vote", post(questions::vote))
        .route(
            "/questions/{id}/answers",
            get(questions::list_answers).post(questions::post_answer),
        )
        .route(
            "/announcements",
            get(announcements::list_active).post(announcements::create),
        )
        .route(
            "/announcements/{id}",
            patch(announcements::update).delete(announcements::delete),
        )
        .route("/dashboard", get(profiles::dashboard))
        .route("/profiles/me", get(profiles::get_me).put(profiles::update_me))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/profiles/{id}/role", put(profiles::set_role))
        .route("/realtime", get(realtime::stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
