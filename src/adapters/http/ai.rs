//! AI assistant endpoints. Every response carries the full result shape;
//! failures add an `error` field and a non-2xx status.

use super::AppState;
use crate::usecases::assistant_service::{self, AssistantOutcome};
use crate::usecases::normalizer;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnhancerBody {
    question: String,
    subject: String,
    difficulty: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StudyBody {
    question: String,
    context: Option<String>,
}

/// Serialize `result` and merge `error` into it when present.
fn shaped<T: Serialize>(status: StatusCode, result: &T, error: Option<String>) -> Response {
    let mut body = serde_json::to_value(result).unwrap_or(Value::Null);
    if let (Some(error), Value::Object(map)) = (error, &mut body) {
        map.insert("error".to_string(), Value::String(error));
    }
    (status, Json(body)).into_response()
}

fn outcome_response<T: Serialize>(outcome: AssistantOutcome<T>) -> Response {
    match outcome {
        AssistantOutcome::Success(result) => shaped(StatusCode::OK, &result, None),
        AssistantOutcome::Degraded { result, error } => {
            shaped(StatusCode::INTERNAL_SERVER_ERROR, &result, Some(error))
        }
    }
}

pub async fn question_enhancer(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match serde_json::from_slice::<EnhancerBody>(&body) {
        Ok(body) => body,
        Err(e) => return rejected_enhancement("", format!("Malformed request body: {}", e)),
    };

    match assistant_service::enhancement_request(&body.question, &body.subject, &body.difficulty)
    {
        Ok(req) => outcome_response(state.assistant.enhance_question(&req).await),
        Err(e) => rejected_enhancement(&body.question, e.public_message()),
    }
}

/// 400 with the fallback shape; `question` is echoed as submitted.
fn rejected_enhancement(question: &str, error: String) -> Response {
    warn!(error = %error, "rejected enhancer request");
    shaped(
        StatusCode::BAD_REQUEST,
        &normalizer::enhancement_fallback(question),
        Some(error),
    )
}

pub async fn study_assistant(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed = serde_json::from_slice::<StudyBody>(&body)
        .map_err(|e| format!("Malformed request body: {}", e))
        .and_then(|b| {
            assistant_service::study_request(&b.question, b.context.as_deref())
                .map_err(|e| e.public_message())
        });

    match parsed {
        Ok(req) => outcome_response(state.assistant.study_help(&req).await),
        Err(error) => {
            warn!(error = %error, "rejected study assistant request");
            shaped(
                StatusCode::BAD_REQUEST,
                &normalizer::study_fallback(),
                Some(error),
            )
        }
    }
}
