//! AI assistant use case. Builds prompts, makes exactly one provider call,
//! and hands the outcome to the normalizer.
//!
//! Callers never see an `Err`: failures come back as `AssistantOutcome::Degraded`
//! carrying a fully shaped fallback result.

use crate::domain::{
    ChatMessage, CompletionRequest, DomainError, EnhancementRequest, EnhancementResult,
    StudyAssistantRequest, StudyAssistantResult,
};
use crate::ports::ChatCompletionPort;
use crate::usecases::normalizer::{self, ReplyShape};
use std::sync::Arc;
use tracing::{info, warn};

pub const ENHANCER_MAX_TOKENS: u32 = 800;
pub const STUDY_MAX_TOKENS: u32 = 1000;
pub const TEMPERATURE: f32 = 0.7;

/// Result of an assistant call. Both arms hold a complete payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantOutcome<T> {
    Success(T),
    /// Provider call failed; `result` is the fallback, `error` is safe to show.
    Degraded { result: T, error: String },
}

impl<T> AssistantOutcome<T> {
    pub fn result(&self) -> &T {
        match self {
            AssistantOutcome::Success(r) => r,
            AssistantOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AssistantOutcome::Success(_))
    }
}

pub struct AssistantService {
    chat: Arc<dyn ChatCompletionPort>,
}

impl AssistantService {
    pub fn new(chat: Arc<dyn ChatCompletionPort>) -> Self {
        Self { chat }
    }

    /// Review a student's question and propose a better phrasing.
    pub async fn enhance_question(
        &self,
        req: &EnhancementRequest,
    ) -> AssistantOutcome<EnhancementResult> {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(enhancer_system_prompt(req)),
                ChatMessage::user(enhancer_user_prompt(req)),
            ],
            max_tokens: ENHANCER_MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        match self.chat.complete(&request).await {
            Ok(raw) => {
                let (result, shape) = normalizer::normalize_enhancement(&raw, &req.question_text);
                if shape == ReplyShape::RawText {
                    warn!(
                        raw_len = raw.len(),
                        "enhancer reply was not a JSON object; using raw text"
                    );
                }
                info!(
                    subject = %req.subject,
                    difficulty = %req.difficulty,
                    suggestions = result.suggestions.len(),
                    "question enhanced"
                );
                AssistantOutcome::Success(result)
            }
            Err(e) => {
                warn!(error = %e, "question enhancer falling back");
                AssistantOutcome::Degraded {
                    result: normalizer::enhancement_fallback(&req.question_text),
                    error: e.public_message(),
                }
            }
        }
    }

    /// Free-form study help. Provider text is returned unchanged.
    pub async fn study_help(
        &self,
        req: &StudyAssistantRequest,
    ) -> AssistantOutcome<StudyAssistantResult> {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(study_system_prompt(req.context.as_deref())),
                ChatMessage::user(req.question.clone()),
            ],
            max_tokens: STUDY_MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        match self.chat.complete(&request).await {
            Ok(raw) => {
                info!(response_len = raw.len(), "study assistant answered");
                AssistantOutcome::Success(normalizer::study_result(raw))
            }
            Err(e) => {
                warn!(error = %e, "study assistant falling back");
                AssistantOutcome::Degraded {
                    result: normalizer::study_fallback(),
                    error: e.public_message(),
                }
            }
        }
    }
}

/// Validate and build an enhancer request from loosely typed input.
pub fn enhancement_request(
    question: &str,
    subject: &str,
    difficulty: &str,
) -> Result<EnhancementRequest, DomainError> {
    if question.trim().is_empty() {
        return Err(DomainError::Validation(
            "question must not be empty".to_string(),
        ));
    }
    Ok(EnhancementRequest {
        question_text: question.to_string(),
        subject: subject.trim().to_string(),
        // The provider copes with any level; unknown values degrade to the default.
        difficulty: difficulty.parse().unwrap_or_default(),
    })
}

pub fn study_request(
    question: &str,
    context: Option<&str>,
) -> Result<StudyAssistantRequest, DomainError> {
    if question.trim().is_empty() {
        return Err(DomainError::Validation(
            "question must not be empty".to_string(),
        ));
    }
    Ok(StudyAssistantRequest {
        question: question.to_string(),
        context: context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    })
}

fn enhancer_system_prompt(req: &EnhancementRequest) -> String {
    format!(
        r#"You are the question-enhancement assistant of Learn Assist, a course Q&A platform. You help students improve their questions so they get better answers.

## Your Task
- Analyze the question for clarity, specificity and completeness.
- Suggest concrete improvements.
- Provide a revised version of the question if needed.
- Take the subject ({subject}) and difficulty level ({difficulty}) into account.
- Be encouraging and constructive.

## Output Format
You MUST respond with valid JSON only. No markdown, no explanations outside JSON.

{{
  "analysis": "Brief analysis of the original question",
  "suggestions": ["suggestion1", "suggestion2", "suggestion3"],
  "improvedQuestion": "Enhanced version of the question",
  "additionalTips": "General tips for asking better questions in this subject"
}}"#,
        subject = req.subject,
        difficulty = req.difficulty,
    )
}

fn enhancer_user_prompt(req: &EnhancementRequest) -> String {
    format!(
        "Please analyze and improve this question:\n\nSubject: {}\nDifficulty: {}\nQuestion: {}",
        req.subject, req.difficulty, req.question_text
    )
}

fn study_system_prompt(context: Option<&str>) -> String {
    format!(
        r#"You are the study assistant of Learn Assist, an educational platform. Help students with their academic questions.

## Guidelines
- Give clear, accurate and helpful explanations.
- Break complex topics into understandable parts and use examples when helpful.
- Encourage critical thinking.
- If you are unsure about something, say so.
- Stay focused, educational and supportive.

Context about the user's question: {}"#,
        context.unwrap_or("No additional context provided")
    )
}
