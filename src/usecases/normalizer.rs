//! Response normalizer. Turns whatever the chat-completion provider replied
//! (or failed to reply) into a fully populated result.
//!
//! Three outcomes per enhancer call:
//! - provider replied with a JSON object: its fields are used, gaps filled with defaults
//! - provider replied with anything else: synthesized result carrying the raw text
//! - provider call failed: deterministic fallback echoing the student's question

use crate::domain::{EnhancementResult, StudyAssistantResult};
use serde_json::{Map, Value};

const FALLBACK_ANALYSIS: &str = "I'm having trouble analyzing your question right now.";
const FALLBACK_SUGGESTIONS: [&str; 3] = [
    "Try rephrasing your question",
    "Add more context",
    "Be more specific about what you need help with",
];
const FALLBACK_TIPS: &str = "Clear, specific questions get better answers!";

const RAW_ANALYSIS: &str = "Here's my analysis of your question:";
const RAW_SUGGESTIONS: [&str; 3] = [
    "Consider adding more specific details",
    "Include what you've already tried",
    "Clarify what exactly you're struggling with",
];
const RAW_TIPS: &str = "Try to be as specific as possible when asking questions.";

pub const STUDY_APOLOGY: &str = "I apologize, but I'm having trouble processing your question right now. Please try again later or contact your instructor for assistance.";

/// How a successful provider reply was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    Json,
    RawText,
}

/// Result used when the provider could not be reached or refused the call.
pub fn enhancement_fallback(question: &str) -> EnhancementResult {
    EnhancementResult {
        analysis: FALLBACK_ANALYSIS.to_string(),
        suggestions: FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        improved_question: question.to_string(),
        additional_tips: FALLBACK_TIPS.to_string(),
    }
}

/// Result used when the provider answered but not with a JSON object.
fn raw_text_result(raw: &str) -> EnhancementResult {
    EnhancementResult {
        analysis: RAW_ANALYSIS.to_string(),
        suggestions: RAW_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        improved_question: raw.to_string(),
        additional_tips: RAW_TIPS.to_string(),
    }
}

/// Interpret a successful enhancer reply.
pub fn normalize_enhancement(raw: &str, question: &str) -> (EnhancementResult, ReplyShape) {
    let clean = sanitize_json(raw);
    match serde_json::from_str::<Value>(&clean) {
        Ok(Value::Object(obj)) => (from_object(&obj, question), ReplyShape::Json),
        _ => (raw_text_result(raw), ReplyShape::RawText),
    }
}

fn from_object(obj: &Map<String, Value>, question: &str) -> EnhancementResult {
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    let suggestions = match obj.get("suggestions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => RAW_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    };

    EnhancementResult {
        analysis: text("analysis").unwrap_or_else(|| RAW_ANALYSIS.to_string()),
        suggestions,
        improved_question: text("improvedQuestion").unwrap_or_else(|| question.to_string()),
        additional_tips: text("additionalTips").unwrap_or_else(|| RAW_TIPS.to_string()),
    }
}

/// Study-assistant reply: provider text passes through untouched.
pub fn study_result(raw: String) -> StudyAssistantResult {
    StudyAssistantResult { response: raw }
}

pub fn study_fallback() -> StudyAssistantResult {
    StudyAssistantResult {
        response: STUDY_APOLOGY.to_string(),
    }
}

/// Strip a markdown code fence from a JSON reply.
///
/// Models sometimes wrap JSON in ```json blocks. Anything else, including prose
/// that happens to contain braces, is left as is and fails to parse as an object.
fn sanitize_json(raw_text: &str) -> String {
    let trimmed = raw_text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        let without_lang = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end_idx) = without_lang.rfind("```") {
            return without_lang[..end_idx].trim().to_string();
        }
        return without_lang.trim().to_string();
    }

    trimmed.to_string()
}
