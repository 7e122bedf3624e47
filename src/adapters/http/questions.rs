//! Question and answer endpoints.

use super::AppState;
use super::error::{AppError, parse_body};
use super::identity::Identity;
use crate::domain::{
    Answer, NewQuestion, Question, QuestionQuery, QuestionUpdate, SortOrder, VoteType,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    search: Option<String>,
    subject: Option<String>,
    /// Comma-separated.
    tags: Option<String>,
    sort: Option<SortOrder>,
}

impl ListParams {
    fn into_query(self) -> QuestionQuery {
        let tags = self
            .tags
            .map(|raw| raw.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        QuestionQuery {
            search: self.search,
            subject: self.subject,
            tags: crate::domain::normalize_tags(tags),
            sort: self.sort.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    vote: VoteType,
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    content: String,
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Question>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    Ok(Json(state.questions.list(&params.into_query()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    who: Identity,
    body: Bytes,
) -> Result<(StatusCode, Json<Question>), AppError> {
    let new: NewQuestion = parse_body(&body)?;
    let question = state.questions.create(who.id(), new).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Question>, AppError> {
    Ok(Json(state.questions.get(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Question>, AppError> {
    let update: QuestionUpdate = parse_body(&body)?;
    Ok(Json(state.questions.update(who.id(), &id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.questions.delete(who.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote(
    State(state): State<AppState>,
    _who: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Question>, AppError> {
    let VoteBody { vote } = parse_body(&body)?;
    Ok(Json(state.questions.vote(&id, vote).await?))
}

pub async fn list_answers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Answer>>, AppError> {
    Ok(Json(state.questions.answers(&id).await?))
}

pub async fn post_answer(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Answer>), AppError> {
    let AnswerBody { content } = parse_body(&body)?;
    let answer = state.questions.answer(who.id(), &id, &content).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_split_tags() {
        let params = ListParams {
            tags: Some("python, Recursion,,python".into()),
            sort: Some(SortOrder::Popular),
            ..Default::default()
        };
        let query = params.into_query();
        assert_eq!(query.tags, vec!["python", "Recursion"]);
        assert_eq!(query.sort, SortOrder::Popular);
    }
}
