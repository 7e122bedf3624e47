//! Announcement endpoints.

use super::AppState;
use super::error::{AppError, parse_body};
use super::identity::Identity;
use crate::domain::{Announcement, AnnouncementUpdate, NewAnnouncement};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

pub async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    Ok(Json(state.announcements.list_active(Utc::now()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    who: Identity,
    body: Bytes,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    let new: NewAnnouncement = parse_body(&body)?;
    let announcement = state.announcements.create(who.id(), new).await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Announcement>, AppError> {
    let update: AnnouncementUpdate = parse_body(&body)?;
    Ok(Json(state.announcements.update(who.id(), &id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.announcements.delete(who.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
