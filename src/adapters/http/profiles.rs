//! Profile and dashboard endpoints.

use super::AppState;
use super::error::{AppError, parse_body};
use super::identity::Identity;
use crate::domain::{DashboardStats, Profile, Role};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DisplayNameBody {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    role: Role,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.resolve(&id).await?))
}

pub async fn get_me(
    State(state): State<AppState>,
    who: Identity,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.profiles.resolve(who.id()).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    who: Identity,
    body: Bytes,
) -> Result<Json<Profile>, AppError> {
    let DisplayNameBody { display_name } = parse_body(&body)?;
    Ok(Json(
        state
            .profiles
            .update_display_name(who.id(), display_name)
            .await?,
    ))
}

pub async fn set_role(
    State(state): State<AppState>,
    who: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Profile>, AppError> {
    let RoleBody { role } = parse_body(&body)?;
    Ok(Json(state.profiles.set_role(who.id(), &id, role).await?))
}

pub async fn dashboard(
    State(state): State<AppState>,
    who: Identity,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.dashboard.stats_for(who.id()).await?))
}
