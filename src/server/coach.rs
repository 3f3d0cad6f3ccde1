//! Gamification and assistant handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, AuthUser};
use crate::assistant::{AssistantKind, ChatMessage, Reply};
use crate::auth::User;
use crate::gamification::{GamificationManager, GamificationProfile, UserStats, WorkoutLog};

pub(crate) async fn gamification_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<GamificationProfile>, ApiError> {
    let db = state.db.lock().await;
    let profile = GamificationManager::new(db.connection()).get_or_create_profile(user.id)?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkoutBody {
    title: String,
    duration_minutes: u32,
}

pub(crate) async fn record_workout_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<WorkoutBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let outcome = GamificationManager::new(db.connection())
        .with_hub(&state.hub)
        .record_workout(user.id, &body.title, body.duration_minutes)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkoutsQuery {
    #[serde(default = "default_workout_limit")]
    limit: u32,
}

fn default_workout_limit() -> u32 {
    20
}

pub(crate) async fn workouts_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<WorkoutsQuery>,
) -> Result<Json<Vec<WorkoutLog>>, ApiError> {
    let db = state.db.lock().await;
    let workouts = GamificationManager::new(db.connection()).list_workouts(user.id, query.limit.min(100))?;
    Ok(Json(workouts))
}

pub(crate) async fn stats_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserStats>, ApiError> {
    let db = state.db.lock().await;
    let stats = GamificationManager::new(db.connection()).user_stats(user.id, Utc::now())?;
    Ok(Json(stats))
}

fn parse_kind(kind: &str) -> Result<AssistantKind, ApiError> {
    AssistantKind::from_str(kind).ok_or_else(|| ApiError::not_found(format!("Unknown assistant: {}", kind)))
}

async fn require_premium(state: &AppState, user: &User) -> Result<(), ApiError> {
    let db = state.db.lock().await;
    let access = state.access(db.connection(), user)?;
    if access.has_premium_access {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::PAYMENT_REQUIRED,
            "premium_required",
            "Your free trial has ended. Subscribe to keep using the assistants.",
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    message: String,
}

pub(crate) async fn send_message_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(kind): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<Reply>, ApiError> {
    let kind = parse_kind(&kind)?;
    require_premium(&state, &user).await?;
    let reply = state.chat.send(user.id, kind, &body.message).await?;
    Ok(Json(reply))
}

pub(crate) async fn history_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(kind): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.chat.history(user.id, kind).await?))
}

pub(crate) async fn clear_history_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let deleted = state.chat.clear(user.id, kind).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
