//! Account, onboarding and notification handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiError, AppState, AuthUser};
use crate::affiliate::AffiliateManager;
use crate::marketing::{self, MarketingContent};
use crate::notifications::NotificationStore;
use crate::onboarding::{OnboardingChecklist, OnboardingTracker};
use crate::storage::AvatarStore;

pub(crate) async fn healthz_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub(crate) async fn marketing_handler(State(state): State<AppState>) -> Json<MarketingContent> {
    Json(marketing::content(
        state.config.billing.monthly_price_cents,
        state.config.auth.trial_hours,
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignupBody {
    email: String,
    password: String,
    full_name: String,
    #[serde(default)]
    referral_code: Option<String>,
}

pub(crate) async fn signup_handler(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let conn = db.connection();
    let auth = state.auth(conn);

    let user = auth.sign_up(&body.email, &body.password, &body.full_name)?;

    if let Some(code) = body.referral_code.as_deref().filter(|c| !c.trim().is_empty()) {
        let affiliates = AffiliateManager::new(conn, state.config.affiliate.commission_rate);
        match affiliates.register_referral(code, user.id) {
            Ok(Some(_)) => tracing::info!(user_id = %user.id, "Sign-up attributed to referral"),
            Ok(None) => tracing::debug!(user_id = %user.id, "Referral code not applicable"),
            Err(e) => tracing::warn!(user_id = %user.id, "Failed to register referral: {}", e),
        }
    }

    let session = auth.sign_in(&user.email, &body.password)?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: String,
    password: String,
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let session = state.auth(db.connection()).sign_in(&body.email, &body.password)?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetRequestBody {
    email: String,
}

pub(crate) async fn request_reset_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetRequestBody>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    state.auth(db.connection()).request_password_reset(
        &body.email,
        &state.config.server.site_url,
        state.mailer.as_ref(),
    )?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetConfirmBody {
    token: String,
    new_password: String,
}

pub(crate) async fn confirm_reset_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirmBody>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    state
        .auth(db.connection())
        .reset_password(&body.token, &body.new_password)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

pub(crate) async fn change_password_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    state
        .auth(db.connection())
        .change_password(user.id, &body.current_password, &body.new_password)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn me_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let conn = db.connection();
    let access = state.access(conn, &user)?;
    let unread = NotificationStore::new(conn).unread_count(user.id)?;

    Ok(Json(json!({
        "user": user,
        "access": access,
        "unread_notifications": unread,
    })))
}

pub(crate) async fn upload_avatar_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let path = AvatarStore::new(db.connection(), state.config.avatar_dir()).save(user.id, &body)?;
    Ok(Json(json!({ "avatar_path": path })))
}

pub(crate) async fn avatar_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let avatar = AvatarStore::new(db.connection(), state.config.avatar_dir())
        .load(user.id)?
        .ok_or_else(|| ApiError::not_found("No avatar uploaded"))?;
    Ok(([(CONTENT_TYPE, avatar.content_type)], avatar.bytes))
}

pub(crate) async fn onboarding_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<OnboardingChecklist>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(OnboardingTracker::new(db.connection()).refresh(user.id)?))
}

pub(crate) async fn onboarding_tour_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<OnboardingChecklist>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(OnboardingTracker::new(db.connection()).mark_tour_seen(user.id)?))
}

pub(crate) async fn dismiss_tip_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tip_id): Path<String>,
) -> Result<Json<OnboardingChecklist>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(
        OnboardingTracker::new(db.connection()).dismiss_tip(user.id, &tip_id)?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationsQuery {
    #[serde(default)]
    unread_only: bool,
}

pub(crate) async fn notifications_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let store = NotificationStore::new(db.connection());
    let notifications = store.list(user.id, query.unread_only)?;
    let unread_count = store.unread_count(user.id)?;
    Ok(Json(json!({
        "notifications": notifications,
        "unread_count": unread_count,
    })))
}

pub(crate) async fn read_all_notifications_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let updated = NotificationStore::new(db.connection()).mark_all_read(user.id)?;
    Ok(Json(json!({ "updated": updated })))
}

pub(crate) async fn read_notification_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    NotificationStore::new(db.connection()).mark_read(user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_notification_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    NotificationStore::new(db.connection()).delete(user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}
