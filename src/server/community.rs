//! Forum and affiliate handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiError, AppState, AuthUser};
use crate::affiliate::{Affiliate, AffiliateDashboard, AffiliateManager};
use crate::forum::{
    community_stats, trending, trending_categories, Category, CommunityStats, ForumManager,
    ForumPost, ForumReply,
};

fn parse_category(category: &str) -> Result<Category, ApiError> {
    Category::from_str(category)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown category: {}", category)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostsQuery {
    category: Option<String>,
    #[serde(default)]
    limit: u32,
}

pub(crate) async fn list_posts_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PostsQuery>,
) -> Result<Json<Vec<ForumPost>>, ApiError> {
    let category = query.category.as_deref().map(parse_category).transpose()?;
    let db = state.db.lock().await;
    let posts = ForumManager::new(db.connection()).list_posts(category, Some(user.id), query.limit.min(100))?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewPostBody {
    category: String,
    title: String,
    content: String,
}

pub(crate) async fn create_post_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<NewPostBody>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&body.category)?;
    let db = state.db.lock().await;
    let post = ForumManager::new(db.connection()).create_post(user.id, category, &body.title, &body.content)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn get_post_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ForumPost>, ApiError> {
    let db = state.db.lock().await;
    let post = ForumManager::new(db.connection())
        .get_post(id, Some(user.id))?
        .ok_or_else(|| ApiError::not_found(format!("Post not found: {}", id)))?;
    Ok(Json(post))
}

pub(crate) async fn delete_post_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.lock().await;
    ForumManager::new(db.connection()).delete_post(id, user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_replies_handler(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ForumReply>>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(ForumManager::new(db.connection()).list_replies(id)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyBody {
    content: String,
}

pub(crate) async fn add_reply_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let reply = ForumManager::new(db.connection())
        .with_hub(&state.hub)
        .add_reply(id, user.id, &body.content)?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub(crate) async fn toggle_like_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let liked = ForumManager::new(db.connection()).toggle_like(id, user.id)?;
    Ok(Json(json!({ "liked": liked })))
}

pub(crate) async fn forum_stats_handler(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<CommunityStats>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(community_stats(db.connection(), Utc::now())?))
}

pub(crate) async fn trending_handler(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.lock().await;
    let now = Utc::now();
    let posts = trending(db.connection(), now)?;
    let categories = trending_categories(db.connection(), now)?;
    Ok(Json(json!({ "posts": posts, "categories": categories })))
}

pub(crate) async fn join_affiliate_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Affiliate>, ApiError> {
    let db = state.db.lock().await;
    let affiliate = AffiliateManager::new(db.connection(), state.config.affiliate.commission_rate).join(user.id)?;
    Ok(Json(affiliate))
}

pub(crate) async fn affiliate_dashboard_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<AffiliateDashboard>, ApiError> {
    let db = state.db.lock().await;
    let dashboard = AffiliateManager::new(db.connection(), state.config.affiliate.commission_rate)
        .dashboard(user.id, &state.config.server.site_url)?;
    Ok(Json(dashboard))
}
