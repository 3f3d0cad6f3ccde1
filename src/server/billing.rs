//! Billing handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, AuthUser};
use crate::billing::{CheckoutRequest, CheckoutResult, Subscription, WebhookEvent};

/// Shared-secret header sent by the gateway on webhook calls.
const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

pub(crate) async fn checkout_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResult>, ApiError> {
    Ok(Json(state.billing.checkout(user.id, &request).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyBody {
    payment_id: String,
}

pub(crate) async fn verify_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(state.billing.verify(user.id, &body.payment_id).await?))
}

pub(crate) async fn subscription_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Option<Subscription>>, ApiError> {
    Ok(Json(state.billing.current(user.id).await?))
}

pub(crate) async fn cancel_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(state.billing.cancel(user.id).await?))
}

pub(crate) async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<Value>, ApiError> {
    let token = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let outcome = state.billing.handle_webhook(token, &event).await?;
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
