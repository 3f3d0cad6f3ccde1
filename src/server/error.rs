//! HTTP error mapping.
//!
//! Every domain error becomes a status code plus
//! `{"error": {"code": ..., "message": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::affiliate::AffiliateError;
use crate::assistant::AssistantError;
use crate::auth::AuthError;
use crate::billing::{BillingError, GatewayError};
use crate::forum::ForumError;
use crate::gamification::GamificationError;
use crate::notifications::NotificationError;
use crate::onboarding::OnboardingError;
use crate::storage::AvatarError;

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Authentication required")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Log the cause and hide it from the client.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", e.to_string())
            }
            AuthError::EmailTaken => Self::new(StatusCode::CONFLICT, "email_taken", e.to_string()),
            AuthError::InvalidToken => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
            }
            AuthError::InvalidResetToken => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_reset_token", e.to_string())
            }
            AuthError::ValidationError(message) => Self::bad_request(message),
            AuthError::NotFound(_) => Self::not_found(e.to_string()),
            AuthError::DatabaseError(_) | AuthError::Internal(_) => Self::internal(e),
        }
    }
}

impl From<GamificationError> for ApiError {
    fn from(e: GamificationError) -> Self {
        match e {
            GamificationError::ValidationError(message) => Self::bad_request(message),
            other => Self::internal(other),
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::ValidationError(message) => Self::bad_request(message),
            other => Self::internal(other),
        }
    }
}

impl From<ForumError> for ApiError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::PostNotFound(_) => Self::not_found(e.to_string()),
            ForumError::NotAuthor => Self::new(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
            ForumError::ValidationError(message) => Self::bad_request(message),
            other => Self::internal(other),
        }
    }
}

impl From<AffiliateError> for ApiError {
    fn from(e: AffiliateError) -> Self {
        match e {
            AffiliateError::NotAffiliate(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_affiliate", e.to_string())
            }
            other => Self::internal(other),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Gateway(GatewayError::NotConfigured) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "billing_unavailable",
                "Payments are not available right now",
            ),
            BillingError::Gateway(gateway) => {
                tracing::error!("Payment gateway error: {}", gateway);
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "Payment provider error, please try again",
                )
            }
            BillingError::ValidationError(message) => Self::bad_request(message),
            BillingError::NotFound => Self::not_found(e.to_string()),
            BillingError::InvalidWebhookToken => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_webhook_token", e.to_string())
            }
            other => Self::internal(other),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(e: OnboardingError) -> Self {
        match e {
            OnboardingError::ValidationError(message) => Self::bad_request(message),
            other => Self::internal(other),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::NotFound(_) => Self::not_found(e.to_string()),
            other => Self::internal(other),
        }
    }
}

impl From<AvatarError> for ApiError {
    fn from(e: AvatarError) -> Self {
        match e {
            AvatarError::Empty | AvatarError::UnsupportedFormat => Self::bad_request(e.to_string()),
            AvatarError::TooLarge(_) => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", e.to_string())
            }
            AvatarError::UserNotFound(_) => Self::not_found(e.to_string()),
            other => Self::internal(other),
        }
    }
}
