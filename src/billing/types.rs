//! Billing type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

/// A subscription row.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Gateway payment identifier
    pub payment_id: String,
    pub status: SubscriptionStatus,
    pub amount_cents: i64,
    pub pix_payload: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active and not yet expired.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at.map_or(false, |e| e > now)
    }
}

/// Buyer details for a checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub full_name: String,
    pub email: String,
    /// CPF or CNPJ, punctuation allowed
    pub tax_id: String,
}

/// What the buyer needs to pay.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub subscription_id: Uuid,
    pub payment_id: String,
    /// PIX copy-and-paste payload
    pub pix_payload: String,
    /// QR image as a data URI
    pub qr_code_image: String,
    /// Whether the QR was built locally because the gateway never returned one
    pub fallback: bool,
    pub expires_at: Option<String>,
    pub amount_cents: i64,
}

/// Inbound gateway webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payment: Option<WebhookPayment>,
}

/// Payment object inside a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// How a webhook was handled. Every outcome is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Activated,
    AlreadyActive,
    UnknownPayment,
    Ignored,
}

/// Result of activating a subscription.
#[derive(Debug, Clone)]
pub enum Activation {
    Activated(Subscription),
    AlreadyActive(Subscription),
}

impl Activation {
    pub fn subscription(&self) -> &Subscription {
        match self {
            Activation::Activated(s) | Activation::AlreadyActive(s) => s,
        }
    }
}

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

/// Billing errors.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Notification error: {0}")]
    NotificationError(#[from] crate::notifications::NotificationError),

    #[error("Affiliate error: {0}")]
    AffiliateError(#[from] crate::affiliate::AffiliateError),

    #[error("QR code error: {0}")]
    QrError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Subscription not found")]
    NotFound,

    #[error("Invalid webhook token")]
    InvalidWebhookToken,
}
