//! Affiliate program type definitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Affiliate account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    Active,
    Suspended,
}

impl AffiliateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliateStatus::Active => "active",
            AffiliateStatus::Suspended => "suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AffiliateStatus::Active),
            "suspended" => Some(AffiliateStatus::Suspended),
            _ => None,
        }
    }
}

/// An affiliate (promoter) account.
#[derive(Debug, Clone, Serialize)]
pub struct Affiliate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub status: AffiliateStatus,
    pub commission_rate: f64,
    pub total_earnings_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Referral status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Converted,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Converted => "converted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReferralStatus::Pending),
            "converted" => Some(ReferralStatus::Converted),
            _ => None,
        }
    }
}

/// A user who signed up through an affiliate code.
#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referred_user_id: Uuid,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
}

/// Commission earned on a converted referral.
#[derive(Debug, Clone, Serialize)]
pub struct Commission {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub referral_id: Uuid,
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    /// `pending` until paid out
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the affiliate page shows.
#[derive(Debug, Clone, Serialize)]
pub struct AffiliateDashboard {
    pub affiliate: Affiliate,
    pub referral_link: String,
    pub total_referrals: u32,
    pub pending_referrals: u32,
    pub converted_referrals: u32,
    pub commissions: Vec<Commission>,
    pub total_earnings_cents: i64,
}

/// Affiliate errors.
#[derive(Debug, Error)]
pub enum AffiliateError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Referral store error: {0}")]
    StoreError(String),

    #[error("Not an affiliate: {0}")]
    NotAffiliate(Uuid),

    #[error("Could not allocate a unique affiliate code")]
    CodeExhausted,
}
