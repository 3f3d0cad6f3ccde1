//! Permission derivation for a signed-in user.
//!
//! Premium access is the OR of four independent grants: admin allowlist,
//! the free trial window, a paid subscription and an active affiliate.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::types::{AuthError, User};
use crate::storage::database::parse_timestamp;

/// What a user is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessProfile {
    pub is_admin: bool,
    pub is_trial_active: bool,
    pub trial_ends_at: DateTime<Utc>,
    pub has_active_subscription: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub is_promoter: bool,
    pub has_premium_access: bool,
}

/// Settings for [`derive_access`].
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Lowercased admin emails
    pub admin_emails: Vec<String>,
    /// Trial window length in hours
    pub trial_hours: u32,
}

impl AccessPolicy {
    pub fn new(admin_emails: &[String], trial_hours: u32) -> Self {
        Self {
            admin_emails: admin_emails.iter().map(|e| e.trim().to_lowercase()).collect(),
            trial_hours,
        }
    }

    /// Check the admin allowlist.
    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }

    /// End of the trial window for an account created at `created_at`.
    pub fn trial_ends_at(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::hours(self.trial_hours as i64)
    }
}

/// Derive the access profile of `user` at `now`.
pub fn derive_access(
    conn: &Connection,
    policy: &AccessPolicy,
    user: &User,
    now: DateTime<Utc>,
) -> Result<AccessProfile, AuthError> {
    let is_admin = policy.is_admin(&user.email);
    let trial_ends_at = policy.trial_ends_at(user.created_at);
    let is_trial_active = now < trial_ends_at;

    let subscription_expires_at = latest_active_expiry(conn, user, now)?;
    let has_active_subscription = subscription_expires_at.is_some();

    let is_promoter: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM affiliates WHERE user_id = ?1 AND status = 'active')",
        params![user.id.to_string()],
        |row| row.get(0),
    )?;

    Ok(AccessProfile {
        is_admin,
        is_trial_active,
        trial_ends_at,
        has_active_subscription,
        subscription_expires_at,
        is_promoter,
        has_premium_access: is_admin || is_trial_active || has_active_subscription || is_promoter,
    })
}

fn latest_active_expiry(
    conn: &Connection,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, AuthError> {
    let expires: Option<String> = conn
        .query_row(
            "SELECT expires_at FROM subscriptions
             WHERE user_id = ?1 AND status = 'active' AND expires_at IS NOT NULL
             ORDER BY expires_at DESC LIMIT 1",
            params![user.id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match expires {
        Some(value) => {
            let expires_at = parse_timestamp(0, &value)?;
            Ok((expires_at > now).then_some(expires_at))
        }
        None => Ok(None),
    }
}
