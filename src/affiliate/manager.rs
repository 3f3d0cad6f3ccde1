//! Affiliate accounts, referrals and commissions.

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{
    Affiliate, AffiliateDashboard, AffiliateError, AffiliateStatus, Commission, Referral,
    ReferralStatus,
};
use crate::storage::database::{parse_timestamp, parse_uuid};

/// Affiliate code length.
pub const CODE_LEN: usize = 8;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const CODE_ATTEMPTS: usize = 8;

/// Generate a random uppercase alphanumeric code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Manager for the affiliate program.
pub struct AffiliateManager<'a> {
    conn: &'a Connection,
    commission_rate: f64,
}

impl<'a> AffiliateManager<'a> {
    pub fn new(conn: &'a Connection, commission_rate: f64) -> Self {
        Self {
            conn,
            commission_rate,
        }
    }

    /// Join the program. Joining twice returns the existing account.
    pub fn join(&self, user_id: Uuid) -> Result<Affiliate, AffiliateError> {
        if let Some(existing) = self.get_for_user(user_id)? {
            return Ok(existing);
        }

        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            if self.find_by_code(&code)?.is_some() {
                continue;
            }

            let affiliate = Affiliate {
                id: Uuid::new_v4(),
                user_id,
                code,
                status: AffiliateStatus::Active,
                commission_rate: self.commission_rate,
                total_earnings_cents: 0,
                created_at: Utc::now(),
            };
            self.conn.execute(
                "INSERT INTO affiliates (id, user_id, code, status, commission_rate, total_earnings_cents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    affiliate.id.to_string(),
                    user_id.to_string(),
                    affiliate.code,
                    affiliate.status.as_str(),
                    affiliate.commission_rate,
                    affiliate.created_at.to_rfc3339(),
                ],
            )?;
            tracing::info!(%user_id, code = %affiliate.code, "Affiliate joined");
            return Ok(affiliate);
        }

        Err(AffiliateError::CodeExhausted)
    }

    /// Look up an affiliate by code (case-insensitive).
    pub fn find_by_code(&self, code: &str) -> Result<Option<Affiliate>, AffiliateError> {
        self.conn
            .query_row(
                "SELECT id, user_id, code, status, commission_rate, total_earnings_cents, created_at
                 FROM affiliates WHERE code = ?1",
                params![code.trim().to_uppercase()],
                parse_affiliate_row,
            )
            .optional()
            .map_err(AffiliateError::from)
    }

    /// The affiliate account owned by a user, if any.
    pub fn get_for_user(&self, user_id: Uuid) -> Result<Option<Affiliate>, AffiliateError> {
        self.conn
            .query_row(
                "SELECT id, user_id, code, status, commission_rate, total_earnings_cents, created_at
                 FROM affiliates WHERE user_id = ?1",
                params![user_id.to_string()],
                parse_affiliate_row,
            )
            .optional()
            .map_err(AffiliateError::from)
    }

    /// Attribute a new user to the affiliate owning `code`.
    ///
    /// Returns `None` when the code is unknown or inactive, when the user
    /// refers themselves, or when the user was already referred.
    pub fn register_referral(&self, code: &str, referred_user_id: Uuid) -> Result<Option<Referral>, AffiliateError> {
        let Some(affiliate) = self.find_by_code(code)? else {
            tracing::debug!(code, "Unknown referral code");
            return Ok(None);
        };
        if affiliate.status != AffiliateStatus::Active || affiliate.user_id == referred_user_id {
            return Ok(None);
        }

        let referral = Referral {
            id: Uuid::new_v4(),
            affiliate_id: affiliate.id,
            referred_user_id,
            status: ReferralStatus::Pending,
            created_at: Utc::now(),
            converted_at: None,
        };
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO referrals (id, affiliate_id, referred_user_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                referral.id.to_string(),
                affiliate.id.to_string(),
                referred_user_id.to_string(),
                referral.status.as_str(),
                referral.created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        tracing::info!(affiliate_id = %affiliate.id, %referred_user_id, "Referral registered");
        Ok(Some(referral))
    }

    /// Convert a pending referral when the referred user pays.
    ///
    /// At most one commission exists per subscription; repeat calls return `None`.
    pub fn convert(
        &self,
        referred_user_id: Uuid,
        subscription_id: Uuid,
        amount_cents: i64,
    ) -> Result<Option<Commission>, AffiliateError> {
        let tx = self.conn.unchecked_transaction()?;
        let commission = AffiliateManager::new(&tx, self.commission_rate).convert_within(
            referred_user_id,
            subscription_id,
            amount_cents,
        )?;
        tx.commit()?;
        Ok(commission)
    }

    /// Same as [`convert`](Self::convert) but inside the caller's open transaction.
    pub(crate) fn convert_within(
        &self,
        referred_user_id: Uuid,
        subscription_id: Uuid,
        amount_cents: i64,
    ) -> Result<Option<Commission>, AffiliateError> {
        let already: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM commissions WHERE subscription_id = ?1",
                params![subscription_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            return Ok(None);
        }

        let pending: Option<(String, String, f64)> = self
            .conn
            .query_row(
                "SELECT r.id, r.affiliate_id, a.commission_rate
                 FROM referrals r JOIN affiliates a ON a.id = r.affiliate_id
                 WHERE r.referred_user_id = ?1 AND r.status = 'pending'",
                params![referred_user_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((referral_id, affiliate_id, rate)) = pending else {
            return Ok(None);
        };

        let now = Utc::now();
        let amount = (amount_cents as f64 * rate).round() as i64;
        let commission = Commission {
            id: Uuid::new_v4(),
            affiliate_id: parse_uuid(0, &affiliate_id)?,
            referral_id: parse_uuid(0, &referral_id)?,
            subscription_id,
            amount_cents: amount,
            status: "pending".to_string(),
            created_at: now,
        };

        self.conn.execute(
            "UPDATE referrals SET status = 'converted', converted_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), referral_id],
        )?;
        self.conn.execute(
            "INSERT INTO commissions (id, affiliate_id, referral_id, subscription_id, amount_cents, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
            params![
                commission.id.to_string(),
                affiliate_id,
                referral_id,
                subscription_id.to_string(),
                amount,
                now.to_rfc3339(),
            ],
        )?;
        self.conn.execute(
            "UPDATE affiliates SET total_earnings_cents = total_earnings_cents + ?1 WHERE id = ?2",
            params![amount, affiliate_id],
        )?;

        tracing::info!(%affiliate_id, amount_cents = amount, "Referral converted");
        Ok(Some(commission))
    }

    /// Referrals attributed to an affiliate, newest first.
    pub fn list_referrals(&self, affiliate_id: Uuid) -> Result<Vec<Referral>, AffiliateError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, affiliate_id, referred_user_id, status, created_at, converted_at
             FROM referrals WHERE affiliate_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![affiliate_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let affiliate_id: String = row.get(1)?;
            let referred: String = row.get(2)?;
            let status: String = row.get(3)?;
            let created_at: String = row.get(4)?;
            let converted_at: Option<String> = row.get(5)?;
            Ok(Referral {
                id: parse_uuid(0, &id)?,
                affiliate_id: parse_uuid(1, &affiliate_id)?,
                referred_user_id: parse_uuid(2, &referred)?,
                status: ReferralStatus::from_str(&status).unwrap_or(ReferralStatus::Pending),
                created_at: parse_timestamp(4, &created_at)?,
                converted_at: converted_at.map(|t| parse_timestamp(5, &t)).transpose()?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(AffiliateError::from)
    }

    /// Commissions earned by an affiliate, newest first.
    pub fn list_commissions(&self, affiliate_id: Uuid) -> Result<Vec<Commission>, AffiliateError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, affiliate_id, referral_id, subscription_id, amount_cents, status, created_at
             FROM commissions WHERE affiliate_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![affiliate_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let affiliate_id: String = row.get(1)?;
            let referral_id: String = row.get(2)?;
            let subscription_id: String = row.get(3)?;
            let created_at: String = row.get(6)?;
            Ok(Commission {
                id: parse_uuid(0, &id)?,
                affiliate_id: parse_uuid(1, &affiliate_id)?,
                referral_id: parse_uuid(2, &referral_id)?,
                subscription_id: parse_uuid(3, &subscription_id)?,
                amount_cents: row.get(4)?,
                status: row.get(5)?,
                created_at: parse_timestamp(6, &created_at)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(AffiliateError::from)
    }

    /// Dashboard for a user's affiliate account.
    pub fn dashboard(&self, user_id: Uuid, site_url: &str) -> Result<AffiliateDashboard, AffiliateError> {
        let affiliate = self
            .get_for_user(user_id)?
            .ok_or(AffiliateError::NotAffiliate(user_id))?;

        let referrals = self.list_referrals(affiliate.id)?;
        let converted = referrals
            .iter()
            .filter(|r| r.status == ReferralStatus::Converted)
            .count() as u32;
        let commissions = self.list_commissions(affiliate.id)?;

        Ok(AffiliateDashboard {
            referral_link: format!("{}/?ref={}", site_url.trim_end_matches('/'), affiliate.code),
            total_referrals: referrals.len() as u32,
            pending_referrals: referrals.len() as u32 - converted,
            converted_referrals: converted,
            total_earnings_cents: affiliate.total_earnings_cents,
            commissions,
            affiliate,
        })
    }
}

fn parse_affiliate_row(row: &rusqlite::Row) -> rusqlite::Result<Affiliate> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(6)?;

    Ok(Affiliate {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        code: row.get(2)?,
        status: AffiliateStatus::from_str(&status).unwrap_or(AffiliateStatus::Suspended),
        commission_rate: row.get(4)?,
        total_earnings_cents: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn insert_user(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, 'x', 'Test', ?3, ?3)",
            params![id.to_string(), format!("{}@test.dev", id), now],
        )
        .unwrap();
        id
    }

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_join_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let manager = AffiliateManager::new(db.connection(), 0.30);
        let user = insert_user(db.connection());

        let first = manager.join(user).unwrap();
        let second = manager.join(user).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.code, second.code);
        assert_eq!(first.commission_rate, 0.30);

        let by_code = manager.find_by_code(&first.code.to_lowercase()).unwrap().unwrap();
        assert_eq!(by_code.user_id, user);
    }

    #[test]
    fn test_register_referral_rules() {
        let db = Database::open_in_memory().unwrap();
        let manager = AffiliateManager::new(db.connection(), 0.30);
        let promoter = insert_user(db.connection());
        let friend = insert_user(db.connection());
        let code = manager.join(promoter).unwrap().code;

        assert!(manager.register_referral("NOPE1234", friend).unwrap().is_none());
        assert!(manager.register_referral(&code, promoter).unwrap().is_none());

        let referral = manager.register_referral(&code, friend).unwrap().unwrap();
        assert_eq!(referral.status, ReferralStatus::Pending);
        // A user can only be referred once
        assert!(manager.register_referral(&code, friend).unwrap().is_none());
    }

    #[test]
    fn test_convert_creates_single_commission() {
        let db = Database::open_in_memory().unwrap();
        let manager = AffiliateManager::new(db.connection(), 0.30);
        let promoter = insert_user(db.connection());
        let friend = insert_user(db.connection());
        let code = manager.join(promoter).unwrap().code;
        manager.register_referral(&code, friend).unwrap();

        let subscription = Uuid::new_v4();
        let commission = manager.convert(friend, subscription, 2990).unwrap().unwrap();
        assert_eq!(commission.amount_cents, 897);

        assert!(manager.convert(friend, subscription, 2990).unwrap().is_none());

        let dashboard = manager.dashboard(promoter, "https://fitcoach.app/").unwrap();
        assert_eq!(dashboard.total_referrals, 1);
        assert_eq!(dashboard.converted_referrals, 1);
        assert_eq!(dashboard.pending_referrals, 0);
        assert_eq!(dashboard.commissions.len(), 1);
        assert_eq!(dashboard.total_earnings_cents, 897);
        assert_eq!(dashboard.referral_link, format!("https://fitcoach.app/?ref={}", code));
    }

    #[test]
    fn test_convert_without_referral_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let manager = AffiliateManager::new(db.connection(), 0.30);
        let user = insert_user(db.connection());

        assert!(manager.convert(user, Uuid::new_v4(), 2990).unwrap().is_none());
    }

    #[test]
    fn test_dashboard_requires_affiliate() {
        let db = Database::open_in_memory().unwrap();
        let manager = AffiliateManager::new(db.connection(), 0.30);
        let user = insert_user(db.connection());

        assert!(matches!(
            manager.dashboard(user, "http://localhost"),
            Err(AffiliateError::NotAffiliate(_))
        ));
    }
}
