//! Affiliate (referral) program.
//!
//! Users opt in to get a shareable code; sign-ups carrying the code become
//! referrals, and a referral's first paid subscription earns the affiliate
//! a commission.

pub mod manager;
pub mod referral;
pub mod types;

pub use manager::{generate_code, AffiliateManager};
pub use referral::{FileStore, KeyValueStore, MemoryStore, ReferralTracker};
pub use types::{
    Affiliate, AffiliateDashboard, AffiliateError, AffiliateStatus, Commission, Referral,
    ReferralStatus,
};
