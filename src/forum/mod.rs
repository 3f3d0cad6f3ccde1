//! Community forum.

pub mod manager;
pub mod stats;
pub mod types;

pub use manager::ForumManager;
pub use stats::{community_stats, trending, trending_categories};
pub use types::{Category, CategoryActivity, CommunityStats, ForumError, ForumPost, ForumReply};
