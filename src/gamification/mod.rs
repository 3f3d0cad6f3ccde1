//! Gamification module.
//!
//! XP and levels from a fixed threshold table, daily workout streaks and
//! table-driven achievements, all stored in one row per user.

pub mod achievements;
pub mod levels;
pub mod manager;
pub mod types;

pub use achievements::{all_achievements, Achievement, Criterion};
pub use levels::{level_for_xp, next_streak, xp_for_next_level, XP_PER_WORKOUT};
pub use manager::GamificationManager;
pub use types::{
    GamificationError, GamificationProfile, GamificationUpdate, UserStats, WorkoutLog,
    WorkoutOutcome,
};
