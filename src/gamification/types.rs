//! Gamification type definitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::achievements::Achievement;

/// Per-user gamification row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GamificationProfile {
    pub user_id: Uuid,
    pub xp: u32,
    pub level: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Unlocked achievement keys, in unlock order
    pub achievements: Vec<String>,
    pub total_workouts: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl GamificationProfile {
    /// Fresh profile for a user with no activity.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            xp: 0,
            level: 1,
            current_streak: 0,
            best_streak: 0,
            achievements: Vec::new(),
            total_workouts: 0,
            last_activity_date: None,
            updated_at: Utc::now(),
        }
    }
}

/// A completed workout.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub duration_minutes: u32,
    pub completed_at: DateTime<Utc>,
}

/// Result of applying a workout to the gamification profile.
#[derive(Debug, Clone, Serialize)]
pub struct GamificationUpdate {
    pub profile: GamificationProfile,
    pub xp_gained: u32,
    pub leveled_up: bool,
    pub new_achievements: Vec<&'static Achievement>,
}

/// Result of recording a workout.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutOutcome {
    pub workout: WorkoutLog,
    /// `None` when the gamification update failed; the workout still counts
    pub gamification: Option<GamificationUpdate>,
}

/// Dashboard statistics.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_workouts: u32,
    pub total_minutes: u32,
    pub workouts_last_7_days: u32,
    pub xp: u32,
    pub level: u32,
    pub xp_to_next_level: Option<u32>,
    pub level_progress: f32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub achievements_unlocked: usize,
    pub achievements_total: usize,
}

/// Gamification errors.
#[derive(Debug, Error)]
pub enum GamificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Notification error: {0}")]
    NotificationError(#[from] crate::notifications::NotificationError),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
