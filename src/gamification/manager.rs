//! Gamification profile management.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::achievements::{self, AchievementContext};
use super::levels::{effective_streak, level_for_xp, level_progress, next_streak, xp_for_next_level, XP_PER_WORKOUT};
use super::types::{
    GamificationError, GamificationProfile, GamificationUpdate, UserStats, WorkoutLog,
    WorkoutOutcome,
};
use crate::notifications::{NotificationKind, NotificationStore};
use crate::realtime::RealtimeHub;
use crate::storage::database::{parse_date, parse_string_list, parse_timestamp, parse_uuid};

/// Manager for XP, levels, streaks and achievements.
pub struct GamificationManager<'a> {
    conn: &'a Connection,
    hub: Option<&'a RealtimeHub>,
}

impl<'a> GamificationManager<'a> {
    /// Create a new gamification manager with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, hub: None }
    }

    /// Push achievement notifications to the realtime hub.
    pub fn with_hub(mut self, hub: &'a RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Get a user's profile, creating an empty one on first access.
    pub fn get_or_create_profile(&self, user_id: Uuid) -> Result<GamificationProfile, GamificationError> {
        if let Some(profile) = self.get_profile(user_id)? {
            return Ok(profile);
        }

        let profile = GamificationProfile::new(user_id);
        self.conn.execute(
            "INSERT OR IGNORE INTO gamification_profiles (user_id, xp, level, current_streak, best_streak,
                achievements_json, total_workouts, last_activity_date, updated_at)
             VALUES (?1, 0, 1, 0, 0, '[]', 0, NULL, ?2)",
            params![user_id.to_string(), profile.updated_at.to_rfc3339()],
        )?;
        tracing::debug!(%user_id, "Created gamification profile");

        Ok(profile)
    }

    /// Get a user's profile if it exists.
    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<GamificationProfile>, GamificationError> {
        self.conn
            .query_row(
                "SELECT user_id, xp, level, current_streak, best_streak, achievements_json,
                        total_workouts, last_activity_date, updated_at
                 FROM gamification_profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                parse_profile_row,
            )
            .optional()
            .map_err(GamificationError::from)
    }

    /// Record a completed workout now.
    pub fn record_workout(
        &self,
        user_id: Uuid,
        title: &str,
        duration_minutes: u32,
    ) -> Result<WorkoutOutcome, GamificationError> {
        self.record_workout_at(user_id, title, duration_minutes, Utc::now())
    }

    /// Record a completed workout at a given time.
    ///
    /// The workout row is authoritative; if updating the profile fails the
    /// error is logged and the workout is still reported as recorded.
    pub fn record_workout_at(
        &self,
        user_id: Uuid,
        title: &str,
        duration_minutes: u32,
        at: DateTime<Utc>,
    ) -> Result<WorkoutOutcome, GamificationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(GamificationError::ValidationError(
                "Workout title is required".to_string(),
            ));
        }
        if duration_minutes == 0 || duration_minutes > 24 * 60 {
            return Err(GamificationError::ValidationError(
                "Duration must be between 1 and 1440 minutes".to_string(),
            ));
        }

        let workout = WorkoutLog {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            duration_minutes,
            completed_at: at,
        };
        self.conn.execute(
            "INSERT INTO workout_logs (id, user_id, title, duration_minutes, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                workout.id.to_string(),
                user_id.to_string(),
                workout.title,
                duration_minutes,
                at.to_rfc3339(),
            ],
        )?;

        let gamification = match self.apply_workout(user_id, at.date_naive()) {
            Ok(update) => Some(update),
            Err(e) => {
                tracing::warn!(%user_id, "Failed to update gamification profile: {}", e);
                None
            }
        };

        Ok(WorkoutOutcome {
            workout,
            gamification,
        })
    }

    /// Apply one workout's XP, streak and achievement effects.
    pub fn apply_workout(&self, user_id: Uuid, today: NaiveDate) -> Result<GamificationUpdate, GamificationError> {
        let mut profile = self.get_or_create_profile(user_id)?;
        let previous_level = profile.level;

        profile.xp += XP_PER_WORKOUT;
        profile.level = level_for_xp(profile.xp);
        profile.total_workouts += 1;
        profile.current_streak = next_streak(profile.current_streak, profile.last_activity_date, today);
        profile.best_streak = profile.best_streak.max(profile.current_streak);
        profile.last_activity_date = Some(match profile.last_activity_date {
            Some(last) if last > today => last,
            _ => today,
        });
        profile.updated_at = Utc::now();

        let ctx = AchievementContext {
            total_workouts: profile.total_workouts,
            current_streak: profile.current_streak,
            level: profile.level,
        };
        let new_achievements = achievements::unlock_new(&mut profile.achievements, &ctx);

        self.save_profile(&profile)?;

        let mut notifications = NotificationStore::new(self.conn);
        if let Some(hub) = self.hub {
            notifications = notifications.with_hub(hub);
        }
        for achievement in &new_achievements {
            notifications
                .create(
                    user_id,
                    &format!("Conquista desbloqueada: {}", achievement.name),
                    achievement.description,
                    NotificationKind::Achievement,
                )?;
        }

        if profile.level > previous_level {
            tracing::info!(%user_id, level = profile.level, "Level up");
        }

        Ok(GamificationUpdate {
            leveled_up: profile.level > previous_level,
            profile,
            xp_gained: XP_PER_WORKOUT,
            new_achievements,
        })
    }

    /// Persist a profile.
    fn save_profile(&self, profile: &GamificationProfile) -> Result<(), GamificationError> {
        self.conn.execute(
            "UPDATE gamification_profiles SET xp = ?1, level = ?2, current_streak = ?3,
                best_streak = ?4, achievements_json = ?5, total_workouts = ?6,
                last_activity_date = ?7, updated_at = ?8
             WHERE user_id = ?9",
            params![
                profile.xp,
                profile.level,
                profile.current_streak,
                profile.best_streak,
                serde_json::to_string(&profile.achievements)?,
                profile.total_workouts,
                profile.last_activity_date.map(|d| d.format("%Y-%m-%d").to_string()),
                profile.updated_at.to_rfc3339(),
                profile.user_id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// List a user's workouts, newest first.
    pub fn list_workouts(&self, user_id: Uuid, limit: u32) -> Result<Vec<WorkoutLog>, GamificationError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, duration_minutes, completed_at
             FROM workout_logs WHERE user_id = ?1
             ORDER BY completed_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id.to_string(), limit], |row| {
            let id: String = row.get(0)?;
            let user_id: String = row.get(1)?;
            let completed_at: String = row.get(4)?;
            Ok(WorkoutLog {
                id: parse_uuid(0, &id)?,
                user_id: parse_uuid(1, &user_id)?,
                title: row.get(2)?,
                duration_minutes: row.get(3)?,
                completed_at: parse_timestamp(4, &completed_at)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(GamificationError::from)
    }

    /// Dashboard statistics as of `now`.
    pub fn user_stats(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<UserStats, GamificationError> {
        let profile = self.get_or_create_profile(user_id)?;

        let (total_workouts, total_minutes): (u32, u32) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_minutes), 0) FROM workout_logs WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let week_ago = (now - Duration::days(7)).to_rfc3339();
        let workouts_last_7_days: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM workout_logs WHERE user_id = ?1 AND completed_at >= ?2",
            params![user_id.to_string(), week_ago],
            |row| row.get(0),
        )?;

        Ok(UserStats {
            total_workouts,
            total_minutes,
            workouts_last_7_days,
            xp: profile.xp,
            level: profile.level,
            xp_to_next_level: xp_for_next_level(profile.level).map(|next| next - profile.xp),
            level_progress: level_progress(profile.xp),
            current_streak: effective_streak(
                profile.current_streak,
                profile.last_activity_date,
                now.date_naive(),
            ),
            best_streak: profile.best_streak,
            achievements_unlocked: profile.achievements.len(),
            achievements_total: achievements::all_achievements().len(),
        })
    }
}

fn parse_profile_row(row: &rusqlite::Row) -> rusqlite::Result<GamificationProfile> {
    let user_id: String = row.get(0)?;
    let achievements_json: String = row.get(5)?;
    let last_activity: Option<String> = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(GamificationProfile {
        user_id: parse_uuid(0, &user_id)?,
        xp: row.get(1)?,
        level: row.get(2)?,
        current_streak: row.get(3)?,
        best_streak: row.get(4)?,
        achievements: parse_string_list(5, &achievements_json)?,
        total_workouts: row.get(6)?,
        last_activity_date: last_activity.map(|d| parse_date(7, &d)).transpose()?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}
