//! Persisted onboarding state.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{OnboardingChecklist, OnboardingError, OnboardingState, OnboardingStep};
use crate::storage::database::parse_string_list;

/// Longest accepted tip identifier.
const MAX_TIP_ID_LEN: usize = 64;

/// Reads and updates a user's onboarding row.
pub struct OnboardingTracker<'a> {
    conn: &'a Connection,
}

impl<'a> OnboardingTracker<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stored state, or the default for a user without a row.
    pub fn load(&self, user_id: Uuid) -> Result<OnboardingState, OnboardingError> {
        let row = self
            .conn
            .query_row(
                "SELECT has_seen_tour, completed_steps_json, dismissed_tips_json
                 FROM onboarding_status WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    let steps: String = row.get(1)?;
                    let tips: String = row.get(2)?;
                    Ok(OnboardingState {
                        has_seen_tour: row.get(0)?,
                        completed_steps: parse_string_list(1, &steps)?
                            .iter()
                            .filter_map(|s| OnboardingStep::from_str(s))
                            .collect(),
                        dismissed_tips: parse_string_list(2, &tips)?,
                    })
                },
            )
            .optional()?;

        Ok(row.unwrap_or_default())
    }

    fn save(&self, user_id: Uuid, state: &OnboardingState) -> Result<(), OnboardingError> {
        let steps: Vec<&str> = state.completed_steps.iter().map(|s| s.as_str()).collect();
        let steps_json = serde_json::to_string(&steps)
            .map_err(|e| OnboardingError::ValidationError(e.to_string()))?;
        let tips_json = serde_json::to_string(&state.dismissed_tips)
            .map_err(|e| OnboardingError::ValidationError(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO onboarding_status (user_id, has_seen_tour, completed_steps_json, dismissed_tips_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                has_seen_tour = excluded.has_seen_tour,
                completed_steps_json = excluded.completed_steps_json,
                dismissed_tips_json = excluded.dismissed_tips_json,
                updated_at = excluded.updated_at",
            params![
                user_id.to_string(),
                state.has_seen_tour,
                steps_json,
                tips_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Whether the user's data shows a step as done.
    fn is_done(&self, user_id: Uuid, step: OnboardingStep) -> Result<bool, OnboardingError> {
        let sql = match step {
            OnboardingStep::CompleteProfile => {
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND avatar_path IS NOT NULL)"
            }
            OnboardingStep::FirstWorkout => {
                "SELECT EXISTS(SELECT 1 FROM workout_logs WHERE user_id = ?1)"
            }
            OnboardingStep::FirstChat => {
                "SELECT EXISTS(SELECT 1 FROM chat_messages WHERE user_id = ?1 AND role = 'user')"
            }
            OnboardingStep::JoinCommunity => {
                "SELECT EXISTS(SELECT 1 FROM forum_posts WHERE author_id = ?1)
                     OR EXISTS(SELECT 1 FROM forum_replies WHERE author_id = ?1)"
            }
        };
        Ok(self
            .conn
            .query_row(sql, params![user_id.to_string()], |row| row.get(0))?)
    }

    /// Re-check every pending step against the user's data and persist.
    pub fn refresh(&self, user_id: Uuid) -> Result<OnboardingChecklist, OnboardingError> {
        let mut state = self.load(user_id)?;
        let mut changed = false;

        for &step in OnboardingStep::all() {
            if !state.is_step_complete(step) && self.is_done(user_id, step)? {
                state.complete_step(step);
                changed = true;
            }
        }

        if changed {
            tracing::debug!(%user_id, progress = state.progress_percent(), "Onboarding progressed");
            self.save(user_id, &state)?;
        }
        Ok(OnboardingChecklist::from(&state))
    }

    /// Mark a step complete directly.
    pub fn complete_step(&self, user_id: Uuid, step: OnboardingStep) -> Result<OnboardingChecklist, OnboardingError> {
        let mut state = self.load(user_id)?;
        if state.complete_step(step) {
            self.save(user_id, &state)?;
        }
        Ok(OnboardingChecklist::from(&state))
    }

    /// Record that the product tour was shown.
    pub fn mark_tour_seen(&self, user_id: Uuid) -> Result<OnboardingChecklist, OnboardingError> {
        let mut state = self.load(user_id)?;
        if !state.has_seen_tour {
            state.has_seen_tour = true;
            self.save(user_id, &state)?;
        }
        Ok(OnboardingChecklist::from(&state))
    }

    /// Record a dismissed tip.
    pub fn dismiss_tip(&self, user_id: Uuid, tip_id: &str) -> Result<OnboardingChecklist, OnboardingError> {
        let tip_id = tip_id.trim();
        if tip_id.is_empty() || tip_id.len() > MAX_TIP_ID_LEN {
            return Err(OnboardingError::ValidationError(
                "Invalid tip identifier".to_string(),
            ));
        }

        let mut state = self.load(user_id)?;
        if state.dismiss_tip(tip_id) {
            self.save(user_id, &state)?;
        }
        Ok(OnboardingChecklist::from(&state))
    }
}
