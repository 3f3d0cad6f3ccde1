//! Onboarding module for first-time user experience.
//!
//! A four-step checklist whose completion is derived from the user's own
//! data, plus the product-tour flag and dismissed tips.

pub mod steps;
pub mod tracker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export types
pub use steps::OnboardingStep;
pub use tracker::OnboardingTracker;

/// State of a user's onboarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingState {
    /// Whether the product tour was shown
    pub has_seen_tour: bool,
    /// Steps that have been completed, in completion order
    pub completed_steps: Vec<OnboardingStep>,
    /// Tip identifiers the user closed
    pub dismissed_tips: Vec<String>,
}

impl OnboardingState {
    /// Check if a specific step is complete.
    pub fn is_step_complete(&self, step: OnboardingStep) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Record a step. Returns false if it was already complete.
    pub fn complete_step(&mut self, step: OnboardingStep) -> bool {
        if self.is_step_complete(step) {
            return false;
        }
        self.completed_steps.push(step);
        true
    }

    /// Record a dismissed tip. Returns false if it was already dismissed.
    pub fn dismiss_tip(&mut self, tip_id: &str) -> bool {
        if self.dismissed_tips.iter().any(|t| t == tip_id) {
            return false;
        }
        self.dismissed_tips.push(tip_id.to_string());
        true
    }

    /// First step not yet completed, in checklist order.
    pub fn next_step(&self) -> Option<OnboardingStep> {
        OnboardingStep::all()
            .iter()
            .copied()
            .find(|step| !self.is_step_complete(*step))
    }

    /// Whether every step is complete.
    pub fn is_complete(&self) -> bool {
        self.next_step().is_none()
    }

    /// Get progress as a percentage (0-100).
    pub fn progress_percent(&self) -> u8 {
        let total = OnboardingStep::all().len();
        let completed = self.completed_steps.len().min(total);
        ((completed * 100) / total) as u8
    }
}

/// One row of the checklist as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItem {
    pub step: OnboardingStep,
    pub title: &'static str,
    pub description: &'static str,
    pub completed: bool,
}

/// Checklist view returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingChecklist {
    pub items: Vec<ChecklistItem>,
    pub progress_percent: u8,
    pub is_complete: bool,
    pub has_seen_tour: bool,
    pub dismissed_tips: Vec<String>,
}

impl From<&OnboardingState> for OnboardingChecklist {
    fn from(state: &OnboardingState) -> Self {
        Self {
            items: OnboardingStep::all()
                .iter()
                .map(|&step| ChecklistItem {
                    step,
                    title: step.title(),
                    description: step.description(),
                    completed: state.is_step_complete(step),
                })
                .collect(),
            progress_percent: state.progress_percent(),
            is_complete: state.is_complete(),
            has_seen_tour: state.has_seen_tour,
            dismissed_tips: state.dismissed_tips.clone(),
        }
    }
}

/// Onboarding errors.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
