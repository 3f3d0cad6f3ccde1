//! Onboarding checklist steps.

use serde::{Deserialize, Serialize};

/// Steps in the onboarding checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    /// Upload a profile picture
    CompleteProfile,
    /// Log the first workout
    FirstWorkout,
    /// Talk to an assistant
    FirstChat,
    /// Post or reply in the forum
    JoinCommunity,
}

impl OnboardingStep {
    /// Get all steps in order.
    pub fn all() -> &'static [OnboardingStep] {
        &[
            OnboardingStep::CompleteProfile,
            OnboardingStep::FirstWorkout,
            OnboardingStep::FirstChat,
            OnboardingStep::JoinCommunity,
        ]
    }

    /// Get the step index (0-based).
    pub fn index(&self) -> usize {
        Self::all().iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::CompleteProfile => "complete_profile",
            OnboardingStep::FirstWorkout => "first_workout",
            OnboardingStep::FirstChat => "first_chat",
            OnboardingStep::JoinCommunity => "join_community",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|step| step.as_str() == s)
    }

    /// Get the title for this step.
    pub fn title(&self) -> &'static str {
        match self {
            OnboardingStep::CompleteProfile => "Complete seu perfil",
            OnboardingStep::FirstWorkout => "Registre seu primeiro treino",
            OnboardingStep::FirstChat => "Converse com o assistente",
            OnboardingStep::JoinCommunity => "Participe da comunidade",
        }
    }

    /// Get the description for this step.
    pub fn description(&self) -> &'static str {
        match self {
            OnboardingStep::CompleteProfile => "Adicione uma foto de perfil.",
            OnboardingStep::FirstWorkout => "Conclua um treino para ganhar seus primeiros XP.",
            OnboardingStep::FirstChat => "Peça um treino ou uma dica de nutrição à IA.",
            OnboardingStep::JoinCommunity => "Publique ou responda um post no fórum.",
        }
    }
}
