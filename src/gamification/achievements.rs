//! Achievement definitions and unlock checks.

use serde::Serialize;

/// What an achievement measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Total completed workouts
    TotalWorkouts(u32),
    /// Current daily streak
    Streak(u32),
    /// Level reached
    Level(u32),
}

/// Achievement definition.
#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub criterion: Criterion,
}

/// Counters the unlock checks look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct AchievementContext {
    pub total_workouts: u32,
    pub current_streak: u32,
    pub level: u32,
}

impl Achievement {
    /// Whether the criterion is met.
    pub fn is_met(&self, ctx: &AchievementContext) -> bool {
        match self.criterion {
            Criterion::TotalWorkouts(n) => ctx.total_workouts >= n,
            Criterion::Streak(n) => ctx.current_streak >= n,
            Criterion::Level(n) => ctx.level >= n,
        }
    }
}

/// All achievements in display order.
pub fn all_achievements() -> &'static [Achievement] {
    &[
        Achievement {
            key: "first_workout",
            name: "Primeiro Passo",
            description: "Complete seu primeiro treino",
            icon: "trophy",
            criterion: Criterion::TotalWorkouts(1),
        },
        Achievement {
            key: "ten_workouts",
            name: "Dedicação",
            description: "Complete 10 treinos",
            icon: "dumbbell",
            criterion: Criterion::TotalWorkouts(10),
        },
        Achievement {
            key: "fifty_workouts",
            name: "Imparável",
            description: "Complete 50 treinos",
            icon: "medal",
            criterion: Criterion::TotalWorkouts(50),
        },
        Achievement {
            key: "streak_3",
            name: "Aquecendo",
            description: "Treine 3 dias seguidos",
            icon: "flame",
            criterion: Criterion::Streak(3),
        },
        Achievement {
            key: "streak_7",
            name: "Semana Perfeita",
            description: "Treine 7 dias seguidos",
            icon: "calendar",
            criterion: Criterion::Streak(7),
        },
        Achievement {
            key: "streak_30",
            name: "Mês de Ferro",
            description: "Treine 30 dias seguidos",
            icon: "crown",
            criterion: Criterion::Streak(30),
        },
        Achievement {
            key: "level_5",
            name: "Atleta",
            description: "Alcance o nível 5",
            icon: "star",
            criterion: Criterion::Level(5),
        },
        Achievement {
            key: "level_10",
            name: "Lenda",
            description: "Alcance o nível 10",
            icon: "gem",
            criterion: Criterion::Level(10),
        },
    ]
}

/// Look up an achievement by key.
pub fn find(key: &str) -> Option<&'static Achievement> {
    all_achievements().iter().find(|a| a.key == key)
}

/// Append newly met achievements to `unlocked`, returning the new ones.
///
/// The list is append-only: existing keys are never removed or reordered.
pub fn unlock_new(unlocked: &mut Vec<String>, ctx: &AchievementContext) -> Vec<&'static Achievement> {
    let mut newly = Vec::new();
    for achievement in all_achievements() {
        if achievement.is_met(ctx) && !unlocked.iter().any(|k| k == achievement.key) {
            unlocked.push(achievement.key.to_string());
            newly.push(achievement);
        }
    }
    newly
}
