//! Level and streak arithmetic.

use chrono::NaiveDate;

/// XP required to reach each level, starting at level 1.
pub const LEVEL_THRESHOLDS: [u32; 10] = [0, 100, 250, 500, 1000, 2000, 3500, 5000, 7500, 10000];

/// Highest reachable level.
pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

/// XP awarded for each completed workout.
pub const XP_PER_WORKOUT: u32 = 50;

/// Level for a given XP total.
pub fn level_for_xp(xp: u32) -> u32 {
    LEVEL_THRESHOLDS.iter().filter(|&&t| xp >= t).count() as u32
}

/// XP needed to reach the level after `level`, or `None` at the cap.
pub fn xp_for_next_level(level: u32) -> Option<u32> {
    LEVEL_THRESHOLDS.get(level as usize).copied()
}

/// Fraction (0.0..=1.0) of the way from the current level to the next.
pub fn level_progress(xp: u32) -> f32 {
    let level = level_for_xp(xp);
    let floor = LEVEL_THRESHOLDS[(level - 1) as usize];
    match xp_for_next_level(level) {
        Some(next) => (xp - floor) as f32 / (next - floor) as f32,
        None => 1.0,
    }
}

/// Streak after recording activity on `today`.
///
/// Same-day activity keeps the streak; activity the day after the last one
/// extends it; any longer gap (or no previous activity) restarts at 1.
pub fn next_streak(current: u32, last_activity: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_activity {
        Some(last) => match (today - last).num_days() {
            0 => current.max(1),
            1 => current + 1,
            _ => 1,
        },
        None => 1,
    }
}

/// Streak as it stands on `today` without new activity.
pub fn effective_streak(current: u32, last_activity: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_activity {
        Some(last) if (today - last).num_days() <= 1 => current,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn test_level_table() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(650), 4);
        assert_eq!(level_for_xp(10000), 10);
        assert_eq!(level_for_xp(999_999), MAX_LEVEL);
    }

    #[test]
    fn test_next_level_threshold() {
        assert_eq!(xp_for_next_level(1), Some(100));
        assert_eq!(xp_for_next_level(4), Some(1000));
        assert_eq!(xp_for_next_level(10), None);
    }

    #[test]
    fn test_level_progress() {
        assert_eq!(level_progress(0), 0.0);
        assert_eq!(level_progress(750), 0.5);
        assert_eq!(level_progress(20000), 1.0);
    }

    #[test]
    fn test_streak_yesterday_increments() {
        assert_eq!(next_streak(4, Some(day(9)), day(10)), 5);
    }

    #[test]
    fn test_streak_gap_resets() {
        assert_eq!(next_streak(4, Some(day(7)), day(10)), 1);
        assert_eq!(next_streak(0, None, day(10)), 1);
    }

    #[test]
    fn test_streak_same_day_unchanged() {
        assert_eq!(next_streak(4, Some(day(10)), day(10)), 4);
        assert_eq!(next_streak(0, Some(day(10)), day(10)), 1);
    }

    #[test]
    fn test_effective_streak_decays_after_missed_day() {
        assert_eq!(effective_streak(6, Some(day(9)), day(10)), 6);
        assert_eq!(effective_streak(6, Some(day(8)), day(10)), 0);
        assert_eq!(effective_streak(6, None, day(10)), 0);
    }
}
