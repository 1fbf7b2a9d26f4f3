//! Pure level arithmetic over the flat 100-XP window rule: every level
//! spans exactly 100 experience points, so the window for level L runs
//! from (L-1)*100 to L*100. These functions are total — any integer input
//! maps to a clamped, in-range result.

/// Width of every level window in experience points
pub const LEVEL_WINDOW_XP: i64 = 100;

/// XP still needed to finish the current level's window; never negative
pub fn xp_for_next_level(level: i64, xp: i64) -> i64 {
    let level = level.max(1);
    level
        .saturating_mul(LEVEL_WINDOW_XP)
        .saturating_sub(xp)
        .max(0)
}

/// Position inside the current level's window as a percentage in [0, 100]
pub fn level_progress_percent(level: i64, xp: i64) -> f64 {
    let level = level.max(1);
    let window_floor = (level - 1).saturating_mul(LEVEL_WINDOW_XP);
    let xp_into_window = xp.saturating_sub(window_floor);

    ((xp_into_window as f64 / LEVEL_WINDOW_XP as f64) * 100.0).clamp(0.0, 100.0)
}

/// Inverse of the window rule: the largest level whose window floor the
/// given running XP total has reached
pub fn level_for_xp(xp: i64) -> i64 {
    if xp <= 0 { 1 } else { xp / LEVEL_WINDOW_XP + 1 }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_xp_for_next_level() {
        assert_eq!(xp_for_next_level(1, 0), 100);
        assert_eq!(xp_for_next_level(1, 50), 50);
        assert_eq!(xp_for_next_level(2, 110), 90);
        assert_eq!(xp_for_next_level(2, 200), 0);

        // overshoot and garbage inputs clamp rather than go negative
        assert_eq!(xp_for_next_level(1, 5000), 0);
        assert_eq!(xp_for_next_level(-3, 0), 100);
        assert_eq!(xp_for_next_level(i64::MAX, i64::MIN), i64::MAX);
    }

    #[test]
    fn test_level_progress_percent() {
        assert_eq!(level_progress_percent(1, 50), 50.0);
        assert_eq!(level_progress_percent(1, 0), 0.0);
        assert_eq!(level_progress_percent(2, 110), 10.0);
        assert_eq!(level_progress_percent(2, 100), 0.0);

        // always inside [0, 100]
        assert_eq!(level_progress_percent(1, 5000), 100.0);
        assert_eq!(level_progress_percent(5, 0), 0.0);
        assert_eq!(level_progress_percent(-10, i64::MAX), 100.0);
        assert_eq!(level_progress_percent(i64::MAX, i64::MIN), 0.0);
    }

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(110), 2);
        assert_eq!(level_for_xp(200), 3);
        assert_eq!(level_for_xp(-50), 1);
    }
}
