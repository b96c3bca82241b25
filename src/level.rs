/// Lifetime hours needed for each level, ascending. The multiplier at the same
/// index applies once the threshold is reached.
pub const LEVEL_THRESHOLD_HOURS: [f64; 10] = [
    0.0, 25.0, 75.0, 150.0, 300.0, 600.0, 1000.0, 1600.0, 2500.0, 4000.0,
];

pub const LEVEL_MULTIPLIERS: [f64; 10] = [1.0, 1.1, 1.25, 1.4, 1.6, 1.85, 2.1, 2.4, 2.75, 3.2];

pub const MAX_LEVEL: u32 = LEVEL_THRESHOLD_HOURS.len() as u32;

fn level_index(lifetime_minutes: u64) -> usize {
    let hours = lifetime_minutes as f64 / 60.0;
    LEVEL_THRESHOLD_HOURS
        .iter()
        .rposition(|t| hours >= *t)
        .unwrap_or(0)
}

/// Returns `(level, multiplier)`; levels past the last threshold stay pinned there.
pub fn level_and_multiplier(lifetime_minutes: u64) -> (u32, f64) {
    let i = level_index(lifetime_minutes);
    ((i + 1) as u32, LEVEL_MULTIPLIERS[i])
}

pub fn is_max_level(level: u32) -> bool {
    level >= MAX_LEVEL
}

/// Hours still needed to reach the next level, `None` at max level.
pub fn hours_to_next_level(lifetime_minutes: u64) -> Option<f64> {
    let i = level_index(lifetime_minutes);
    let next = LEVEL_THRESHOLD_HOURS.get(i + 1)?;
    let hours = lifetime_minutes as f64 / 60.0;
    Some((next - hours).max(0.0))
}
