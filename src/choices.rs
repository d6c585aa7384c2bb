//! Random choice utilities
//!
//! Every routine takes the RNG explicitly so callers (and tests) control
//! seeding. Precondition violations assert rather than limp along.

/// Uniform integer choice in `[0, max)`.
///
/// `max` must be at least 1; selecting from nothing is a programming error.
pub fn numeric_choice(rng: &mut fastrand::Rng, max: usize) -> usize {
    assert!(max > 0, "numeric_choice requires max > 0");
    rng.usize(0..max)
}

/// Weighted boolean choice. `frequency` is how often the call returns true:
/// 0.25 means true a quarter of the time. The probability is exact, not an
/// approximation. 0 always yields false, 1 always yields true, and anything
/// outside `[0, 1]` is rejected.
pub fn bool_choice(rng: &mut fastrand::Rng, frequency: f64) -> bool {
    if frequency == 0.0 {
        // No sensible use case for always-false, but the maths below supports
        // always-true, so keep the edges consistent.
        return false;
    }
    assert!(
        (0.0..=1.0).contains(&frequency),
        "frequency must be a value between 0 and 1"
    );
    rng.f64() < frequency
}

/// Uniform float in `[lo, hi)`.
pub fn uniform(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    assert!(lo <= hi, "uniform requires lo <= hi");
    lo + (hi - lo) * rng.f64()
}

/// Uniform integer in `[lo, hi]`, inclusive on both ends.
pub fn uniform_int(rng: &mut fastrand::Rng, lo: i32, hi: i32) -> i32 {
    assert!(lo <= hi, "uniform_int requires lo <= hi");
    rng.i32(lo..=hi)
}

/// Evenly spaced stereo pan positions for `count` concurrent voices,
/// symmetric around center and spanning the full range: one voice sits at 0,
/// two sit at [-1, 1], five at [-1, -0.5, 0, 0.5, 1], and so on.
pub fn pan_positions(count: usize) -> Vec<f32> {
    assert!(count > 0, "pan_positions requires at least one position");
    if count == 1 {
        return vec![0.0];
    }

    let step = 2.0 / (count - 1) as f32;
    (0..count).map(|i| -1.0 + i as f32 * step).collect()
}

/// One pan position for a transient voice, drawn from a small discrete set
/// rather than the continuum so one-shots land at recognizable points in the
/// stereo field.
pub fn single_pan_position(rng: &mut fastrand::Rng) -> f32 {
    const POSITIONS: [f32; 5] = [-1.0, -0.5, 0.0, 0.5, 1.0];
    POSITIONS[numeric_choice(rng, POSITIONS.len())]
}
