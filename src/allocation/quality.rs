//! Content Quality Score
//!
//! Maps watch time, interactions and provenance to a score in `[0, 1]`.
//! Watch time saturates at 60 seconds, interactions at 10.

/// Watch time (seconds) at which the score saturates.
pub const WATCH_CAP_SECS: u64 = 60;

/// Interaction count at which the bonus saturates.
pub const INTERACTION_CAP: u64 = 10;

/// Bonus for a fully interactive session.
pub const INTERACTION_BONUS: f64 = 0.1;

/// Bonus for content with verified provenance (C2PA).
pub const PROVENANCE_BONUS: f64 = 0.15;

/// Quality score for one session of one video.
pub fn quality_score(seconds_watched: u64, interactions: u64, provenance_verified: bool) -> f64 {
    let watch = seconds_watched.min(WATCH_CAP_SECS) as f64 / WATCH_CAP_SECS as f64;
    let inter = interactions.min(INTERACTION_CAP) as f64 / INTERACTION_CAP as f64;

    // Logistic centred on half the cap
    let base = 1.0 / (1.0 + (-6.0 * (watch - 0.5)).exp());
    let provenance = if provenance_verified { PROVENANCE_BONUS } else { 0.0 };

    (base + INTERACTION_BONUS * inter + provenance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        assert!((quality_score(30, 0, false) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_monotone_in_watch_time() {
        let mut last = 0.0;
        for s in 0..=60 {
            let q = quality_score(s, 0, false);
            assert!(q >= last);
            last = q;
        }
    }

    #[test]
    fn test_caps() {
        assert_eq!(quality_score(60, 0, false), quality_score(600, 0, false));
        assert_eq!(quality_score(10, 10, false), quality_score(10, 99, false));
    }

    #[test]
    fn test_bonuses_and_clamp() {
        let plain = quality_score(20, 0, false);
        assert!((quality_score(20, 10, false) - plain - 0.1).abs() < 1e-12);
        assert!((quality_score(20, 0, true) - plain - 0.15).abs() < 1e-12);
        assert_eq!(quality_score(60, 10, true), 1.0);
        assert!(quality_score(0, 0, false) > 0.0);
    }
}
