//! Hot score: decaying popularity used to order the feed.
//!
//! ```text
//! score = (likes * 1.0 + comments * 0.5 + shares * 2.0) / (age_hours + 2) ^ 1.2
//! ```
//!
//! The `+ 2` offset keeps the divisor at or above 2^1.2, so brand-new posts get a
//! finite score and are never divided by zero.

use chrono::{DateTime, Utc};

pub const LIKE_WEIGHT: f64 = 1.0;
pub const COMMENT_WEIGHT: f64 = 0.5;
pub const SHARE_WEIGHT: f64 = 2.0;
pub const AGE_OFFSET_HOURS: f64 = 2.0;
pub const GRAVITY: f64 = 1.2;

/// Compute the hot score for a post.
///
/// Negative or NaN ages are clamped to 0.
pub fn compute_hot_score(likes: u64, comments: u64, shares: u64, age_hours: f64) -> f64 {
    let age = if age_hours.is_nan() {
        0.0
    } else {
        age_hours.max(0.0)
    };

    let engagement =
        likes as f64 * LIKE_WEIGHT + comments as f64 * COMMENT_WEIGHT + shares as f64 * SHARE_WEIGHT;

    engagement / (age + AGE_OFFSET_HOURS).powf(GRAVITY)
}

/// Age used by the worker: elapsed time rounded up to whole hours, at least 1.
pub fn age_hours_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed_secs = (now - created_at).num_seconds().max(0);
    let hours = (elapsed_secs + 3599) / 3600;
    hours.max(1) as f64
}

/// Counters from storage are signed; anything negative counts as zero engagement.
pub fn counter(value: i64) -> u64 {
    value.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_zero_engagement_scores_zero() {
        assert_eq!(compute_hot_score(0, 0, 0, 0.0), 0.0);
        assert_eq!(compute_hot_score(0, 0, 0, 1000.0), 0.0);
    }

    #[test]
    fn test_age_zero_is_finite() {
        let score = compute_hot_score(10, 0, 0, 0.0);
        assert!(score.is_finite());
        assert!((score - 10.0 / 2f64.powf(1.2)).abs() < EPS);
    }

    #[test]
    fn test_negative_and_nan_age_clamped() {
        let at_zero = compute_hot_score(3, 2, 1, 0.0);
        assert_eq!(compute_hot_score(3, 2, 1, -5.0), at_zero);
        assert_eq!(compute_hot_score(3, 2, 1, f64::NAN), at_zero);
    }

    #[test]
    fn test_weights() {
        // 2 comments weigh as much as 1 like; 1 share as much as 2 likes
        let likes = compute_hot_score(2, 0, 0, 5.0);
        let comments = compute_hot_score(0, 4, 0, 5.0);
        let shares = compute_hot_score(0, 0, 1, 5.0);
        assert!((likes - comments).abs() < EPS);
        assert!((likes - shares).abs() < EPS);
    }

    #[test]
    fn test_monotonic_in_engagement() {
        for age in [0.0, 1.0, 6.0, 48.0] {
            for base in 0..20u64 {
                let s = compute_hot_score(base, base, base, age);
                assert!(compute_hot_score(base + 1, base, base, age) >= s);
                assert!(compute_hot_score(base, base + 1, base, age) >= s);
                assert!(compute_hot_score(base, base, base + 1, age) >= s);
            }
        }
    }

    #[test]
    fn test_non_increasing_in_age() {
        let mut previous = f64::INFINITY;
        for hour in 0..200 {
            let score = compute_hot_score(12, 4, 3, hour as f64 * 0.5);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_five_likes_two_hours() {
        let score = compute_hot_score(5, 0, 0, 2.0);
        let expected = 5.0 / 4f64.powf(1.2);
        assert!((score - expected).abs() < EPS);
        assert!((score - 0.947).abs() < 1e-3);
    }

    #[test]
    fn test_age_hours_rounds_up_with_floor_of_one() {
        let now = Utc::now();
        assert_eq!(age_hours_since(now, now), 1.0);
        assert_eq!(age_hours_since(now - Duration::minutes(10), now), 1.0);
        assert_eq!(age_hours_since(now - Duration::minutes(61), now), 2.0);
        assert_eq!(age_hours_since(now - Duration::hours(2), now), 2.0);
        assert_eq!(age_hours_since(now - Duration::hours(49), now), 49.0);
        // Clock skew: created "in the future"
        assert_eq!(age_hours_since(now + Duration::hours(3), now), 1.0);
    }

    #[test]
    fn test_counter_clamps_negative() {
        assert_eq!(counter(-3), 0);
        assert_eq!(counter(42), 42);
    }
}
