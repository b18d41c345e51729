//! Gap priority scoring
//!
//! priority = severity_weight * recency_weight * usage_weight
//!
//! Severity weights are a fixed monotonic mapping (low 1, medium 2,
//! high 4, critical 8). Recency decays by half-life from 1.0 down to a
//! floor, so fresh gaps outrank long-ignored ones of equal severity. The
//! decay constants are tunable configuration, not a behavioral contract.

use crate::model::GapSeverity;
use chrono::{DateTime, Utc};

/// Recency weight never decays below this
pub const RECENCY_FLOOR: f64 = 0.25;

/// Exponential half-life decay over days since first detection
pub fn recency_weight(first_detected: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (now - first_detected).num_seconds().max(0) as f64 / 86_400.0;
    if half_life_days <= 0.0 {
        return 1.0;
    }
    let weight = 0.5_f64.powf(age_days / half_life_days);
    weight.max(RECENCY_FLOOR)
}

/// Combined priority for one gap
pub fn compute_priority(
    severity: GapSeverity,
    first_detected: DateTime<Utc>,
    now: DateTime<Utc>,
    usage_weight: Option<f64>,
    half_life_days: f64,
) -> f64 {
    severity.weight() * recency_weight(first_detected, now, half_life_days) * usage_weight.unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_gap_has_full_recency() {
        let now = Utc::now();
        assert!((recency_weight(now, now, 30.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_halves_at_half_life() {
        let now = Utc::now();
        let first = now - Duration::days(30);
        let w = recency_weight(first, now, 30.0);
        assert!((w - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_recency_floor() {
        let now = Utc::now();
        let first = now - Duration::days(3650);
        assert_eq!(recency_weight(first, now, 30.0), RECENCY_FLOOR);
    }

    #[test]
    fn test_priority_scales_with_severity_and_usage() {
        let now = Utc::now();
        let low = compute_priority(GapSeverity::Low, now, now, None, 30.0);
        let critical = compute_priority(GapSeverity::Critical, now, now, None, 30.0);
        assert!((low - 1.0).abs() < 1e-9);
        assert!((critical - 8.0).abs() < 1e-9);

        let used = compute_priority(GapSeverity::Low, now, now, Some(3.0), 30.0);
        assert!((used - 3.0).abs() < 1e-9);
    }
}
