//! crates/garden_core/src/health.rs
//!
//! Plant health classification from watering timestamps.
//!
//! Dryness is the time since the last watering expressed as a percentage of
//! the watering frequency. A watering that came too soon after the previous
//! one starts an overwatering episode which fades out linearly as the plant
//! dries; while it lasts it takes precedence over the dryness ladder.

use crate::domain::PlantHealthStatus;
use chrono::{DateTime, Utc};

pub const SEVERELY_OVERWATERED_MAX_THRESHOLD: f64 = 30.0;
pub const OVERWATERED_MAX_THRESHOLD: f64 = 70.0;
pub const HEALTHY_MAX_THRESHOLD: f64 = 70.0;
pub const SLIGHTLY_DRY_MAX_THRESHOLD: f64 = 100.0;
pub const NEEDS_WATER_MAX_THRESHOLD: f64 = 130.0;

/// Dryness percentage at which an overwatering episode has fully faded.
pub const OVERWATER_STATE_RECOVERY_END_THRESHOLD: f64 = 30.0;
/// Effective severity above which the plant is severely overwatered.
pub const OVERWATERING_SEVERITY_LEVEL_THRESHOLD: f64 = 0.5;

const SECONDS_PER_DAY: f64 = 60.0 * 60.0 * 24.0;

/// Fractional number of days from `from` to `to`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Normalizes `z` clamped into `[x, y]` to `[0, 1]`.
fn relative_percentage(x: f64, y: f64, z: f64) -> f64 {
    if y == x {
        return 0.0;
    }
    let clamped = z.clamp(x, y);
    (clamped - x) / (y - x)
}

/// Computes the health bucket of a plant at instant `now`.
pub fn compute_health_status(
    last_watered: DateTime<Utc>,
    previous_last_watered: Option<DateTime<Utc>>,
    watering_frequency_days: i32,
    now: DateTime<Utc>,
) -> PlantHealthStatus {
    if watering_frequency_days <= 0 {
        return PlantHealthStatus::Unknown;
    }
    let frequency = f64::from(watering_frequency_days);

    let dryness_pct = days_between(last_watered, now) / frequency * 100.0;

    let starting_severity = match previous_last_watered {
        None => 0.0,
        Some(previous) => {
            let interval_pct = days_between(previous, last_watered) / frequency * 100.0;
            if interval_pct < SEVERELY_OVERWATERED_MAX_THRESHOLD {
                1.0
            } else if interval_pct < OVERWATERED_MAX_THRESHOLD {
                1.0 - relative_percentage(
                    SEVERELY_OVERWATERED_MAX_THRESHOLD,
                    OVERWATERED_MAX_THRESHOLD,
                    interval_pct,
                )
            } else {
                0.0
            }
        }
    };

    let decay = (1.0 - dryness_pct / OVERWATER_STATE_RECOVERY_END_THRESHOLD).clamp(0.0, 1.0);
    let effective_severity = starting_severity * decay;

    if effective_severity > 0.0 {
        if effective_severity > OVERWATERING_SEVERITY_LEVEL_THRESHOLD {
            return PlantHealthStatus::SeverelyOverwatered;
        }
        return PlantHealthStatus::Overwatered;
    }

    if dryness_pct <= HEALTHY_MAX_THRESHOLD {
        PlantHealthStatus::Healthy
    } else if dryness_pct <= SLIGHTLY_DRY_MAX_THRESHOLD {
        PlantHealthStatus::SlightlyDry
    } else if dryness_pct <= NEEDS_WATER_MAX_THRESHOLD {
        PlantHealthStatus::NeedsWater
    } else {
        PlantHealthStatus::SeverelyDry
    }
}

/// Whether a status counts towards a healthy streak.
pub fn is_healthy(status: PlantHealthStatus) -> bool {
    matches!(
        status,
        PlantHealthStatus::Healthy | PlantHealthStatus::SlightlyDry
    )
}

/// Whether the owner should be told to water the plant.
pub fn needs_attention(status: PlantHealthStatus) -> bool {
    matches!(
        status,
        PlantHealthStatus::NeedsWater | PlantHealthStatus::SeverelyDry
    )
}

/// Start of the healthy streak after a status change from `old` to `new`.
pub fn healthy_since_after_transition(
    old: PlantHealthStatus,
    new: PlantHealthStatus,
    healthy_since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (is_healthy(old), is_healthy(new)) {
        (false, true) => Some(now),
        (true, false) => None,
        _ => healthy_since,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 10, 0, 0, 0).unwrap()
    }

    fn status(last_days_ago: Duration, previous_gap: Option<Duration>, frequency: i32) -> PlantHealthStatus {
        let last = now() - last_days_ago;
        compute_health_status(last, previous_gap.map(|gap| last - gap), frequency, now())
    }

    #[test]
    fn severely_dry_at_two_hundred_percent() {
        assert_eq!(status(Duration::days(20), None, 10), PlantHealthStatus::SeverelyDry);
    }

    #[test]
    fn needs_water_past_the_frequency() {
        assert_eq!(status(Duration::days(11), None, 10), PlantHealthStatus::NeedsWater);
    }

    #[test]
    fn slightly_dry_before_the_frequency() {
        assert_eq!(status(Duration::days(9), None, 10), PlantHealthStatus::SlightlyDry);
    }

    #[test]
    fn healthy_at_half_the_frequency() {
        assert_eq!(status(Duration::days(5), None, 10), PlantHealthStatus::Healthy);
    }

    #[test]
    fn ladder_boundaries_are_inclusive() {
        assert_eq!(status(Duration::days(7), None, 10), PlantHealthStatus::Healthy);
        assert_eq!(status(Duration::days(10), None, 10), PlantHealthStatus::SlightlyDry);
        assert_eq!(status(Duration::days(13), None, 10), PlantHealthStatus::NeedsWater);
        assert_eq!(
            status(Duration::days(13) + Duration::hours(1), None, 10),
            PlantHealthStatus::SeverelyDry
        );
    }

    #[test]
    fn fresh_watering_without_history_is_healthy() {
        assert_eq!(status(Duration::hours(1), None, 10), PlantHealthStatus::Healthy);
        assert_eq!(status(Duration::days(1), None, 10), PlantHealthStatus::Healthy);
    }

    #[test]
    fn watering_again_after_a_day_is_severely_overwatered() {
        assert_eq!(
            status(Duration::hours(1), Some(Duration::days(1)), 10),
            PlantHealthStatus::SeverelyOverwatered
        );
    }

    #[test]
    fn watering_at_half_the_frequency_is_overwatered() {
        assert_eq!(
            status(Duration::hours(1), Some(Duration::days(5)), 10),
            PlantHealthStatus::Overwatered
        );
    }

    #[test]
    fn overwatering_fades_back_to_healthy() {
        assert_eq!(
            status(Duration::days(5), Some(Duration::days(1)), 10),
            PlantHealthStatus::Healthy
        );
    }

    #[test]
    fn regular_watering_is_not_overwatering() {
        assert_eq!(
            status(Duration::hours(1), Some(Duration::days(8)), 10),
            PlantHealthStatus::Healthy
        );
    }

    #[test]
    fn invalid_frequency_is_unknown() {
        assert_eq!(status(Duration::days(1), None, 0), PlantHealthStatus::Unknown);
        assert_eq!(status(Duration::days(1), None, -3), PlantHealthStatus::Unknown);
    }

    #[test]
    fn below_frequency_never_needs_water() {
        for hours in 0..(10 * 24) {
            let s = status(Duration::hours(hours), None, 10);
            assert!(is_healthy(s), "{} hours gave {}", hours, s);
        }
    }

    #[test]
    fn healthy_since_follows_streak_transitions() {
        let started = now() - Duration::days(3);
        assert_eq!(
            healthy_since_after_transition(
                PlantHealthStatus::NeedsWater,
                PlantHealthStatus::Healthy,
                None,
                now()
            ),
            Some(now())
        );
        assert_eq!(
            healthy_since_after_transition(
                PlantHealthStatus::SlightlyDry,
                PlantHealthStatus::NeedsWater,
                Some(started),
                now()
            ),
            None
        );
        assert_eq!(
            healthy_since_after_transition(
                PlantHealthStatus::Healthy,
                PlantHealthStatus::SlightlyDry,
                Some(started),
                now()
            ),
            Some(started)
        );
    }
}
