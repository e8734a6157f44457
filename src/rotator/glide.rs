use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::RotatorLimits;

const MIN_GLIDE: Duration = Duration::milliseconds(10);

/// A timed linear move of both axes from one angle to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlideState {
    pub start_azimuth_deg: f64,
    pub start_elevation_deg: f64,
    pub target_azimuth_deg: f64,
    pub target_elevation_deg: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlideStep {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub done: bool,
}

impl GlideState {
    /// `current` and `target` are `(azimuth, elevation)` in degrees. The target is
    /// clamped to `limits`; durations shorter than 10 ms are stretched to 10 ms.
    pub fn start(
        current: (f64, f64),
        target: (f64, f64),
        started_at: DateTime<Utc>,
        duration: StdDuration,
        limits: &RotatorLimits,
    ) -> Self {
        let (target_azimuth_deg, target_elevation_deg) = limits.clamp(target.0, target.1);
        let duration = Duration::from_std(duration)
            .unwrap_or(Duration::MAX)
            .max(MIN_GLIDE);

        Self {
            start_azimuth_deg: current.0,
            start_elevation_deg: current.1,
            target_azimuth_deg,
            target_elevation_deg,
            started_at,
            duration,
        }
    }

    /// Fraction of the glide elapsed at `now`, in [0, 1].
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.started_at).num_microseconds().unwrap_or(i64::MAX) as f64;
        let total = self.duration.num_microseconds().unwrap_or(i64::MAX) as f64;
        (elapsed / total).clamp(0.0, 1.0)
    }

    pub fn step(&self, now: DateTime<Utc>) -> GlideStep {
        let alpha = self.progress(now);
        if alpha >= 1.0 {
            return GlideStep {
                azimuth_deg: self.target_azimuth_deg,
                elevation_deg: self.target_elevation_deg,
                done: true,
            };
        }

        GlideStep {
            azimuth_deg: lerp(self.start_azimuth_deg, self.target_azimuth_deg, alpha),
            elevation_deg: lerp(self.start_elevation_deg, self.target_elevation_deg, alpha),
            done: false,
        }
    }

    pub fn target(&self) -> (f64, f64) {
        (self.target_azimuth_deg, self.target_elevation_deg)
    }
}

fn lerp(from: f64, to: f64, alpha: f64) -> f64 {
    from + (to - from) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::epoch;

    fn two_second_glide() -> GlideState {
        GlideState::start(
            (-40.0, 10.0),
            (60.0, -30.0),
            epoch(),
            StdDuration::from_secs(2),
            &RotatorLimits::default(),
        )
    }

    #[test]
    fn starts_at_the_current_angle() {
        let step = two_second_glide().step(epoch());
        assert_eq!(step.azimuth_deg, -40.0);
        assert_eq!(step.elevation_deg, 10.0);
        assert!(!step.done);
    }

    #[test]
    fn ends_exactly_on_target() {
        let glide = two_second_glide();
        for later in [2_000, 2_001, 60_000] {
            let step = glide.step(epoch() + Duration::milliseconds(later));
            assert_eq!(step.azimuth_deg, 60.0);
            assert_eq!(step.elevation_deg, -30.0);
            assert!(step.done);
        }
    }

    #[test]
    fn halfway_is_the_midpoint() {
        let step = two_second_glide().step(epoch() + Duration::seconds(1));
        assert!((step.azimuth_deg - 10.0).abs() < 1e-9);
        assert!((step.elevation_deg + 10.0).abs() < 1e-9);
    }

    #[test]
    fn each_axis_moves_monotonically() {
        let glide = two_second_glide();
        let mut previous = glide.step(epoch());
        for ms in (50..=2_100).step_by(50) {
            let step = glide.step(epoch() + Duration::milliseconds(ms));
            assert!(step.azimuth_deg >= previous.azimuth_deg);
            assert!(step.elevation_deg <= previous.elevation_deg);
            previous = step;
        }
        assert!(previous.done);
    }

    #[test]
    fn time_before_start_holds_the_start_angle() {
        let step = two_second_glide().step(epoch() - Duration::seconds(5));
        assert_eq!(step.azimuth_deg, -40.0);
        assert!(!step.done);
    }

    #[test]
    fn target_is_clamped_and_duration_floored() {
        let glide = GlideState::start(
            (0.0, 0.0),
            (170.0, -120.0),
            epoch(),
            StdDuration::ZERO,
            &RotatorLimits::default(),
        );
        assert_eq!(glide.target(), (135.0, -90.0));
        assert_eq!(glide.duration, Duration::milliseconds(10));
        assert!(glide.step(epoch() + Duration::milliseconds(10)).done);
    }
}
