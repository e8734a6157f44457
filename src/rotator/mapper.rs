use serde::{Deserialize, Serialize};

const NORTH_EPSILON: f64 = 1e-9;

/// Mechanical travel of the two axes, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RotatorLimits {
    pub az_min: f64,
    pub az_max: f64,
    pub el_min: f64,
    pub el_max: f64,
}

impl Default for RotatorLimits {
    fn default() -> Self {
        Self {
            az_min: -135.0,
            az_max: 135.0,
            el_min: -90.0,
            el_max: 90.0,
        }
    }
}

impl RotatorLimits {
    pub fn contains(&self, azimuth_deg: f64, elevation_deg: f64) -> bool {
        (self.az_min..=self.az_max).contains(&azimuth_deg)
            && (self.el_min..=self.el_max).contains(&elevation_deg)
    }

    pub fn clamp(&self, azimuth_deg: f64, elevation_deg: f64) -> (f64, f64) {
        (
            azimuth_deg.clamp(self.az_min, self.az_max),
            elevation_deg.clamp(self.el_min, self.el_max),
        )
    }

    /// Total distance both axes would have to be moved to fit inside the limits.
    fn clamp_cost(&self, azimuth_deg: f64, elevation_deg: f64) -> f64 {
        let (az, el) = self.clamp(azimuth_deg, elevation_deg);
        (az - azimuth_deg).abs() + (el - elevation_deg).abs()
    }
}

/// Angle to command on the rotator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotatorAngle {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    /// Reached by turning the azimuth axis half a revolution and tilting past zenith.
    pub flipped: bool,
}

/// Maps a sky direction onto the rotator.
///
/// The elevation axis tilts through the zenith, so every direction can be reached
/// either directly or with the azimuth axis turned 180°. The direct solution wins
/// whenever it fits the limits. When neither fits, the one needing the least
/// clamping is returned, which is always within `limits`.
pub fn map_to_rotator(sky_az: f64, sky_el: f64, limits: &RotatorLimits) -> RotatorAngle {
    let (direct_az, direct_el) = tilt_solution(sky_az, sky_el);
    if limits.contains(direct_az, direct_el) {
        return RotatorAngle {
            azimuth_deg: direct_az,
            elevation_deg: direct_el,
            flipped: false,
        };
    }

    let (flipped_az, flipped_el) = tilt_solution(sky_az + 180.0, sky_el);
    if limits.contains(flipped_az, flipped_el) {
        return RotatorAngle {
            azimuth_deg: flipped_az,
            elevation_deg: flipped_el,
            flipped: true,
        };
    }

    let direct_cost = limits.clamp_cost(direct_az, direct_el);
    let flipped_cost = limits.clamp_cost(flipped_az, flipped_el);
    let (az, el, flipped) = if flipped_cost < direct_cost {
        (flipped_az, flipped_el, true)
    } else {
        (direct_az, direct_el, false)
    };
    let (azimuth_deg, elevation_deg) = limits.clamp(az, el);
    RotatorAngle {
        azimuth_deg,
        elevation_deg,
        flipped,
    }
}

/// Azimuth in (-180, 180] and signed tilt from zenith pointing along `az`.
fn tilt_solution(az_deg: f64, el_deg: f64) -> (f64, f64) {
    let az = az_deg.to_radians();
    let el = el_deg.to_radians();
    let east = el.cos() * az.sin();
    let north = el.cos() * az.cos();
    let up = el.sin();

    let azimuth = normalize_deg(east.atan2(north).to_degrees());
    let from_zenith = up.clamp(-1.0, 1.0).acos().to_degrees();
    let sign = if north.abs() > NORTH_EPSILON {
        1.0_f64.copysign(north)
    } else {
        1.0_f64.copysign(az.cos())
    };

    (azimuth, (from_zenith * sign).clamp(-90.0, 90.0))
}

fn normalize_deg(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn direct_mapping_is_kept_when_it_fits() {
        let angle = map_to_rotator(10.0, 5.0, &RotatorLimits::default());
        assert!(!angle.flipped);
        assert!(close(angle.azimuth_deg, 10.0));
        assert!(close(angle.elevation_deg, 85.0));
    }

    #[test]
    fn azimuth_beyond_travel_is_flipped() {
        let angle = map_to_rotator(170.0, 80.0, &RotatorLimits::default());
        assert!(angle.flipped);
        assert!(close(angle.azimuth_deg, -10.0));
        assert!(close(angle.elevation_deg, 10.0));
    }

    #[test]
    fn zenith_is_straight_up() {
        let angle = map_to_rotator(0.0, 90.0, &RotatorLimits::default());
        assert!(!angle.flipped);
        assert!(close(angle.elevation_deg, 0.0));
    }

    #[test]
    fn due_south_needs_the_flip() {
        // Due south cannot be reached directly with ±135° of azimuth travel.
        let angle = map_to_rotator(180.0, 30.0, &RotatorLimits::default());
        assert!(angle.flipped);
        assert!(close(angle.azimuth_deg, 0.0));
        assert!(close(angle.elevation_deg, 60.0));
    }

    #[test]
    fn due_east_uses_the_azimuth_sign_tie_break() {
        let angle = map_to_rotator(90.0, 20.0, &RotatorLimits::default());
        assert!(!angle.flipped);
        assert!(close(angle.azimuth_deg, 90.0));
        assert!(close(angle.elevation_deg.abs(), 70.0));
    }

    #[test]
    fn normalize_keeps_half_open_range() {
        assert_eq!(normalize_deg(180.0), 180.0);
        assert_eq!(normalize_deg(-180.0), 180.0);
        assert!(close(normalize_deg(540.0), 180.0));
        assert!(close(normalize_deg(-190.0), 170.0));
        assert!(close(normalize_deg(359.0), -1.0));
    }

    #[test]
    fn unreachable_direction_is_clamped_inside_narrow_limits() {
        let limits = RotatorLimits {
            az_min: -30.0,
            az_max: 30.0,
            el_min: -45.0,
            el_max: 45.0,
        };
        let angle = map_to_rotator(100.0, 10.0, &limits);
        assert!(limits.contains(angle.azimuth_deg, angle.elevation_deg));
    }

    proptest! {
        #[test]
        fn output_always_within_default_limits(az in 0.0f64..360.0, el in -90.0f64..=90.0) {
            let limits = RotatorLimits::default();
            let angle = map_to_rotator(az, el, &limits);
            prop_assert!(limits.contains(angle.azimuth_deg, angle.elevation_deg));
        }

        #[test]
        fn output_always_within_arbitrary_limits(
            az in 0.0f64..360.0,
            el in -90.0f64..=90.0,
            az_span in 10.0f64..180.0,
            el_span in 10.0f64..90.0,
        ) {
            let limits = RotatorLimits {
                az_min: -az_span,
                az_max: az_span,
                el_min: -el_span,
                el_max: el_span,
            };
            let angle = map_to_rotator(az, el, &limits);
            prop_assert!(limits.contains(angle.azimuth_deg, angle.elevation_deg));
        }

        #[test]
        fn direct_wins_when_both_fit(az in -90.0f64..90.0, el in 0.0f64..=90.0) {
            // Wide limits: both solutions fit for any northern-sky direction.
            let limits = RotatorLimits {
                az_min: -180.0,
                az_max: 180.0,
                el_min: -90.0,
                el_max: 90.0,
            };
            let angle = map_to_rotator(az, el, &limits);
            prop_assert!(!angle.flipped);
        }
    }
}
