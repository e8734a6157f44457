use serde::Serialize;

use crate::rotator::{GlideState, RotatorAngle};

/// Operator input, indices are 0-based into the tracked satellite set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Hover(usize),
    Select(usize),
    SetAutoTrack(bool),
    ToggleAutoTrack,
    ManualAzimuth(f64),
    ManualElevation(f64),
    Park,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum TrackingTarget {
    #[default]
    Idle,
    Hovering(usize),
    Locked(usize),
}

impl TrackingTarget {
    pub fn locked(&self) -> Option<usize> {
        match self {
            TrackingTarget::Locked(i) => Some(*i),
            _ => None,
        }
    }

    /// Satellite shown in the preview, locked or merely hovered.
    pub fn focus(&self) -> Option<usize> {
        match self {
            TrackingTarget::Idle => None,
            TrackingTarget::Hovering(i) | TrackingTarget::Locked(i) => Some(*i),
        }
    }
}

/// What a control tick did with the actuator.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not locked with auto-tracking on; nothing commanded.
    Idle,
    Gliding {
        azimuth_deg: f64,
        elevation_deg: f64,
        done: bool,
    },
    /// A jump was detected and a glide towards the new target begun.
    GlideStarted(GlideState),
    Tracking(RotatorAngle),
    /// Target below the horizon or past the safety floor; elevation parked.
    Safe { elevation_deg: f64 },
    /// No position available for the locked satellite.
    Holding,
}

impl TickOutcome {
    pub fn is_jump(&self) -> bool {
        matches!(self, TickOutcome::GlideStarted(_))
    }
}
