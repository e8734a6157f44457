mod controller;
mod error;
mod frame;
mod parsing;
mod scheduler;
mod types;

pub use controller::{ControllerSettings, ControllerStatus, TrackingController};
pub use error::TrackerError;
pub use frame::{compute_frame, CachedFrame, FrameSettings, NextPassCache, SatelliteTelemetry};
pub use parsing::{parse_command, ParseError};
pub use scheduler::{ComputeScheduler, SchedulerSettings};
pub use types::{Command, TickOutcome, TrackingTarget};
