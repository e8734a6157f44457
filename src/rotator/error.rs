use strum_macros::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Axis {
    Azimuth,
    Elevation,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{axis} {angle:.2}° outside [{min}, {max}]")]
    OutOfRange {
        axis: Axis,
        angle: f64,
        min: f64,
        max: f64,
    },
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
}
