use thiserror::Error;

use crate::rotator::DriverError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("compute worker already running")]
    AlreadyRunning,
    #[error("no satellite #{0}")]
    UnknownSatellite(usize),
    #[error("actuator error: {0}")]
    Driver(#[from] DriverError),
}
