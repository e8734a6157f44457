use super::error::{Axis, DriverError};
use super::RotatorLimits;

/// Two-axis actuator commanded open loop.
///
/// `azimuth()` and `elevation()` report the last commanded angle, not a measured one.
pub trait ActuatorDriver: Send {
    fn set_azimuth(&mut self, degrees: f64) -> Result<(), DriverError>;
    fn set_elevation(&mut self, degrees: f64) -> Result<(), DriverError>;
    fn azimuth(&self) -> f64;
    fn elevation(&self) -> f64;
    fn hardware_available(&self) -> bool;
}

impl<D: ActuatorDriver + ?Sized> ActuatorDriver for Box<D> {
    fn set_azimuth(&mut self, degrees: f64) -> Result<(), DriverError> {
        (**self).set_azimuth(degrees)
    }

    fn set_elevation(&mut self, degrees: f64) -> Result<(), DriverError> {
        (**self).set_elevation(degrees)
    }

    fn azimuth(&self) -> f64 {
        (**self).azimuth()
    }

    fn elevation(&self) -> f64 {
        (**self).elevation()
    }

    fn hardware_available(&self) -> bool {
        (**self).hardware_available()
    }
}

pub(crate) fn check_range(axis: Axis, angle: f64, min: f64, max: f64) -> Result<(), DriverError> {
    if angle.is_finite() && (min..=max).contains(&angle) {
        Ok(())
    } else {
        Err(DriverError::OutOfRange {
            axis,
            angle,
            min,
            max,
        })
    }
}

/// Headless rotator that only remembers what it was told.
#[derive(Debug, Clone)]
pub struct SimulatedRotator {
    limits: RotatorLimits,
    azimuth: f64,
    elevation: f64,
    writes: usize,
}

impl SimulatedRotator {
    pub fn new(limits: RotatorLimits) -> Self {
        Self {
            limits,
            azimuth: 0.0,
            elevation: 0.0,
            writes: 0,
        }
    }

    /// Number of accepted commands on either axis.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ActuatorDriver for SimulatedRotator {
    fn set_azimuth(&mut self, degrees: f64) -> Result<(), DriverError> {
        check_range(Axis::Azimuth, degrees, self.limits.az_min, self.limits.az_max)?;
        self.azimuth = degrees;
        self.writes += 1;
        Ok(())
    }

    fn set_elevation(&mut self, degrees: f64) -> Result<(), DriverError> {
        check_range(Axis::Elevation, degrees, self.limits.el_min, self.limits.el_max)?;
        self.elevation = degrees;
        self.writes += 1;
        Ok(())
    }

    fn azimuth(&self) -> f64 {
        self.azimuth
    }

    fn elevation(&self) -> f64 {
        self.elevation
    }

    fn hardware_available(&self) -> bool {
        false
    }
}
