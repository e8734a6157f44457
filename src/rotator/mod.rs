mod driver;
mod error;
mod glide;
mod mapper;
mod pwm;

pub use driver::{ActuatorDriver, SimulatedRotator};
pub use error::{Axis, DriverError};
pub use glide::{GlideState, GlideStep};
pub use mapper::{map_to_rotator, RotatorAngle, RotatorLimits};
pub use pwm::{PwmConfig, PwmServo};
