use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::driver::{check_range, ActuatorDriver};
use super::error::{Axis, DriverError};
use super::RotatorLimits;

/// Hobby-servo pair on a Linux sysfs PWM chip.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub chip: u32,
    pub azimuth_channel: u32,
    pub elevation_channel: u32,
    pub period_us: u32,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub sysfs_root: PathBuf,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            chip: 0,
            azimuth_channel: 0,
            elevation_channel: 1,
            period_us: 20_000,
            min_pulse_us: 500,
            max_pulse_us: 2_500,
            sysfs_root: PathBuf::from("/sys/class/pwm"),
        }
    }
}

#[derive(Debug)]
struct PwmChannel {
    dir: PathBuf,
    min_angle: f64,
    max_angle: f64,
    min_pulse_ns: u64,
    max_pulse_ns: u64,
}

impl PwmChannel {
    fn open(
        chip_dir: &Path,
        channel: u32,
        period_ns: u64,
        (min_angle, max_angle): (f64, f64),
        (min_pulse_ns, max_pulse_ns): (u64, u64),
    ) -> io::Result<Self> {
        let dir = chip_dir.join(format!("pwm{}", channel));
        if !dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string())?;
        }

        let channel = Self {
            dir,
            min_angle,
            max_angle,
            min_pulse_ns,
            max_pulse_ns,
        };
        channel.write_attr("period", period_ns)?;
        channel.write_angle(0.0)?;
        channel.write_attr("enable", 1)?;
        Ok(channel)
    }

    /// Pulse width for `degrees`, linear between the range ends.
    fn pulse_ns(&self, degrees: f64) -> u64 {
        let span = self.max_angle - self.min_angle;
        let fraction = if span > 0.0 {
            ((degrees - self.min_angle) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let pulse_span = self.max_pulse_ns.saturating_sub(self.min_pulse_ns) as f64;
        self.min_pulse_ns + (fraction * pulse_span).round() as u64
    }

    fn write_angle(&self, degrees: f64) -> io::Result<()> {
        self.write_attr("duty_cycle", self.pulse_ns(degrees))
    }

    fn write_attr(&self, name: &str, value: u64) -> io::Result<()> {
        fs::write(self.dir.join(name), value.to_string())
    }
}

/// Servo driver writing pulse widths through `/sys/class/pwm`.
///
/// When the chip cannot be opened the driver keeps working as a simulation and
/// `hardware_available()` reports `false`.
pub struct PwmServo {
    limits: RotatorLimits,
    channels: Option<(PwmChannel, PwmChannel)>,
    azimuth: f64,
    elevation: f64,
}

impl PwmServo {
    pub fn open(config: &PwmConfig, limits: RotatorLimits) -> Self {
        let channels = match Self::open_channels(config, &limits) {
            Ok(channels) => {
                log::info!(
                    "Servos on pwmchip{} channels {}/{}",
                    config.chip,
                    config.azimuth_channel,
                    config.elevation_channel
                );
                Some(channels)
            }
            Err(e) => {
                log::warn!(
                    "PWM chip {} unavailable ({}), running in simulation",
                    config.chip,
                    e
                );
                None
            }
        };

        Self {
            limits,
            channels,
            azimuth: 0.0,
            elevation: 0.0,
        }
    }

    fn open_channels(
        config: &PwmConfig,
        limits: &RotatorLimits,
    ) -> io::Result<(PwmChannel, PwmChannel)> {
        let chip_dir = config.sysfs_root.join(format!("pwmchip{}", config.chip));
        if !chip_dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", chip_dir.display()),
            ));
        }

        let period_ns = u64::from(config.period_us) * 1_000;
        let pulses = (
            u64::from(config.min_pulse_us) * 1_000,
            u64::from(config.max_pulse_us) * 1_000,
        );
        let azimuth = PwmChannel::open(
            &chip_dir,
            config.azimuth_channel,
            period_ns,
            (limits.az_min, limits.az_max),
            pulses,
        )?;
        let elevation = PwmChannel::open(
            &chip_dir,
            config.elevation_channel,
            period_ns,
            (limits.el_min, limits.el_max),
            pulses,
        )?;
        Ok((azimuth, elevation))
    }
}

impl ActuatorDriver for PwmServo {
    fn set_azimuth(&mut self, degrees: f64) -> Result<(), DriverError> {
        check_range(Axis::Azimuth, degrees, self.limits.az_min, self.limits.az_max)?;
        self.azimuth = degrees;
        if let Some((channel, _)) = &self.channels {
            channel
                .write_angle(degrees)
                .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    fn set_elevation(&mut self, degrees: f64) -> Result<(), DriverError> {
        check_range(Axis::Elevation, degrees, self.limits.el_min, self.limits.el_max)?;
        self.elevation = degrees;
        if let Some((_, channel)) = &self.channels {
            channel
                .write_angle(degrees)
                .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    fn azimuth(&self) -> f64 {
        self.azimuth
    }

    fn elevation(&self) -> f64 {
        self.elevation
    }

    fn hardware_available(&self) -> bool {
        self.channels.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_chip(root: &Path) {
        let chip = root.join("pwmchip0");
        for channel in ["pwm0", "pwm1"] {
            fs::create_dir_all(chip.join(channel)).unwrap();
        }
        fs::write(chip.join("export"), "").unwrap();
    }

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    fn config(root: &Path) -> PwmConfig {
        PwmConfig {
            sysfs_root: root.to_path_buf(),
            ..PwmConfig::default()
        }
    }

    #[test]
    fn missing_chip_falls_back_to_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let mut servo = PwmServo::open(&config(dir.path()), RotatorLimits::default());
        assert!(!servo.hardware_available());
        servo.set_azimuth(45.0).unwrap();
        assert_eq!(servo.azimuth(), 45.0);
    }

    #[test]
    fn opening_centres_both_servos() {
        let dir = tempfile::tempdir().unwrap();
        fake_chip(dir.path());
        let servo = PwmServo::open(&config(dir.path()), RotatorLimits::default());
        assert!(servo.hardware_available());

        let chip = dir.path().join("pwmchip0");
        assert_eq!(read(chip.join("pwm0/period")), "20000000");
        assert_eq!(read(chip.join("pwm0/duty_cycle")), "1500000");
        assert_eq!(read(chip.join("pwm1/duty_cycle")), "1500000");
        assert_eq!(read(chip.join("pwm1/enable")), "1");
    }

    #[test]
    fn angles_map_linearly_onto_pulse_width() {
        let dir = tempfile::tempdir().unwrap();
        fake_chip(dir.path());
        let mut servo = PwmServo::open(&config(dir.path()), RotatorLimits::default());
        let chip = dir.path().join("pwmchip0");

        servo.set_azimuth(-135.0).unwrap();
        assert_eq!(read(chip.join("pwm0/duty_cycle")), "500000");
        servo.set_azimuth(135.0).unwrap();
        assert_eq!(read(chip.join("pwm0/duty_cycle")), "2500000");
        servo.set_elevation(45.0).unwrap();
        assert_eq!(read(chip.join("pwm1/duty_cycle")), "2000000");
    }

    #[test]
    fn out_of_range_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        fake_chip(dir.path());
        let mut servo = PwmServo::open(&config(dir.path()), RotatorLimits::default());
        assert!(matches!(
            servo.set_elevation(91.0),
            Err(DriverError::OutOfRange { .. })
        ));
        let duty = read(dir.path().join("pwmchip0/pwm1/duty_cycle"));
        assert_eq!(duty, "1500000");
    }
}
