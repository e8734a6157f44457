use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

use crate::predict::Observer;
use crate::rotator::{PwmConfig, RotatorLimits};
use crate::scoring::ScoringParams;
use crate::tracker::{ControllerSettings, FrameSettings, SchedulerSettings};

/// Satellite name that requests automatic selection by score.
pub const BEST: &str = "best";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    #[serde(default)]
    pub satellites: SatellitesConfig,
    #[serde(default)]
    pub intervals: IntervalsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub rotator: RotatorConfig,
    #[serde(default)]
    pub scoring: ScoringParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(default)]
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SatellitesConfig {
    pub tle_file: PathBuf,
    pub names: Vec<String>,
    pub max_tracked: usize,
    pub best_count: usize,
}

impl Default for SatellitesConfig {
    fn default() -> Self {
        Self {
            tle_file: PathBuf::from("satellites.txt"),
            names: vec![BEST.to_string()],
            max_tracked: 8,
            best_count: 4,
        }
    }
}

impl SatellitesConfig {
    pub fn wants_best(&self) -> bool {
        self.names.iter().any(|n| n.trim().eq_ignore_ascii_case(BEST))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    #[serde(deserialize_with = "parse_duration")]
    pub control_tick: Duration,
    #[serde(deserialize_with = "parse_duration")]
    pub frame_refresh: Duration,
    #[serde(deserialize_with = "parse_duration")]
    pub next_pass_refresh: Duration,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            control_tick: Duration::from_millis(100),
            frame_refresh: Duration::from_millis(500),
            next_pass_refresh: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    #[serde(deserialize_with = "parse_duration")]
    pub glide_duration: Duration,
    #[serde(deserialize_with = "parse_duration")]
    pub park_duration: Duration,
    pub min_pass_elevation_deg: f64,
    pub safety_floor_deg: f64,
    pub neutral_elevation_deg: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            glide_duration: Duration::from_secs(2),
            park_duration: Duration::from_secs(3),
            min_pass_elevation_deg: 20.0,
            safety_floor_deg: -70.0,
            neutral_elevation_deg: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Simulated,
    Pwm,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub driver: DriverKind,
    pub limits: RotatorLimits,
    pub pwm: PwmConfig,
}

/// Deserializes a humantime string such as `500ms` or `2s`.
pub(crate) fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    /// Reads, applies `SATTRACK_*` environment overrides and validates.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let seconds = |name: &str| -> Result<Option<Duration>, ConfigError> {
            let Some(raw) = lookup(name) else {
                return Ok(None);
            };
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s > 0.0)
                .map(|s| Some(Duration::from_secs_f64(s)))
                .ok_or_else(|| invalid(name, format!("expected positive seconds, got {:?}", raw)))
        };

        if let Some(d) = seconds("SATTRACK_UPDATE_INTERVAL")? {
            self.intervals.control_tick = d;
        }
        if let Some(d) = seconds("SATTRACK_MAP_UPDATE_INTERVAL")? {
            self.intervals.frame_refresh = d;
        }
        if let Some(d) = seconds("SATTRACK_PASS_UPDATE_INTERVAL")? {
            self.intervals.next_pass_refresh = d;
        }
        if let Some(raw) = lookup("SATTRACK_MAX_SATELLITES") {
            self.satellites.max_tracked = raw.trim().parse().map_err(|_| {
                invalid(
                    "SATTRACK_MAX_SATELLITES",
                    format!("expected a count, got {:?}", raw),
                )
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.observer()?;

        let intervals = [
            ("intervals.control_tick", self.intervals.control_tick),
            ("intervals.frame_refresh", self.intervals.frame_refresh),
            ("intervals.next_pass_refresh", self.intervals.next_pass_refresh),
            ("tracking.glide_duration", self.tracking.glide_duration),
            ("tracking.park_duration", self.tracking.park_duration),
            ("scoring.lookahead_step", self.scoring.lookahead_step),
        ];
        for (field, value) in intervals {
            if value.is_zero() {
                return Err(invalid(field, "must be positive"));
            }
        }

        let limits = &self.rotator.limits;
        if limits.az_min >= limits.az_max {
            return Err(invalid("rotator.limits", "az_min must be below az_max"));
        }
        if limits.el_min >= limits.el_max {
            return Err(invalid("rotator.limits", "el_min must be below el_max"));
        }
        if !(limits.el_min..=limits.el_max).contains(&self.tracking.neutral_elevation_deg) {
            return Err(invalid(
                "tracking.neutral_elevation_deg",
                format!("must be within [{}, {}]", limits.el_min, limits.el_max),
            ));
        }

        let pwm = &self.rotator.pwm;
        if pwm.min_pulse_us >= pwm.max_pulse_us || pwm.max_pulse_us > pwm.period_us {
            return Err(invalid(
                "rotator.pwm",
                "pulses must satisfy min < max <= period",
            ));
        }

        if self.satellites.names.is_empty() {
            return Err(invalid("satellites.names", "at least one name or \"best\""));
        }
        if self.satellites.max_tracked == 0 {
            return Err(invalid("satellites.max_tracked", "must be at least 1"));
        }
        if self.satellites.best_count == 0 {
            return Err(invalid("satellites.best_count", "must be at least 1"));
        }
        if self.scoring.slope_deg == 0.0 || !self.scoring.slope_deg.is_finite() {
            return Err(invalid("scoring.slope_deg", "must be non-zero"));
        }
        if self.scoring.lookahead_samples == 0 {
            return Err(invalid("scoring.lookahead_samples", "must be at least 1"));
        }
        Ok(())
    }

    pub fn observer(&self) -> Result<Observer, ConfigError> {
        Observer::from_coordinates(&self.station.coordinates, Some(self.station.altitude_m))
            .ok_or_else(|| {
                invalid(
                    "station.coordinates",
                    format!("cannot parse {:?}", self.station.coordinates),
                )
            })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            frame_refresh: self.intervals.frame_refresh,
            next_pass_refresh: self.intervals.next_pass_refresh,
            frame: FrameSettings {
                scoring: self.scoring.clone(),
                min_pass_elevation_deg: self.tracking.min_pass_elevation_deg,
            },
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            glide_duration: self.tracking.glide_duration,
            park_duration: self.tracking.park_duration,
            safety_floor_deg: self.tracking.safety_floor_deg,
            neutral_elevation_deg: self.tracking.neutral_elevation_deg,
            limits: self.rotator.limits,
        }
    }
}
