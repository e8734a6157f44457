use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::TrackerError;
use super::frame::CachedFrame;
use super::types::{Command, TickOutcome, TrackingTarget};
use crate::predict::{Ephemeris, Observer, Satellite, SkyPosition};
use crate::rotator::{map_to_rotator, ActuatorDriver, GlideState, RotatorLimits};

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub glide_duration: StdDuration,
    pub park_duration: StdDuration,
    /// Lowest rotator elevation commanded while following a pass.
    pub safety_floor_deg: f64,
    /// Rotator elevation used when the target is unsafe to follow.
    pub neutral_elevation_deg: f64,
    pub limits: RotatorLimits,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            glide_duration: StdDuration::from_secs(2),
            park_duration: StdDuration::from_secs(3),
            safety_floor_deg: -70.0,
            neutral_elevation_deg: 0.0,
            limits: RotatorLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub target: TrackingTarget,
    pub target_name: Option<String>,
    pub auto_tracking: bool,
    pub gliding: bool,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub hardware_available: bool,
}

/// Target selection, auto-tracking and glides for one rotator.
///
/// Commands and ticks come from the control loop only; the driver is never
/// touched anywhere else.
pub struct TrackingController<D: ActuatorDriver> {
    ephemeris: Arc<dyn Ephemeris>,
    satellites: Arc<[Satellite]>,
    observer: Observer,
    driver: D,
    settings: ControllerSettings,
    target: TrackingTarget,
    auto_tracking: bool,
    glide: Option<GlideState>,
    // jump detection, reset whenever we stop following a target
    was_auto: bool,
    last_tracked: Option<usize>,
    last_flipped: bool,
}

impl<D: ActuatorDriver> TrackingController<D> {
    pub fn new(
        ephemeris: Arc<dyn Ephemeris>,
        satellites: Arc<[Satellite]>,
        observer: Observer,
        driver: D,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            ephemeris,
            satellites,
            observer,
            driver,
            settings,
            target: TrackingTarget::Idle,
            auto_tracking: false,
            glide: None,
            was_auto: false,
            last_tracked: None,
            last_flipped: false,
        }
    }

    pub fn handle(&mut self, command: Command, now: DateTime<Utc>) -> Result<(), TrackerError> {
        match command {
            Command::Hover(index) => {
                self.check_index(index)?;
                if self.target.locked().is_none() {
                    self.target = TrackingTarget::Hovering(index);
                }
            }
            Command::Select(index) => {
                self.check_index(index)?;
                if self.target == TrackingTarget::Locked(index) {
                    log::info!("Unlocked {}", self.satellites[index].name);
                    self.target = TrackingTarget::Hovering(index);
                } else {
                    log::info!("Locked on {}", self.satellites[index].name);
                    self.target = TrackingTarget::Locked(index);
                }
            }
            Command::SetAutoTrack(enabled) => self.set_auto_tracking(enabled),
            Command::ToggleAutoTrack => self.set_auto_tracking(!self.auto_tracking),
            Command::ManualAzimuth(degrees) => {
                self.take_manual_control();
                self.driver.set_azimuth(degrees)?;
            }
            Command::ManualElevation(degrees) => {
                self.take_manual_control();
                self.driver.set_elevation(degrees)?;
            }
            Command::Park => {
                self.take_manual_control();
                let glide = GlideState::start(
                    self.commanded(),
                    (0.0, 0.0),
                    now,
                    self.settings.park_duration,
                    &self.settings.limits,
                );
                log::info!("Parking");
                self.glide = Some(glide);
            }
        }
        Ok(())
    }

    pub fn tick(&mut self, now: DateTime<Utc>, frame: Option<&CachedFrame>) -> TickOutcome {
        if let Some(glide) = &self.glide {
            let step = glide.step(now);
            if step.done {
                self.glide = None;
            }
            self.command(step.azimuth_deg, step.elevation_deg);
            return TickOutcome::Gliding {
                azimuth_deg: step.azimuth_deg,
                elevation_deg: step.elevation_deg,
                done: step.done,
            };
        }

        let index = match (self.target, self.auto_tracking) {
            (TrackingTarget::Locked(index), true) => index,
            _ => {
                self.reset_jump_detection();
                return TickOutcome::Idle;
            }
        };

        let Some(sky) = self.sky_position(index, now, frame) else {
            return TickOutcome::Holding;
        };

        let mapped = map_to_rotator(sky.azimuth_deg, sky.elevation_deg, &self.settings.limits);
        let jump = self.last_tracked != Some(index)
            || !self.was_auto
            || self.last_flipped != mapped.flipped;
        self.was_auto = true;
        self.last_tracked = Some(index);
        self.last_flipped = mapped.flipped;

        let safe =
            sky.elevation_deg > 0.0 && mapped.elevation_deg >= self.settings.safety_floor_deg;

        if jump {
            let target = if safe {
                (mapped.azimuth_deg, mapped.elevation_deg)
            } else {
                (self.driver.azimuth(), self.settings.neutral_elevation_deg)
            };
            let glide = GlideState::start(
                self.commanded(),
                target,
                now,
                self.settings.glide_duration,
                &self.settings.limits,
            );
            log::info!(
                "Gliding to {} at az {:.1}° el {:.1}°{}",
                self.satellites[index].name,
                glide.target_azimuth_deg,
                glide.target_elevation_deg,
                if mapped.flipped { " (flipped)" } else { "" }
            );
            self.glide = Some(glide.clone());
            return TickOutcome::GlideStarted(glide);
        }

        if safe {
            self.command(mapped.azimuth_deg, mapped.elevation_deg);
            TickOutcome::Tracking(mapped)
        } else {
            let elevation_deg = self.settings.neutral_elevation_deg;
            if let Err(e) = self.driver.set_elevation(elevation_deg) {
                log::warn!("Elevation rejected: {}", e);
            }
            TickOutcome::Safe { elevation_deg }
        }
    }

    /// Current sky position of the hovered or locked satellite, for display.
    pub fn focus_position(
        &self,
        now: DateTime<Utc>,
        frame: Option<&CachedFrame>,
    ) -> Option<(&Satellite, SkyPosition)> {
        let index = self.target.focus()?;
        let sky = self.sky_position(index, now, frame)?;
        Some((&self.satellites[index], sky))
    }

    pub fn target(&self) -> TrackingTarget {
        self.target
    }

    pub fn auto_tracking(&self) -> bool {
        self.auto_tracking
    }

    pub fn is_gliding(&self) -> bool {
        self.glide.is_some()
    }

    /// Last `(azimuth, elevation)` sent to the driver.
    pub fn commanded(&self) -> (f64, f64) {
        (self.driver.azimuth(), self.driver.elevation())
    }

    pub fn status(&self) -> ControllerStatus {
        let (azimuth_deg, elevation_deg) = self.commanded();
        ControllerStatus {
            target: self.target,
            target_name: self
                .target
                .focus()
                .map(|i| self.satellites[i].name.clone()),
            auto_tracking: self.auto_tracking,
            gliding: self.is_gliding(),
            azimuth_deg,
            elevation_deg,
            hardware_available: self.driver.hardware_available(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn set_auto_tracking(&mut self, enabled: bool) {
        if enabled == self.auto_tracking {
            return;
        }
        self.auto_tracking = enabled;
        if !enabled {
            self.glide = None;
            self.reset_jump_detection();
        }
        log::info!("Auto-tracking {}", if enabled { "on" } else { "off" });
    }

    fn take_manual_control(&mut self) {
        self.glide = None;
        self.reset_jump_detection();
        if self.auto_tracking {
            self.auto_tracking = false;
            log::info!("Auto-tracking off (manual control)");
        }
    }

    /// The next followed tick counts as a jump.
    fn reset_jump_detection(&mut self) {
        self.was_auto = false;
        self.last_tracked = None;
    }

    fn check_index(&self, index: usize) -> Result<(), TrackerError> {
        if index < self.satellites.len() {
            Ok(())
        } else {
            Err(TrackerError::UnknownSatellite(index + 1))
        }
    }

    fn sky_position(
        &self,
        index: usize,
        now: DateTime<Utc>,
        frame: Option<&CachedFrame>,
    ) -> Option<SkyPosition> {
        let satellite = &self.satellites[index];
        match self.ephemeris.position(satellite, &self.observer, now) {
            Ok(sky) => Some(sky),
            Err(e) => {
                let cached = frame
                    .filter(|f| f.telemetry.len() == self.satellites.len())
                    .and_then(|f| f.telemetry[index].as_ref())
                    .map(|t| t.sky);
                log::warn!(
                    "Live position for {} failed ({}), {}",
                    satellite.name,
                    e,
                    if cached.is_some() { "using cached frame" } else { "holding" }
                );
                cached
            }
        }
    }

    fn command(&mut self, azimuth_deg: f64, elevation_deg: f64) {
        if let Err(e) = self.driver.set_azimuth(azimuth_deg) {
            log::warn!("Azimuth rejected: {}", e);
        }
        if let Err(e) = self.driver.set_elevation(elevation_deg) {
            log::warn!("Elevation rejected: {}", e);
        }
    }
}
