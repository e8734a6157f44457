//! Deterministic ephemeris fakes shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use crate::predict::{
    Ephemeris, EphemerisHandle, Observer, PredictError, Satellite, SkyPosition, Subpoint,
};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Seconds since [`epoch`] -> (azimuth, elevation, distance), or `None` to fail.
type Profile = Box<dyn Fn(f64) -> Option<(f64, f64, f64)> + Send + Sync>;

pub struct FakeTrack {
    name: String,
    profile: Profile,
}

impl FakeTrack {
    pub fn custom(
        name: &str,
        profile: impl Fn(f64) -> Option<(f64, f64, f64)> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            profile: Box::new(profile),
        }
    }

    pub fn fixed(name: &str, azimuth: f64, elevation: f64, distance_km: f64) -> Self {
        Self::custom(name, move |_| Some((azimuth, elevation, distance_km)))
    }

    /// Elevation changing linearly with time, due east.
    pub fn ramp(name: &str, start_el: f64, deg_per_minute: f64, distance_km: f64) -> Self {
        Self::custom(name, move |t| {
            Some((90.0, start_el + deg_per_minute * t / 60.0, distance_km))
        })
    }

    pub fn failing(name: &str) -> Self {
        Self::custom(name, |_| None)
    }
}

pub struct FakeEphemeris {
    tracks: Vec<FakeTrack>,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeEphemeris {
    pub fn with_tracks(tracks: Vec<FakeTrack>) -> (Self, Vec<Satellite>) {
        let satellites = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| Satellite {
                name: t.name.clone(),
                norad_id: 40_000 + i as u32,
                handle: EphemerisHandle(i),
            })
            .collect();
        let ephemeris = Self {
            tracks,
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        (ephemeris, satellites)
    }

    /// Makes every position query sleep, so overlapping callers become observable.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn sample(&self, satellite: &Satellite, at: DateTime<Utc>) -> Result<(f64, f64, f64), PredictError> {
        let track = self
            .tracks
            .get(satellite.handle.index())
            .ok_or(PredictError::UnknownHandle(satellite.handle.index()))?;
        let t = (at - epoch()).num_milliseconds() as f64 / 1000.0;
        (track.profile)(t).ok_or_else(|| PredictError::Propagation("fake failure".into()))
    }
}

impl Ephemeris for FakeEphemeris {
    fn position(
        &self,
        satellite: &Satellite,
        _observer: &Observer,
        at: DateTime<Utc>,
    ) -> Result<SkyPosition, PredictError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let result = self.sample(satellite, at);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (azimuth_deg, elevation_deg, distance_km) = result?;
        Ok(SkyPosition {
            azimuth_deg,
            elevation_deg,
            distance_km,
            velocity_mps: 7500.0,
            range_rate_km_s: 0.0,
        })
    }

    fn subpoint(
        &self,
        satellite: &Satellite,
        at: DateTime<Utc>,
    ) -> Result<Subpoint, PredictError> {
        let (_, _, distance_km) = self.sample(satellite, at)?;
        Ok(Subpoint {
            latitude_deg: -30.0,
            longitude_deg: 116.0,
            altitude_km: distance_km,
        })
    }
}
