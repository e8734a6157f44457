use serde::Serialize;

/// Opaque reference into an ephemeris provider's catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EphemerisHandle(pub(crate) usize);

impl EphemerisHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A satellite from the loaded set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Satellite {
    pub name: String,
    pub norad_id: u32,
    pub handle: EphemerisHandle,
}

/// Line-of-sight position of a satellite from the observer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkyPosition {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub distance_km: f64,
    pub velocity_mps: f64,
    pub range_rate_km_s: f64,
}

/// Point on the ground directly below the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Subpoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}
