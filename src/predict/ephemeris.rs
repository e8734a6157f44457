use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use crate::predict::ground_station::{Observer, EARTH_ROTATION_RAD_S, WGS84_A_KM, WGS84_E2};
use crate::predict::{PredictError, Satellite, SkyPosition, Subpoint};

/// Source of topocentric satellite positions.
///
/// Implementations must be cheap enough to call many times per control tick
/// and must accept any instant, past or future.
pub trait Ephemeris: Send + Sync {
    fn position(
        &self,
        satellite: &Satellite,
        observer: &Observer,
        at: DateTime<Utc>,
    ) -> Result<SkyPosition, PredictError>;

    fn subpoint(&self, satellite: &Satellite, at: DateTime<Utc>)
        -> Result<Subpoint, PredictError>;
}

pub struct OrbitEntry {
    pub elements: Elements,
    pub constants: Constants,
}

/// SGP4 propagation over a catalogue of TLE elements.
pub struct Sgp4Ephemeris {
    catalog: Vec<OrbitEntry>,
}

impl Sgp4Ephemeris {
    pub fn new(catalog: Vec<OrbitEntry>) -> Self {
        Self { catalog }
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    fn entry(&self, satellite: &Satellite) -> Result<&OrbitEntry, PredictError> {
        self.catalog
            .get(satellite.handle.index())
            .ok_or(PredictError::UnknownHandle(satellite.handle.index()))
    }

    /// Satellite position and velocity in ECEF (km, km/s).
    fn ecef_state(
        &self,
        satellite: &Satellite,
        at: DateTime<Utc>,
    ) -> Result<([f64; 3], [f64; 3]), PredictError> {
        let entry = self.entry(satellite)?;
        let minutes = entry
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;
        let prediction = entry.constants.propagate(minutes)?;

        let sidereal =
            sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()));

        Ok((
            teme_to_ecef_position(prediction.position, sidereal),
            teme_to_ecef_velocity(prediction.position, prediction.velocity, sidereal),
        ))
    }
}

impl Ephemeris for Sgp4Ephemeris {
    fn position(
        &self,
        satellite: &Satellite,
        observer: &Observer,
        at: DateTime<Utc>,
    ) -> Result<SkyPosition, PredictError> {
        let (sat_ecef, sat_vel_ecef) = self.ecef_state(satellite, at)?;
        let sta_ecef = observer.position_ecef_km();
        let sta_vel = observer.velocity_ecef_km_s();

        let dr = [
            sat_ecef[0] - sta_ecef[0],
            sat_ecef[1] - sta_ecef[1],
            sat_ecef[2] - sta_ecef[2],
        ];
        let range_km = norm(dr);

        let (east, north, up) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
        let azimuth = east.atan2(north).to_degrees().rem_euclid(360.0);
        let elevation = if range_km > 0.0 {
            (up / range_km).clamp(-1.0, 1.0).asin().to_degrees()
        } else {
            0.0
        };

        let rel_vel = [
            sat_vel_ecef[0] - sta_vel[0],
            sat_vel_ecef[1] - sta_vel[1],
            sat_vel_ecef[2] - sta_vel[2],
        ];
        let range_rate_km_s = if range_km > 0.0 {
            (rel_vel[0] * dr[0] + rel_vel[1] * dr[1] + rel_vel[2] * dr[2]) / range_km
        } else {
            0.0
        };

        Ok(SkyPosition {
            azimuth_deg: azimuth,
            elevation_deg: elevation,
            distance_km: range_km,
            velocity_mps: norm(rel_vel) * 1000.0,
            range_rate_km_s,
        })
    }

    fn subpoint(
        &self,
        satellite: &Satellite,
        at: DateTime<Utc>,
    ) -> Result<Subpoint, PredictError> {
        let (sat_ecef, _) = self.ecef_state(satellite, at)?;
        Ok(ecef_to_geodetic(sat_ecef))
    }
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn teme_to_ecef_velocity(pos_teme: [f64; 3], vel_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    let pos = teme_to_ecef_position(pos_teme, gmst);
    let rotated = [
        vel_teme[0] * cos_gmst + vel_teme[1] * sin_gmst,
        -vel_teme[0] * sin_gmst + vel_teme[1] * cos_gmst,
        vel_teme[2],
    ];
    [
        rotated[0] + EARTH_ROTATION_RAD_S * pos[1],
        rotated[1] - EARTH_ROTATION_RAD_S * pos[0],
        rotated[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// WGS-84 geodetic coordinates of an ECEF point (fixed-point iteration on latitude).
pub fn ecef_to_geodetic(pos: [f64; 3]) -> Subpoint {
    let p = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
    let lon = pos[1].atan2(pos[0]);
    let mut lat = pos[2].atan2(p * (1.0 - WGS84_E2));
    let mut alt = 0.0;

    for _ in 0..5 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        alt = if lat.cos().abs() > 1e-12 {
            p / lat.cos() - n
        } else {
            pos[2].abs() - n * (1.0 - WGS84_E2)
        };
        lat = pos[2].atan2(p * (1.0 - WGS84_E2 * n / (n + alt)));
    }

    Subpoint {
        latitude_deg: lat.to_degrees(),
        longitude_deg: lon.to_degrees(),
        altitude_km: alt,
    }
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enu_of_point_straight_up_is_pure_up() {
        let observer = Observer::new(-31.9505, 115.8605, 0.0);
        let station = observer.position_ecef_km();
        let scale = 500.0 / WGS84_A_KM;
        let dr = [station[0] * scale, station[1] * scale, station[2] * scale];
        let (e, n, u) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
        // Geocentric and geodetic verticals differ slightly away from the equator.
        assert!(u > 499.0);
        assert!(e.abs() < 1.0);
        assert!(n.abs() < 5.0);
    }

    #[test]
    fn geodetic_round_trip_of_observer_position() {
        let observer = Observer::new(-31.9505, 115.8605, 850_000.0);
        let sub = ecef_to_geodetic(observer.position_ecef_km());
        assert!((sub.latitude_deg - observer.latitude_deg).abs() < 1e-5);
        assert!((sub.longitude_deg - observer.longitude_deg).abs() < 1e-9);
        assert!((sub.altitude_km - 850.0).abs() < 1e-2);
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let ephemeris = Sgp4Ephemeris::new(Vec::new());
        let sat = Satellite {
            name: "GHOST".into(),
            norad_id: 1,
            handle: crate::predict::EphemerisHandle(3),
        };
        let err = ephemeris
            .position(&sat, &Observer::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, PredictError::UnknownHandle(3)));
    }
}
