use serde::Serialize;

pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115e-5;
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

// WGS-84
pub const WGS84_A_KM: f64 = 6378.137;
pub const WGS84_E2: f64 = 0.00669437999014;

/// Fixed observer location on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl Default for Observer {
    fn default() -> Self {
        Self {
            latitude_deg: 0.0,
            longitude_deg: 0.0,
            altitude_m: 0.0,
        }
    }
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Parses `"lat lon"` or `"lat, lon"`.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 2 {
            return None;
        }
        let lat: f64 = parts[0].parse().ok()?;
        let lon: f64 = parts[1].parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self::new(lat, lon, altitude_m.unwrap_or(0.0)))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let sin_lon = lon.sin();
        let cos_lon = lon.cos();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        let x = (n + alt_km) * cos_lat * cos_lon;
        let y = (n + alt_km) * cos_lat * sin_lon;
        let z = (n * (1.0 - WGS84_E2) + alt_km) * sin_lat;
        [x, y, z]
    }

    pub fn velocity_ecef_km_s(&self) -> [f64; 3] {
        let pos = self.position_ecef_km();
        [
            -EARTH_ROTATION_RAD_S * pos[1],
            EARTH_ROTATION_RAD_S * pos[0],
            0.0,
        ]
    }

    /// Spherical great-circle distance to a ground point.
    pub fn great_circle_km(&self, latitude_deg: f64, longitude_deg: f64) -> f64 {
        let lat1 = self.lat_rad();
        let lat2 = latitude_deg.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (longitude_deg - self.longitude_deg).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_MEAN_RADIUS_KM * c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_and_comma_separated_coordinates() {
        let a = Observer::from_coordinates("-31.9505 115.8605", None).unwrap();
        let b = Observer::from_coordinates("-31.9505, 115.8605", Some(12.0)).unwrap();
        assert_eq!(a.latitude_deg, -31.9505);
        assert_eq!(b.longitude_deg, 115.8605);
        assert_eq!(b.altitude_m, 12.0);
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(Observer::from_coordinates("-31.9505", None).is_none());
        assert!(Observer::from_coordinates("north east", None).is_none());
        assert!(Observer::from_coordinates("95.0 10.0", None).is_none());
    }

    #[test]
    fn great_circle_quarter_meridian() {
        let equator = Observer::new(0.0, 0.0, 0.0);
        let d = equator.great_circle_km(90.0, 0.0);
        let expected = EARTH_MEAN_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn ecef_position_on_equator_is_semi_major_axis() {
        let p = Observer::new(0.0, 0.0, 0.0).position_ecef_km();
        assert!((p[0] - WGS84_A_KM).abs() < 1e-9);
        assert!(p[1].abs() < 1e-9 && p[2].abs() < 1e-9);
    }
}
