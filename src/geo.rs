use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Bath, UK. Reference point used when no origin is configured.
pub const DEFAULT_ORIGIN: Coordinates = Coordinates {
    latitude: 51.3758,
    longitude: -2.3599,
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses `"lat,lon"`.
    pub fn parse_pair(text: &str) -> Option<Self> {
        let (lat, lon) = text.split_once(',')?;
        let latitude = lat.trim().parse::<f64>().ok()?;
        let longitude = lon.trim().parse::<f64>().ok()?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self::new(latitude, longitude))
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(from: Coordinates, to: Coordinates) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = (to.latitude - from.latitude).to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_to_self() {
        assert_eq!(haversine_m(DEFAULT_ORIGIN, DEFAULT_ORIGIN), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_m(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        // 2 * pi * R / 360
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let abbey = Coordinates::new(51.3814, -2.3590);
        let a = haversine_m(DEFAULT_ORIGIN, abbey);
        let b = haversine_m(abbey, DEFAULT_ORIGIN);
        assert!((a - b).abs() < 1e-9);
        assert!(a > 500.0 && a < 700.0, "got {a}");
    }

    #[test]
    fn parses_coordinate_pairs() {
        assert_eq!(
            Coordinates::parse_pair("51.3758, -2.3599"),
            Some(DEFAULT_ORIGIN)
        );
        assert_eq!(Coordinates::parse_pair("91,0"), None);
        assert_eq!(Coordinates::parse_pair("51.3"), None);
    }
}
