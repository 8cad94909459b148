use super::PositionFix;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two fixes in meters.
///
/// Spherical approximation; good to within consumer GPS accuracy. Callers
/// must pass validated coordinates.
pub fn distance_between(from: &PositionFix, to: &PositionFix) -> f64 {
    haversine(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Total length of a track in meters.
pub fn path_distance(points: &[PositionFix]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| distance_between(&w[0], &w[1]))
        .sum()
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64) -> PositionFix {
        PositionFix::now(lat, lon, 5.0)
    }

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_between(&fix(47.0, 8.0), &fix(47.0, 8.0)), 0.0);
    }

    #[test]
    fn small_longitude_step_on_equator() {
        let d = distance_between(&fix(0.0, 0.0), &fix(0.0, 0.0001));
        assert!((d - 11.1195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_between(&fix(0.0, 0.0), &fix(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = fix(51.5007, -0.1246);
        let b = fix(48.8584, 2.2945);
        assert!((distance_between(&a, &b) - distance_between(&b, &a)).abs() < 1e-9);
        // London to Paris is roughly 340 km
        assert!((distance_between(&a, &b) - 340_000.0).abs() < 5_000.0);
    }

    #[test]
    fn antipodal_points_do_not_nan() {
        let d = distance_between(&fix(0.0, 0.0), &fix(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn path_sums_segments() {
        let track = [fix(0.0, 0.0), fix(0.0, 0.0001), fix(0.0, 0.0002)];
        let expected = distance_between(&track[0], &track[1]) + distance_between(&track[1], &track[2]);
        assert!((path_distance(&track) - expected).abs() < 1e-9);
        assert_eq!(path_distance(&track[..1]), 0.0);
        assert_eq!(path_distance(&[]), 0.0);
    }
}
