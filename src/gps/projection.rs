// src/gps/projection.rs
//! Geographic (EPSG:4326) to ETRS89 / UTM zone 33N (EPSG:25833) projection
//!
//! Transverse Mercator via the Krüger series, sixth order in the third
//! flattening. Accurate to well below a millimetre inside the zone.
//! Building the coefficient set is the expensive part, so a projection is
//! built once and shared.

/// GRS80 semi-major axis in meters
pub const GRS80_SEMI_MAJOR: f64 = 6_378_137.0;
/// GRS80 inverse flattening
pub const GRS80_INV_FLATTENING: f64 = 298.257_222_101;

/// UTM zone 33 central meridian in degrees
pub const ZONE_33_CENTRAL_MERIDIAN: f64 = 15.0;
pub const UTM_SCALE_FACTOR: f64 = 0.9996;
pub const UTM_FALSE_EASTING: f64 = 500_000.0;

/// Projected coordinate pair in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub easting: f64,
    pub northing: f64,
}

#[derive(Debug, Clone)]
pub struct UtmProjection {
    central_meridian: f64,
    /// k0 * rectifying radius
    scaled_radius: f64,
    eccentricity: f64,
    alpha: [f64; 6],
    false_easting: f64,
    false_northing: f64,
}

impl UtmProjection {
    /// The fixed target system of the bridge
    pub fn etrs89_zone33n() -> Self {
        Self::new(
            GRS80_SEMI_MAJOR,
            1.0 / GRS80_INV_FLATTENING,
            ZONE_33_CENTRAL_MERIDIAN,
            UTM_SCALE_FACTOR,
            UTM_FALSE_EASTING,
            0.0,
        )
    }

    fn new(
        semi_major: f64,
        flattening: f64,
        central_meridian: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let n = flattening / (2.0 - flattening);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let rectifying_radius = semi_major / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1_983_433.0 * n6 / 1_935_360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167_603.0 * n6 / 181_440.0,
            49561.0 * n4 / 161_280.0 - 179.0 * n5 / 168.0 + 6_601_661.0 * n6 / 7_257_600.0,
            34729.0 * n5 / 80640.0 - 3_418_889.0 * n6 / 1_995_840.0,
            212_378_941.0 * n6 / 319_334_400.0,
        ];

        Self {
            central_meridian,
            scaled_radius: scale_factor * rectifying_radius,
            eccentricity: 2.0 * n.sqrt() / (1.0 + n),
            alpha,
            false_easting,
            false_northing,
        }
    }

    /// Project (longitude, latitude) in decimal degrees
    pub fn transform(&self, longitude: f64, latitude: f64) -> Projected {
        let phi = latitude.to_radians();
        let lambda = (longitude - self.central_meridian).to_radians();

        let e = self.eccentricity;
        let sin_phi = phi.sin();
        // conformal latitude, as tan
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();

        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        Projected {
            easting: self.false_easting + self.scaled_radius * eta,
            northing: self.false_northing + self.scaled_radius * xi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::data::round_to;

    #[test]
    fn test_berlin_reference_point() {
        let projection = UtmProjection::etrs89_zone33n();
        let p = projection.transform(13.404954, 52.520008);

        assert_eq!(round_to(p.easting, 3), 391776.158);
        assert_eq!(round_to(p.northing, 3), 5820073.118);
    }

    #[test]
    fn test_repeated_calls_identical() {
        let projection = UtmProjection::etrs89_zone33n();
        let a = projection.transform(13.404954, 52.520008);
        let b = projection.transform(13.404954, 52.520008);
        assert_eq!(a.easting.to_bits(), b.easting.to_bits());
        assert_eq!(a.northing.to_bits(), b.northing.to_bits());
    }

    #[test]
    fn test_central_meridian_and_equator() {
        let projection = UtmProjection::etrs89_zone33n();
        let p = projection.transform(15.0, 0.0);
        assert!((p.easting - 500_000.0).abs() < 1e-6);
        assert!(p.northing.abs() < 1e-6);

        // meridian arc at 52N
        let p = projection.transform(15.0, 52.0);
        assert!((p.northing - 5_761_038.212).abs() < 0.01);
    }

    #[test]
    fn test_west_of_central_meridian() {
        let projection = UtmProjection::etrs89_zone33n();
        let p = projection.transform(11.516666666666667, 48.1173);
        assert!((p.easting - 240_765.798).abs() < 0.01);
        assert!((p.northing - 5_335_208.081).abs() < 0.01);
    }
}
