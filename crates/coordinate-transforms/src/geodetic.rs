//! ITRS ↔ WGS-84 geodetic conversion
//!
//! Bowring's iterative method with the loaded ellipsoid parameters.
//! Convergence tolerance 1e-15 rad, capped at 20 iterations; the polar
//! axis (p ≈ 0) is handled directly.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use reference_data::Wgs84Parameters;

use crate::{Result, TransformError};

const MAX_ITERATIONS: usize = 20;
const TOLERANCE_RAD: f64 = 1e-15;
const POLAR_P_M: f64 = 1e-10;

/// WGS-84 geodetic coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_m: f64,
}

/// ITRS cartesian (meters) → WGS-84 geodetic.
pub fn itrs_to_geodetic(r_itrs_m: &Vector3<f64>, wgs84: &Wgs84Parameters) -> Result<GeodeticPosition> {
    let (x, y, z) = (r_itrs_m.x, r_itrs_m.y, r_itrs_m.z);

    let mut longitude_deg = y.atan2(x).to_degrees();
    while longitude_deg > 180.0 {
        longitude_deg -= 360.0;
    }
    while longitude_deg < -180.0 {
        longitude_deg += 360.0;
    }

    let p = (x * x + y * y).sqrt();

    // On the polar axis latitude is exact and height follows from |z|
    if p < POLAR_P_M {
        let latitude_deg = if z >= 0.0 { 90.0 } else { -90.0 };
        return Ok(GeodeticPosition {
            latitude_deg,
            longitude_deg,
            height_m: z.abs() - wgs84.semi_minor_axis_m,
        });
    }

    let (latitude_rad, height_m) = bowring(p, z, wgs84)?;

    Ok(GeodeticPosition {
        latitude_deg: latitude_rad.to_degrees(),
        longitude_deg,
        height_m,
    })
}

/// Geodetic → ITRS cartesian (meters).
pub fn geodetic_to_itrs(position: &GeodeticPosition, wgs84: &Wgs84Parameters) -> Vector3<f64> {
    let lat = position.latitude_deg.to_radians();
    let lon = position.longitude_deg.to_radians();
    let h = position.height_m;

    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    let e2 = wgs84.first_eccentricity_squared;
    let n = wgs84.semi_major_axis_m / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - e2) + h) * sin_lat,
    )
}

fn bowring(p: f64, z: f64, wgs84: &Wgs84Parameters) -> Result<(f64, f64)> {
    let a = wgs84.semi_major_axis_m;
    let b = wgs84.semi_minor_axis_m;
    let e2 = wgs84.first_eccentricity_squared;
    let ep2 = wgs84.second_eccentricity_squared;

    // Bowring's parametric-latitude initial estimate
    let theta = (z * a).atan2(p * b);
    let (sin_theta, cos_theta) = theta.sin_cos();
    let numerator = z + ep2 * b * sin_theta.powi(3);
    let denominator = p - e2 * a * cos_theta.powi(3);
    let mut latitude = if denominator.abs() < POLAR_P_M {
        z.atan2(p)
    } else {
        numerator.atan2(denominator)
    };

    let mut height = 0.0;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();

        height = if cos_lat.abs() > POLAR_P_M {
            p / cos_lat - n
        } else {
            z.abs() - b
        };

        let denom = n + height;
        let updated = if denom.abs() < POLAR_P_M {
            z.atan2(p)
        } else {
            z.atan2(p * (1.0 - e2 * n / denom))
        };

        if (updated - latitude).abs() < TOLERANCE_RAD {
            return Ok((updated, height));
        }
        latitude = updated;
    }

    // One extra residual check: sub-tolerance oscillation still counts
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let residual = (z.atan2(p * (1.0 - e2 * n / (n + height))) - latitude).abs();
    if residual < 1e-12 {
        return Ok((latitude, height));
    }

    Err(TransformError::BowringNonConvergence {
        iterations: MAX_ITERATIONS,
        p_m: p,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wgs84() -> Wgs84Parameters {
        serde_json::from_value(serde_json::json!({
            "semi_major_axis_m": 6378137.0,
            "inverse_flattening": 298.257223563,
            "gravitational_constant_m3_s2": 3.986004418e14,
            "angular_velocity_rad_s": 7.292115e-5,
            "mean_equatorial_gravity_m_s2": 9.7803253359,
            "mean_polar_gravity_m_s2": 9.8321849378,
            "atmosphere_scale_height_m": 8500.0,
            "flattening": 0.0033528106647474805,
            "semi_minor_axis_m": 6356752.314245179,
            "first_eccentricity_squared": 0.0066943799901413165,
            "second_eccentricity_squared": 0.006739496742276434
        }))
        .unwrap()
    }

    #[test]
    fn test_equator_prime_meridian() {
        let wgs84 = wgs84();
        let surface = Vector3::new(wgs84.semi_major_axis_m, 0.0, 0.0);
        let geo = itrs_to_geodetic(&surface, &wgs84).unwrap();
        assert!(geo.latitude_deg.abs() < 1e-12);
        assert!(geo.longitude_deg.abs() < 1e-12);
        assert!(geo.height_m.abs() < 1e-6);
    }

    #[test]
    fn test_polar_axis_direct_branch() {
        let wgs84 = wgs84();
        let above_north_pole = Vector3::new(0.0, 0.0, wgs84.semi_minor_axis_m + 400_000.0);
        let geo = itrs_to_geodetic(&above_north_pole, &wgs84).unwrap();
        assert_eq!(geo.latitude_deg, 90.0);
        assert!((geo.height_m - 400_000.0).abs() < 1e-6);

        let below = Vector3::new(0.0, 0.0, -(wgs84.semi_minor_axis_m + 1_000.0));
        let geo = itrs_to_geodetic(&below, &wgs84).unwrap();
        assert_eq!(geo.latitude_deg, -90.0);
    }

    #[test]
    fn test_round_trip_across_latitudes() {
        let wgs84 = wgs84();
        for &lat in &[-89.5, -60.0, -24.9442, 0.0, 24.9442, 45.0, 89.5] {
            for &h in &[0.0, 500.0, 550_000.0] {
                let input = GeodeticPosition {
                    latitude_deg: lat,
                    longitude_deg: 121.3714,
                    height_m: h,
                };
                let cart = geodetic_to_itrs(&input, &wgs84);
                let output = itrs_to_geodetic(&cart, &wgs84).unwrap();
                assert!(
                    (output.latitude_deg - lat).abs() < 1e-9,
                    "lat {lat} h {h}: got {}",
                    output.latitude_deg
                );
                assert!((output.height_m - h).abs() < 1e-3);
            }
        }
    }
}
