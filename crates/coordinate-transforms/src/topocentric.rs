//! Topocentric geometry
//!
//! Satellite ITRS state relative to a fixed observer, expressed in the
//! observer's East-North-Up frame: elevation, azimuth from north, slant
//! range and range rate.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed ground observer, WGS-84 geodetic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

/// Look angles of one satellite sample from the observer.
#[derive(Debug, Clone, Copy)]
pub struct LookAngles {
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
    pub range_rate_km_per_s: f64,
}

/// ITRS→ENU rotation for an observer at the given geodetic location.
pub fn enu_rotation(latitude_deg: f64, longitude_deg: f64) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude_deg.to_radians().sin_cos();

    Matrix3::new(
        -sin_lon,
        cos_lon,
        0.0,
        -sin_lat * cos_lon,
        -sin_lat * sin_lon,
        cos_lat,
        cos_lat * cos_lon,
        cos_lat * sin_lon,
        sin_lat,
    )
}

/// Look angles from observer and satellite ITRS states (km, km/s). The
/// observer is Earth-fixed, so the satellite's ITRS velocity is already the
/// relative velocity.
pub fn look_angles(
    observer_itrs_km: &Vector3<f64>,
    enu_rotation: &Matrix3<f64>,
    satellite_itrs_km: &Vector3<f64>,
    satellite_velocity_itrs_km_s: &Vector3<f64>,
) -> LookAngles {
    let relative = satellite_itrs_km - observer_itrs_km;
    let enu = enu_rotation * relative;

    let range_km = enu.norm();
    let elevation_deg = (enu.z / range_km).asin().to_degrees();
    let azimuth_deg = enu.x.atan2(enu.y).to_degrees().rem_euclid(360.0);
    let range_rate_km_per_s = relative.dot(satellite_velocity_itrs_km_s) / range_km;

    LookAngles {
        elevation_deg,
        azimuth_deg,
        range_km,
        range_rate_km_per_s,
    }
}
