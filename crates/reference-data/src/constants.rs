//! Constants provider
//!
//! Parses the on-disk IAU 2012 Resolution B2 constants and the NIMA TR
//! 8350.2 WGS-84 parameter set. Both files are parsed once; derived
//! ellipsoid quantities are computed at load time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ReferenceDataError, Result};

/// IAU 2012 Resolution B2 astronomical constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstronomicalConstants {
    /// Astronomical unit in kilometers (exact by IAU 2012 Resolution B2).
    pub astronomical_unit_km: f64,
    /// Speed of light in m/s (exact by definition).
    pub speed_of_light_m_s: f64,
}

#[derive(Debug, Deserialize)]
struct IauConstantsFile {
    astronomical_unit: IauValue,
    #[serde(default)]
    speed_of_light_m_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IauValue {
    value_kilometers: f64,
}

impl AstronomicalConstants {
    /// Load from `iau_constants.json`. The file must exist and must carry
    /// `astronomical_unit.value_kilometers`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_reference_file(path)?;
        let parsed: IauConstantsFile =
            serde_json::from_str(&raw).map_err(|source| ReferenceDataError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        if !parsed.astronomical_unit.value_kilometers.is_finite()
            || parsed.astronomical_unit.value_kilometers <= 0.0
        {
            return Err(ReferenceDataError::FieldMissing {
                file: path.display().to_string(),
                field: "astronomical_unit.value_kilometers".into(),
            });
        }

        Ok(Self {
            astronomical_unit_km: parsed.astronomical_unit.value_kilometers,
            speed_of_light_m_s: parsed.speed_of_light_m_s.unwrap_or(299_792_458.0),
        })
    }
}

/// WGS-84 (G1150) parameter set from NIMA TR 8350.2.
///
/// Defining parameters come straight from the reference file; the ellipsoid
/// quantities below them are derived once at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wgs84Parameters {
    pub semi_major_axis_m: f64,
    pub inverse_flattening: f64,
    pub gravitational_constant_m3_s2: f64,
    pub angular_velocity_rad_s: f64,
    pub mean_equatorial_gravity_m_s2: f64,
    pub mean_polar_gravity_m_s2: f64,
    pub atmosphere_scale_height_m: f64,

    // Derived at load.
    pub flattening: f64,
    pub semi_minor_axis_m: f64,
    pub first_eccentricity_squared: f64,
    pub second_eccentricity_squared: f64,
}

#[derive(Debug, Deserialize)]
struct Wgs84File {
    defining_parameters: Wgs84Defining,
    mean_gravity: Wgs84Gravity,
    atmosphere: Wgs84Atmosphere,
}

#[derive(Debug, Deserialize)]
struct Wgs84Defining {
    semi_major_axis_m: f64,
    inverse_flattening: f64,
    gravitational_constant_m3_s2: f64,
    angular_velocity_rad_s: f64,
}

#[derive(Debug, Deserialize)]
struct Wgs84Gravity {
    equatorial_m_s2: f64,
    polar_m_s2: f64,
}

#[derive(Debug, Deserialize)]
struct Wgs84Atmosphere {
    scale_height_m: f64,
}

impl Wgs84Parameters {
    /// Load from `nima_tr8350_2_official.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_reference_file(path)?;
        let parsed: Wgs84File =
            serde_json::from_str(&raw).map_err(|source| ReferenceDataError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let d = parsed.defining_parameters;
        for (field, value) in [
            ("defining_parameters.semi_major_axis_m", d.semi_major_axis_m),
            ("defining_parameters.inverse_flattening", d.inverse_flattening),
            (
                "defining_parameters.gravitational_constant_m3_s2",
                d.gravitational_constant_m3_s2,
            ),
            (
                "defining_parameters.angular_velocity_rad_s",
                d.angular_velocity_rad_s,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ReferenceDataError::FieldMissing {
                    file: path.display().to_string(),
                    field: field.into(),
                });
            }
        }

        let f = 1.0 / d.inverse_flattening;
        let b = d.semi_major_axis_m * (1.0 - f);
        let e2 = f * (2.0 - f);
        let ep2 = e2 / (1.0 - e2);

        Ok(Self {
            semi_major_axis_m: d.semi_major_axis_m,
            inverse_flattening: d.inverse_flattening,
            gravitational_constant_m3_s2: d.gravitational_constant_m3_s2,
            angular_velocity_rad_s: d.angular_velocity_rad_s,
            mean_equatorial_gravity_m_s2: parsed.mean_gravity.equatorial_m_s2,
            mean_polar_gravity_m_s2: parsed.mean_gravity.polar_m_s2,
            atmosphere_scale_height_m: parsed.atmosphere.scale_height_m,
            flattening: f,
            semi_minor_axis_m: b,
            first_eccentricity_squared: e2,
            second_eccentricity_squared: ep2,
        })
    }

    /// Earth gravitational parameter in km³/s².
    pub fn gm_km3_s2(&self) -> f64 {
        self.gravitational_constant_m3_s2 * 1e-9
    }

    /// Equatorial radius in kilometers.
    pub fn semi_major_axis_km(&self) -> f64 {
        self.semi_major_axis_m / 1000.0
    }
}

fn read_reference_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ReferenceDataError::FileMissing(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WGS84_JSON: &str = r#"{
        "source": "NIMA TR8350.2 Amendment 1",
        "defining_parameters": {
            "semi_major_axis_m": 6378137.0,
            "inverse_flattening": 298.257223563,
            "gravitational_constant_m3_s2": 3.986004418e14,
            "angular_velocity_rad_s": 7.292115e-5
        },
        "mean_gravity": {
            "equatorial_m_s2": 9.7803253359,
            "polar_m_s2": 9.8321849378
        },
        "atmosphere": { "scale_height_m": 8500.0 }
    }"#;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_wgs84_derived_quantities() {
        let file = write_temp(WGS84_JSON);
        let wgs84 = Wgs84Parameters::load(file.path()).unwrap();

        // Known WGS-84 derived values
        assert!((wgs84.semi_minor_axis_m - 6_356_752.314_245).abs() < 1e-3);
        assert!((wgs84.first_eccentricity_squared - 6.694_379_990_14e-3).abs() < 1e-12);
        assert!((wgs84.gm_km3_s2() - 398_600.4418).abs() < 1e-4);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = Wgs84Parameters::load(Path::new("/nonexistent/wgs84.json")).unwrap_err();
        assert!(matches!(err, ReferenceDataError::FileMissing(_)));
    }

    #[test]
    fn test_iau_constants_require_au() {
        let file = write_temp(r#"{"astronomical_unit": {"value_kilometers": 149597870.7}}"#);
        let consts = AstronomicalConstants::load(file.path()).unwrap();
        assert!((consts.astronomical_unit_km - 149_597_870.7).abs() < 1e-6);
        assert_eq!(consts.speed_of_light_m_s, 299_792_458.0);

        let bad = write_temp(r#"{"astronomical_unit": {"value_kilometers": 0.0}}"#);
        assert!(AstronomicalConstants::load(bad.path()).is_err());
    }
}
