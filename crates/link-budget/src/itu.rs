//! ITU-R propagation losses
//!
//! Free-space path loss per P.525, a linearised P.676 slant-path gaseous
//! absorption (single specific-attenuation coefficient per gas, scaled by
//! the Kasten-Young air mass), and the simplified P.618 rain attenuation
//! with P.838 regression coefficients for Ku band.

use serde::{Deserialize, Serialize};

use crate::{Result, SignalError};

/// Friis free-space path loss, dB. FSPL = 20·log10(d_km) + 20·log10(f_GHz)
/// + 92.45.
pub fn free_space_path_loss_db(distance_km: f64, frequency_ghz: f64) -> Result<f64> {
    if distance_km <= 0.0 || frequency_ghz <= 0.0 {
        return Err(SignalError::InvalidGeometry {
            distance_km,
            frequency_ghz,
        });
    }
    let fspl = 20.0 * distance_km.log10() + 20.0 * frequency_ghz.log10() + 92.45;
    if !fspl.is_finite() {
        return Err(SignalError::NonFiniteLoss { stage: "fspl" });
    }
    Ok(fspl)
}

/// Kasten-Young relative air mass for a given elevation angle.
fn air_mass(elevation_deg: f64) -> f64 {
    let zenith_deg = 90.0 - elevation_deg;
    let zenith_rad = zenith_deg.to_radians();
    1.0 / (zenith_rad.cos() + 0.50572 * (96.07995 - zenith_deg).powf(-1.6364))
}

/// Oxygen specific attenuation at sea level, dB/km, linearised around the
/// Ku-band window.
fn gamma_oxygen_db_km(frequency_ghz: f64) -> f64 {
    // Flat below the 22 GHz water line; mild frequency dependence
    0.0067 + 0.0002 * frequency_ghz
}

/// Water-vapour specific attenuation at 7.5 g/m³, dB/km.
fn gamma_water_db_km(frequency_ghz: f64) -> f64 {
    0.0003 * frequency_ghz.powf(1.6)
}

/// Equivalent oxygen column height, km.
const OXYGEN_HEIGHT_KM: f64 = 6.0;

/// Equivalent water-vapour column height, km.
const WATER_HEIGHT_KM: f64 = 2.1;

/// Slant-path gaseous absorption, dB. Zenith attenuation from the two
/// equivalent-column products, scaled by the air mass.
pub fn gaseous_attenuation_db(elevation_deg: f64, frequency_ghz: f64) -> Result<f64> {
    if elevation_deg <= 0.0 {
        return Err(SignalError::InvalidGeometry {
            distance_km: 0.0,
            frequency_ghz,
        });
    }
    let zenith_db = gamma_oxygen_db_km(frequency_ghz) * OXYGEN_HEIGHT_KM
        + gamma_water_db_km(frequency_ghz) * WATER_HEIGHT_KM;
    let slant = zenith_db * air_mass(elevation_deg);
    if !slant.is_finite() {
        return Err(SignalError::NonFiniteLoss { stage: "gaseous" });
    }
    Ok(slant)
}

/// P.838 rain regression coefficients (k, α), horizontal polarisation,
/// interpolated for the Ku-band downlink window.
fn rain_coefficients(frequency_ghz: f64) -> (f64, f64) {
    // Anchored at 12 GHz: k ≈ 0.0188, α ≈ 1.217
    let k = 0.0188 * (frequency_ghz / 12.0).powf(2.03);
    let alpha = 1.217 - 0.023 * (frequency_ghz / 12.0 - 1.0);
    (k, alpha)
}

/// Simplified ITU-R P.618 rain attenuation at the 0.01% availability
/// level, dB. `rain_rate_mm_h` is the R0.01 statistic of the climatic
/// zone (22 mm/h reference for the target region).
pub fn rain_attenuation_db(
    elevation_deg: f64,
    frequency_ghz: f64,
    rain_rate_mm_h: f64,
    observer_latitude_deg: f64,
    observer_height_km: f64,
) -> Result<f64> {
    if elevation_deg <= 0.0 {
        return Err(SignalError::InvalidGeometry {
            distance_km: 0.0,
            frequency_ghz,
        });
    }
    if rain_rate_mm_h <= 0.0 {
        return Ok(0.0);
    }

    // Rain height, km (P.839 simplification)
    let abs_lat = observer_latitude_deg.abs();
    let rain_height_km = if abs_lat < 23.0 {
        5.0
    } else {
        (5.0 - 0.075 * (abs_lat - 23.0)).max(0.0)
    };

    let vertical_km = (rain_height_km - observer_height_km).max(0.0);
    if vertical_km == 0.0 {
        return Ok(0.0);
    }

    let sin_el = elevation_deg.to_radians().sin();
    let slant_km = vertical_km / sin_el;
    let horizontal_km = slant_km * elevation_deg.to_radians().cos();

    let (k, alpha) = rain_coefficients(frequency_ghz);
    let gamma_r = k * rain_rate_mm_h.powf(alpha);

    // Horizontal reduction factor
    let l0 = 35.0 * (-0.015 * rain_rate_mm_h).exp();
    let reduction = 1.0 / (1.0 + horizontal_km / l0);

    let attenuation = gamma_r * slant_km * reduction;
    if !attenuation.is_finite() {
        return Err(SignalError::NonFiniteLoss { stage: "rain" });
    }
    Ok(attenuation)
}

/// Environmental class of the observer site; maps to a multiplier applied
/// to the tropospheric losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentClass {
    #[default]
    Clear,
    Urban,
    Suburban,
    Rural,
    Mountainous,
    HeavyRain,
}

impl EnvironmentClass {
    pub fn loss_multiplier(&self) -> f64 {
        match self {
            EnvironmentClass::Clear => 1.0,
            EnvironmentClass::Urban => 1.15,
            EnvironmentClass::Suburban => 1.08,
            EnvironmentClass::Rural => 1.0,
            EnvironmentClass::Mountainous => 1.2,
            EnvironmentClass::HeavyRain => 1.4,
        }
    }
}
