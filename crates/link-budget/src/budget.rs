//! RSRP / RSRQ / SINR and the link budget
//!
//! 3GPP TS 38.133 measurement quantities computed from the per-sample
//! geometry and the constellation's reference parameters (EIRP per public
//! filings). RSSI follows the resource-block model (5 RB per MHz), thermal
//! noise is N₀·B·NF and interference is elevation-dependent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use coordinate_transforms::TopocentricSample;
use orbital_mechanics::Constellation;

use crate::itu::{self, EnvironmentClass};
use crate::{Result, SignalError, SignalSample};

/// Per-constellation RF reference parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstellationParams {
    pub satellite_eirp_dbm: f64,
    pub frequency_ghz: f64,
    pub antenna_gain_dbi: f64,
    pub noise_temperature_k: f64,
}

impl ConstellationParams {
    /// Reference table from public FCC/ITU filings.
    pub fn reference_table() -> HashMap<Constellation, ConstellationParams> {
        let mut table = HashMap::new();
        table.insert(
            Constellation::Starlink,
            ConstellationParams {
                satellite_eirp_dbm: 37.0,
                frequency_ghz: 12.0,
                antenna_gain_dbi: 32.0,
                noise_temperature_k: 290.0,
            },
        );
        table.insert(
            Constellation::Oneweb,
            ConstellationParams {
                satellite_eirp_dbm: 35.0,
                frequency_ghz: 12.0,
                antenna_gain_dbi: 35.0,
                noise_temperature_k: 290.0,
            },
        );
        table
    }
}

/// Terminal-side system parameters (3GPP defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemParams {
    pub bandwidth_mhz: f64,
    pub noise_figure_db: f64,
    pub thermal_noise_density_dbm_hz: f64,
    pub implementation_loss_db: f64,
    pub body_loss_db: f64,
    pub rx_antenna_gain_dbi: f64,
    pub sensitivity_dbm: f64,
    pub rain_rate_mm_h: f64,
    pub environment: EnvironmentClass,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            bandwidth_mhz: 20.0,
            noise_figure_db: 7.0,
            thermal_noise_density_dbm_hz: -174.0,
            implementation_loss_db: 2.0,
            body_loss_db: 3.0,
            rx_antenna_gain_dbi: 0.0,
            sensitivity_dbm: -110.0,
            rain_rate_mm_h: 22.0,
            environment: EnvironmentClass::Clear,
        }
    }
}

/// Detailed link budget decomposition for one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBudgetBreakdown {
    pub satellite_eirp_dbm: f64,
    pub tx_antenna_gain_dbi: f64,
    pub fspl_db: f64,
    pub atmospheric_loss_db: f64,
    pub rain_loss_db: f64,
    pub implementation_loss_db: f64,
    pub body_loss_db: f64,
    pub rx_antenna_gain_dbi: f64,
    pub gt_ratio_dbk: f64,
    pub received_power_dbm: f64,
    pub sensitivity_dbm: f64,
    pub link_margin_db: f64,
    pub link_feasible: bool,
}

/// Quality grade and handover-urgency assessment for one sample.
#[derive(Debug, Clone, Serialize)]
pub struct QualityAssessment {
    pub rsrp_score: f64,
    pub rsrq_score: f64,
    pub sinr_score: f64,
    pub overall_score: f64,
    pub grade: &'static str,
    pub handover_urgency: &'static str,
    pub handover_recommendation: &'static str,
}

/// Link-budget engine for one observer environment, shared across workers
/// by reference.
pub struct SignalEngine {
    constellations: HashMap<Constellation, ConstellationParams>,
    system: SystemParams,
    observer_latitude_deg: f64,
    observer_height_km: f64,
}

impl SignalEngine {
    pub fn new(system: SystemParams, observer_latitude_deg: f64, observer_height_m: f64) -> Self {
        Self {
            constellations: ConstellationParams::reference_table(),
            system,
            observer_latitude_deg,
            observer_height_km: observer_height_m / 1000.0,
        }
    }

    /// Override or extend the constellation reference table.
    pub fn with_constellation(mut self, tag: Constellation, params: ConstellationParams) -> Self {
        self.constellations.insert(tag, params);
        self
    }

    pub fn system(&self) -> &SystemParams {
        &self.system
    }

    fn params_for(&self, constellation: &Constellation) -> Result<&ConstellationParams> {
        self.constellations
            .get(constellation)
            .ok_or_else(|| SignalError::UnknownConstellation(constellation.to_string()))
    }

    /// Evaluate one topocentric sample into a signal sample. Samples below
    /// the elevation mask produce the no-signal sentinel; degenerate
    /// geometry yields an unreliable sample rather than an error.
    pub fn evaluate(
        &self,
        topo: &TopocentricSample,
        constellation: &Constellation,
    ) -> Result<SignalSample> {
        if !topo.is_visible {
            return Ok(SignalSample::no_signal(topo, constellation.clone()));
        }

        let params = self.params_for(constellation)?;

        let fspl_db = match itu::free_space_path_loss_db(topo.range_km, params.frequency_ghz) {
            Ok(value) => value,
            Err(_) => return Ok(SignalSample::no_signal(topo, constellation.clone())),
        };

        let multiplier = self.system.environment.loss_multiplier();
        let atmo_loss_db =
            itu::gaseous_attenuation_db(topo.elevation_deg, params.frequency_ghz)? * multiplier;
        let rain_loss_db = itu::rain_attenuation_db(
            topo.elevation_deg,
            params.frequency_ghz,
            self.system.rain_rate_mm_h,
            self.observer_latitude_deg,
            self.observer_height_km,
        )? * multiplier;

        let rsrp_dbm = params.satellite_eirp_dbm
            + params.antenna_gain_dbi
            + self.system.rx_antenna_gain_dbi
            - fspl_db
            - atmo_loss_db
            - rain_loss_db
            - self.system.implementation_loss_db
            - self.system.body_loss_db;

        let rsrq_db = self.rsrq_db(rsrp_dbm);
        let sinr_db = self.sinr_db(rsrp_dbm, topo.elevation_deg);
        let link_margin_db = rsrp_dbm - self.system.sensitivity_dbm;

        let reliable = fspl_db.is_finite() && atmo_loss_db.is_finite() && rain_loss_db.is_finite();

        Ok(SignalSample {
            t_utc: topo.t_utc,
            constellation: constellation.clone(),
            elevation_deg: topo.elevation_deg,
            azimuth_deg: topo.azimuth_deg_from_north,
            range_km: topo.range_km,
            is_visible: topo.is_visible,
            reliable,
            fspl_db,
            atmo_loss_db,
            rain_loss_db,
            rsrp_dbm,
            rsrq_db,
            sinr_db,
            link_margin_db,
            event_flags: Default::default(),
        })
    }

    /// RSRQ from RSRP via the resource-block RSSI model, clamped to the
    /// reportable range.
    fn rsrq_db(&self, rsrp_dbm: f64) -> f64 {
        let resource_blocks = (self.system.bandwidth_mhz * 5.0).round();
        let rssi_dbm = rsrp_dbm + 10.0 * resource_blocks.log10();
        (rsrp_dbm - rssi_dbm).clamp(-25.0, 0.0)
    }

    /// SINR from thermal noise and the elevation-dependent interference
    /// model, combined in the linear domain.
    fn sinr_db(&self, rsrp_dbm: f64, elevation_deg: f64) -> f64 {
        let bandwidth_hz = self.system.bandwidth_mhz * 1e6;
        let thermal_dbm = self.system.thermal_noise_density_dbm_hz
            + 10.0 * bandwidth_hz.log10()
            + self.system.noise_figure_db;

        let elevation_factor = (elevation_deg / 90.0).max(0.1);
        let interference_dbm = (rsrp_dbm - 20.0) - 10.0 * elevation_factor.log10();

        let noise_linear = 10f64.powf(thermal_dbm / 10.0);
        let interference_linear = 10f64.powf(interference_dbm / 10.0);
        let total_dbm = 10.0 * (noise_linear + interference_linear).log10();

        rsrp_dbm - total_dbm
    }

    /// Full link-budget decomposition for reporting.
    pub fn detailed_budget(
        &self,
        constellation: &Constellation,
        distance_km: f64,
        elevation_deg: f64,
    ) -> Result<LinkBudgetBreakdown> {
        let params = self.params_for(constellation)?;
        let fspl_db = itu::free_space_path_loss_db(distance_km, params.frequency_ghz)?;
        let multiplier = self.system.environment.loss_multiplier();
        let atmo = itu::gaseous_attenuation_db(elevation_deg, params.frequency_ghz)? * multiplier;
        let rain = itu::rain_attenuation_db(
            elevation_deg,
            params.frequency_ghz,
            self.system.rain_rate_mm_h,
            self.observer_latitude_deg,
            self.observer_height_km,
        )? * multiplier;

        let received = params.satellite_eirp_dbm
            + params.antenna_gain_dbi
            + self.system.rx_antenna_gain_dbi
            - fspl_db
            - atmo
            - rain
            - self.system.implementation_loss_db
            - self.system.body_loss_db;
        let margin = received - self.system.sensitivity_dbm;
        let gt_ratio =
            self.system.rx_antenna_gain_dbi - 10.0 * params.noise_temperature_k.log10();

        Ok(LinkBudgetBreakdown {
            satellite_eirp_dbm: params.satellite_eirp_dbm,
            tx_antenna_gain_dbi: params.antenna_gain_dbi,
            fspl_db,
            atmospheric_loss_db: atmo,
            rain_loss_db: rain,
            implementation_loss_db: self.system.implementation_loss_db,
            body_loss_db: self.system.body_loss_db,
            rx_antenna_gain_dbi: self.system.rx_antenna_gain_dbi,
            gt_ratio_dbk: gt_ratio,
            received_power_dbm: received,
            sensitivity_dbm: self.system.sensitivity_dbm,
            link_margin_db: margin,
            link_feasible: margin > 0.0,
        })
    }
}

/// TS 38.133-based quality scoring: per-metric ladders, RSRP-weighted
/// overall score, and handover urgency from the trigger count.
pub fn assess_quality(rsrp_dbm: f64, rsrq_db: f64, sinr_db: f64) -> QualityAssessment {
    let ladder = |value: f64, thresholds: [f64; 4]| -> f64 {
        if value >= thresholds[0] {
            100.0
        } else if value >= thresholds[1] {
            75.0
        } else if value >= thresholds[2] {
            50.0
        } else if value >= thresholds[3] {
            25.0
        } else {
            0.0
        }
    };

    let rsrp_score = ladder(rsrp_dbm, [-85.0, -95.0, -105.0, -115.0]);
    let rsrq_score = ladder(rsrq_db, [-5.0, -10.0, -15.0, -20.0]);
    let sinr_score = ladder(sinr_db, [15.0, 10.0, 5.0, 0.0]);

    let overall_score = 0.5 * rsrp_score + 0.3 * sinr_score + 0.2 * rsrq_score;

    let grade = if overall_score >= 85.0 {
        "excellent"
    } else if overall_score >= 65.0 {
        "good"
    } else if overall_score >= 45.0 {
        "fair"
    } else if overall_score >= 25.0 {
        "poor"
    } else {
        "unusable"
    };

    let mut triggers = 0;
    if rsrp_dbm < -110.0 {
        triggers += 1;
    }
    if rsrq_db < -15.0 {
        triggers += 1;
    }
    if sinr_db < 3.0 {
        triggers += 1;
    }

    let (handover_urgency, handover_recommendation) = match triggers {
        0 => ("low", "maintain_connection"),
        1 => ("medium", "prepare_handover"),
        _ => ("high", "immediate_handover"),
    };

    QualityAssessment {
        rsrp_score,
        rsrq_score,
        sinr_score,
        overall_score,
        grade,
        handover_urgency,
        handover_recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use coordinate_transforms::GeodeticPosition;
    use nalgebra::Vector3;

    fn topo(elevation_deg: f64, range_km: f64, visible: bool) -> TopocentricSample {
        TopocentricSample {
            t_utc: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            position_itrs_km: Vector3::new(6_778.0, 0.0, 0.0),
            geodetic: GeodeticPosition {
                latitude_deg: 0.0,
                longitude_deg: 0.0,
                height_m: 550_000.0,
            },
            elevation_deg,
            azimuth_deg_from_north: 135.0,
            range_km,
            range_rate_km_per_s: -3.0,
            accuracy_estimate_m: 0.1,
            is_visible: visible,
        }
    }

    #[test]
    fn test_starlink_overhead_rsrp_band() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let sample = engine
            .evaluate(&topo(80.0, 560.0, true), &Constellation::Starlink)
            .unwrap();

        // EIRP 37 + 32 dBi − FSPL ~169 − tropospheric losses − 5
        assert!(sample.reliable);
        assert!(
            sample.rsrp_dbm > -120.0 && sample.rsrp_dbm < -100.0,
            "rsrp {}",
            sample.rsrp_dbm
        );
        assert!(sample.fspl_db > 160.0 && sample.fspl_db < 180.0);

        // Friis reverse check within 2%
        let recomputed =
            20.0 * sample.range_km.log10() + 20.0 * 12.0_f64.log10() + 92.45;
        assert!(((recomputed - sample.fspl_db) / sample.fspl_db).abs() <= 0.02);
    }

    #[test]
    fn test_oneweb_weaker_than_starlink_at_same_geometry() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let starlink = engine
            .evaluate(&topo(45.0, 800.0, true), &Constellation::Starlink)
            .unwrap();
        let oneweb = engine
            .evaluate(&topo(45.0, 800.0, true), &Constellation::Oneweb)
            .unwrap();
        // EIRP+gain: Starlink 37+32 vs OneWeb 35+35 → OneWeb leads by 1 dB
        assert!((oneweb.rsrp_dbm - starlink.rsrp_dbm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invisible_sample_is_no_signal() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let sample = engine
            .evaluate(&topo(-5.0, 2_500.0, false), &Constellation::Starlink)
            .unwrap();
        assert!(!sample.reliable);
        assert_eq!(sample.rsrp_dbm, -150.0);
    }

    #[test]
    fn test_unknown_constellation_is_error() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let err = engine
            .evaluate(
                &topo(45.0, 800.0, true),
                &Constellation::Other("globalstar".into()),
            )
            .unwrap_err();
        assert!(matches!(err, SignalError::UnknownConstellation(_)));
    }

    #[test]
    fn test_rsrq_is_resource_block_constant() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let sample = engine
            .evaluate(&topo(45.0, 800.0, true), &Constellation::Starlink)
            .unwrap();
        // 100 RB → RSRQ = −10·log10(100) = −20 dB, inside the clamp
        assert!((sample.rsrq_db + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sinr_degrades_toward_horizon() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let high = engine
            .evaluate(&topo(80.0, 560.0, true), &Constellation::Starlink)
            .unwrap();
        let low = engine
            .evaluate(&topo(6.0, 560.0, true), &Constellation::Starlink)
            .unwrap();
        // Same geometry except elevation: interference rises near the horizon
        assert!(high.sinr_db > low.sinr_db);
    }

    #[test]
    fn test_quality_assessment_ladder() {
        let excellent = assess_quality(-80.0, -4.0, 18.0);
        assert_eq!(excellent.grade, "excellent");
        assert_eq!(excellent.handover_recommendation, "maintain_connection");

        let failing = assess_quality(-118.0, -22.0, -5.0);
        assert_eq!(failing.grade, "unusable");
        assert_eq!(failing.handover_urgency, "high");
        assert_eq!(failing.handover_recommendation, "immediate_handover");
    }

    #[test]
    fn test_detailed_budget_margin_consistency() {
        let engine = SignalEngine::new(SystemParams::default(), 24.9442, 0.0);
        let breakdown = engine
            .detailed_budget(&Constellation::Starlink, 560.0, 80.0)
            .unwrap();
        let expected = breakdown.received_power_dbm - breakdown.sensitivity_dbm;
        assert!((breakdown.link_margin_db - expected).abs() < 1e-12);
        assert_eq!(breakdown.link_feasible, breakdown.link_margin_db > 0.0);
    }
}
