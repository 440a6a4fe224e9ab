//! End-to-end pipeline scenarios with synthetic catalogs and an in-memory
//! EOP table.

use chrono::{TimeZone, Utc};

use orbital_mechanics::tle::checksum_official;
use orbital_mechanics::{Constellation, TleRecord};
use pipeline::{Pipeline, PipelineConfig};
use reference_data::{datetime_to_mjd, AstronomicalConstants, EopProvider, EopRecord, EopSource, Wgs84Parameters};

fn fixture_constants() -> AstronomicalConstants {
    AstronomicalConstants {
        astronomical_unit_km: 149_597_870.7,
        speed_of_light_m_s: 299_792_458.0,
    }
}

fn fixture_wgs84() -> Wgs84Parameters {
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

fn fixture_eop(center_mjd: f64) -> EopProvider {
    let records: Vec<EopRecord> = (-3..=3)
        .map(|offset| EopRecord {
            mjd: center_mjd.floor() + offset as f64,
            x_pm_arcsec: 0.05,
            y_pm_arcsec: 0.35,
            ut1_minus_utc_s: -0.15,
            lod_ms: 1.2,
            dx_nut_arcsec: 0.0002,
            dy_nut_arcsec: -0.0001,
            sigma_x_arcsec: 0.0001,
            sigma_y_arcsec: 0.0001,
            sigma_ut1_s: 0.00001,
            source: EopSource::RapidService,
        })
        .collect();
    EopProvider::from_records(records).unwrap()
}

/// Synthetic catalog TLE with a valid official checksum, epoch
/// 2024-03-01T00:00 (day 061 of 2024).
fn make_tle(
    norad_id: u32,
    inclination_deg: f64,
    raan_deg: f64,
    mean_anomaly_deg: f64,
    mean_motion: f64,
) -> (String, String) {
    let body1 = format!(
        "1 {:05}U 24001A   24061.00000000  .00000000  00000-0  00000-0 0    1",
        norad_id
    );
    let line1 = format!("{}{}", body1, checksum_official(&body1));

    let body2 = format!(
        "2 {:05} {:>8.4} {:>8.4} 0001000 {:>8.4} {:>8.4} {:>11.8}{:05}",
        norad_id, inclination_deg, raan_deg, 0.0, mean_anomaly_deg, mean_motion, 1u32,
    );
    let line2 = format!("{}{}", body2, checksum_official(&body2));

    (line1, line2)
}

fn make_record(
    norad_id: u32,
    name: &str,
    constellation: Constellation,
    inclination_deg: f64,
    raan_deg: f64,
    mean_anomaly_deg: f64,
    mean_motion: f64,
) -> TleRecord {
    let (line1, line2) = make_tle(norad_id, inclination_deg, raan_deg, mean_anomaly_deg, mean_motion);
    TleRecord::from_lines(name, constellation, &line1, &line2).expect("synthetic TLE is valid")
}

fn fixture_pipeline(mask_deg: f64) -> Pipeline {
    let epoch = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut config = PipelineConfig {
        elevation_mask_deg: mask_deg,
        ..PipelineConfig::default()
    };
    config.validate().unwrap();
    Pipeline::from_parts(
        config,
        fixture_constants(),
        fixture_wgs84(),
        fixture_eop(datetime_to_mjd(epoch)),
    )
}

/// A small mixed Starlink/OneWeb shell spread in RAAN and phase.
fn mixed_catalog() -> Vec<TleRecord> {
    let mut records = Vec::new();
    for i in 0..12u32 {
        records.push(make_record(
            44000 + i,
            &format!("STARLINK-{}", 1000 + i),
            Constellation::Starlink,
            53.0,
            (i as f64 * 30.0) % 360.0,
            (i as f64 * 97.0) % 360.0,
            15.05,
        ));
    }
    for i in 0..6u32 {
        records.push(make_record(
            48000 + i,
            &format!("ONEWEB-{:04}", i),
            Constellation::Oneweb,
            87.4,
            (i as f64 * 60.0) % 360.0,
            (i as f64 * 151.0) % 360.0,
            13.15,
        ));
    }
    records
}

#[test]
fn test_iss_like_single_satellite_run() {
    let pipeline = fixture_pipeline(10.0);
    // RF parameters of the Starlink reference table; ISS-like geometry
    let record = make_record(25544, "ISS-LIKE", Constellation::Starlink, 51.6, 240.0, 200.0, 15.5);

    let document = pipeline.run(std::slice::from_ref(&record)).unwrap();

    assert_eq!(document.statistics.total_satellites, 1);
    assert_eq!(document.statistics.succeeded, 1);
    assert_eq!(document.statistics.grade, "A+");

    let satellite = &document.satellites[0];
    // Starlink cadence: 192 samples at 30 s, none dropped
    assert_eq!(satellite.sample_count, 192);
    assert_eq!(satellite.dropped_samples, 0);
    assert!(satellite.kepler_deviation <= 0.03);

    // Any window this geometry produces respects the pass envelope
    for window in &satellite.windows {
        assert!(window.duration_s >= 30.0);
        assert!(window.duration_s <= 720.0);
        assert!(window.max_elevation_deg >= 10.0 && window.max_elevation_deg <= 90.0);
        assert!(window.start_utc < window.end_utc);
    }
}

#[test]
fn test_decayed_satellite_recorded_and_run_completes() {
    let pipeline = fixture_pipeline(5.0);
    let mut records = mixed_catalog();
    // Mean motion 17 rev/day sits below the LEO band: decayed
    records.push(make_record(
        99999,
        "DECAYED-OBJECT",
        Constellation::Other("debris".into()),
        51.6,
        0.0,
        0.0,
        17.0,
    ));

    let document = pipeline.run(&records).unwrap();

    assert_eq!(document.statistics.total_satellites, 19);
    assert_eq!(document.statistics.failed, 1);
    assert_eq!(document.statistics.succeeded, 18);

    let failure = &document.failures[0];
    assert_eq!(failure.norad_id, 99999);
    assert_eq!(failure.stage, "propagation");
    assert!(
        failure.reason.contains("sgp4") || failure.reason.contains("stale"),
        "unexpected failure reason: {}",
        failure.reason
    );

    // 18/19 ≈ 94.7% → grade B
    assert_eq!(document.statistics.grade, "B");
}

#[test]
fn test_mixed_fleet_document_is_consistent() {
    let pipeline = fixture_pipeline(5.0);
    let document = pipeline.run(&mixed_catalog()).unwrap();

    assert_eq!(
        document.statistics.succeeded + document.statistics.failed,
        document.statistics.total_satellites
    );

    // Satellites come back sorted by NORAD id (deterministic reduce order)
    for pair in document.satellites.windows(2) {
        assert!(pair[0].norad_id < pair[1].norad_id);
    }

    // Windows per satellite are in start-time order
    for satellite in &document.satellites {
        for pair in satellite.windows.windows(2) {
            assert!(pair[0].start_utc <= pair[1].start_utc);
        }
    }

    // Pool cardinality constraints hold wherever a plan exists
    for instant in &document.pool_plan.instants {
        let size = instant.members.len();
        assert!(size >= 8 && size <= 20, "pool size {size}");
    }

    // Strategy-comparison aggregates stay internally consistent
    for (name, summary) in &document.pool_plan.strategy_scores {
        assert!(summary.pools_won <= summary.pools_generated, "{name}");
        assert!(
            (0.0..=1.0).contains(&summary.mean_configuration_score),
            "{name} score {}",
            summary.mean_configuration_score
        );
    }

    // The document serialises as self-describing JSON
    let json = document.to_canonical_json().unwrap();
    assert!(json.contains("\"metadata\""));
    assert!(json.contains("\"pool_plan\""));
    assert!(json.contains("\"validation\""));
}

#[test]
fn test_runs_are_deterministic_modulo_metadata() {
    let catalog = mixed_catalog();

    let document_a = fixture_pipeline(5.0).run(&catalog).unwrap();
    let document_b = fixture_pipeline(5.0).run(&catalog).unwrap();

    let payload = |doc: &pipeline::OutputDocument| {
        serde_json::json!({
            "satellites": serde_json::to_value(&doc.satellites).unwrap(),
            "pool_plan": serde_json::to_value(&doc.pool_plan).unwrap(),
            "failures": serde_json::to_value(&doc.failures).unwrap(),
            "statistics": serde_json::to_value(&doc.statistics).unwrap(),
        })
    };

    assert_eq!(payload(&document_a), payload(&document_b));
}

#[test]
fn test_catalog_order_does_not_change_results() {
    let catalog = mixed_catalog();
    let mut reversed = catalog.clone();
    reversed.reverse();

    let document_a = fixture_pipeline(5.0).run(&catalog).unwrap();
    let document_b = fixture_pipeline(5.0).run(&reversed).unwrap();

    assert_eq!(
        serde_json::to_value(&document_a.satellites).unwrap(),
        serde_json::to_value(&document_b.satellites).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&document_a.pool_plan).unwrap(),
        serde_json::to_value(&document_b.pool_plan).unwrap()
    );
}
