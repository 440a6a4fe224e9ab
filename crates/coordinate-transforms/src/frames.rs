//! Inertial and Earth-fixed frame rotations
//!
//! Equinox-based reduction: IAU 2006 precession (Capitaine P03 equinox
//! angles), the IAU 2000B luni-solar nutation series (77 terms plus the
//! fixed offsets standing in for the dropped planetary terms) corrected by
//! the EOP celestial-pole offsets, the equation of the equinoxes linking
//! TEME's mean equinox to the true equator, and the IAU 2006 GMST built on
//! the Earth Rotation Angle.
//!
//! TEME→ITRS uses the GMST shortcut (TEME is true-equator/mean-equinox, so
//! GMST rotates it straight into the pseudo-Earth-fixed frame); TEME→GCRS
//! goes through the full P·N chain. Composing one against the other's
//! transpose reproduces R3(GMST) exactly, keeping both legs consistent.

use chrono::{DateTime, Utc};
use nalgebra::{Matrix3, Vector3};

use orbital_mechanics::timescale;
use reference_data::{polar_motion_from_arcsec, EopRecord};

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);
const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Rotation about the x-axis (frame rotation convention).
pub fn r1(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Rotation about the y-axis.
pub fn r2(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
}

/// Rotation about the z-axis.
pub fn r3(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Mean obliquity of the ecliptic (IAU 2006), radians. `t` in Julian
/// centuries of TT since J2000.
pub fn mean_obliquity_rad(t: f64) -> f64 {
    (84_381.406 - 46.836_769 * t - 0.000_1831 * t * t + 0.002_003_40 * t * t * t)
        * ARCSEC_TO_RAD
}

/// Delaunay fundamental arguments (IAU 2000B truncated expressions),
/// radians.
struct FundamentalArgs {
    l: f64,
    lp: f64,
    f: f64,
    d: f64,
    omega: f64,
}

fn fundamental_args(t: f64) -> FundamentalArgs {
    // Linear expressions in arcseconds, as adopted for the 2000B model
    let norm = |arcsec: f64| (arcsec % 1_296_000.0) * ARCSEC_TO_RAD;
    FundamentalArgs {
        l: norm(485_868.249_036 + 1_717_915_923.217_8 * t),
        lp: norm(1_287_104.793_05 + 129_596_581.048_1 * t),
        f: norm(335_779.526_232 + 1_739_527_262.847_8 * t),
        d: norm(1_072_260.703_69 + 1_602_961_601.209_0 * t),
        omega: norm(450_160.398_036 - 6_962_890.543_1 * t),
    }
}

/// The IAU 2000B luni-solar nutation series (McCarthy & Luzum 2003).
/// Multipliers are (l, l', F, D, Ω); coefficients are (ψ_sin, ψ_sin·t,
/// ψ_cos, ε_cos, ε_cos·t, ε_sin) in units of 0.1 µas.
const NUTATION_TERMS: &[([i8; 5], f64, f64, f64, f64, f64, f64)] = &[
    ([0, 0, 0, 0, 1], -172_064_161.0, -174_666.0, 33_386.0, 92_052_331.0, 9_086.0, 15_377.0),
    ([0, 0, 2, -2, 2], -13_170_906.0, -1_675.0, -13_696.0, 5_730_336.0, -3_015.0, -4_587.0),
    ([0, 0, 2, 0, 2], -2_276_413.0, -234.0, 2_796.0, 978_459.0, -485.0, 1_374.0),
    ([0, 0, 0, 0, 2], 2_074_554.0, 207.0, -698.0, -897_492.0, 470.0, -291.0),
    ([0, 1, 0, 0, 0], 1_475_877.0, -3_633.0, 11_817.0, 73_871.0, -184.0, -1_924.0),
    ([0, 1, 2, -2, 2], -516_821.0, 1_226.0, -524.0, 224_386.0, -677.0, -174.0),
    ([1, 0, 0, 0, 0], 711_159.0, 73.0, -872.0, -6_750.0, 0.0, 358.0),
    ([0, 0, 2, 0, 1], -387_298.0, -367.0, 380.0, 200_728.0, 18.0, 318.0),
    ([1, 0, 2, 0, 2], -301_461.0, -36.0, 816.0, 129_025.0, -63.0, 367.0),
    ([0, -1, 2, -2, 2], 215_829.0, -494.0, 111.0, -95_929.0, 299.0, 132.0),
    ([0, 0, 2, -2, 1], 128_227.0, 137.0, 181.0, -68_982.0, -9.0, 39.0),
    ([-1, 0, 2, 0, 2], 123_457.0, 11.0, 19.0, -53_311.0, 32.0, -4.0),
    ([-1, 0, 0, 2, 0], 156_994.0, 10.0, -168.0, -1_235.0, 0.0, 82.0),
    ([1, 0, 0, 0, 1], 63_110.0, 63.0, 27.0, -33_228.0, 0.0, -9.0),
    ([-1, 0, 0, 0, 1], -57_976.0, -63.0, -189.0, 31_429.0, 0.0, -75.0),
    ([-1, 0, 2, 2, 2], -59_641.0, -11.0, 149.0, 25_543.0, -11.0, 66.0),
    ([1, 0, 2, 0, 1], -51_613.0, -42.0, 129.0, 26_366.0, 0.0, 78.0),
    ([-2, 0, 2, 0, 1], 45_893.0, 50.0, 31.0, -24_236.0, -10.0, 20.0),
    ([0, 0, 0, 2, 0], 63_384.0, 11.0, -150.0, -1_220.0, 0.0, 29.0),
    ([0, 0, 2, 2, 2], -38_571.0, -1.0, 158.0, 16_452.0, -11.0, 68.0),
    ([0, -2, 2, -2, 2], 32_481.0, 0.0, 0.0, -13_870.0, 0.0, 0.0),
    ([-2, 0, 0, 2, 0], -47_722.0, 0.0, -18.0, 477.0, 0.0, -25.0),
    ([2, 0, 2, 0, 2], -31_046.0, -1.0, 131.0, 13_238.0, -11.0, 59.0),
    ([1, 0, 2, -2, 2], 28_593.0, 0.0, -1.0, -12_338.0, 10.0, -3.0),
    ([-1, 0, 2, 0, 1], 20_441.0, 21.0, 10.0, -10_758.0, 0.0, -3.0),
    ([2, 0, 0, 0, 0], 29_243.0, 0.0, -74.0, -609.0, 0.0, 13.0),
    ([0, 0, 2, 0, 0], 25_887.0, 0.0, -66.0, -550.0, 0.0, 11.0),
    ([0, 1, 0, 0, 1], -14_053.0, -25.0, 79.0, 8_551.0, -2.0, -45.0),
    ([-1, 0, 0, 2, 1], 15_164.0, 10.0, 11.0, -8_001.0, 0.0, -1.0),
    ([0, 2, 2, -2, 2], -15_794.0, 72.0, -16.0, 6_850.0, -42.0, -5.0),
    ([0, 0, -2, 2, 0], 21_783.0, 0.0, 13.0, -167.0, 0.0, 13.0),
    ([1, 0, 0, -2, 1], -12_873.0, -10.0, -37.0, 6_953.0, 0.0, -14.0),
    ([0, -1, 0, 0, 1], -12_654.0, 11.0, 63.0, 6_415.0, 0.0, 26.0),
    ([-1, 0, 2, 2, 1], -10_204.0, 0.0, 25.0, 5_222.0, 0.0, 15.0),
    ([0, 2, 0, 0, 0], 16_707.0, -85.0, -10.0, 168.0, -1.0, 10.0),
    ([1, 0, 2, 2, 2], -7_691.0, 0.0, 44.0, 3_268.0, 0.0, 19.0),
    ([-2, 0, 2, 0, 0], -11_024.0, 0.0, -14.0, 104.0, 0.0, 2.0),
    ([0, 1, 2, 0, 2], 7_566.0, -21.0, -11.0, -3_250.0, 0.0, -5.0),
    ([0, 0, 2, 2, 1], -6_637.0, -11.0, 25.0, 3_353.0, 0.0, 14.0),
    ([0, -1, 2, 0, 2], -7_141.0, 21.0, 8.0, 3_070.0, 0.0, 4.0),
    ([0, 0, 0, 2, 1], -6_302.0, -11.0, 2.0, 3_272.0, 0.0, 4.0),
    ([1, 0, 2, -2, 1], 5_800.0, 10.0, 2.0, -3_045.0, 0.0, -1.0),
    ([2, 0, 2, -2, 2], 6_443.0, 0.0, -7.0, -2_768.0, 0.0, -4.0),
    ([-2, 0, 0, 2, 1], -5_774.0, -11.0, -15.0, 3_041.0, 0.0, -5.0),
    ([2, 0, 2, 0, 1], -5_350.0, 0.0, 21.0, 2_695.0, 0.0, 12.0),
    ([0, -1, 2, -2, 1], -4_752.0, -11.0, -3.0, 2_719.0, 0.0, -3.0),
    ([0, 0, 0, -2, 1], -4_940.0, -11.0, -21.0, 2_720.0, 0.0, -9.0),
    ([-1, -1, 0, 2, 0], 7_350.0, 0.0, -8.0, -51.0, 0.0, 4.0),
    ([2, 0, 0, -2, 1], 4_065.0, 0.0, 6.0, -2_206.0, 0.0, 1.0),
    ([1, 0, 0, 2, 0], 6_579.0, 0.0, -24.0, -199.0, 0.0, 2.0),
    ([0, 1, 2, -2, 1], 3_579.0, 0.0, 5.0, -1_900.0, 0.0, 1.0),
    ([1, -1, 0, 0, 0], 4_725.0, 0.0, -6.0, -41.0, 0.0, 3.0),
    ([-2, 0, 2, 0, 2], -3_075.0, 0.0, -2.0, 1_313.0, 0.0, -1.0),
    ([3, 0, 2, 0, 2], -2_904.0, 0.0, 15.0, 1_233.0, 0.0, 7.0),
    ([0, -1, 0, 2, 0], 4_348.0, 0.0, -10.0, -81.0, 0.0, 2.0),
    ([1, -1, 2, 0, 2], -2_878.0, 0.0, 8.0, 1_232.0, 0.0, 4.0),
    ([0, 0, 0, 1, 0], -4_230.0, 0.0, 5.0, -20.0, 0.0, -2.0),
    ([-1, -1, 2, 2, 2], -2_819.0, 0.0, 7.0, 1_207.0, 0.0, 3.0),
    ([-1, 0, 2, 0, 0], -4_056.0, 0.0, 5.0, 40.0, 0.0, -2.0),
    ([0, -1, 2, 2, 2], -2_647.0, 0.0, 11.0, 1_129.0, 0.0, 5.0),
    ([-2, 0, 0, 0, 1], -2_294.0, 0.0, -10.0, 1_266.0, 0.0, -4.0),
    ([1, 1, 2, 0, 2], 2_481.0, 0.0, -7.0, -1_062.0, 0.0, -3.0),
    ([2, 0, 0, 0, 1], 2_179.0, 0.0, -2.0, -1_129.0, 0.0, -2.0),
    ([-1, 1, 0, 1, 0], 3_276.0, 0.0, 1.0, -9.0, 0.0, 0.0),
    ([1, 1, 0, 0, 0], -3_389.0, 0.0, 5.0, 35.0, 0.0, -2.0),
    ([1, 0, 2, 0, 0], 3_339.0, 0.0, -13.0, -107.0, 0.0, 1.0),
    ([-1, 0, 2, -2, 1], -1_987.0, 0.0, -6.0, 1_073.0, 0.0, -2.0),
    ([1, 0, 0, 0, 2], -1_981.0, 0.0, 0.0, 854.0, 0.0, 0.0),
    ([-1, 0, 0, 1, 0], 4_026.0, 0.0, -353.0, -553.0, 0.0, -139.0),
    ([0, 0, 2, 1, 2], 1_660.0, 0.0, -5.0, -710.0, 0.0, -2.0),
    ([-1, 0, 2, 4, 2], -1_521.0, 0.0, 9.0, 647.0, 0.0, 4.0),
    ([-1, 1, 0, 1, 1], 1_314.0, 0.0, 0.0, -700.0, 0.0, 0.0),
    ([0, -2, 2, -2, 1], -1_283.0, 0.0, 0.0, 672.0, 0.0, 0.0),
    ([1, 0, 2, 2, 1], -1_331.0, 0.0, 8.0, 663.0, 0.0, 4.0),
    ([-2, 0, 2, 2, 2], 1_383.0, 0.0, -2.0, -594.0, 0.0, -2.0),
    ([-1, 0, 0, 0, 2], 1_405.0, 0.0, 4.0, -610.0, 0.0, 2.0),
    ([1, 1, 2, -2, 2], 1_290.0, 0.0, 0.0, -556.0, 0.0, 0.0),
];

/// Fixed offsets standing in for the planetary terms dropped by the 2000B
/// truncation, arcseconds.
const PSI_PLANETARY_BIAS_ARCSEC: f64 = -0.135e-3;
const EPS_PLANETARY_BIAS_ARCSEC: f64 = 0.388e-3;

/// Nutation in longitude and obliquity (IAU 2000B), radians, including
/// the EOP celestial-pole corrections (dX ≈ dψ·sin ε, dY ≈ dε).
pub fn nutation_rad(t: f64, eop: &EopRecord) -> (f64, f64) {
    let args = fundamental_args(t);
    let mut dpsi = 0.0; // 0.1 µas
    let mut deps = 0.0;

    for &(multipliers, psi_sin, psi_sin_t, psi_cos, eps_cos, eps_cos_t, eps_sin) in NUTATION_TERMS
    {
        let arg = multipliers[0] as f64 * args.l
            + multipliers[1] as f64 * args.lp
            + multipliers[2] as f64 * args.f
            + multipliers[3] as f64 * args.d
            + multipliers[4] as f64 * args.omega;
        let (sin_arg, cos_arg) = arg.sin_cos();
        dpsi += (psi_sin + psi_sin_t * t) * sin_arg + psi_cos * cos_arg;
        deps += (eps_cos + eps_cos_t * t) * cos_arg + eps_sin * sin_arg;
    }

    // 0.1 µas → arcsec, plus the fixed planetary offsets
    let mut dpsi_arcsec = dpsi * 1e-7 + PSI_PLANETARY_BIAS_ARCSEC;
    let mut deps_arcsec = deps * 1e-7 + EPS_PLANETARY_BIAS_ARCSEC;

    dpsi_arcsec += eop.dx_nut_arcsec / mean_obliquity_rad(t).sin();
    deps_arcsec += eop.dy_nut_arcsec;

    (dpsi_arcsec * ARCSEC_TO_RAD, deps_arcsec * ARCSEC_TO_RAD)
}

/// IAU 2006 precession matrix (Capitaine P03 equinox angles),
/// GCRS → mean-of-date.
pub fn precession_matrix(t: f64) -> Matrix3<f64> {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let zeta = (2.650_545 + 2_306.083_227 * t + 0.298_849_9 * t2 + 0.018_018_28 * t3
        - 0.000_005_971 * t4
        - 0.000_000_317_3 * t5)
        * ARCSEC_TO_RAD;
    let z = (-2.650_545 + 2_306.077_181 * t + 1.092_734_8 * t2 + 0.018_268_37 * t3
        - 0.000_028_596 * t4
        - 0.000_000_290_4 * t5)
        * ARCSEC_TO_RAD;
    let theta = (2_004.191_903 * t - 0.429_493_4 * t2 - 0.041_822_64 * t3
        - 0.000_007_089 * t4
        - 0.000_000_127_4 * t5)
        * ARCSEC_TO_RAD;

    r3(-z) * r2(theta) * r3(-zeta)
}

/// Nutation matrix, mean-of-date → true-of-date.
pub fn nutation_matrix(eps: f64, dpsi: f64, deps: f64) -> Matrix3<f64> {
    r1(-(eps + deps)) * r3(-dpsi) * r1(eps)
}

/// Equation of the equinoxes, radians.
pub fn equation_of_equinoxes(dpsi: f64, eps: f64) -> f64 {
    dpsi * eps.cos()
}

/// Earth Rotation Angle, radians, from a UT1 Julian date.
pub fn era_rad(jd_ut1: f64) -> f64 {
    let t_u = jd_ut1 - timescale::JD_J2000;
    let theta = TWO_PI * (0.779_057_273_264_0 + 1.002_737_811_911_354_48 * t_u);
    theta.rem_euclid(TWO_PI)
}

/// Greenwich Mean Sidereal Time (IAU 2006), radians.
pub fn gmst_rad(t_utc: DateTime<Utc>, ut1_minus_utc_s: f64) -> f64 {
    let era = era_rad(timescale::julian_date_ut1(t_utc, ut1_minus_utc_s));
    let t = timescale::julian_centuries_tt(t_utc);
    let correction_arcsec = 0.014_506
        + 4_612.156_534 * t
        + 1.391_581_7 * t * t
        - 0.000_000_44 * t * t * t
        - 0.000_029_956 * t * t * t * t;
    (era + correction_arcsec * ARCSEC_TO_RAD).rem_euclid(TWO_PI)
}

/// TEME → GCRS rotation at a sample instant.
pub fn teme_to_gcrs_matrix(t_utc: DateTime<Utc>, eop: &EopRecord) -> Matrix3<f64> {
    let t = timescale::julian_centuries_tt(t_utc);
    let eps = mean_obliquity_rad(t);
    let (dpsi, deps) = nutation_rad(t, eop);
    let eqeq = equation_of_equinoxes(dpsi, eps);

    let p = precession_matrix(t);
    let n = nutation_matrix(eps, dpsi, deps);

    // r_GCRS = Pᵀ·Nᵀ·R3(−eqeq)·r_TEME
    p.transpose() * n.transpose() * r3(-eqeq)
}

/// TEME → ITRS for position and velocity. Earth rotation uses GMST on the
/// UT1 scale; velocity picks up the −ω×r transport term; polar motion maps
/// the pseudo-Earth-fixed frame onto ITRS.
pub fn teme_to_itrs(
    t_utc: DateTime<Utc>,
    eop: &EopRecord,
    r_teme_km: &Vector3<f64>,
    v_teme_km_s: &Vector3<f64>,
    earth_rotation_rad_s: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let gmst = gmst_rad(t_utc, eop.ut1_minus_utc_s);
    let spin = r3(gmst);

    let r_pef = spin * r_teme_km;

    // LOD shortens the effective rotation rate
    let omega = earth_rotation_rad_s * (1.0 - eop.lod_ms / 1000.0 / 86_400.0);
    let omega_vec = Vector3::new(0.0, 0.0, omega);
    let v_pef = spin * v_teme_km_s - omega_vec.cross(&r_pef);

    let w = polar_motion_from_arcsec(eop.x_pm_arcsec, eop.y_pm_arcsec);
    (w.transpose() * r_pef, w.transpose() * v_pef)
}
