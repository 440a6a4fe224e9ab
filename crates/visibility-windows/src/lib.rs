//! Visibility Window Analyser
//!
//! Reduces one satellite's signal-sample trajectory to contiguous
//! visibility windows: a window opens at the first sample that is visible
//! AND usable (RSRP at or above the usability threshold), closes after the
//! condition has been false for the configured hold-off, and is discarded
//! entirely if shorter than the transient cutoff. Windows are emitted in
//! start-time order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use link_budget::SignalSample;

/// Window extraction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    /// RSRP at or above which a visible sample counts as usable, dBm.
    pub usability_rsrp_dbm: f64,
    /// Consecutive non-usable samples tolerated before the window closes.
    pub hold_off_samples: usize,
    /// Windows shorter than this are transients and dropped, seconds.
    pub min_duration_s: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            usability_rsrp_dbm: -110.0,
            hold_off_samples: 1,
            min_duration_s: 30.0,
        }
    }
}

/// One contiguous pass of a satellite above the mask and the usability
/// threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityWindow {
    pub satellite_id: u32,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_s: f64,
    pub max_elevation_deg: f64,
    pub mean_elevation_deg: f64,
    pub mean_rsrp_dbm: f64,
    pub min_rsrp_dbm: f64,
    pub max_rsrp_dbm: f64,
    pub sample_count: usize,
}

/// Severity classes for gaps between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Short,
    Moderate,
    Severe,
}

impl GapSeverity {
    fn classify(duration_s: f64) -> Self {
        if duration_s < 60.0 {
            GapSeverity::Short
        } else if duration_s < 300.0 {
            GapSeverity::Moderate
        } else {
            GapSeverity::Severe
        }
    }
}

/// Interval with no coverage from any satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageGap {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_s: f64,
    pub severity: GapSeverity,
}

struct OpenWindow {
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    max_elevation_deg: f64,
    elevation_sum: f64,
    rsrp_sum: f64,
    min_rsrp_dbm: f64,
    max_rsrp_dbm: f64,
    sample_count: usize,
    miss_streak: usize,
}

impl OpenWindow {
    fn start(sample: &SignalSample) -> Self {
        Self {
            start_utc: sample.t_utc,
            end_utc: sample.t_utc,
            max_elevation_deg: sample.elevation_deg,
            elevation_sum: sample.elevation_deg,
            rsrp_sum: sample.rsrp_dbm,
            min_rsrp_dbm: sample.rsrp_dbm,
            max_rsrp_dbm: sample.rsrp_dbm,
            sample_count: 1,
            miss_streak: 0,
        }
    }

    fn absorb(&mut self, sample: &SignalSample) {
        self.end_utc = sample.t_utc;
        self.max_elevation_deg = self.max_elevation_deg.max(sample.elevation_deg);
        self.elevation_sum += sample.elevation_deg;
        self.rsrp_sum += sample.rsrp_dbm;
        self.min_rsrp_dbm = self.min_rsrp_dbm.min(sample.rsrp_dbm);
        self.max_rsrp_dbm = self.max_rsrp_dbm.max(sample.rsrp_dbm);
        self.sample_count += 1;
        self.miss_streak = 0;
    }

    fn close(self, satellite_id: u32) -> VisibilityWindow {
        let duration_s = (self.end_utc - self.start_utc).num_microseconds().unwrap_or(0) as f64
            / 1e6;
        VisibilityWindow {
            satellite_id,
            start_utc: self.start_utc,
            end_utc: self.end_utc,
            duration_s,
            max_elevation_deg: self.max_elevation_deg,
            mean_elevation_deg: self.elevation_sum / self.sample_count as f64,
            mean_rsrp_dbm: self.rsrp_sum / self.sample_count as f64,
            min_rsrp_dbm: self.min_rsrp_dbm,
            max_rsrp_dbm: self.max_rsrp_dbm,
            sample_count: self.sample_count,
        }
    }
}

/// Extract the visibility windows of one trajectory, left to right.
pub fn extract_windows(
    satellite_id: u32,
    samples: &[SignalSample],
    config: &WindowConfig,
) -> Vec<VisibilityWindow> {
    let mut windows = Vec::new();
    let mut open: Option<OpenWindow> = None;

    for sample in samples {
        let usable =
            sample.reliable && sample.is_visible && sample.rsrp_dbm >= config.usability_rsrp_dbm;

        if usable {
            match open.as_mut() {
                Some(window) => window.absorb(sample),
                None => open = Some(OpenWindow::start(sample)),
            }
        } else {
            let close_now = match open.as_mut() {
                Some(window) => {
                    window.miss_streak += 1;
                    window.miss_streak >= config.hold_off_samples
                }
                None => false,
            };
            if close_now {
                let finished = open.take().expect("window is open").close(satellite_id);
                push_if_long_enough(&mut windows, finished, config);
            }
        }
    }

    if let Some(window) = open {
        push_if_long_enough(&mut windows, window.close(satellite_id), config);
    }

    debug!(
        satellite_id,
        windows = windows.len(),
        "extracted visibility windows"
    );
    windows
}

fn push_if_long_enough(
    windows: &mut Vec<VisibilityWindow>,
    window: VisibilityWindow,
    config: &WindowConfig,
) {
    if window.duration_s >= config.min_duration_s {
        windows.push(window);
    }
}

/// Coverage gaps of the merged window set over an analysis horizon.
/// Windows may come from any number of satellites in any order.
pub fn identify_coverage_gaps(
    windows: &[VisibilityWindow],
    horizon_start: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
) -> Vec<CoverageGap> {
    let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = windows
        .iter()
        .map(|w| (w.start_utc, w.end_utc))
        .collect();
    intervals.sort_by_key(|&(start, _)| start);

    // Merge overlapping/adjacent intervals
    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in intervals {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                if end > *last_end {
                    *last_end = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }

    let mut gaps = Vec::new();
    let mut cursor = horizon_start;
    for (start, end) in merged.iter().filter(|&&(_, end)| end > horizon_start) {
        if *start > cursor {
            let gap_end = (*start).min(horizon_end);
            if gap_end > cursor {
                gaps.push(gap(cursor, gap_end));
            }
        }
        cursor = cursor.max(*end);
        if cursor >= horizon_end {
            break;
        }
    }
    if cursor < horizon_end {
        gaps.push(gap(cursor, horizon_end));
    }

    gaps
}

fn gap(start: DateTime<Utc>, end: DateTime<Utc>) -> CoverageGap {
    let duration_s = (end - start).num_microseconds().unwrap_or(0) as f64 / 1e6;
    CoverageGap {
        start_utc: start,
        end_utc: end,
        duration_s,
        severity: GapSeverity::classify(duration_s),
    }
}
