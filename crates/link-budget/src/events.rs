//! 3GPP NTN measurement events
//!
//! A4 / A5 / D2 trigger machines per TS 38.331 semantics: a condition must
//! hold for the time-to-trigger before the event fires, it fires exactly
//! once on entry, and it re-arms only after the reverse condition (with
//! hysteresis on the RSRP events) has held for the time-to-trigger.
//!
//! The evaluator runs over one satellite's sample stream. When a serving
//! context is supplied the stream plays the neighbour role in A5/D2; with
//! no context the satellite's own metrics drive the serving-side arm of
//! A5 and the far-range arm of D2, which is how per-satellite catalog
//! screening uses these triggers.

use serde::{Deserialize, Serialize};

use crate::SignalSample;

/// Event thresholds and timing, configurable per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub a4_threshold_dbm: f64,
    pub a5_threshold1_dbm: f64,
    pub a5_threshold2_dbm: f64,
    pub d2_far_threshold_km: f64,
    pub d2_near_threshold_km: f64,
    pub hysteresis_db: f64,
    pub time_to_trigger_ms: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            a4_threshold_dbm: -110.0,
            a5_threshold1_dbm: -115.0,
            a5_threshold2_dbm: -105.0,
            d2_far_threshold_km: 2_000.0,
            d2_near_threshold_km: 1_500.0,
            hysteresis_db: 3.0,
            time_to_trigger_ms: 160.0,
        }
    }
}

/// Serving-cell measurements at one instant, for neighbour-role
/// evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ServingContext {
    pub rsrp_dbm: f64,
    pub range_km: f64,
}

/// Fired-event flags for one sample instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFlags {
    pub a4: bool,
    pub a5_entering: bool,
    pub a5_leaving: bool,
    pub d2: bool,
}

/// Dwell tracking for one trigger.
#[derive(Debug, Default, Clone)]
struct TriggerState {
    active: bool,
    enter_dwell_s: f64,
    leave_dwell_s: f64,
}

enum Transition {
    None,
    Fired,
    Cleared,
}

impl TriggerState {
    /// Advance by one sample interval. `entering`/`leaving` are the
    /// hysteresis-separated conditions; between them the state holds.
    fn step(&mut self, entering: bool, leaving: bool, dt_s: f64, ttt_s: f64) -> Transition {
        if !self.active {
            self.leave_dwell_s = 0.0;
            if entering {
                self.enter_dwell_s += dt_s;
                if self.enter_dwell_s >= ttt_s {
                    self.active = true;
                    self.enter_dwell_s = 0.0;
                    return Transition::Fired;
                }
            } else {
                self.enter_dwell_s = 0.0;
            }
        } else {
            self.enter_dwell_s = 0.0;
            if leaving {
                self.leave_dwell_s += dt_s;
                if self.leave_dwell_s >= ttt_s {
                    self.active = false;
                    self.leave_dwell_s = 0.0;
                    return Transition::Cleared;
                }
            } else {
                self.leave_dwell_s = 0.0;
            }
        }
        Transition::None
    }

    fn reset_dwells(&mut self) {
        self.enter_dwell_s = 0.0;
        self.leave_dwell_s = 0.0;
    }
}

/// Per-satellite event state machine.
pub struct EventEvaluator {
    config: EventConfig,
    step_s: f64,
    a4: TriggerState,
    a5: TriggerState,
    d2: TriggerState,
}

impl EventEvaluator {
    pub fn new(config: EventConfig, step_s: f64) -> Self {
        Self {
            config,
            step_s,
            a4: TriggerState::default(),
            a5: TriggerState::default(),
            d2: TriggerState::default(),
        }
    }

    /// Evaluate one sample in stream order, writing its event flags.
    /// Unreliable samples never generate events and freeze the dwells.
    pub fn process(&mut self, sample: &mut SignalSample, serving: Option<ServingContext>) {
        sample.event_flags = EventFlags::default();

        if !sample.reliable {
            self.a4.reset_dwells();
            self.a5.reset_dwells();
            self.d2.reset_dwells();
            return;
        }

        let ttt_s = self.config.time_to_trigger_ms / 1000.0;
        let hys = self.config.hysteresis_db;

        // A4: neighbour becomes better than threshold
        let a4_enter = sample.rsrp_dbm > self.config.a4_threshold_dbm + hys;
        let a4_leave = sample.rsrp_dbm < self.config.a4_threshold_dbm - hys;
        if let Transition::Fired = self.a4.step(a4_enter, a4_leave, self.step_s, ttt_s) {
            sample.event_flags.a4 = true;
        }

        // A5: serving worse than threshold1 AND neighbour better than
        // threshold2. Without a serving context only the serving-side arm
        // is evaluable, with this stream as the serving cell.
        let (a5_enter, a5_leave) = match serving {
            Some(ctx) => (
                ctx.rsrp_dbm < self.config.a5_threshold1_dbm - hys
                    && sample.rsrp_dbm > self.config.a5_threshold2_dbm + hys,
                ctx.rsrp_dbm > self.config.a5_threshold1_dbm + hys
                    || sample.rsrp_dbm < self.config.a5_threshold2_dbm - hys,
            ),
            None => (
                sample.rsrp_dbm < self.config.a5_threshold1_dbm - hys,
                sample.rsrp_dbm > self.config.a5_threshold1_dbm + hys,
            ),
        };
        match self.a5.step(a5_enter, a5_leave, self.step_s, ttt_s) {
            Transition::Fired => sample.event_flags.a5_entering = true,
            Transition::Cleared => sample.event_flags.a5_leaving = true,
            Transition::None => {}
        }

        // D2: serving range beyond the far threshold AND candidate range
        // inside the near threshold.
        let (d2_enter, d2_leave) = match serving {
            Some(ctx) => (
                ctx.range_km > self.config.d2_far_threshold_km
                    && sample.range_km < self.config.d2_near_threshold_km,
                ctx.range_km < self.config.d2_far_threshold_km
                    || sample.range_km > self.config.d2_near_threshold_km,
            ),
            None => (
                sample.range_km > self.config.d2_far_threshold_km,
                sample.range_km < self.config.d2_far_threshold_km,
            ),
        };
        if let Transition::Fired = self.d2.step(d2_enter, d2_leave, self.step_s, ttt_s) {
            sample.event_flags.d2 = true;
        }
    }

    /// Annotate a whole trajectory in place.
    pub fn annotate(&mut self, samples: &mut [SignalSample]) {
        for sample in samples.iter_mut() {
            self.process(sample, None);
        }
    }
}
