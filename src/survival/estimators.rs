//! Non-parametric survival estimators
//!
//! Kaplan-Meier survival curves (with log-minus-log confidence bands), the
//! event-form life table, and the Nelson-Aalen cumulative hazard. All three
//! are single-pass computations over observations grouped by distinct time.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// A step-function survival curve with pointwise confidence bounds.
#[derive(Debug, Clone, Serialize)]
pub struct KmCurve {
    /// Distinct observed times, ascending, starting at 0.
    pub timeline: Vec<f64>,
    /// Survival probability at each timeline point.
    pub survival: Vec<f64>,
    /// Lower confidence bound.
    pub lower_ci: Vec<f64>,
    /// Upper confidence bound.
    pub upper_ci: Vec<f64>,
}

/// One row of the event-form life table.
#[derive(Debug, Clone, Serialize)]
pub struct LifeTableEntry {
    /// Distinct observed time.
    pub time: f64,
    /// Subjects still at risk just before this time.
    pub at_risk: usize,
    /// Events at this time.
    pub observed: usize,
    /// Censorings at this time.
    pub censored: usize,
}

/// Nelson-Aalen cumulative hazard step function.
#[derive(Debug, Clone, Serialize)]
pub struct HazardCurve {
    /// Distinct observed times, ascending, starting at 0.
    pub timeline: Vec<f64>,
    /// Cumulative hazard at each timeline point (non-decreasing).
    pub cumhaz: Vec<f64>,
}

/// Counts at one distinct observed time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeGroup {
    pub time: f64,
    pub events: usize,
    pub censored: usize,
}

/// Group observations by distinct time, ascending.
pub(crate) fn group_by_time(times: &[f64], events: &[bool]) -> Vec<TimeGroup> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let mut groups: Vec<TimeGroup> = Vec::new();
    for &i in &order {
        match groups.last_mut() {
            Some(g) if g.time == times[i] => {
                if events[i] {
                    g.events += 1;
                } else {
                    g.censored += 1;
                }
            }
            _ => groups.push(TimeGroup {
                time: times[i],
                events: usize::from(events[i]),
                censored: usize::from(!events[i]),
            }),
        }
    }
    groups
}

/// Kaplan-Meier estimator.
///
/// At each distinct event time the survival estimate multiplies by
/// `1 - d/n`; the at-risk count then drops by everyone leaving at that time
/// (events and censorings alike). The timeline includes every distinct
/// observed time plus a leading 0, so censor-only times appear as flat
/// steps. The confidence band uses the log-minus-log (exponential
/// Greenwood) formula `S^exp(±z·sqrt(v))`.
pub fn kaplan_meier(times: &[f64], events: &[bool], confidence_level: f64) -> KmCurve {
    let groups = group_by_time(times, events);
    let z = normal_quantile(1.0 - (1.0 - confidence_level) / 2.0);

    let mut curve = KmCurve {
        timeline: Vec::with_capacity(groups.len() + 1),
        survival: Vec::with_capacity(groups.len() + 1),
        lower_ci: Vec::with_capacity(groups.len() + 1),
        upper_ci: Vec::with_capacity(groups.len() + 1),
    };

    if groups.first().map(|g| g.time > 0.0).unwrap_or(true) {
        curve.push(0.0, 1.0, 1.0, 1.0);
    }

    let mut at_risk = times.len();
    let mut survival = 1.0_f64;
    // Accumulates sum d / (n (n - d)) for the Greenwood-type variance.
    let mut greenwood = 0.0_f64;

    for g in &groups {
        let n = at_risk as f64;
        let d = g.events as f64;
        if g.events > 0 {
            survival *= 1.0 - d / n;
            if at_risk > g.events {
                greenwood += d / (n * (n - d));
            } else {
                // All remaining subjects fail here; survival hits zero.
                greenwood = f64::INFINITY;
            }
        }
        let (lower, upper) = log_minus_log_ci(survival, greenwood, z);
        curve.push(g.time, survival, lower, upper);
        at_risk -= g.events + g.censored;
    }

    curve
}

impl KmCurve {
    fn push(&mut self, time: f64, survival: f64, lower: f64, upper: f64) {
        self.timeline.push(time);
        self.survival.push(survival);
        self.lower_ci.push(lower);
        self.upper_ci.push(upper);
    }
}

/// Pointwise CI on the log(-log S) scale: `S^exp(±z·se)`.
fn log_minus_log_ci(survival: f64, greenwood: f64, z: f64) -> (f64, f64) {
    if survival >= 1.0 {
        return (1.0, 1.0);
    }
    if survival <= 0.0 || !greenwood.is_finite() {
        return (0.0, if survival <= 0.0 { 0.0 } else { 1.0 });
    }
    let log_s = survival.ln();
    let se = (greenwood / (log_s * log_s)).sqrt();
    let lower = survival.powf((z * se).exp());
    let upper = survival.powf((-z * se).exp());
    (lower, upper)
}

fn normal_quantile(p: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    normal.inverse_cdf(p)
}

/// Life table in event form: per distinct time, the at-risk count and how
/// many subjects left through events vs censoring.
pub fn event_life_table(times: &[f64], events: &[bool]) -> Vec<LifeTableEntry> {
    let groups = group_by_time(times, events);
    let mut at_risk = times.len();
    let mut rows = Vec::with_capacity(groups.len());

    for g in &groups {
        rows.push(LifeTableEntry {
            time: g.time,
            at_risk,
            observed: g.events,
            censored: g.censored,
        });
        at_risk -= g.events + g.censored;
    }
    rows
}

/// Nelson-Aalen cumulative hazard: `H(t) = sum d_i / n_i` over event times
/// up to `t`.
pub fn nelson_aalen(times: &[f64], events: &[bool]) -> HazardCurve {
    let groups = group_by_time(times, events);
    let mut curve = HazardCurve {
        timeline: Vec::with_capacity(groups.len() + 1),
        cumhaz: Vec::with_capacity(groups.len() + 1),
    };

    if groups.first().map(|g| g.time > 0.0).unwrap_or(true) {
        curve.timeline.push(0.0);
        curve.cumhaz.push(0.0);
    }

    let mut at_risk = times.len();
    let mut cumhaz = 0.0;
    for g in &groups {
        if g.events > 0 && at_risk > 0 {
            cumhaz += g.events as f64 / at_risk as f64;
        }
        curve.timeline.push(g.time);
        curve.cumhaz.push(cumhaz);
        at_risk -= g.events + g.censored;
    }

    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    // 6 subjects: events at 1, 2, 4; censored at 3, 4, 5.
    fn sample() -> (Vec<f64>, Vec<bool>) {
        (
            vec![1.0, 2.0, 3.0, 4.0, 4.0, 5.0],
            vec![true, true, false, true, false, false],
        )
    }

    #[test]
    fn test_km_hand_computed_steps() {
        let (times, events) = sample();
        let km = kaplan_meier(&times, &events, 0.95);

        assert_eq!(km.timeline, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        // S(1) = 5/6, S(2) = 5/6 * 4/5 = 2/3, flat at 3, S(4) = 2/3 * 2/3.
        assert!((km.survival[1] - 5.0 / 6.0).abs() < 1e-12);
        assert!((km.survival[2] - 2.0 / 3.0).abs() < 1e-12);
        assert!((km.survival[3] - 2.0 / 3.0).abs() < 1e-12);
        assert!((km.survival[4] - 4.0 / 9.0).abs() < 1e-12);
        assert!((km.survival[5] - 4.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_km_monotone_and_bounded() {
        let (times, events) = sample();
        let km = kaplan_meier(&times, &events, 0.95);

        assert_eq!(km.survival[0], 1.0);
        for w in km.survival.windows(2) {
            assert!(w[1] <= w[0]);
        }
        for i in 0..km.timeline.len() {
            assert!(km.lower_ci[i] <= km.survival[i] + 1e-12);
            assert!(km.upper_ci[i] >= km.survival[i] - 1e-12);
            assert!((0.0..=1.0).contains(&km.lower_ci[i]));
            assert!((0.0..=1.0).contains(&km.upper_ci[i]));
        }
    }

    #[test]
    fn test_km_reaches_zero_only_on_terminal_event() {
        // Last observation is an event: curve must reach 0.
        let km = kaplan_meier(&[1.0, 2.0, 3.0], &[true, true, true], 0.95);
        assert_eq!(*km.survival.last().unwrap(), 0.0);
        assert_eq!(*km.lower_ci.last().unwrap(), 0.0);
        assert_eq!(*km.upper_ci.last().unwrap(), 0.0);

        // Last observation censored: curve stays positive.
        let km = kaplan_meier(&[1.0, 2.0, 3.0], &[true, true, false], 0.95);
        assert!(*km.survival.last().unwrap() > 0.0);
    }

    #[test]
    fn test_event_life_table_at_risk_decrement() {
        let (times, events) = sample();
        let lt = event_life_table(&times, &events);

        assert_eq!(lt.len(), 5);
        assert_eq!(lt[0].at_risk, 6);
        assert_eq!(lt[0].observed, 1);
        assert_eq!(lt[1].at_risk, 5);
        // Time 4 has one event and one censoring in the same interval.
        assert_eq!(lt[3].time, 4.0);
        assert_eq!(lt[3].at_risk, 3);
        assert_eq!(lt[3].observed, 1);
        assert_eq!(lt[3].censored, 1);
        assert_eq!(lt[4].at_risk, 1);
    }

    #[test]
    fn test_nelson_aalen_non_decreasing() {
        let (times, events) = sample();
        let na = nelson_aalen(&times, &events);

        assert_eq!(na.cumhaz[0], 0.0);
        for w in na.cumhaz.windows(2) {
            assert!(w[1] >= w[0]);
        }
        // H(1) = 1/6, H(2) = 1/6 + 1/5, H(4) adds 1/3.
        assert!((na.cumhaz[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((na.cumhaz[2] - (1.0 / 6.0 + 1.0 / 5.0)).abs() < 1e-12);
        assert!((na.cumhaz[4] - (1.0 / 6.0 + 1.0 / 5.0 + 1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_drop_count_bounded_by_events() {
        // 20 subjects, 12 events at distinct times, 8 censored.
        let mut times = Vec::new();
        let mut events = Vec::new();
        for i in 0..12 {
            times.push(1.0 + i as f64);
            events.push(true);
        }
        for i in 0..8 {
            times.push(0.5 + i as f64);
            events.push(false);
        }
        let km = kaplan_meier(&times, &events, 0.95);
        let drops = km
            .survival
            .windows(2)
            .filter(|w| w[1] < w[0])
            .count();
        assert!(drops <= 12, "expected at most 12 drops, got {drops}");
    }
}
