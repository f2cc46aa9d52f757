//! Survival analysis engine
//!
//! Orchestrates a full survival dashboard from one observation table:
//! column resolution, row cleaning, Kaplan-Meier with confidence band,
//! event-form life table, Nelson-Aalen cumulative hazard, optional
//! stratified comparison, and Cox regression. One synchronous pass, no
//! state kept between calls.

use serde::Serialize;

use crate::dataset::{self, DataTable};
use crate::error::{EngineError, Result};
use crate::survival::cox::{fit_cox, CoxConfig, CoxResult};
use crate::survival::estimators::{
    event_life_table, kaplan_meier, nelson_aalen, HazardCurve, KmCurve, LifeTableEntry,
};
use crate::survival::logrank::multivariate_logrank;

/// Configuration for a survival computation.
#[derive(Debug, Clone)]
pub struct SurvivalConfig {
    /// Column to stratify by, if any.
    pub strata_col: Option<String>,
    /// Explicit Cox covariate columns; `None` selects every numeric column
    /// other than time and event.
    pub cox_covariates: Option<Vec<String>>,
    /// Confidence level for the KM band (default 0.95).
    pub confidence_level: f64,
    /// Cox regression settings.
    pub cox: CoxConfig,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            strata_col: None,
            cox_covariates: None,
            confidence_level: 0.95,
            cox: CoxConfig::default(),
        }
    }
}

/// Dataset-level counts reported alongside the curves.
#[derive(Debug, Clone, Serialize)]
pub struct SurvivalMeta {
    /// Valid observations after cleaning.
    pub n: usize,
    /// Observations ending in an event.
    pub n_events: usize,
    /// Right-censored observations.
    pub n_censored: usize,
    /// Median observed time.
    pub median_follow_up: f64,
}

/// KM curve for one stratum.
#[derive(Debug, Clone, Serialize)]
pub struct GroupKm {
    /// Stratum label.
    pub group: String,
    /// Observations in the stratum.
    pub n: usize,
    #[serde(flatten)]
    pub curve: KmCurve,
}

/// Stratified comparison block; empty when no strata column was configured.
#[derive(Debug, Clone, Serialize)]
pub struct StrataResult {
    /// The strata column, when one was used.
    pub column: Option<String>,
    /// Per-group curves (groups with fewer than 2 observations skipped).
    pub results: Vec<GroupKm>,
    /// Omnibus log-rank p-value across all groups.
    pub logrank_p: Option<f64>,
}

impl StrataResult {
    fn empty() -> Self {
        Self {
            column: None,
            results: Vec::new(),
            logrank_p: None,
        }
    }
}

/// Full survival dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct SurvivalResult {
    pub meta: SurvivalMeta,
    pub overall_km: KmCurve,
    pub life_table: Vec<LifeTableEntry>,
    pub nelson_aalen: HazardCurve,
    pub strata: StrataResult,
    pub cox: CoxResult,
}

/// Survival computation engine.
pub struct SurvivalEngine {
    config: SurvivalConfig,
}

impl SurvivalEngine {
    /// Engine with the given configuration.
    pub fn new(config: SurvivalConfig) -> Self {
        Self { config }
    }

    /// Engine with default settings and an optional strata column.
    pub fn with_strata(strata_col: Option<String>) -> Self {
        Self::new(SurvivalConfig {
            strata_col,
            ..SurvivalConfig::default()
        })
    }

    /// Compute the full survival dashboard for one observation table.
    pub fn compute(&self, table: &DataTable) -> Result<SurvivalResult> {
        let time_col = dataset::resolve_time(table)?;
        let event_col = dataset::resolve_event(table, time_col)?;
        log::info!(
            "resolved time column '{}', event column '{}'",
            table.headers()[time_col],
            table.headers()[event_col]
        );

        // Keep rows where both time and event are numeric. Event coding is
        // a caller precondition: 0 = censored, anything else = event.
        let time_cells = table.numeric_column(time_col);
        let event_cells = table.numeric_column(event_col);
        let mut rows = Vec::new();
        let mut times = Vec::new();
        let mut events = Vec::new();
        for i in 0..table.n_rows() {
            if let (Some(t), Some(e)) = (time_cells[i], event_cells[i]) {
                rows.push(i);
                times.push(t);
                events.push(e != 0.0);
            }
        }
        if times.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let n_events = events.iter().filter(|&&e| e).count();
        let meta = SurvivalMeta {
            n: times.len(),
            n_events,
            n_censored: times.len() - n_events,
            median_follow_up: median(&times),
        };

        let overall_km = kaplan_meier(&times, &events, self.config.confidence_level);
        let life_table = event_life_table(&times, &events);
        let nelson_aalen = nelson_aalen(&times, &events);
        let strata = self.compute_strata(table, &rows, &times, &events);
        let cox = self.compute_cox(table, time_col, event_col, &rows, &times, &events);

        Ok(SurvivalResult {
            meta,
            overall_km,
            life_table,
            nelson_aalen,
            strata,
            cox,
        })
    }

    /// Per-group KM curves plus the omnibus log-rank test.
    fn compute_strata(
        &self,
        table: &DataTable,
        rows: &[usize],
        times: &[f64],
        events: &[bool],
    ) -> StrataResult {
        let Some(name) = self.config.strata_col.as_deref() else {
            return StrataResult::empty();
        };
        let Some(col) = table.column_index(name) else {
            log::warn!("strata column '{name}' not found; skipping stratified analysis");
            return StrataResult::empty();
        };

        // Group cleaned rows by label, in order of first appearance.
        let mut group_names: Vec<String> = Vec::new();
        let mut membership: Vec<Option<usize>> = Vec::with_capacity(rows.len());
        for &row in rows {
            match table.cell(row, col).label() {
                Some(label) => {
                    let g = match group_names.iter().position(|n| *n == label) {
                        Some(g) => g,
                        None => {
                            group_names.push(label);
                            group_names.len() - 1
                        }
                    };
                    membership.push(Some(g));
                }
                None => membership.push(None),
            }
        }

        let mut results = Vec::new();
        for (g, label) in group_names.iter().enumerate() {
            let idx: Vec<usize> = (0..rows.len())
                .filter(|&i| membership[i] == Some(g))
                .collect();
            if idx.len() < 2 {
                continue;
            }
            let g_times: Vec<f64> = idx.iter().map(|&i| times[i]).collect();
            let g_events: Vec<bool> = idx.iter().map(|&i| events[i]).collect();
            results.push(GroupKm {
                group: label.clone(),
                n: idx.len(),
                curve: kaplan_meier(&g_times, &g_events, self.config.confidence_level),
            });
        }

        // The omnibus test runs over every labelled row, including groups
        // too small for their own curve.
        let logrank_p = if results.len() >= 2 {
            let labelled: Vec<usize> = (0..rows.len()).filter(|&i| membership[i].is_some()).collect();
            let t: Vec<f64> = labelled.iter().map(|&i| times[i]).collect();
            let e: Vec<bool> = labelled.iter().map(|&i| events[i]).collect();
            let g: Vec<usize> = labelled
                .iter()
                .map(|&i| membership[i].unwrap_or(0))
                .collect();
            multivariate_logrank(&t, &e, &g, group_names.len())
        } else {
            None
        };

        StrataResult {
            column: Some(name.to_string()),
            results,
            logrank_p,
        }
    }

    /// Cox regression over every numeric column other than time and event.
    fn compute_cox(
        &self,
        table: &DataTable,
        time_col: usize,
        event_col: usize,
        rows: &[usize],
        times: &[f64],
        events: &[bool],
    ) -> CoxResult {
        let cov_cols: Vec<usize> = match &self.config.cox_covariates {
            Some(names) => names
                .iter()
                .filter_map(|n| table.column_index(n))
                .filter(|&c| c != time_col && c != event_col && table.is_numeric_column(c))
                .collect(),
            None => {
                let strata_col = self
                    .config
                    .strata_col
                    .as_deref()
                    .and_then(|n| table.column_index(n));
                table
                    .numeric_column_indices()
                    .into_iter()
                    .filter(|&c| c != time_col && c != event_col && Some(c) != strata_col)
                    .collect()
            }
        };
        let names: Vec<String> = cov_cols
            .iter()
            .map(|&c| table.headers()[c].clone())
            .collect();

        // Complete-case rows only: drop any row missing a covariate value.
        let cov_cells: Vec<Vec<Option<f64>>> =
            cov_cols.iter().map(|&c| table.numeric_column(c)).collect();
        let complete: Vec<usize> = (0..rows.len())
            .filter(|&i| cov_cells.iter().all(|col| col[rows[i]].is_some()))
            .collect();

        let c_times: Vec<f64> = complete.iter().map(|&i| times[i]).collect();
        let c_events: Vec<bool> = complete.iter().map(|&i| events[i]).collect();
        let covariates: Vec<Vec<f64>> = cov_cells
            .iter()
            .map(|col| {
                complete
                    .iter()
                    .map(|&i| col[rows[i]].unwrap_or_default())
                    .collect()
            })
            .collect();

        fit_cox(&c_times, &c_events, &covariates, &names, &self.config.cox)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
