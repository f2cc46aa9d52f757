//! Mortality table analytics engine
//!
//! Builds the full dashboard for one mortality series: scale
//! normalization, actuarial life table, three graduation passes, two
//! parametric law fits, and summary KPIs.

use serde::Serialize;

use crate::dataset::{self, DataTable};
use crate::error::{EngineError, Result};
use crate::lifetable::{LifeTableBuilder, LifeTableRow, DEFAULT_RADIX};
use crate::mortality::graduation::{moving_average, smoothing_spline, whittaker_henderson};
use crate::mortality::laws::{fit_gompertz, fit_makeham, ModelOutcome};

/// Configuration for a mortality computation.
#[derive(Debug, Clone)]
pub struct MortalityConfig {
    /// Whittaker-Henderson difference order.
    pub whittaker_order: usize,
    /// Whittaker-Henderson smoothing parameter.
    pub whittaker_lambda: f64,
    /// Moving-average window width (forced odd).
    pub ma_window: usize,
    /// Spline smoothing factor (scaled by series length).
    pub spline_factor: f64,
    /// Life table radix.
    pub radix: f64,
}

impl Default for MortalityConfig {
    fn default() -> Self {
        Self {
            whittaker_order: 3,
            whittaker_lambda: 100.0,
            ma_window: 5,
            spline_factor: 0.1,
            radix: DEFAULT_RADIX,
        }
    }
}

/// The input series after scale normalization.
#[derive(Debug, Clone, Serialize)]
pub struct RawSeries {
    pub ages: Vec<f64>,
    pub qx: Vec<f64>,
}

/// One graduated series with its method description.
#[derive(Debug, Clone, Serialize)]
pub struct GraduatedSeries {
    pub ages: Vec<f64>,
    pub qx: Vec<f64>,
    pub method: String,
}

/// The three graduation outputs; independent passes, they do not compose.
#[derive(Debug, Clone, Serialize)]
pub struct GraduatedSet {
    pub whittaker_henderson: GraduatedSeries,
    pub moving_average: GraduatedSeries,
    pub penalized_spline: GraduatedSeries,
}

/// Both parametric law fits.
#[derive(Debug, Clone, Serialize)]
pub struct FittedModels {
    pub gompertz: ModelOutcome,
    pub makeham: ModelOutcome,
}

/// Min/max of the input ages.
#[derive(Debug, Clone, Serialize)]
pub struct AgeRange {
    pub min: f64,
    pub max: f64,
}

/// Headline indicators derived from the life table.
#[derive(Debug, Clone, Serialize)]
pub struct MortalityKpis {
    /// Life expectancy at the first age: `ex[0]`.
    pub life_expectancy_at_birth: f64,
    /// First age at which survivors fall to half the radix.
    pub median_age_at_death: f64,
    /// Starting cohort size.
    pub total_population: f64,
    /// Total deaths across the table.
    pub total_deaths: f64,
    pub age_range: AgeRange,
}

/// Where the series came from, when loaded from a table.
#[derive(Debug, Clone, Serialize)]
pub struct MortalityMetadata {
    pub n_ages: usize,
    pub age_column: Option<String>,
    pub qx_column: Option<String>,
}

/// Full mortality dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct MortalityResult {
    pub raw_data: RawSeries,
    pub life_table: Vec<LifeTableRow>,
    pub graduated: GraduatedSet,
    pub fitted_models: FittedModels,
    pub kpis: MortalityKpis,
    pub metadata: MortalityMetadata,
}

/// Mortality computation engine.
pub struct MortalityEngine {
    config: MortalityConfig,
}

impl MortalityEngine {
    /// Engine with the given configuration.
    pub fn new(config: MortalityConfig) -> Self {
        Self { config }
    }

    /// Compute the dashboard from parallel age / qx arrays.
    pub fn compute(&self, ages: &[f64], qx: &[f64]) -> Result<MortalityResult> {
        self.compute_named(ages, qx, None, None)
    }

    /// Compute the dashboard from an observation table, resolving the age
    /// and qx columns first. Rows missing either value are dropped.
    pub fn compute_table(&self, table: &DataTable) -> Result<MortalityResult> {
        let age_col = dataset::resolve_age(table)?;
        let qx_col = dataset::resolve_qx(table)?;
        log::info!(
            "resolved age column '{}', qx column '{}'",
            table.headers()[age_col],
            table.headers()[qx_col]
        );

        let age_cells = table.numeric_column(age_col);
        let qx_cells = table.numeric_column(qx_col);
        let mut ages = Vec::new();
        let mut qx = Vec::new();
        for i in 0..table.n_rows() {
            if let (Some(a), Some(q)) = (age_cells[i], qx_cells[i]) {
                ages.push(a);
                qx.push(q);
            }
        }
        if ages.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        self.compute_named(
            &ages,
            &qx,
            Some(table.headers()[age_col].clone()),
            Some(table.headers()[qx_col].clone()),
        )
    }

    fn compute_named(
        &self,
        ages: &[f64],
        qx_raw: &[f64],
        age_column: Option<String>,
        qx_column: Option<String>,
    ) -> Result<MortalityResult> {
        let qx = normalize_qx(qx_raw);
        let ages = ages.to_vec();

        let builder = LifeTableBuilder::with_radix(self.config.radix);
        let life_table = builder.build(&ages, &qx)?;

        let graduated = GraduatedSet {
            whittaker_henderson: GraduatedSeries {
                ages: ages.clone(),
                qx: whittaker_henderson(&qx, self.config.whittaker_order, self.config.whittaker_lambda),
                method: format!(
                    "Whittaker-Henderson (order={}, lambda={})",
                    self.config.whittaker_order, self.config.whittaker_lambda
                ),
            },
            moving_average: GraduatedSeries {
                ages: ages.clone(),
                qx: moving_average(&qx, self.config.ma_window),
                method: format!("Weighted Moving Average (window={})", self.config.ma_window),
            },
            penalized_spline: GraduatedSeries {
                ages: ages.clone(),
                qx: smoothing_spline(&ages, &qx, self.config.spline_factor),
                method: "Penalized Cubic Spline".to_string(),
            },
        };

        let fitted_models = FittedModels {
            gompertz: fit_gompertz(&ages, &qx),
            makeham: fit_makeham(&ages, &qx),
        };

        let kpis = self.kpis(&ages, &life_table);
        let metadata = MortalityMetadata {
            n_ages: ages.len(),
            age_column,
            qx_column,
        };

        Ok(MortalityResult {
            raw_data: RawSeries { ages, qx },
            life_table,
            graduated,
            fitted_models,
            kpis,
            metadata,
        })
    }

    fn kpis(&self, ages: &[f64], life_table: &[LifeTableRow]) -> MortalityKpis {
        let radix = self.config.radix;
        let median_age_at_death = life_table
            .iter()
            .find(|row| row.lx <= radix / 2.0)
            .map(|row| row.age)
            .unwrap_or_else(|| life_table.last().map(|r| r.age).unwrap_or(0.0));

        MortalityKpis {
            life_expectancy_at_birth: life_table.first().map(|r| r.ex).unwrap_or(0.0),
            median_age_at_death,
            total_population: radix,
            total_deaths: life_table.iter().map(|r| r.dx).sum(),
            age_range: AgeRange {
                min: ages.first().copied().unwrap_or(0.0),
                max: ages.last().copied().unwrap_or(0.0),
            },
        }
    }
}

impl Default for MortalityEngine {
    fn default() -> Self {
        Self::new(MortalityConfig::default())
    }
}

/// Bring a qx series onto the [0, 1] probability scale. Series whose
/// maximum exceeds 1 are assumed to be percentages; above 100, deaths per
/// thousand.
pub fn normalize_qx(qx: &[f64]) -> Vec<f64> {
    let max = qx.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 100.0 {
        qx.iter().map(|&q| q / 1000.0).collect()
    } else if max > 1.0 {
        qx.iter().map(|&q| q / 100.0).collect()
    } else {
        qx.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_table_from_reader;

    fn gompertz_series() -> (Vec<f64>, Vec<f64>) {
        let ages: Vec<f64> = (0..100).map(|a| a as f64).collect();
        let qx: Vec<f64> = ages
            .iter()
            .map(|&x| {
                let mu = 1e-4 * (0.09_f64 * x).exp();
                1.0 - (-mu).exp()
            })
            .collect();
        (ages, qx)
    }

    #[test]
    fn test_full_dashboard() {
        let (ages, qx) = gompertz_series();
        let result = MortalityEngine::default().compute(&ages, &qx).unwrap();

        assert_eq!(result.life_table.len(), 100);
        assert_eq!(result.raw_data.qx.len(), 100);
        assert_eq!(result.graduated.whittaker_henderson.qx.len(), 100);
        assert_eq!(result.graduated.moving_average.qx.len(), 100);
        assert_eq!(result.graduated.penalized_spline.qx.len(), 100);
        assert!(result.fitted_models.gompertz.is_success());

        let gompertz = result.fitted_models.gompertz.fit().unwrap();
        assert!(gompertz.r_squared > 0.9);

        assert!(result.kpis.life_expectancy_at_birth > 0.0);
        assert_eq!(result.kpis.age_range.min, 0.0);
        assert_eq!(result.kpis.age_range.max, 99.0);
        assert_eq!(result.metadata.n_ages, 100);
        assert!(result.metadata.age_column.is_none());
    }

    #[test]
    fn test_median_age_at_death_half_radix() {
        let (ages, qx) = gompertz_series();
        let result = MortalityEngine::default().compute(&ages, &qx).unwrap();

        let median = result.kpis.median_age_at_death;
        let row = result
            .life_table
            .iter()
            .find(|r| r.age == median)
            .expect("median age is in the table");
        assert!(row.lx <= DEFAULT_RADIX / 2.0);
        // The previous age still had more than half the cohort alive.
        if let Some(prev) = result.life_table.iter().find(|r| r.age == median - 1.0) {
            assert!(prev.lx > DEFAULT_RADIX / 2.0);
        }
    }

    #[test]
    fn test_qx_rescaling_heuristics() {
        // Percent scale.
        let scaled = normalize_qx(&[0.5, 1.2, 50.0]);
        assert!((scaled[2] - 0.5).abs() < 1e-12);
        // Per-mille scale.
        let scaled = normalize_qx(&[5.0, 120.0, 500.0]);
        assert!((scaled[2] - 0.5).abs() < 1e-12);
        // Already probabilities: untouched.
        let scaled = normalize_qx(&[0.01, 0.5, 1.0]);
        assert_eq!(scaled, vec![0.01, 0.5, 1.0]);
    }

    #[test]
    fn test_compute_from_table_with_rescale() {
        let mut csv = String::from("Age,Mortality_Rate\n");
        // Rates in percent, with a junk row to drop. Headers resolve
        // case-insensitively ("Mortality_Rate" -> qx candidates).
        for a in 0..60 {
            let q = 0.1 * (0.08 * a as f64).exp();
            csv.push_str(&format!("{a},{q}\n"));
        }
        csv.push_str("x,\n");
        let table = load_table_from_reader(csv.as_bytes()).unwrap();
        let result = MortalityEngine::default().compute_table(&table).unwrap();

        assert_eq!(result.metadata.n_ages, 60);
        assert_eq!(result.metadata.age_column.as_deref(), Some("Age"));
        assert_eq!(result.metadata.qx_column.as_deref(), Some("Mortality_Rate"));
        // Percent input was brought back to probabilities.
        assert!(result.raw_data.qx.iter().all(|&q| (0.0..=1.0).contains(&q)));
    }

    #[test]
    fn test_total_deaths_bounded_by_radix() {
        let (ages, qx) = gompertz_series();
        let result = MortalityEngine::default().compute(&ages, &qx).unwrap();
        assert!(result.kpis.total_deaths <= DEFAULT_RADIX);
        assert!(result.kpis.total_deaths > 0.0);
    }

    #[test]
    fn test_invalid_ages_rejected() {
        let result = MortalityEngine::default().compute(&[1.0, 1.0], &[0.1, 0.2]);
        assert!(result.is_err());
    }
}
