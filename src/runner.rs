//! Batch analysis runner
//!
//! Holds the engine configurations once, then runs any number of analyses
//! without rebuilding them. Engines carry no shared state, so batch runs
//! fan out across a rayon thread pool.

use rayon::prelude::*;

use crate::dataset::{DataTable, Triangle};
use crate::error::Result;
use crate::mortality::{MortalityConfig, MortalityEngine, MortalityResult};
use crate::reserving::{ChainLadder, ReservingResult};
use crate::survival::{SurvivalConfig, SurvivalEngine, SurvivalResult};

/// Pre-configured runner for one-off and batch analyses.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRunner {
    survival_config: SurvivalConfig,
    mortality_config: MortalityConfig,
}

impl AnalysisRunner {
    /// Runner with default configurations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner with explicit configurations.
    pub fn with_configs(survival: SurvivalConfig, mortality: MortalityConfig) -> Self {
        Self {
            survival_config: survival,
            mortality_config: mortality,
        }
    }

    /// Survival analysis on one observation table.
    pub fn run_survival(&self, table: &DataTable) -> Result<SurvivalResult> {
        SurvivalEngine::new(self.survival_config.clone()).compute(table)
    }

    /// Mortality dashboard on one rate table.
    pub fn run_mortality(&self, table: &DataTable) -> Result<MortalityResult> {
        MortalityEngine::new(self.mortality_config.clone()).compute_table(table)
    }

    /// Chain-ladder reserve on one run-off triangle.
    pub fn run_reserving(&self, triangle: &Triangle) -> Result<ReservingResult> {
        ChainLadder::new().compute(triangle)
    }

    /// Survival analysis over many tables in parallel. Each table gets its
    /// own result slot; per-table failures do not abort the batch.
    pub fn run_survival_batch(&self, tables: &[DataTable]) -> Vec<Result<SurvivalResult>> {
        tables.par_iter().map(|t| self.run_survival(t)).collect()
    }

    /// Mortality dashboards over many tables in parallel.
    pub fn run_mortality_batch(&self, tables: &[DataTable]) -> Vec<Result<MortalityResult>> {
        tables.par_iter().map(|t| self.run_mortality(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_table_from_reader;

    fn survival_csv(offset: usize) -> String {
        let mut csv = String::from("time,event\n");
        for i in 0..20 {
            let t = i + 1 + offset;
            let e = i % 2;
            csv.push_str(&format!("{t},{e}\n"));
        }
        csv
    }

    #[test]
    fn test_batch_survival() {
        let tables: Vec<DataTable> = (0..4)
            .map(|k| load_table_from_reader(survival_csv(k).as_bytes()).unwrap())
            .collect();

        let runner = AnalysisRunner::new();
        let results = runner.run_survival_batch(&tables);
        assert_eq!(results.len(), 4);
        for result in results {
            let r = result.unwrap();
            assert_eq!(r.meta.n, 20);
        }
    }

    #[test]
    fn test_runner_reserving() {
        let triangle = Triangle::new(
            vec!["2022".into(), "2023".into()],
            vec![
                vec![Some(100.0), Some(150.0)],
                vec![Some(200.0), None],
            ],
        )
        .unwrap();
        let result = AnalysisRunner::new().run_reserving(&triangle).unwrap();
        assert!((result.reserve_estimate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_failure_isolated() {
        let good = load_table_from_reader(survival_csv(0).as_bytes()).unwrap();
        let bad = load_table_from_reader("name,city\na,x\nb,y\n".as_bytes()).unwrap();
        let results = AnalysisRunner::new().run_survival_batch(&[good, bad]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
