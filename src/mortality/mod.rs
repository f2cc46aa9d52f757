//! Mortality table analytics: graduation of raw rates, parametric law
//! fitting (Gompertz, Makeham), and the dashboard engine tying them to
//! the actuarial life table.

mod engine;
pub mod graduation;
mod laws;

pub use engine::{
    normalize_qx, AgeRange, FittedModels, GraduatedSeries, GraduatedSet, MortalityConfig,
    MortalityEngine, MortalityKpis, MortalityMetadata, MortalityResult, RawSeries,
};
pub use laws::{
    fit_gompertz, fit_makeham, force_of_mortality, FitFailure, ModelOutcome, MortalityLawFit,
};
