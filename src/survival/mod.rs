//! Survival analysis: Kaplan-Meier, life table, Nelson-Aalen, Cox
//! regression, and stratified log-rank comparison over right-censored
//! time/event observations.

mod cox;
mod engine;
mod estimators;
mod logrank;

pub use cox::{concordance_index, fit_cox, CoxCoefficient, CoxConfig, CoxResult};
pub use engine::{
    GroupKm, StrataResult, SurvivalConfig, SurvivalEngine, SurvivalMeta, SurvivalResult,
};
pub use estimators::{
    event_life_table, kaplan_meier, nelson_aalen, HazardCurve, KmCurve, LifeTableEntry,
};
pub use logrank::multivariate_logrank;
