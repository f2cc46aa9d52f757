//! Actuarial Analytics - survival, mortality and reserving computations
//!
//! This library provides:
//! - Survival analysis over right-censored observations (Kaplan-Meier,
//!   event-form life table, Nelson-Aalen, Cox regression, stratified
//!   comparisons with log-rank tests)
//! - Mortality table analytics (actuarial life table, graduation,
//!   Gompertz/Makeham law fitting, summary KPIs)
//! - Chain-ladder loss reserving over cumulative run-off triangles
//! - CSV loading with heuristic column resolution, and a batch runner

pub mod dataset;
pub mod error;
pub mod lifetable;
pub mod mortality;
pub mod reserving;
pub mod runner;
pub mod survival;

// Re-export commonly used types
pub use dataset::{load_table, load_triangle, DataTable, Triangle};
pub use error::{EngineError, Result};
pub use lifetable::{LifeTableBuilder, LifeTableRow};
pub use mortality::{MortalityEngine, MortalityResult};
pub use reserving::{ChainLadder, ReservingResult};
pub use runner::AnalysisRunner;
pub use survival::{SurvivalEngine, SurvivalResult};
