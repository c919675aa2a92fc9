//! Simulation - step loop, run configuration and checkpoints

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod plan;

pub use checkpoint::{compute_config_hash, StateSnapshot};
pub use config::{RunArgs, SimulationConfig, Verbosity};
pub use engine::{Simulation, SimulationError};
pub use plan::{RunPlan, RunPlanVector};
