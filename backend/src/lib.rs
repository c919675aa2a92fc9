//! Agent Simulation Core - Rust Engine
//!
//! In-process agent-based simulation core with deterministic random streams
//! and keyed population sorting.
//!
//! # Architecture
//!
//! - **models**: Agent variables, descriptions, populations, model description
//! - **rng**: Seeded random streams (host stream + one substream per agent slot)
//! - **sort**: Keyed sorting of populations and record sequences
//! - **host**: API handed to host functions
//! - **simulation**: Step loop, run configuration, run plans, checkpoints
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic for a given `(seed, run_index)`
//! 2. Agent variables are never coerced between numeric types
//! 3. Sorting moves whole agents; columns never separate
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod host;
pub mod models;
pub mod rng;
pub mod simulation;
pub mod sort;

// Re-exports for convenience
pub use host::{HostAgent, HostApi};
pub use models::{
    agent::{AgentDescription, AgentRecord, VariableDescription},
    model::{Layer, ModelDescription},
    population::{AgentPopulation, Column, PopulationError},
    variable::{AgentVariable, Value, VariableType},
};
pub use rng::{AgentRandomPool, RandomError, RandomStream, StreamState};
pub use simulation::{
    RunArgs, RunPlan, RunPlanVector, Simulation, SimulationConfig, SimulationError, Verbosity,
};
pub use sort::{SortError, SortKey, SortOrder};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn agent_sim_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::random::PyRandomStream>()?;
    m.add_class::<ffi::population::PyAgentPopulation>()?;
    Ok(())
}
