//! Checkpoint - Save/Load Simulation State
//!
//! Serializes the complete mutable state of a [`Simulation`] to JSON so a
//! run can be paused and resumed.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a resumed run draws exactly the values the
//!   uninterrupted run would have drawn
//! - **Schema Matching**: a snapshot only loads into a simulation of the same
//!   model, seed and run index
//! - **Population Integrity**: every restored population passes
//!   `AgentPopulation::validate`, and each agent type appears once
//! - **Stream Identity**: every stream position belongs to the simulation's
//!   seed and run index
//!
//! [`Simulation`]: crate::simulation::Simulation

use crate::models::model::ModelDescription;
use crate::models::population::AgentPopulation;
use crate::rng::{StreamState, HOST_STREAM};
use crate::simulation::config::SimulationConfig;
use crate::simulation::engine::SimulationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete simulation state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Instance that produced the snapshot
    pub simulation_id: String,

    pub model_name: String,

    /// Steps completed
    pub step_counter: u32,

    /// Whether init functions have run
    pub initialised: bool,

    pub config: SimulationConfig,

    /// Host stream position (CRITICAL for determinism)
    pub host_random: StreamState,

    /// Agent slot stream positions, by slot
    pub agent_random: Vec<StreamState>,

    /// Populations, ordered by agent name
    pub populations: Vec<AgentPopulation>,

    /// SHA256 of the model schema, seed and run index
    pub config_hash: String,
}

/// Hashed identity of a run
#[derive(Serialize)]
struct RunIdentity<'a> {
    model: &'a str,
    agents: Vec<&'a crate::models::agent::AgentDescription>,
    random_seed: u64,
    run_index: u64,
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of any serializable value
///
/// Object keys are sorted before hashing so the hash does not depend on map
/// iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config)
        .map_err(|e| SimulationError::Checkpoint(format!("Config serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| SimulationError::Checkpoint(format!("Config serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash identifying which snapshots may be loaded into a simulation
pub(crate) fn run_hash(
    model: &ModelDescription,
    config: &SimulationConfig,
) -> Result<String, SimulationError> {
    compute_config_hash(&RunIdentity {
        model: model.name(),
        agents: model.agents().collect(),
        random_seed: config.random_seed,
        run_index: config.run_index,
    })
}

// ============================================================================
// Validation
// ============================================================================

/// Check a snapshot against the simulation it is about to be loaded into
pub(crate) fn validate_snapshot(
    snapshot: &StateSnapshot,
    model: &ModelDescription,
    config: &SimulationConfig,
) -> Result<(), SimulationError> {
    let expected_hash = run_hash(model, config)?;
    if snapshot.config_hash != expected_hash {
        return Err(SimulationError::Checkpoint(format!(
            "Config hash mismatch: snapshot {} vs simulation {}",
            snapshot.config_hash, expected_hash
        )));
    }

    // The hash is stored text; the streams must agree with it on their own
    let host = &snapshot.host_random;
    if host.stream != HOST_STREAM
        || host.seed != config.random_seed
        || host.run_index != config.run_index
    {
        return Err(SimulationError::Checkpoint(
            "Host random stream does not belong to this run".to_string(),
        ));
    }

    if snapshot.populations.len() != model.agents.len() {
        return Err(SimulationError::Checkpoint(format!(
            "Snapshot holds {} populations, model has {} agent types",
            snapshot.populations.len(),
            model.agents.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for population in &snapshot.populations {
        if !seen.insert(population.agent_name()) {
            return Err(SimulationError::Checkpoint(format!(
                "Population '{}' appears twice",
                population.agent_name()
            )));
        }
        let description = model
            .agent(population.agent_name())
            .ok_or_else(|| SimulationError::AgentNotFound(population.agent_name().to_string()))?;
        if description != population.description() {
            return Err(SimulationError::Checkpoint(format!(
                "Population '{}' does not match the model",
                population.agent_name()
            )));
        }
        population.validate()?;
    }

    for (slot, state) in snapshot.agent_random.iter().enumerate() {
        if state.stream != slot as u64
            || state.seed != config.random_seed
            || state.run_index != config.run_index
        {
            return Err(SimulationError::Checkpoint(format!(
                "Agent random stream {} is out of place",
                slot
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
