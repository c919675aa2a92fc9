//! Simulation Engine
//!
//! Runs the step loop of a [`ModelDescription`]:
//!
//! ```text
//! On the first step:
//!   run init functions
//! Each step:
//! 1. For each layer, in order, run its functions in order
//!    - host functions get a HostApi over the host stream and populations
//!    - agent functions run once per agent, in parallel, each agent slot
//!      drawing from its own random substream
//! 2. Run step functions
//! 3. Advance the step counter
//! 4. Evaluate exit conditions
//! After the last step of `simulate`:
//!   run exit functions
//! ```
//!
//! # Example
//!
//! ```
//! use agent_sim_core_rs::{ModelDescription, Simulation, SortOrder};
//!
//! let mut model = ModelDescription::new("model");
//! let agent = model.new_agent("agent").unwrap();
//! agent.new_variable::<f32>("float").unwrap();
//!
//! model
//!     .new_layer("fill")
//!     .add_agent_function("agent", |record, random| {
//!         record.set("float", random.uniform::<f32>())?;
//!         Ok(())
//!     });
//! model.new_layer("sort").add_host_function(|api| {
//!     api.agent("agent")?.sort::<f32>("float", SortOrder::Ascending)
//! });
//!
//! let mut simulation = Simulation::new(model).unwrap();
//! simulation.initialise(["prog", "-s", "1", "--steps", "2"]).unwrap();
//! simulation.set_population_capacity("agent", 16).unwrap();
//! simulation.fill_population("agent").unwrap();
//! assert_eq!(simulation.simulate().unwrap(), 2);
//!
//! let values = simulation.population("agent").unwrap().column::<f32>("float").unwrap();
//! assert!(values.windows(2).all(|w| w[0] <= w[1]));
//! ```

use crate::host::HostApi;
use crate::models::agent::AgentRecord;
use crate::models::model::{AgentFunction, LayerFunction, ModelDescription};
use crate::models::population::{AgentPopulation, PopulationError};
use crate::rng::{AgentRandomPool, RandomError, RandomStream};
use crate::simulation::checkpoint::{run_hash, validate_snapshot, StateSnapshot};
use crate::simulation::config::{RunArgs, SimulationConfig, Verbosity};
use crate::simulation::plan::RunPlan;
use crate::sort::SortError;
use clap::Parser;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace};
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

/// Simulation error types
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration validation error
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Command-line arguments could not be parsed
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent '{0}' is already defined")]
    DuplicateAgent(String),

    #[error(transparent)]
    Random(#[from] RandomError),

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Snapshot could not be written, parsed or applied
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// An agent function returned an error
    #[error("Agent function failed for '{agent}' agent {index}: {message}")]
    AgentFunction {
        agent: String,
        index: usize,
        message: String,
    },

    /// The worker pool for agent functions could not be created
    #[error("Execution engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Error raised by user code in a host function
    #[error("Host function failed: {0}")]
    HostFunction(String),
}

impl SimulationError {
    /// True for errors caused by invalid input to an operation
    ///
    /// These leave the simulation usable, and the operation that reported
    /// them (a draw, a sort, a population write) had no effect. A step is not
    /// one such operation: see [`Simulation::step`].
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SimulationError::InvalidConfig(_)
                | SimulationError::InvalidArguments(_)
                | SimulationError::AgentNotFound(_)
                | SimulationError::DuplicateAgent(_)
                | SimulationError::Random(_)
                | SimulationError::Sort(_)
                | SimulationError::Population(_)
        )
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// One simulation instance of a model
pub struct Simulation {
    id: Uuid,
    model: ModelDescription,
    config: SimulationConfig,
    populations: BTreeMap<String, AgentPopulation>,
    random: RandomStream,
    agent_random: AgentRandomPool,
    step_counter: u32,
    initialised: bool,
    thread_pool: Option<rayon::ThreadPool>,
}

impl Simulation {
    /// Create a simulation with the default configuration (time-based seed)
    pub fn new(model: ModelDescription) -> Result<Self, SimulationError> {
        Self::with_config(model, SimulationConfig::default())
    }

    pub fn with_config(
        model: ModelDescription,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        validate_config(&model, &config)?;
        let thread_pool = build_thread_pool(config.threads)?;
        let populations = model
            .agents()
            .map(|agent| (agent.name().to_string(), AgentPopulation::new(agent, 0)))
            .collect();

        let simulation = Self {
            id: Uuid::new_v4(),
            random: RandomStream::new(config.random_seed, config.run_index),
            agent_random: AgentRandomPool::new(config.random_seed, config.run_index),
            model,
            config,
            populations,
            step_counter: 0,
            initialised: false,
            thread_pool,
        };
        debug!(
            id = %simulation.id,
            model = simulation.model.name(),
            seed = simulation.config.random_seed,
            run_index = simulation.config.run_index,
            "Created simulation"
        );
        Ok(simulation)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &ModelDescription {
        &self.model
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration and reseed every random stream
    ///
    /// Populations and the step counter are kept.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<(), SimulationError> {
        validate_config(&self.model, &config)?;
        if config.threads != self.config.threads {
            self.thread_pool = build_thread_pool(config.threads)?;
        }
        self.random.reseed(config.random_seed, config.run_index);
        self.agent_random.reseed(config.random_seed, config.run_index);
        self.config = config;
        Ok(())
    }

    /// Apply command-line style arguments (`-s`, `-r`, `--steps`, ...)
    ///
    /// The first item is the program name, as with `std::env::args`.
    pub fn initialise<I, T>(&mut self, args: I) -> Result<(), SimulationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = RunArgs::try_parse_from(args)
            .map_err(|e| SimulationError::InvalidArguments(e.to_string()))?;
        self.apply_args(&args)
    }

    /// Apply already parsed arguments
    pub fn apply_args(&mut self, args: &RunArgs) -> Result<(), SimulationError> {
        let mut config = self.config.clone();
        args.apply(&mut config);
        self.set_config(config)
    }

    /// Take seed, run index and step count from a run plan
    pub fn apply_run_plan(&mut self, plan: &RunPlan) -> Result<(), SimulationError> {
        let mut config = self.config.clone();
        config.random_seed = plan.random_seed;
        config.run_index = plan.run_index;
        config.steps = plan.steps;
        self.set_config(config)
    }

    // ------------------------------------------------------------------------
    // Populations
    // ------------------------------------------------------------------------

    /// Replace a population with an empty one of the given capacity
    pub fn set_population_capacity(
        &mut self,
        agent: &str,
        capacity: usize,
    ) -> Result<(), SimulationError> {
        let description = self
            .model
            .agent(agent)
            .ok_or_else(|| SimulationError::AgentNotFound(agent.to_string()))?;
        self.populations
            .insert(agent.to_string(), AgentPopulation::new(description, capacity));
        Ok(())
    }

    /// Fill a population up to its capacity with default agents
    pub fn fill_population(&mut self, agent: &str) -> Result<(), SimulationError> {
        let population = self
            .populations
            .get_mut(agent)
            .ok_or_else(|| SimulationError::AgentNotFound(agent.to_string()))?;
        while population.len() < population.capacity() {
            population.push_default()?;
        }
        Ok(())
    }

    /// Copy a population into the simulation
    ///
    /// The population's agent type must be part of the model with an
    /// identical description.
    pub fn set_population_data(&mut self, population: &AgentPopulation) -> Result<(), SimulationError> {
        let name = population.agent_name();
        let description = self
            .model
            .agent(name)
            .ok_or_else(|| SimulationError::AgentNotFound(name.to_string()))?;
        if description != population.description() {
            return Err(PopulationError::SchemaMismatch {
                expected: description.name().to_string(),
                actual: name.to_string(),
            }
            .into());
        }
        population.validate()?;
        self.populations.insert(name.to_string(), population.clone());
        Ok(())
    }

    /// Copy a population out of the simulation
    pub fn get_population_data(&self, agent: &str) -> Result<AgentPopulation, SimulationError> {
        self.population(agent)
            .cloned()
            .ok_or_else(|| SimulationError::AgentNotFound(agent.to_string()))
    }

    pub fn population(&self, agent: &str) -> Option<&AgentPopulation> {
        self.populations.get(agent)
    }

    /// Host random stream
    pub fn random(&self) -> &RandomStream {
        &self.random
    }

    pub fn random_mut(&mut self) -> &mut RandomStream {
        &mut self.random
    }

    /// Steps completed
    pub fn step_counter(&self) -> u32 {
        self.step_counter
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Run one step
    ///
    /// Init functions run before the first step. Returns `false` when an exit
    /// condition asked the simulation to stop.
    ///
    /// A step is not atomic. If a layer fails, layers that ran before it in
    /// the same step keep their population writes and host stream draws, and
    /// the step counter is not advanced. Use [`save_state`](Self::save_state)
    /// before the step to be able to roll back.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        if !self.initialised {
            let start = Instant::now();
            self.run_init_functions()?;
            self.initialised = true;
            if self.config.timing {
                info!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "Init functions");
            }
        }

        let start = Instant::now();
        for layer in 0..self.model.layers.len() {
            self.run_layer(layer)?;
        }
        self.run_step_functions()?;
        self.step_counter += 1;
        let stop = self.evaluate_exit_conditions()?;

        match self.config.verbosity {
            Verbosity::Verbose => info!(step = self.step_counter, "Completed step"),
            _ => trace!(step = self.step_counter, "Completed step"),
        }
        if self.config.timing {
            debug!(
                step = self.step_counter,
                elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
                "Step time"
            );
        }
        Ok(!stop)
    }

    /// Run the configured number of steps, then the exit functions
    ///
    /// With `steps == 0` runs until an exit condition fires. Returns the
    /// number of steps executed by this call.
    pub fn simulate(&mut self) -> Result<u32, SimulationError> {
        let start = Instant::now();
        let mut executed = 0;
        loop {
            if self.config.steps != 0 && executed >= self.config.steps {
                break;
            }
            executed += 1;
            if !self.step()? {
                break;
            }
        }
        self.run_exit_functions()?;

        if self.config.verbosity != Verbosity::Quiet {
            info!(
                id = %self.id,
                steps = executed,
                total_steps = self.step_counter,
                "Simulation complete"
            );
        }
        if self.config.timing {
            info!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "Simulation time");
        }
        Ok(executed)
    }

    /// Return to the state just after construction
    ///
    /// Populations are emptied (capacity kept), streams reseeded from the
    /// current config and init functions will run again.
    pub fn reset(&mut self) {
        for population in self.populations.values_mut() {
            population.clear();
        }
        self.random.reseed(self.config.random_seed, self.config.run_index);
        self.agent_random
            .reseed(self.config.random_seed, self.config.run_index);
        self.step_counter = 0;
        self.initialised = false;
    }

    fn run_init_functions(&mut self) -> Result<(), SimulationError> {
        let Self {
            model,
            random,
            populations,
            step_counter,
            ..
        } = self;
        for entry in &mut model.init_functions {
            (entry.0)(&mut HostApi::new(random, populations, *step_counter))?;
        }
        Ok(())
    }

    fn run_step_functions(&mut self) -> Result<(), SimulationError> {
        let Self {
            model,
            random,
            populations,
            step_counter,
            ..
        } = self;
        for entry in &mut model.step_functions {
            (entry.0)(&mut HostApi::new(random, populations, *step_counter))?;
        }
        Ok(())
    }

    fn run_exit_functions(&mut self) -> Result<(), SimulationError> {
        let Self {
            model,
            random,
            populations,
            step_counter,
            ..
        } = self;
        for entry in &mut model.exit_functions {
            (entry.0)(&mut HostApi::new(random, populations, *step_counter))?;
        }
        Ok(())
    }

    fn evaluate_exit_conditions(&mut self) -> Result<bool, SimulationError> {
        let Self {
            model,
            random,
            populations,
            step_counter,
            ..
        } = self;
        for entry in &mut model.exit_conditions {
            if (entry.0)(&mut HostApi::new(random, populations, *step_counter))? {
                debug!(step = *step_counter, "Exit condition met");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn run_layer(&mut self, index: usize) -> Result<(), SimulationError> {
        let Self {
            model,
            random,
            agent_random,
            populations,
            step_counter,
            thread_pool,
            ..
        } = self;
        let layer = &mut model.layers[index];
        trace!(layer = layer.name(), "Running layer");

        for function in &mut layer.functions {
            match function {
                LayerFunction::Host(function) => {
                    function(&mut HostApi::new(random, populations, *step_counter))?;
                }
                LayerFunction::Agent { agent, function } => {
                    let population = populations
                        .get_mut(agent.as_str())
                        .ok_or_else(|| SimulationError::AgentNotFound(agent.clone()))?;
                    run_agent_function(agent, function, population, agent_random, thread_pool.as_ref())?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------------

    /// Serialize the simulation state to JSON
    pub fn save_state(&self) -> Result<String, SimulationError> {
        let snapshot = StateSnapshot {
            simulation_id: self.id.to_string(),
            model_name: self.model.name().to_string(),
            step_counter: self.step_counter,
            initialised: self.initialised,
            config: self.config.clone(),
            host_random: self.random.state(),
            agent_random: self.agent_random.states(),
            populations: self.populations.values().cloned().collect(),
            config_hash: run_hash(&self.model, &self.config)?,
        };
        serde_json::to_string(&snapshot)
            .map_err(|e| SimulationError::Checkpoint(format!("Snapshot serialization failed: {}", e)))
    }

    /// Restore state saved by [`save_state`](Self::save_state)
    ///
    /// The snapshot must come from the same model, seed and run index.
    /// Nothing changes if it is rejected.
    pub fn load_state(&mut self, json: &str) -> Result<(), SimulationError> {
        let snapshot: StateSnapshot = serde_json::from_str(json)
            .map_err(|e| SimulationError::Checkpoint(format!("Snapshot parse failed: {}", e)))?;
        validate_snapshot(&snapshot, &self.model, &self.config)?;

        self.step_counter = snapshot.step_counter;
        self.initialised = snapshot.initialised;
        self.random = RandomStream::from_state(snapshot.host_random);
        self.agent_random = AgentRandomPool::restore(
            self.config.random_seed,
            self.config.run_index,
            &snapshot.agent_random,
        );
        self.populations = snapshot
            .populations
            .into_iter()
            .map(|population| (population.agent_name().to_string(), population))
            .collect();
        debug!(
            id = %self.id,
            from = %snapshot.simulation_id,
            step = self.step_counter,
            "Loaded checkpoint"
        );
        Ok(())
    }
}

// Manual Debug implementation (model functions don't implement Debug)
impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("config", &self.config)
            .field("step_counter", &self.step_counter)
            .field("agents", &self.populations.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn validate_config(model: &ModelDescription, config: &SimulationConfig) -> Result<(), SimulationError> {
    if config.steps == 0 && !model.has_exit_conditions() {
        return Err(SimulationError::InvalidConfig(
            "steps may only be 0 when the model has exit conditions".to_string(),
        ));
    }
    if config.threads == Some(0) {
        return Err(SimulationError::InvalidConfig(
            "threads must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> Result<Option<rayon::ThreadPool>, SimulationError> {
    threads
        .map(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("agent-sim-{}", i))
                .build()
                .map_err(|e| SimulationError::EngineUnavailable(e.to_string()))
        })
        .transpose()
}

/// Run an agent function over every agent of a population
///
/// Agent `i` gets slot stream `i`. All records are checked against the
/// agent description before any is written back, so a failing function
/// leaves the population unchanged.
fn run_agent_function(
    agent: &str,
    function: &AgentFunction,
    population: &mut AgentPopulation,
    agent_random: &mut AgentRandomPool,
    thread_pool: Option<&rayon::ThreadPool>,
) -> Result<(), SimulationError> {
    let mut records = population.records();
    let streams = agent_random.slots_mut(records.len());

    match thread_pool {
        Some(pool) => pool.install(|| apply_in_parallel(agent, function, &mut records, streams))?,
        None => apply_in_parallel(agent, function, &mut records, streams)?,
    }

    for record in &records {
        record.conforms_to(population.description())?;
    }
    for (index, record) in records.iter().enumerate() {
        population.write_record(index, record)?;
    }
    trace!(agent, agents = records.len(), "Ran agent function");
    Ok(())
}

fn apply_in_parallel(
    agent: &str,
    function: &AgentFunction,
    records: &mut [AgentRecord],
    streams: &mut [RandomStream],
) -> Result<(), SimulationError> {
    records
        .par_iter_mut()
        .zip(streams.par_iter_mut())
        .enumerate()
        .try_for_each(|(index, (record, stream))| {
            (**function)(record, stream).map_err(|e| SimulationError::AgentFunction {
                agent: agent.to_string(),
                index,
                message: e.to_string(),
            })
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDescription {
        let mut model = ModelDescription::new("model");
        let agent = model.new_agent("agent").unwrap();
        agent.new_variable::<f32>("float").unwrap();
        agent.new_variable::<i32>("spare").unwrap();
        model
    }

    #[test]
    fn test_creation() {
        let simulation = Simulation::with_config(model(), SimulationConfig::with_seed(1)).unwrap();
        assert_eq!(simulation.step_counter(), 0);
        assert_eq!(simulation.population("agent").unwrap().len(), 0);
        assert_eq!(simulation.random().seed(), 1);
    }

    #[test]
    fn test_zero_steps_without_exit_condition_rejected() {
        let mut config = SimulationConfig::with_seed(1);
        config.steps = 0;
        let err = Simulation::with_config(model(), config).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut config = SimulationConfig::with_seed(1);
        config.threads = Some(0);
        assert!(Simulation::with_config(model(), config).is_err());
    }

    #[test]
    fn test_agent_function_error_leaves_population_unchanged() {
        let mut model = model();
        model.new_layer("fail").add_agent_function("agent", |record, _| {
            record.set("spare", 99i32)?;
            if record.get::<f32>("float")? > 0.5 {
                return Err(SimulationError::HostFunction("too large".to_string()));
            }
            Ok(())
        });
        let mut simulation = Simulation::with_config(model, SimulationConfig::with_seed(1)).unwrap();
        simulation.set_population_capacity("agent", 4).unwrap();
        let mut population = simulation.get_population_data("agent").unwrap();
        for x in [0.1f32, 0.9, 0.2, 0.3] {
            population.next_instance().unwrap().set("float", x).unwrap();
        }
        simulation.set_population_data(&population).unwrap();

        let err = simulation.step().unwrap_err();
        assert!(matches!(err, SimulationError::AgentFunction { index: 1, .. }));
        assert_eq!(simulation.get_population_data("agent").unwrap(), population);
    }

    #[test]
    fn test_agent_function_cannot_change_schema() {
        let mut model = model();
        model.new_layer("extend").add_agent_function("agent", |record, _| {
            record.insert("extra", 1u16.into());
            Ok(())
        });
        let mut simulation = Simulation::with_config(model, SimulationConfig::with_seed(1)).unwrap();
        simulation.set_population_capacity("agent", 2).unwrap();
        simulation.fill_population("agent").unwrap();
        assert!(matches!(
            simulation.step(),
            Err(SimulationError::Population(PopulationError::UnknownVariable(_)))
        ));
    }

    #[test]
    fn test_unknown_agent_in_layer() {
        let mut model = model();
        model.new_layer("bad").add_agent_function("other", |_, _| Ok(()));
        let mut simulation = Simulation::with_config(model, SimulationConfig::with_seed(1)).unwrap();
        assert!(matches!(simulation.step(), Err(SimulationError::AgentNotFound(_))));
    }

    #[test]
    fn test_set_population_data_rejects_other_schema() {
        let mut simulation = Simulation::with_config(model(), SimulationConfig::with_seed(1)).unwrap();
        let mut other = crate::models::agent::AgentDescription::new("agent");
        other.new_variable::<f64>("float").unwrap();
        let population = AgentPopulation::new(&other, 4);
        assert!(matches!(
            simulation.set_population_data(&population),
            Err(SimulationError::Population(PopulationError::SchemaMismatch { .. }))
        ));
    }

    #[test]
    fn test_init_functions_run_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut model = model();
        model.add_init_function(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut config = SimulationConfig::with_seed(1);
        config.steps = 3;
        let mut simulation = Simulation::with_config(model, config).unwrap();
        assert_eq!(simulation.simulate().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        simulation.reset();
        simulation.step().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(simulation.step_counter(), 1);
    }
}
