//! Model description
//!
//! A [`ModelDescription`] names the agent types of a model and the functions
//! the step loop runs:
//!
//! - init functions, once before the first step
//! - layers, in order, each holding host functions and per-agent functions
//! - step functions, after the layers of every step
//! - exit conditions, after every step; the first to return `true` ends the run
//! - exit functions, once after the last step
//!
//! Host functions receive a [`HostApi`]. Agent functions receive one agent's
//! record together with the random stream owned by that agent's slot.

use crate::host::HostApi;
use crate::models::agent::{AgentDescription, AgentRecord};
use crate::rng::RandomStream;
use crate::simulation::SimulationError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Host function run once per invocation point
pub type HostFunction = Box<dyn FnMut(&mut HostApi<'_>) -> Result<(), SimulationError> + Send>;

/// Function run once per agent, possibly in parallel
pub type AgentFunction =
    Arc<dyn Fn(&mut AgentRecord, &mut RandomStream) -> Result<(), SimulationError> + Send + Sync>;

/// Returns `true` when the simulation should stop
pub type ExitCondition = Box<dyn FnMut(&mut HostApi<'_>) -> Result<bool, SimulationError> + Send>;

/// Entry of a layer
pub enum LayerFunction {
    Host(HostFunction),
    Agent {
        agent: String,
        function: AgentFunction,
    },
}

impl fmt::Debug for LayerFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerFunction::Host(_) => f.write_str("Host(..)"),
            LayerFunction::Agent { agent, .. } => write!(f, "Agent({})", agent),
        }
    }
}

/// Ordered group of functions executed within a step
#[derive(Debug)]
pub struct Layer {
    name: String,
    pub(crate) functions: Vec<LayerFunction>,
}

impl Layer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn add_host_function<F>(&mut self, function: F) -> &mut Self
    where
        F: FnMut(&mut HostApi<'_>) -> Result<(), SimulationError> + Send + 'static,
    {
        self.functions.push(LayerFunction::Host(Box::new(function)));
        self
    }

    /// Add a function run for every agent of type `agent`
    ///
    /// The agent type is resolved when the layer executes; an unknown name
    /// fails that step with [`SimulationError::AgentNotFound`].
    pub fn add_agent_function<F>(&mut self, agent: &str, function: F) -> &mut Self
    where
        F: Fn(&mut AgentRecord, &mut RandomStream) -> Result<(), SimulationError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.push(LayerFunction::Agent {
            agent: agent.to_string(),
            function: Arc::new(function),
        });
        self
    }
}

/// Agent types and functions of a model
///
/// # Example
/// ```
/// use agent_sim_core_rs::ModelDescription;
///
/// let mut model = ModelDescription::new("model");
/// let agent = model.new_agent("agent").unwrap();
/// agent.new_variable::<f32>("float").unwrap();
///
/// model.new_layer("fill").add_host_function(|api| {
///     let _ = api.random().uniform::<f32>();
///     Ok(())
/// });
/// assert!(model.agent("agent").is_some());
/// ```
#[derive(Debug)]
pub struct ModelDescription {
    pub(crate) name: String,
    pub(crate) agents: BTreeMap<String, AgentDescription>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) init_functions: Vec<HostFunctionEntry>,
    pub(crate) step_functions: Vec<HostFunctionEntry>,
    pub(crate) exit_functions: Vec<HostFunctionEntry>,
    pub(crate) exit_conditions: Vec<ExitConditionEntry>,
}

pub(crate) struct HostFunctionEntry(pub(crate) HostFunction);

pub(crate) struct ExitConditionEntry(pub(crate) ExitCondition);

impl fmt::Debug for HostFunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction(..)")
    }
}

impl fmt::Debug for ExitConditionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExitCondition(..)")
    }
}

impl ModelDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            agents: BTreeMap::new(),
            layers: Vec::new(),
            init_functions: Vec::new(),
            step_functions: Vec::new(),
            exit_functions: Vec::new(),
            exit_conditions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an agent type
    pub fn new_agent(&mut self, name: &str) -> Result<&mut AgentDescription, SimulationError> {
        if self.agents.contains_key(name) {
            return Err(SimulationError::DuplicateAgent(name.to_string()));
        }
        Ok(self
            .agents
            .entry(name.to_string())
            .or_insert_with(|| AgentDescription::new(name)))
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDescription> {
        self.agents.get(name)
    }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut AgentDescription> {
        self.agents.get_mut(name)
    }

    /// Agent types, ordered by name
    pub fn agents(&self) -> impl Iterator<Item = &AgentDescription> {
        self.agents.values()
    }

    /// Append a layer; layers run in the order they were added
    pub fn new_layer(&mut self, name: &str) -> &mut Layer {
        self.layers.push(Layer::new(name));
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn add_init_function<F>(&mut self, function: F)
    where
        F: FnMut(&mut HostApi<'_>) -> Result<(), SimulationError> + Send + 'static,
    {
        self.init_functions.push(HostFunctionEntry(Box::new(function)));
    }

    pub fn add_step_function<F>(&mut self, function: F)
    where
        F: FnMut(&mut HostApi<'_>) -> Result<(), SimulationError> + Send + 'static,
    {
        self.step_functions.push(HostFunctionEntry(Box::new(function)));
    }

    pub fn add_exit_function<F>(&mut self, function: F)
    where
        F: FnMut(&mut HostApi<'_>) -> Result<(), SimulationError> + Send + 'static,
    {
        self.exit_functions.push(HostFunctionEntry(Box::new(function)));
    }

    pub fn add_exit_condition<F>(&mut self, condition: F)
    where
        F: FnMut(&mut HostApi<'_>) -> Result<bool, SimulationError> + Send + 'static,
    {
        self.exit_conditions.push(ExitConditionEntry(Box::new(condition)));
    }

    pub fn has_exit_conditions(&self) -> bool {
        !self.exit_conditions.is_empty()
    }
}
