//! Domain models for the agent simulation

pub mod agent;
mod float_repr;
pub mod model;
pub mod population;
pub mod variable;

// Re-exports
pub use agent::{AgentDescription, AgentRecord, VariableDescription};
pub use model::{AgentFunction, ExitCondition, HostFunction, Layer, LayerFunction, ModelDescription};
pub use population::{AgentInstance, AgentInstanceMut, AgentPopulation, Column, PopulationError};
pub use variable::{AgentVariable, UnknownVariableType, Value, VariableType};
