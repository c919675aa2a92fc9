//! Agent descriptions and records
//!
//! An [`AgentDescription`] is the schema of one agent type: an ordered list of
//! uniquely named, typed variables with default values. An [`AgentRecord`] is
//! one agent's values keyed by variable name; it is the row form of a
//! population and the unit agent functions operate on.

use crate::models::population::PopulationError;
use crate::models::variable::{AgentVariable, Value, VariableType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One variable of an agent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescription {
    /// Variable name, unique within the agent type
    pub name: String,
    /// Numeric kind
    pub kind: VariableType,
    /// Value given to newly created agents
    pub default: Value,
}

/// Schema of an agent type
///
/// # Example
/// ```
/// use agent_sim_core_rs::{AgentDescription, VariableType};
///
/// let mut agent = AgentDescription::new("agent");
/// agent.new_variable::<f32>("float").unwrap();
/// agent.new_variable_with_default::<i32>("spare", 12).unwrap();
///
/// assert_eq!(agent.variable_type("float"), Some(VariableType::Float));
/// assert_eq!(agent.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescription {
    name: String,
    variables: Vec<VariableDescription>,
}

impl AgentDescription {
    /// Create an agent type with no variables
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Declare a variable whose default is zero
    pub fn new_variable<T: AgentVariable>(&mut self, name: &str) -> Result<(), PopulationError> {
        self.new_variable_with_default::<T>(name, T::default())
    }

    /// Declare a variable with an explicit default
    pub fn new_variable_with_default<T: AgentVariable>(
        &mut self,
        name: &str,
        default: T,
    ) -> Result<(), PopulationError> {
        self.push_variable(name, default.into_value())
    }

    /// Declare a variable from a runtime kind; the default is zero
    pub fn new_variable_of_type(
        &mut self,
        name: &str,
        kind: VariableType,
    ) -> Result<(), PopulationError> {
        self.push_variable(name, kind.zero())
    }

    /// Builder form of [`new_variable`](Self::new_variable)
    pub fn with_variable<T: AgentVariable>(mut self, name: &str) -> Result<Self, PopulationError> {
        self.new_variable::<T>(name)?;
        Ok(self)
    }

    fn push_variable(&mut self, name: &str, default: Value) -> Result<(), PopulationError> {
        if self.index_of(name).is_some() {
            return Err(PopulationError::DuplicateVariable(name.to_string()));
        }
        self.variables.push(VariableDescription {
            name: name.to_string(),
            kind: default.kind(),
            default,
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[VariableDescription] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDescription> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Column index of a variable
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn variable_type(&self, name: &str) -> Option<VariableType> {
        self.variable(name).map(|v| v.kind)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// A record holding every variable's default
    pub fn default_record(&self) -> AgentRecord {
        let values = self
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.default))
            .collect();
        AgentRecord { values }
    }
}

/// One agent's variable values, keyed by name
///
/// Records built by hand with [`with_value`](Self::with_value) carry no schema;
/// [`conforms_to`](Self::conforms_to) checks one against an
/// [`AgentDescription`]. [`set`](Self::set) only updates existing variables
/// and never changes a variable's kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentRecord {
    values: BTreeMap<String, Value>,
}

impl AgentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add or replace a variable
    ///
    /// # Example
    /// ```
    /// use agent_sim_core_rs::AgentRecord;
    ///
    /// let record = AgentRecord::new()
    ///     .with_value("float", 3.5f32)
    ///     .with_value("spare", 15i32);
    /// assert_eq!(record.get::<i32>("spare").unwrap(), 15);
    /// ```
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Add or replace a variable, returning the previous value
    pub fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        self.values.insert(name.to_string(), value)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    /// Typed read
    pub fn get<T: AgentVariable>(&self, name: &str) -> Result<T, PopulationError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| PopulationError::UnknownVariable(name.to_string()))?;
        T::from_value(*value).ok_or_else(|| PopulationError::TypeMismatch {
            variable: name.to_string(),
            expected: value.kind(),
            actual: T::KIND,
        })
    }

    /// Typed write to an existing variable of the same kind
    pub fn set<T: AgentVariable>(&mut self, name: &str, value: T) -> Result<(), PopulationError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| PopulationError::UnknownVariable(name.to_string()))?;
        if slot.kind() != T::KIND {
            return Err(PopulationError::TypeMismatch {
                variable: name.to_string(),
                expected: slot.kind(),
                actual: T::KIND,
            });
        }
        *slot = value.into_value();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that this record has exactly the variables and kinds of `description`
    pub fn conforms_to(&self, description: &AgentDescription) -> Result<(), PopulationError> {
        for variable in description.variables() {
            match self.values.get(&variable.name) {
                None => return Err(PopulationError::UnknownVariable(variable.name.clone())),
                Some(value) if value.kind() != variable.kind => {
                    return Err(PopulationError::TypeMismatch {
                        variable: variable.name.clone(),
                        expected: variable.kind,
                        actual: value.kind(),
                    })
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = self
            .values
            .keys()
            .find(|name| description.index_of(name).is_none())
        {
            return Err(PopulationError::UnknownVariable(extra.clone()));
        }
        Ok(())
    }

    /// Same variable names with the same kinds
    pub fn same_schema(&self, other: &AgentRecord) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.kind() == vb.kind())
    }
}
