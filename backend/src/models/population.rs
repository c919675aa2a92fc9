//! Agent population storage
//!
//! A population stores one agent type's records as a struct of arrays: one
//! [`Column`] per variable, all of equal length. Capacity is fixed when the
//! population is created.
//!
//! # Critical Invariants
//!
//! 1. `columns[i]` has the kind of `description.variables()[i]`
//! 2. Every column holds exactly `len` values
//! 3. `len <= capacity`
//! 4. Reordering (see `crate::sort`) permutes every column with the same
//!    permutation, so a record's values never separate

use crate::models::agent::{AgentDescription, AgentRecord};
use crate::models::float_repr;
use crate::models::variable::{AgentVariable, Value, VariableType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised by schema and population operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PopulationError {
    #[error("Unknown agent variable '{0}'")]
    UnknownVariable(String),

    #[error("Variable '{variable}' has type {expected}, not {actual}")]
    TypeMismatch {
        variable: String,
        expected: VariableType,
        actual: VariableType,
    },

    #[error("Variable '{0}' is already defined")]
    DuplicateVariable(String),

    #[error("Population is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("Index {index} out of range for population of {len} agents")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Population for agent '{actual}' does not match the description of agent '{expected}'")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Population storage is inconsistent: {0}")]
    Inconsistent(String),
}

/// Typed storage for one variable across a population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Float(#[serde(with = "float_repr::vec")] Vec<f32>),
    Double(#[serde(with = "float_repr::vec")] Vec<f64>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
}

/// Run `$body` with `$values` bound to the typed vector of any column variant
macro_rules! with_column {
    ($column:expr, $values:ident => $body:expr) => {
        match $column {
            Column::Float($values) => $body,
            Column::Double($values) => $body,
            Column::Int16($values) => $body,
            Column::Int32($values) => $body,
            Column::Int64($values) => $body,
            Column::UInt16($values) => $body,
            Column::UInt32($values) => $body,
            Column::UInt64($values) => $body,
        }
    };
}

impl Column {
    /// Empty column of the given kind
    pub fn new(kind: VariableType, capacity: usize) -> Self {
        match kind {
            VariableType::Float => Column::Float(Vec::with_capacity(capacity)),
            VariableType::Double => Column::Double(Vec::with_capacity(capacity)),
            VariableType::Int16 => Column::Int16(Vec::with_capacity(capacity)),
            VariableType::Int32 => Column::Int32(Vec::with_capacity(capacity)),
            VariableType::Int64 => Column::Int64(Vec::with_capacity(capacity)),
            VariableType::UInt16 => Column::UInt16(Vec::with_capacity(capacity)),
            VariableType::UInt32 => Column::UInt32(Vec::with_capacity(capacity)),
            VariableType::UInt64 => Column::UInt64(Vec::with_capacity(capacity)),
        }
    }

    pub fn kind(&self) -> VariableType {
        match self {
            Column::Float(_) => VariableType::Float,
            Column::Double(_) => VariableType::Double,
            Column::Int16(_) => VariableType::Int16,
            Column::Int32(_) => VariableType::Int32,
            Column::Int64(_) => VariableType::Int64,
            Column::UInt16(_) => VariableType::UInt16,
            Column::UInt32(_) => VariableType::UInt32,
            Column::UInt64(_) => VariableType::UInt64,
        }
    }

    pub fn len(&self) -> usize {
        with_column!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, if in range
    pub fn get(&self, index: usize) -> Option<Value> {
        with_column!(self, values => values.get(index).map(|v| v.into_value()))
    }

    /// Compare the values at two indices (IEEE total order for floats)
    ///
    /// Both indices must be in range.
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        with_column!(self, values => values[a].compare(&values[b]))
    }

    fn check_kind(&self, variable: &str, value: &Value) -> Result<(), PopulationError> {
        if value.kind() == self.kind() {
            Ok(())
        } else {
            Err(PopulationError::TypeMismatch {
                variable: variable.to_string(),
                expected: self.kind(),
                actual: value.kind(),
            })
        }
    }

    // Callers check the kind first; a mismatching value is ignored.
    fn push_unchecked(&mut self, value: Value) {
        with_column!(self, values => {
            if let Some(v) = AgentVariable::from_value(value) {
                values.push(v);
            }
        })
    }

    fn set_unchecked(&mut self, index: usize, value: Value) {
        with_column!(self, values => {
            if let (Some(slot), Some(v)) = (values.get_mut(index), AgentVariable::from_value(value)) {
                *slot = v;
            }
        })
    }

    /// Reorder so that position `i` receives the value previously at `order[i]`
    pub(crate) fn permute(&mut self, order: &[usize]) {
        with_column!(self, values => {
            let permuted: Vec<_> = order.iter().map(|&i| values[i]).collect();
            *values = permuted;
        })
    }

    fn clear(&mut self) {
        with_column!(self, values => values.clear())
    }
}

/// Fixed-capacity, columnar collection of agents of one type
///
/// # Example
/// ```
/// use agent_sim_core_rs::{AgentDescription, AgentPopulation};
///
/// let mut agent = AgentDescription::new("agent");
/// agent.new_variable::<f32>("float").unwrap();
/// agent.new_variable::<i32>("spare").unwrap();
///
/// let mut population = AgentPopulation::new(&agent, 4);
/// let mut instance = population.next_instance().unwrap();
/// instance.set::<f32>("float", 2.5).unwrap();
/// instance.set::<i32>("spare", 14).unwrap();
///
/// assert_eq!(population.len(), 1);
/// assert_eq!(population.get::<i32>(0, "spare").unwrap(), 14);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPopulation")]
pub struct AgentPopulation {
    description: AgentDescription,
    columns: Vec<Column>,
    len: usize,
    capacity: usize,
}

/// Unchecked serialized form; only becomes a population through `validate`
#[derive(Deserialize)]
struct RawPopulation {
    description: AgentDescription,
    columns: Vec<Column>,
    len: usize,
    capacity: usize,
}

impl TryFrom<RawPopulation> for AgentPopulation {
    type Error = PopulationError;

    fn try_from(raw: RawPopulation) -> Result<Self, Self::Error> {
        let population = AgentPopulation {
            description: raw.description,
            columns: raw.columns,
            len: raw.len,
            capacity: raw.capacity,
        };
        population.validate()?;
        Ok(population)
    }
}

impl AgentPopulation {
    /// Create an empty population able to hold `capacity` agents
    pub fn new(description: &AgentDescription, capacity: usize) -> Self {
        let columns = description
            .variables()
            .iter()
            .map(|v| Column::new(v.kind, capacity))
            .collect();
        Self {
            description: description.clone(),
            columns,
            len: 0,
            capacity,
        }
    }

    /// Build a full population (capacity = number of records)
    pub fn from_records(
        description: &AgentDescription,
        records: &[AgentRecord],
    ) -> Result<Self, PopulationError> {
        let mut population = Self::new(description, records.len());
        for record in records {
            population.push_record(record)?;
        }
        Ok(population)
    }

    pub fn description(&self) -> &AgentDescription {
        &self.description
    }

    pub fn agent_name(&self) -> &str {
        self.description.name()
    }

    /// Number of agents currently stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an agent holding the variable defaults; returns its index
    pub fn push_default(&mut self) -> Result<usize, PopulationError> {
        self.ensure_room()?;
        for (column, variable) in self.columns.iter_mut().zip(self.description.variables()) {
            column.push_unchecked(variable.default);
        }
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Append a default agent and return a mutable handle to it
    pub fn next_instance(&mut self) -> Result<AgentInstanceMut<'_>, PopulationError> {
        let index = self.push_default()?;
        Ok(AgentInstanceMut {
            population: self,
            index,
        })
    }

    /// Append a record; it must conform to the description
    pub fn push_record(&mut self, record: &AgentRecord) -> Result<usize, PopulationError> {
        self.ensure_room()?;
        record.conforms_to(&self.description)?;
        for (column, variable) in self.columns.iter_mut().zip(self.description.variables()) {
            if let Some(value) = record.value(&variable.name) {
                column.push_unchecked(value);
            }
        }
        self.len += 1;
        Ok(self.len - 1)
    }

    fn ensure_room(&self) -> Result<(), PopulationError> {
        if self.len >= self.capacity {
            Err(PopulationError::CapacityExceeded {
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }

    fn check_index(&self, index: usize) -> Result<(), PopulationError> {
        if index < self.len {
            Ok(())
        } else {
            Err(PopulationError::IndexOutOfRange {
                index,
                len: self.len,
            })
        }
    }

    pub fn instance(&self, index: usize) -> Result<AgentInstance<'_>, PopulationError> {
        self.check_index(index)?;
        Ok(AgentInstance {
            population: self,
            index,
        })
    }

    pub fn instance_mut(&mut self, index: usize) -> Result<AgentInstanceMut<'_>, PopulationError> {
        self.check_index(index)?;
        Ok(AgentInstanceMut {
            population: self,
            index,
        })
    }

    /// Untyped column for a variable name
    pub fn column_values(&self, name: &str) -> Result<&Column, PopulationError> {
        let index = self
            .description
            .index_of(name)
            .ok_or_else(|| PopulationError::UnknownVariable(name.to_string()))?;
        Ok(&self.columns[index])
    }

    /// Typed view of one variable across all agents
    pub fn column<T: AgentVariable>(&self, name: &str) -> Result<&[T], PopulationError> {
        let column = self.column_values(name)?;
        T::column(column).ok_or_else(|| PopulationError::TypeMismatch {
            variable: name.to_string(),
            expected: column.kind(),
            actual: T::KIND,
        })
    }

    pub fn value(&self, index: usize, name: &str) -> Result<Value, PopulationError> {
        self.check_index(index)?;
        let column = self.column_values(name)?;
        column.get(index).ok_or(PopulationError::IndexOutOfRange {
            index,
            len: self.len,
        })
    }

    pub fn get<T: AgentVariable>(&self, index: usize, name: &str) -> Result<T, PopulationError> {
        self.check_index(index)?;
        let values = self.column::<T>(name)?;
        Ok(values[index])
    }

    pub fn set<T: AgentVariable>(
        &mut self,
        index: usize,
        name: &str,
        value: T,
    ) -> Result<(), PopulationError> {
        self.set_value(index, name, value.into_value())
    }

    pub fn set_value(&mut self, index: usize, name: &str, value: Value) -> Result<(), PopulationError> {
        self.check_index(index)?;
        let column_index = self
            .description
            .index_of(name)
            .ok_or_else(|| PopulationError::UnknownVariable(name.to_string()))?;
        let column = &mut self.columns[column_index];
        column.check_kind(name, &value)?;
        column.set_unchecked(index, value);
        Ok(())
    }

    /// Row view of one agent
    pub fn record(&self, index: usize) -> Result<AgentRecord, PopulationError> {
        self.check_index(index)?;
        let mut record = AgentRecord::new();
        for (column, variable) in self.columns.iter().zip(self.description.variables()) {
            if let Some(value) = column.get(index) {
                record.insert(&variable.name, value);
            }
        }
        Ok(record)
    }

    /// Row view of every agent, in storage order
    pub fn records(&self) -> Vec<AgentRecord> {
        (0..self.len).filter_map(|i| self.record(i).ok()).collect()
    }

    /// Overwrite one agent from a conforming record
    pub fn write_record(&mut self, index: usize, record: &AgentRecord) -> Result<(), PopulationError> {
        self.check_index(index)?;
        record.conforms_to(&self.description)?;
        for (column, variable) in self.columns.iter_mut().zip(self.description.variables()) {
            if let Some(value) = record.value(&variable.name) {
                column.set_unchecked(index, value);
            }
        }
        Ok(())
    }

    /// Remove every agent; capacity is kept
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.len = 0;
    }

    /// Apply a permutation of `0..len` to every column
    pub(crate) fn apply_permutation(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.len);
        for column in &mut self.columns {
            column.permute(order);
        }
    }

    /// Check the storage invariants
    ///
    /// Deserialization runs this, so a population that fails it cannot be
    /// built outside the crate.
    pub fn validate(&self) -> Result<(), PopulationError> {
        for (i, variable) in self.description.variables().iter().enumerate() {
            if variable.default.kind() != variable.kind {
                return Err(PopulationError::Inconsistent(format!(
                    "default of '{}' is {}, variable is {}",
                    variable.name,
                    variable.default.kind(),
                    variable.kind
                )));
            }
            if self.description.index_of(&variable.name) != Some(i) {
                return Err(PopulationError::DuplicateVariable(variable.name.clone()));
            }
        }
        if self.columns.len() != self.description.len() {
            return Err(PopulationError::Inconsistent(format!(
                "{} columns for {} variables",
                self.columns.len(),
                self.description.len()
            )));
        }
        if self.len > self.capacity {
            return Err(PopulationError::Inconsistent(format!(
                "{} agents exceed capacity {}",
                self.len, self.capacity
            )));
        }
        for (column, variable) in self.columns.iter().zip(self.description.variables()) {
            if column.kind() != variable.kind || column.len() != self.len {
                return Err(PopulationError::Inconsistent(format!(
                    "column '{}' holds {} {} values, expected {} {}",
                    variable.name,
                    column.len(),
                    column.kind(),
                    self.len,
                    variable.kind
                )));
            }
        }
        Ok(())
    }
}

/// Read-only handle to one agent of a population
#[derive(Debug, Clone, Copy)]
pub struct AgentInstance<'a> {
    population: &'a AgentPopulation,
    index: usize,
}

impl<'a> AgentInstance<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get<T: AgentVariable>(&self, name: &str) -> Result<T, PopulationError> {
        self.population.get::<T>(self.index, name)
    }

    pub fn value(&self, name: &str) -> Result<Value, PopulationError> {
        self.population.value(self.index, name)
    }
}

/// Mutable handle to one agent of a population
#[derive(Debug)]
pub struct AgentInstanceMut<'a> {
    population: &'a mut AgentPopulation,
    index: usize,
}

impl<'a> AgentInstanceMut<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get<T: AgentVariable>(&self, name: &str) -> Result<T, PopulationError> {
        self.population.get::<T>(self.index, name)
    }

    pub fn set<T: AgentVariable>(&mut self, name: &str, value: T) -> Result<(), PopulationError> {
        self.population.set::<T>(self.index, name, value)
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), PopulationError> {
        self.population.set_value(self.index, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> AgentDescription {
        let mut agent = AgentDescription::new("agent");
        agent.new_variable::<f32>("float").unwrap();
        agent.new_variable_with_default::<i32>("spare", 12).unwrap();
        agent
    }

    #[test]
    fn test_new_instances_take_defaults() {
        let mut population = AgentPopulation::new(&description(), 2);
        population.push_default().unwrap();
        assert_eq!(population.get::<i32>(0, "spare").unwrap(), 12);
        assert_eq!(population.get::<f32>(0, "float").unwrap(), 0.0);
    }

    #[test]
    fn test_capacity_is_fixed() {
        let mut population = AgentPopulation::new(&description(), 1);
        population.push_default().unwrap();
        assert_eq!(
            population.push_default(),
            Err(PopulationError::CapacityExceeded { capacity: 1 })
        );
        assert_eq!(population.len(), 1);
    }

    #[test]
    fn test_typed_access_rejects_wrong_kind() {
        let mut population = AgentPopulation::new(&description(), 1);
        population.push_default().unwrap();
        assert!(matches!(
            population.get::<f64>(0, "float"),
            Err(PopulationError::TypeMismatch { .. })
        ));
        assert!(matches!(
            population.set::<u32>(0, "spare", 3),
            Err(PopulationError::TypeMismatch { .. })
        ));
        assert_eq!(population.get::<i32>(0, "spare").unwrap(), 12);
    }

    #[test]
    fn test_index_out_of_range() {
        let population = AgentPopulation::new(&description(), 4);
        assert_eq!(
            population.record(0),
            Err(PopulationError::IndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_permutation_moves_whole_records() {
        let mut population = AgentPopulation::new(&description(), 3);
        for (i, x) in [3.0f32, 1.0, 2.0].iter().enumerate() {
            population.push_default().unwrap();
            population.set::<f32>(i, "float", *x).unwrap();
            population.set::<i32>(i, "spare", *x as i32 + 12).unwrap();
        }

        population.apply_permutation(&[1, 2, 0]);

        assert_eq!(population.column::<f32>("float").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(population.column::<i32>("spare").unwrap(), &[13, 14, 15]);
        assert!(population.validate().is_ok());
    }

    #[test]
    fn test_record_round_trip() {
        let agent = description();
        let mut population = AgentPopulation::new(&agent, 2);
        let record = agent
            .default_record()
            .with_value("float", 9.5f32)
            .with_value("spare", 21i32);
        population.push_record(&record).unwrap();
        assert_eq!(population.record(0).unwrap(), record);
    }

    #[test]
    fn test_write_record_is_all_or_nothing() {
        let agent = description();
        let mut population = AgentPopulation::new(&agent, 1);
        population.push_default().unwrap();
        let bad = AgentRecord::new().with_value("float", 1.0f32);
        assert!(population.write_record(0, &bad).is_err());
        assert_eq!(population.record(0).unwrap(), agent.default_record());
    }
}
