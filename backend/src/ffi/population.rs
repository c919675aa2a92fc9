//! PyO3 wrapper for AgentPopulation
//!
//! Typed accessors are provided for the common kinds; `get`/`set` dispatch
//! on the declared type of the variable.

use pyo3::prelude::*;

use super::types::{parse_type, population_err, py_to_value, sort_err, value_to_py};
use crate::models::agent::AgentDescription;
use crate::models::population::{AgentPopulation as RustAgentPopulation, PopulationError};
use crate::models::variable::AgentVariable;
use crate::sort::{self, SortOrder};

/// Python wrapper for a fixed-capacity agent population
///
/// # Example (from Python)
///
/// ```python
/// from agent_sim_core_rs import AgentPopulation
///
/// pop = AgentPopulation("agent", [("float", "float"), ("spare", "int")], 1024)
/// i = pop.push()
/// pop.set_float(i, "float", 0.5)
/// pop.sort_float("float")
/// ```
#[pyclass(name = "AgentPopulation")]
pub struct PyAgentPopulation {
    inner: RustAgentPopulation,
}

impl PyAgentPopulation {
    fn typed_get<T: AgentVariable>(&self, index: usize, variable: &str) -> PyResult<T> {
        self.inner.get::<T>(index, variable).map_err(population_err)
    }

    fn typed_set<T: AgentVariable>(&mut self, index: usize, variable: &str, value: T) -> PyResult<()> {
        self.inner.set(index, variable, value).map_err(population_err)
    }

    fn typed_sort<T: AgentVariable>(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        let order = if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        sort::sort_population_as::<T>(&mut self.inner, variable, order).map_err(sort_err)
    }
}

#[pymethods]
impl PyAgentPopulation {
    /// Create an empty population
    ///
    /// `variables` is a list of `(name, type)` pairs; type names are those
    /// accepted by `VariableType`, e.g. "float", "double", "int", "uint64".
    #[new]
    fn new(agent: &str, variables: Vec<(String, String)>, capacity: usize) -> PyResult<Self> {
        let mut description = AgentDescription::new(agent);
        for (name, kind) in &variables {
            description
                .new_variable_of_type(name, parse_type(kind)?)
                .map_err(population_err)?;
        }
        Ok(Self {
            inner: RustAgentPopulation::new(&description, capacity),
        })
    }

    #[getter]
    fn agent(&self) -> String {
        self.inner.agent_name().to_string()
    }

    #[getter]
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Append an agent with default values, returning its index
    fn push(&mut self) -> PyResult<usize> {
        self.inner.push_default().map_err(population_err)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    /// Value of any variable, converted from its declared type
    fn get(&self, py: Python<'_>, index: usize, variable: &str) -> PyResult<PyObject> {
        let value = self.inner.value(index, variable).map_err(population_err)?;
        Ok(value_to_py(py, value))
    }

    /// Set any variable; the value is converted to its declared type
    fn set(&mut self, index: usize, variable: &str, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let kind = self
            .inner
            .description()
            .variable_type(variable)
            .ok_or_else(|| population_err(PopulationError::UnknownVariable(variable.to_string())))?;
        let value = py_to_value(value, kind)?;
        self.inner.set_value(index, variable, value).map_err(population_err)
    }

    fn get_float(&self, index: usize, variable: &str) -> PyResult<f32> {
        self.typed_get(index, variable)
    }

    fn set_float(&mut self, index: usize, variable: &str, value: f32) -> PyResult<()> {
        self.typed_set(index, variable, value)
    }

    fn get_double(&self, index: usize, variable: &str) -> PyResult<f64> {
        self.typed_get(index, variable)
    }

    fn set_double(&mut self, index: usize, variable: &str, value: f64) -> PyResult<()> {
        self.typed_set(index, variable, value)
    }

    fn get_int(&self, index: usize, variable: &str) -> PyResult<i32> {
        self.typed_get(index, variable)
    }

    fn set_int(&mut self, index: usize, variable: &str, value: i32) -> PyResult<()> {
        self.typed_set(index, variable, value)
    }

    fn get_uint(&self, index: usize, variable: &str) -> PyResult<u32> {
        self.typed_get(index, variable)
    }

    fn set_uint(&mut self, index: usize, variable: &str, value: u32) -> PyResult<()> {
        self.typed_set(index, variable, value)
    }

    #[pyo3(signature = (variable, descending = false))]
    fn sort_float(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        self.typed_sort::<f32>(variable, descending)
    }

    #[pyo3(signature = (variable, descending = false))]
    fn sort_double(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        self.typed_sort::<f64>(variable, descending)
    }

    #[pyo3(signature = (variable, descending = false))]
    fn sort_int(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        self.typed_sort::<i32>(variable, descending)
    }

    #[pyo3(signature = (variable, descending = false))]
    fn sort_uint(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        self.typed_sort::<u32>(variable, descending)
    }

    /// Sort by a variable of any type
    #[pyo3(signature = (variable, descending = false))]
    fn sort(&mut self, variable: &str, descending: bool) -> PyResult<()> {
        let key = if descending {
            sort::SortKey::descending(variable)
        } else {
            sort::SortKey::ascending(variable)
        };
        sort::sort_population(&mut self.inner, &key).map_err(sort_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "AgentPopulation(agent='{}', len={}, capacity={})",
            self.inner.agent_name(),
            self.inner.len(),
            self.inner.capacity()
        )
    }
}
