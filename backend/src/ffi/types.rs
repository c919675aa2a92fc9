//! Type conversion utilities for FFI boundary
//!
//! Converts between agent [`Value`]s and Python objects, and maps Rust error
//! enums onto Python exceptions.

use pyo3::exceptions::{PyIndexError, PyKeyError, PyTypeError, PyValueError};
use pyo3::prelude::*;

use crate::models::population::PopulationError;
use crate::models::variable::{Value, VariableType};
use crate::rng::RandomError;
use crate::sort::SortError;

// ========================================================================
// Value Conversion
// ========================================================================

/// Convert a typed value to the matching Python number
pub(crate) fn value_to_py(py: Python<'_>, value: Value) -> PyObject {
    match value {
        Value::Float(v) => v.into_py(py),
        Value::Double(v) => v.into_py(py),
        Value::Int16(v) => v.into_py(py),
        Value::Int32(v) => v.into_py(py),
        Value::Int64(v) => v.into_py(py),
        Value::UInt16(v) => v.into_py(py),
        Value::UInt32(v) => v.into_py(py),
        Value::UInt64(v) => v.into_py(py),
    }
}

/// Extract a Python number as a value of `kind`
///
/// Raises OverflowError/TypeError through PyO3 if the object does not fit.
pub(crate) fn py_to_value(value: &Bound<'_, PyAny>, kind: VariableType) -> PyResult<Value> {
    Ok(match kind {
        VariableType::Float => Value::Float(value.extract()?),
        VariableType::Double => Value::Double(value.extract()?),
        VariableType::Int16 => Value::Int16(value.extract()?),
        VariableType::Int32 => Value::Int32(value.extract()?),
        VariableType::Int64 => Value::Int64(value.extract()?),
        VariableType::UInt16 => Value::UInt16(value.extract()?),
        VariableType::UInt32 => Value::UInt32(value.extract()?),
        VariableType::UInt64 => Value::UInt64(value.extract()?),
    })
}

/// Parse a type name such as `"float"` or `"uint32"`
pub(crate) fn parse_type(name: &str) -> PyResult<VariableType> {
    name.parse()
        .map_err(|e: crate::models::variable::UnknownVariableType| PyValueError::new_err(e.to_string()))
}

// ========================================================================
// Error Mapping
// ========================================================================

pub(crate) fn population_err(error: PopulationError) -> PyErr {
    match error {
        PopulationError::UnknownVariable(_) => PyKeyError::new_err(error.to_string()),
        PopulationError::TypeMismatch { .. } => PyTypeError::new_err(error.to_string()),
        PopulationError::IndexOutOfRange { .. } => PyIndexError::new_err(error.to_string()),
        _ => PyValueError::new_err(error.to_string()),
    }
}

pub(crate) fn sort_err(error: SortError) -> PyErr {
    match error {
        SortError::UnknownKey(_) => PyKeyError::new_err(error.to_string()),
        SortError::TypeMismatch { .. } => PyTypeError::new_err(error.to_string()),
        _ => PyValueError::new_err(error.to_string()),
    }
}

pub(crate) fn random_err(error: RandomError) -> PyErr {
    PyValueError::new_err(error.to_string())
}
