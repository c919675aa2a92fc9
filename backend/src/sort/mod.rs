//! Keyed sorting of agent populations
//!
//! Reorders agents by one or more key variables while keeping every other
//! variable aligned with its agent. Two forms are provided:
//!
//! - columnar, in place on an [`AgentPopulation`]
//! - sequence, over a `Vec<AgentRecord>`
//!
//! # Critical Invariants
//!
//! 1. The result is a permutation: no agent is duplicated or dropped
//! 2. Every column is reordered with the same permutation
//! 3. Failures are detected before anything is reordered
//! 4. Floating keys use IEEE 754 total order; NaN sorts after +inf ascending
//!
//! Equal keys may end up in any relative order.

mod permutation;

use crate::models::agent::AgentRecord;
use crate::models::population::{AgentPopulation, Column, PopulationError};
use crate::models::variable::{AgentVariable, Value, VariableType};
use permutation::{gather_records, is_permutation, sorted_indices};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

/// Direction of a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Orient an ascending comparison result
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Variable to sort by, with direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub variable: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(variable: &str, order: SortOrder) -> Self {
        Self {
            variable: variable.to_string(),
            order,
        }
    }

    pub fn ascending(variable: &str) -> Self {
        Self::new(variable, SortOrder::Ascending)
    }

    pub fn descending(variable: &str) -> Self {
        Self::new(variable, SortOrder::Descending)
    }
}

/// Errors from sort operations; nothing is reordered when one is returned
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SortError {
    #[error("Sort key '{0}' is not a variable of the agent")]
    UnknownKey(String),

    #[error("Sort key '{variable}' has type {expected}, not {requested}")]
    TypeMismatch {
        variable: String,
        expected: VariableType,
        requested: VariableType,
    },

    #[error("No sort keys given")]
    NoKeys,

    #[error("Record {index} does not share the schema of record 0")]
    InconsistentRecords { index: usize },
}

fn key_error(error: PopulationError) -> SortError {
    match error {
        PopulationError::TypeMismatch {
            variable,
            expected,
            actual,
        } => SortError::TypeMismatch {
            variable,
            expected,
            requested: actual,
        },
        PopulationError::UnknownVariable(name) => SortError::UnknownKey(name),
        other => SortError::UnknownKey(other.to_string()),
    }
}

/// Sort a population in place by a single key
///
/// # Example
/// ```
/// use agent_sim_core_rs::{AgentDescription, AgentPopulation};
/// use agent_sim_core_rs::sort::{sort_population, SortKey};
///
/// let mut agent = AgentDescription::new("agent");
/// agent.new_variable::<f32>("float").unwrap();
/// agent.new_variable::<i32>("spare").unwrap();
///
/// let mut population = AgentPopulation::new(&agent, 3);
/// for x in [2.0f32, 0.5, 1.0] {
///     let mut instance = population.next_instance().unwrap();
///     instance.set("float", x).unwrap();
///     instance.set("spare", x as i32 + 12).unwrap();
/// }
///
/// sort_population(&mut population, &SortKey::ascending("float")).unwrap();
/// assert_eq!(population.column::<f32>("float").unwrap(), &[0.5, 1.0, 2.0]);
/// assert_eq!(population.column::<i32>("spare").unwrap(), &[12, 13, 14]);
/// ```
pub fn sort_population(population: &mut AgentPopulation, key: &SortKey) -> Result<(), SortError> {
    sort_population_by_keys(population, std::slice::from_ref(key))
}

/// Sort a population in place by a key whose type must be `T`
///
/// The column is never coerced: a `T` different from the variable's declared
/// type returns [`SortError::TypeMismatch`].
pub fn sort_population_as<T: AgentVariable>(
    population: &mut AgentPopulation,
    variable: &str,
    order: SortOrder,
) -> Result<(), SortError> {
    let keys = population.column::<T>(variable).map_err(key_error)?;
    let permutation = sorted_indices(keys.len(), |a, b| order.apply(keys[a].compare(&keys[b])));
    finish_population(population, permutation, variable);
    Ok(())
}

/// Sort a population in place, lexicographically by `keys`
///
/// The first key is the primary key; later keys only break ties.
pub fn sort_population_by_keys(
    population: &mut AgentPopulation,
    keys: &[SortKey],
) -> Result<(), SortError> {
    if keys.is_empty() {
        return Err(SortError::NoKeys);
    }
    let columns: Vec<(&Column, SortOrder)> = keys
        .iter()
        .map(|key| {
            population
                .column_values(&key.variable)
                .map(|column| (column, key.order))
                .map_err(key_error)
        })
        .collect::<Result<_, _>>()?;

    let permutation = sorted_indices(population.len(), |a, b| {
        columns
            .iter()
            .map(|(column, order)| order.apply(column.compare(a, b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    finish_population(population, permutation, &keys[0].variable);
    Ok(())
}

fn finish_population(population: &mut AgentPopulation, permutation: Vec<usize>, variable: &str) {
    debug_assert!(is_permutation(&permutation, population.len()));
    population.apply_permutation(&permutation);
    debug!(
        agent = population.agent_name(),
        key = variable,
        agents = population.len(),
        "Sorted population"
    );
}

/// Sort a sequence of records by a single key
pub fn sort_records(records: Vec<AgentRecord>, key: &SortKey) -> Result<Vec<AgentRecord>, SortError> {
    sort_records_by_keys(records, std::slice::from_ref(key))
}

/// Sort a sequence of records lexicographically by `keys`
///
/// Every record must have the variables and kinds of the first record.
pub fn sort_records_by_keys(
    records: Vec<AgentRecord>,
    keys: &[SortKey],
) -> Result<Vec<AgentRecord>, SortError> {
    if keys.is_empty() {
        return Err(SortError::NoKeys);
    }
    let Some(first) = records.first() else {
        return Ok(records);
    };
    for key in keys {
        if first.value(&key.variable).is_none() {
            return Err(SortError::UnknownKey(key.variable.clone()));
        }
    }
    if let Some(index) = records.iter().position(|r| !r.same_schema(first)) {
        return Err(SortError::InconsistentRecords { index });
    }

    let columns: Vec<(Vec<Value>, SortOrder)> = keys
        .iter()
        .map(|key| {
            let values = records
                .iter()
                .filter_map(|r| r.value(&key.variable))
                .collect();
            (values, key.order)
        })
        .collect();

    let permutation = sorted_indices(records.len(), |a, b| {
        columns
            .iter()
            .map(|(values, order)| {
                order.apply(values[a].total_cmp(&values[b]).unwrap_or(Ordering::Equal))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    debug_assert!(is_permutation(&permutation, records.len()));
    Ok(gather_records(records, &permutation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::AgentDescription;

    fn population(values: &[(f32, i32)]) -> AgentPopulation {
        let mut agent = AgentDescription::new("agent");
        agent.new_variable::<f32>("float").unwrap();
        agent.new_variable::<i32>("spare").unwrap();
        let mut population = AgentPopulation::new(&agent, values.len());
        for &(x, spare) in values {
            let mut instance = population.next_instance().unwrap();
            instance.set("float", x).unwrap();
            instance.set("spare", spare).unwrap();
        }
        population
    }

    #[test]
    fn test_descending_keeps_alignment() {
        let mut pop = population(&[(1.0, 1), (3.0, 3), (2.0, 2)]);
        sort_population(&mut pop, &SortKey::descending("float")).unwrap();
        assert_eq!(pop.column::<f32>("float").unwrap(), &[3.0, 2.0, 1.0]);
        assert_eq!(pop.column::<i32>("spare").unwrap(), &[3, 2, 1]);
    }

    #[test]
    fn test_typed_sort_rejects_wrong_type() {
        let mut pop = population(&[(1.0, 2), (0.0, 1)]);
        let before = pop.clone();
        let err = sort_population_as::<f64>(&mut pop, "float", SortOrder::Ascending).unwrap_err();
        assert_eq!(
            err,
            SortError::TypeMismatch {
                variable: "float".to_string(),
                expected: VariableType::Float,
                requested: VariableType::Double,
            }
        );
        assert_eq!(pop, before);
    }

    #[test]
    fn test_unknown_key_leaves_population_untouched() {
        let mut pop = population(&[(1.0, 2), (0.0, 1)]);
        let before = pop.clone();
        let keys = [SortKey::ascending("float"), SortKey::ascending("missing")];
        assert_eq!(
            sort_population_by_keys(&mut pop, &keys),
            Err(SortError::UnknownKey("missing".to_string()))
        );
        assert_eq!(pop, before);
        assert_eq!(sort_population_by_keys(&mut pop, &[]), Err(SortError::NoKeys));
    }

    #[test]
    fn test_nan_sorts_last_ascending() {
        let mut pop = population(&[(f32::NAN, 0), (f32::INFINITY, 1), (-1.0, 2)]);
        sort_population_as::<f32>(&mut pop, "float", SortOrder::Ascending).unwrap();
        assert_eq!(pop.column::<i32>("spare").unwrap(), &[2, 1, 0]);
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let mut pop = population(&[(1.0, 5), (0.0, 9), (1.0, 2), (0.0, 3)]);
        let keys = [SortKey::ascending("float"), SortKey::descending("spare")];
        sort_population_by_keys(&mut pop, &keys).unwrap();
        assert_eq!(pop.column::<i32>("spare").unwrap(), &[9, 3, 5, 2]);
    }

    #[test]
    fn test_sort_records_rejects_mixed_schema() {
        let records = vec![
            AgentRecord::new().with_value("float", 1.0f32),
            AgentRecord::new().with_value("float", 2.0f64),
        ];
        assert_eq!(
            sort_records(records, &SortKey::ascending("float")),
            Err(SortError::InconsistentRecords { index: 1 })
        );
    }

    #[test]
    fn test_sort_records_empty_is_ok() {
        assert_eq!(sort_records(Vec::new(), &SortKey::ascending("x")), Ok(Vec::new()));
    }
}
