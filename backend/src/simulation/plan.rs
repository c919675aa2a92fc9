//! Run plans
//!
//! A [`RunPlan`] is the configuration of one run of a model. A
//! [`RunPlanVector`] builds many plans at once, typically one per seed.

use crate::models::model::ModelDescription;
use crate::simulation::engine::SimulationError;
use serde::{Deserialize, Serialize};

/// Settings of a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub random_seed: u64,
    pub run_index: u64,
    pub steps: u32,
    /// Directory, relative to the output root, that receives this run's output
    pub output_subdirectory: String,
}

impl RunPlan {
    pub fn new(random_seed: u64, run_index: u64, steps: u32) -> Self {
        Self {
            random_seed,
            run_index,
            steps,
            output_subdirectory: String::new(),
        }
    }
}

/// Ordered collection of run plans for one model
///
/// Plan `i` starts with run index `i`, seed 0 and one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlanVector {
    plans: Vec<RunPlan>,
    allow_unbounded: bool,
}

impl RunPlanVector {
    pub fn new(model: &ModelDescription, count: usize) -> Self {
        Self {
            plans: (0..count as u64).map(|i| RunPlan::new(0, i, 1)).collect(),
            allow_unbounded: model.has_exit_conditions(),
        }
    }

    /// Seeds `initial`, `initial + step`, ... in plan order (wrapping)
    ///
    /// # Example
    /// ```
    /// use agent_sim_core_rs::ModelDescription;
    /// use agent_sim_core_rs::simulation::RunPlanVector;
    ///
    /// let model = ModelDescription::new("model");
    /// let mut plans = RunPlanVector::new(&model, 3);
    /// plans.set_random_simulation_seed(10, 5);
    ///
    /// let seeds: Vec<u64> = plans.iter().map(|p| p.random_seed).collect();
    /// assert_eq!(seeds, vec![10, 15, 20]);
    /// ```
    pub fn set_random_simulation_seed(&mut self, initial: u64, step: u64) {
        let mut seed = initial;
        for plan in &mut self.plans {
            plan.random_seed = seed;
            seed = seed.wrapping_add(step);
        }
    }

    /// Set the step count of every plan
    ///
    /// 0 is only accepted when the model has an exit condition.
    pub fn set_steps(&mut self, steps: u32) -> Result<(), SimulationError> {
        if steps == 0 && !self.allow_unbounded {
            return Err(SimulationError::InvalidConfig(
                "steps may only be 0 when the model has exit conditions".to_string(),
            ));
        }
        for plan in &mut self.plans {
            plan.steps = steps;
        }
        Ok(())
    }

    /// Give every plan the same output subdirectory
    pub fn set_output_subdirectory(&mut self, subdirectory: &str) {
        for plan in &mut self.plans {
            plan.output_subdirectory = subdirectory.to_string();
        }
    }

    /// Append the plans of another vector
    pub fn extend(&mut self, other: RunPlanVector) {
        self.allow_unbounded &= other.allow_unbounded;
        self.plans.extend(other.plans);
    }

    pub fn push(&mut self, plan: RunPlan) {
        self.plans.push(plan);
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RunPlan> {
        self.plans.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RunPlan> {
        self.plans.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunPlan> {
        self.plans.iter()
    }
}

impl<'a> IntoIterator for &'a RunPlanVector {
    type Item = &'a RunPlan;
    type IntoIter = std::slice::Iter<'a, RunPlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.plans.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_run_indices() {
        let model = ModelDescription::new("model");
        let plans = RunPlanVector::new(&model, 4);
        let indices: Vec<u64> = plans.iter().map(|p| p.run_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_seed_wraps() {
        let model = ModelDescription::new("model");
        let mut plans = RunPlanVector::new(&model, 2);
        plans.set_random_simulation_seed(u64::MAX, 2);
        assert_eq!(plans.get(1).unwrap().random_seed, 1);
    }

    #[test]
    fn test_zero_steps_needs_exit_condition() {
        let mut model = ModelDescription::new("model");
        let mut plans = RunPlanVector::new(&model, 2);
        assert!(plans.set_steps(0).is_err());
        assert_eq!(plans.get(0).unwrap().steps, 1);

        model.add_exit_condition(|_| Ok(true));
        let mut plans = RunPlanVector::new(&model, 2);
        plans.set_steps(0).unwrap();
        assert!(plans.iter().all(|p| p.steps == 0));
    }

    #[test]
    fn test_extend_concatenates() {
        let model = ModelDescription::new("model");
        let mut plans = RunPlanVector::new(&model, 2);
        plans.set_output_subdirectory("a");
        let mut more = RunPlanVector::new(&model, 1);
        more.set_output_subdirectory("b");
        plans.extend(more);
        let dirs: Vec<&str> = plans.iter().map(|p| p.output_subdirectory.as_str()).collect();
        assert_eq!(dirs, vec!["a", "a", "b"]);
    }
}
