//! Host-side API handed to host functions and exit conditions
//!
//! A [`HostApi`] borrows the simulation's host random stream and its agent
//! populations for the duration of one host function call. [`HostAgent`]
//! wraps one population with the whole-population operations available
//! between layers: sorting, counting and reductions.

use crate::models::population::AgentPopulation;
use crate::models::variable::AgentVariable;
use crate::rng::RandomStream;
use crate::simulation::SimulationError;
use crate::sort::{self, SortKey, SortOrder};
use std::collections::BTreeMap;

/// Access to the simulation from inside a host function
pub struct HostApi<'a> {
    random: &'a mut RandomStream,
    populations: &'a mut BTreeMap<String, AgentPopulation>,
    step_counter: u32,
}

impl<'a> HostApi<'a> {
    pub(crate) fn new(
        random: &'a mut RandomStream,
        populations: &'a mut BTreeMap<String, AgentPopulation>,
        step_counter: u32,
    ) -> Self {
        Self {
            random,
            populations,
            step_counter,
        }
    }

    /// The host random stream
    pub fn random(&mut self) -> &mut RandomStream {
        &mut *self.random
    }

    /// Steps completed so far
    pub fn step_counter(&self) -> u32 {
        self.step_counter
    }

    /// Names of every agent type, in order
    pub fn agent_names(&self) -> Vec<String> {
        self.populations.keys().cloned().collect()
    }

    /// Population of one agent type
    pub fn agent(&mut self, name: &str) -> Result<HostAgent<'_>, SimulationError> {
        self.populations
            .get_mut(name)
            .map(|population| HostAgent { population })
            .ok_or_else(|| SimulationError::AgentNotFound(name.to_string()))
    }

    /// Population of one agent type together with the host random stream
    ///
    /// # Example
    /// ```
    /// use agent_sim_core_rs::{ModelDescription, Simulation};
    ///
    /// let mut model = ModelDescription::new("model");
    /// model.new_agent("agent").unwrap().new_variable::<f32>("x").unwrap();
    /// model.add_init_function(|api| {
    ///     let (mut agent, random) = api.agent_and_random("agent")?;
    ///     let population = agent.population_mut();
    ///     for _ in 0..population.capacity() {
    ///         let x = random.uniform::<f32>();
    ///         population.next_instance()?.set("x", x)?;
    ///     }
    ///     Ok(())
    /// });
    ///
    /// let mut simulation = Simulation::new(model).unwrap();
    /// simulation.set_population_capacity("agent", 8).unwrap();
    /// simulation.step().unwrap();
    /// assert_eq!(simulation.population("agent").unwrap().len(), 8);
    /// ```
    pub fn agent_and_random(
        &mut self,
        name: &str,
    ) -> Result<(HostAgent<'_>, &mut RandomStream), SimulationError> {
        let population = self
            .populations
            .get_mut(name)
            .ok_or_else(|| SimulationError::AgentNotFound(name.to_string()))?;
        Ok((HostAgent { population }, &mut *self.random))
    }
}

/// One agent population as seen from a host function
pub struct HostAgent<'a> {
    population: &'a mut AgentPopulation,
}

impl<'a> HostAgent<'a> {
    /// Number of agents
    pub fn count(&self) -> usize {
        self.population.len()
    }

    /// Sort by a variable of type `T`
    pub fn sort<T: AgentVariable>(
        &mut self,
        variable: &str,
        order: SortOrder,
    ) -> Result<(), SimulationError> {
        sort::sort_population_as::<T>(&mut *self.population, variable, order)?;
        Ok(())
    }

    /// Sort by a variable of any type
    pub fn sort_by(&mut self, key: &SortKey) -> Result<(), SimulationError> {
        sort::sort_population(&mut *self.population, key)?;
        Ok(())
    }

    /// Sort by several variables, the first being the primary key
    pub fn sort_by_keys(&mut self, keys: &[SortKey]) -> Result<(), SimulationError> {
        sort::sort_population_by_keys(&mut *self.population, keys)?;
        Ok(())
    }

    /// Sum of a variable, widened to `f64`
    pub fn sum<T: AgentVariable>(&self, variable: &str) -> Result<f64, SimulationError> {
        let values = self.population.column::<T>(variable)?;
        Ok(values.iter().map(|v| v.to_f64()).sum())
    }

    /// Smallest value, `None` for an empty population
    pub fn min<T: AgentVariable>(&self, variable: &str) -> Result<Option<T>, SimulationError> {
        let values = self.population.column::<T>(variable)?;
        Ok(values.iter().copied().min_by(|a, b| a.compare(b)))
    }

    /// Largest value, `None` for an empty population
    pub fn max<T: AgentVariable>(&self, variable: &str) -> Result<Option<T>, SimulationError> {
        let values = self.population.column::<T>(variable)?;
        Ok(values.iter().copied().max_by(|a, b| a.compare(b)))
    }

    /// Number of agents whose variable equals `value`
    pub fn count_value<T: AgentVariable>(
        &self,
        variable: &str,
        value: T,
    ) -> Result<usize, SimulationError> {
        let values = self.population.column::<T>(variable)?;
        Ok(values.iter().filter(|v| v.compare(&value).is_eq()).count())
    }

    pub fn population(&self) -> &AgentPopulation {
        &*self.population
    }

    pub fn population_mut(&mut self) -> &mut AgentPopulation {
        &mut *self.population
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::AgentDescription;

    fn populations() -> BTreeMap<String, AgentPopulation> {
        let mut agent = AgentDescription::new("agent");
        agent.new_variable::<i32>("spare").unwrap();
        let mut population = AgentPopulation::new(&agent, 8);
        for value in [5, -2, 7, 5] {
            population.next_instance().unwrap().set("spare", value).unwrap();
        }
        BTreeMap::from([("agent".to_string(), population)])
    }

    #[test]
    fn test_reductions() {
        let mut random = RandomStream::new(1, 0);
        let mut pops = populations();
        let mut api = HostApi::new(&mut random, &mut pops, 0);
        let agent = api.agent("agent").unwrap();

        assert_eq!(agent.count(), 4);
        assert_eq!(agent.sum::<i32>("spare").unwrap(), 15.0);
        assert_eq!(agent.min::<i32>("spare").unwrap(), Some(-2));
        assert_eq!(agent.max::<i32>("spare").unwrap(), Some(7));
        assert_eq!(agent.count_value::<i32>("spare", 5).unwrap(), 2);
        assert!(agent.sum::<f32>("spare").is_err());
    }

    #[test]
    fn test_unknown_agent() {
        let mut random = RandomStream::new(1, 0);
        let mut pops = populations();
        let mut api = HostApi::new(&mut random, &mut pops, 3);
        assert_eq!(api.step_counter(), 3);
        assert!(matches!(
            api.agent("other"),
            Err(SimulationError::AgentNotFound(name)) if name == "other"
        ));
    }

    #[test]
    fn test_sort_through_host_agent() {
        let mut random = RandomStream::new(1, 0);
        let mut pops = populations();
        let mut api = HostApi::new(&mut random, &mut pops, 0);
        let mut agent = api.agent("agent").unwrap();
        agent.sort::<i32>("spare", SortOrder::Descending).unwrap();
        assert_eq!(
            agent.population().column::<i32>("spare").unwrap(),
            &[7, 5, 5, -2]
        );
    }
}
