//! Sort Property Tests
//!
//! For arbitrary populations:
//! - the result is a permutation of the input
//! - keys are ordered in the requested direction
//! - every agent's variables stay together

use agent_sim_core_rs::sort::{sort_population, sort_population_by_keys, sort_records};
use agent_sim_core_rs::{AgentDescription, AgentPopulation, AgentRecord, SortKey, SortOrder};
use proptest::prelude::*;

fn description() -> AgentDescription {
    let mut agent = AgentDescription::new("agent");
    agent.new_variable::<f32>("key").unwrap();
    agent.new_variable::<i64>("group").unwrap();
    agent.new_variable::<u32>("id").unwrap();
    agent
}

/// Population whose `id` column is the original index
fn population(rows: &[(f32, i64)]) -> AgentPopulation {
    let mut population = AgentPopulation::new(&description(), rows.len());
    for (id, &(key, group)) in rows.iter().enumerate() {
        let mut instance = population.next_instance().unwrap();
        instance.set("key", key).unwrap();
        instance.set("group", group).unwrap();
        instance.set("id", id as u32).unwrap();
    }
    population
}

fn order_strategy() -> impl Strategy<Value = SortOrder> {
    prop_oneof![Just(SortOrder::Ascending), Just(SortOrder::Descending)]
}

proptest! {
    #[test]
    fn prop_single_key_sort(
        rows in prop::collection::vec((any::<f32>(), -5i64..5), 0..200),
        order in order_strategy(),
    ) {
        let mut pop = population(&rows);
        sort_population(&mut pop, &SortKey::new("key", order)).unwrap();

        prop_assert_eq!(pop.len(), rows.len());

        // Permutation and alignment: ids are unique and point back at their row
        let ids = pop.column::<u32>("id").unwrap();
        let mut seen = vec![false; rows.len()];
        for (i, &id) in ids.iter().enumerate() {
            let id = id as usize;
            prop_assert!(!seen[id]);
            seen[id] = true;
            prop_assert_eq!(pop.get::<f32>(i, "key").unwrap().to_bits(), rows[id].0.to_bits());
            prop_assert_eq!(pop.get::<i64>(i, "group").unwrap(), rows[id].1);
        }

        // Ordering under IEEE total order
        let keys = pop.column::<f32>("key").unwrap();
        for pair in keys.windows(2) {
            prop_assert!(order.apply(pair[0].total_cmp(&pair[1])).is_le());
        }
    }

    #[test]
    fn prop_two_key_sort(
        rows in prop::collection::vec((-100.0f32..100.0, -3i64..3), 0..200),
        primary in order_strategy(),
        secondary in order_strategy(),
    ) {
        let mut pop = population(&rows);
        let keys = [SortKey::new("group", primary), SortKey::new("key", secondary)];
        sort_population_by_keys(&mut pop, &keys).unwrap();

        for i in 1..pop.len() {
            let (g0, g1) = (pop.get::<i64>(i - 1, "group").unwrap(), pop.get::<i64>(i, "group").unwrap());
            prop_assert!(primary.apply(g0.cmp(&g1)).is_le());
            if g0 == g1 {
                let (k0, k1) = (pop.get::<f32>(i - 1, "key").unwrap(), pop.get::<f32>(i, "key").unwrap());
                prop_assert!(secondary.apply(k0.total_cmp(&k1)).is_le());
            }
        }
    }

    #[test]
    fn prop_record_sort_matches_population_sort(
        rows in prop::collection::vec((-1.0e3f32..1.0e3, any::<i64>()), 0..100),
        order in order_strategy(),
    ) {
        let mut pop = population(&rows);
        let records: Vec<AgentRecord> = pop.records();
        let key = SortKey::new("key", order);

        let sorted_records = sort_records(records, &key).unwrap();
        sort_population(&mut pop, &key).unwrap();

        let from_records: Vec<f32> = sorted_records.iter().map(|r| r.get::<f32>("key").unwrap()).collect();
        prop_assert_eq!(from_records.as_slice(), pop.column::<f32>("key").unwrap());
        for record in &sorted_records {
            let id = record.get::<u32>("id").unwrap() as usize;
            prop_assert_eq!(record.get::<i64>("group").unwrap(), rows[id].1);
        }
    }
}
