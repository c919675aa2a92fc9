//! Population Tests
//!
//! Critical invariants tested:
//! - Capacity is fixed at creation
//! - New agents take the variable defaults
//! - Variables are never coerced between types
//! - Row and column views agree

use agent_sim_core_rs::{
    AgentDescription, AgentPopulation, AgentRecord, Column, PopulationError, Value, VariableType,
};

fn description() -> AgentDescription {
    let mut agent = AgentDescription::new("agent");
    agent.new_variable::<f32>("float").unwrap();
    agent.new_variable_with_default::<i32>("spare", 12).unwrap();
    agent.new_variable::<u64>("id").unwrap();
    agent
}

#[test]
fn test_new_agents_take_defaults() {
    let mut population = AgentPopulation::new(&description(), 2);
    let index = population.push_default().unwrap();

    assert_eq!(index, 0);
    assert_eq!(population.get::<f32>(0, "float").unwrap(), 0.0);
    assert_eq!(population.get::<i32>(0, "spare").unwrap(), 12);
    assert_eq!(population.get::<u64>(0, "id").unwrap(), 0);
}

#[test]
fn test_capacity_is_enforced() {
    let mut population = AgentPopulation::new(&description(), 2);
    population.push_default().unwrap();
    population.push_default().unwrap();

    assert_eq!(
        population.push_default(),
        Err(PopulationError::CapacityExceeded { capacity: 2 })
    );
    assert!(population.next_instance().is_err());
    assert_eq!(population.len(), 2);
}

#[test]
fn test_type_mismatch_rejected() {
    let mut population = AgentPopulation::new(&description(), 1);
    population.push_default().unwrap();

    assert_eq!(
        population.set::<f64>(0, "float", 1.0),
        Err(PopulationError::TypeMismatch {
            variable: "float".to_string(),
            expected: VariableType::Float,
            actual: VariableType::Double,
        })
    );
    assert!(population.get::<i64>(0, "spare").is_err());
    assert!(population.column::<u32>("id").is_err());
    assert!(population.set_value(0, "id", Value::Int64(3)).is_err());
    assert_eq!(population.get::<f32>(0, "float").unwrap(), 0.0);
}

#[test]
fn test_unknown_variable_and_index() {
    let mut population = AgentPopulation::new(&description(), 4);
    population.push_default().unwrap();

    assert_eq!(
        population.get::<f32>(0, "missing"),
        Err(PopulationError::UnknownVariable("missing".to_string()))
    );
    assert_eq!(
        population.get::<f32>(3, "float"),
        Err(PopulationError::IndexOutOfRange { index: 3, len: 1 })
    );
}

#[test]
fn test_records_and_columns_agree() {
    let desc = description();
    let records: Vec<AgentRecord> = (0..5u64)
        .map(|i| {
            desc.default_record()
                .with_value("float", i as f32 * 0.5)
                .with_value("id", i)
        })
        .collect();
    let population = AgentPopulation::from_records(&desc, &records).unwrap();

    assert_eq!(population.len(), 5);
    assert_eq!(population.capacity(), 5);
    assert_eq!(population.records(), records);
    assert_eq!(
        population.column_values("id").unwrap(),
        &Column::UInt64(vec![0, 1, 2, 3, 4])
    );
    assert_eq!(population.column::<f32>("float").unwrap()[3], 1.5);
}

#[test]
fn test_push_record_rejects_foreign_schema() {
    let mut population = AgentPopulation::new(&description(), 4);
    let record = AgentRecord::new().with_value("float", 1.0f32);
    assert!(population.push_record(&record).is_err());
    assert!(population.is_empty());
}

#[test]
fn test_write_record_is_all_or_nothing() {
    let desc = description();
    let mut population = AgentPopulation::new(&desc, 1);
    population.push_default().unwrap();

    let bad = desc.default_record().with_value("spare", 1.0f64);
    assert!(population.write_record(0, &bad).is_err());
    assert_eq!(population.record(0).unwrap(), desc.default_record());

    let good = desc.default_record().with_value("id", 42u64);
    population.write_record(0, &good).unwrap();
    assert_eq!(population.get::<u64>(0, "id").unwrap(), 42);
}

#[test]
fn test_instance_handles() {
    let mut population = AgentPopulation::new(&description(), 3);
    {
        let mut instance = population.next_instance().unwrap();
        instance.set("float", 2.5f32).unwrap();
        assert_eq!(instance.index(), 0);
        assert_eq!(instance.get::<f32>("float").unwrap(), 2.5);
    }
    let instance = population.instance(0).unwrap();
    assert_eq!(instance.value("float").unwrap(), Value::Float(2.5));
    assert!(population.instance(1).is_err());
}

#[test]
fn test_clear_keeps_capacity() {
    let mut population = AgentPopulation::new(&description(), 3);
    population.push_default().unwrap();
    population.clear();
    assert!(population.is_empty());
    assert_eq!(population.capacity(), 3);
    population.validate().unwrap();
}

#[test]
fn test_serde_round_trip_validates() {
    let mut population = AgentPopulation::new(&description(), 3);
    population.next_instance().unwrap().set("float", 0.1f32).unwrap();

    let json = serde_json::to_string(&population).unwrap();
    let restored: AgentPopulation = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, population);
    restored.validate().unwrap();
}

#[test]
fn test_validate_detects_tampered_columns() {
    let mut population = AgentPopulation::new(&description(), 3);
    population.push_default().unwrap();
    let json: serde_json::Value = serde_json::to_value(&population).unwrap();

    // More agents than the columns hold
    let mut tampered = json.clone();
    tampered["len"] = serde_json::json!(2);
    let err = serde_json::from_value::<AgentPopulation>(tampered).unwrap_err();
    assert!(err.to_string().contains("inconsistent"), "{}", err);

    // More agents than capacity
    let mut tampered = json.clone();
    tampered["capacity"] = serde_json::json!(0);
    assert!(serde_json::from_value::<AgentPopulation>(tampered).is_err());

    // Column of the wrong kind
    let mut tampered = json.clone();
    tampered["columns"][1] = serde_json::json!({ "UInt16": [12] });
    assert!(serde_json::from_value::<AgentPopulation>(tampered).is_err());

    // Variable declared twice
    let mut tampered = json;
    let first = tampered["description"]["variables"][0].clone();
    tampered["description"]["variables"][1]["name"] = first["name"].clone();
    assert!(serde_json::from_value::<AgentPopulation>(tampered).is_err());
}

#[test]
fn test_short_columns_rejected_on_deserialize() {
    let mut population = AgentPopulation::new(&description(), 1);
    population.push_default().unwrap();
    let mut json = serde_json::to_value(&population).unwrap();
    json["len"] = serde_json::json!(3);
    json["capacity"] = serde_json::json!(3);

    let err = serde_json::from_value::<AgentPopulation>(json).unwrap_err();
    assert!(err.to_string().contains("column 'float'"), "{}", err);
}

#[test]
fn test_non_finite_floats_survive_serde() {
    let mut agent = description();
    agent.new_variable::<f64>("weight").unwrap();
    let mut population = AgentPopulation::new(&agent, 3);
    for x in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
        let mut instance = population.next_instance().unwrap();
        instance.set("float", x).unwrap();
        instance.set("weight", f64::NAN).unwrap();
    }

    let json = serde_json::to_string(&population).unwrap();
    assert!(!json.contains("null"));
    let restored: AgentPopulation = serde_json::from_str(&json).unwrap();

    let floats = restored.column::<f32>("float").unwrap();
    assert_eq!(floats[0], f32::INFINITY);
    assert_eq!(floats[1], f32::NEG_INFINITY);
    assert!(floats[2].is_nan());
    assert!(restored.column::<f64>("weight").unwrap().iter().all(|w| w.is_nan()));
}
