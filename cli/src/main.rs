//! Agent simulation CLI
//!
//! Runs a demonstration model: every step each agent draws new random values
//! from its own substream, then the population is sorted by one of them.

use agent_sim_core_rs::{ModelDescription, RunArgs, Simulation, SimulationConfig, SimulationError, SortOrder};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

const AGENT: &str = "agent";

#[derive(Parser, Debug)]
#[command(name = "agent-sim")]
#[command(about = "Seeded agent simulation with keyed population sort")]
struct Args {
    #[command(flatten)]
    run: RunArgs,

    /// Number of agents
    #[arg(short, long, default_value = "1024")]
    agents: usize,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Write a checkpoint of the final state to this file
    #[arg(long)]
    checkpoint: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    simulation_id: String,
    seed: u64,
    run_index: u64,
    steps: u32,
    agents: usize,
    sorted: bool,
    mean_x: f64,
    min_x: Option<f32>,
    max_x: Option<f32>,
    host_draws: u64,
}

/// Model with one agent type `(x: f32, spare: i32, noise: f64)`
fn demo_model() -> Result<ModelDescription, SimulationError> {
    let mut model = ModelDescription::new("random_sort");
    let agent = model.new_agent(AGENT)?;
    agent.new_variable::<f32>("x")?;
    agent.new_variable_with_default::<i32>("spare", 12)?;
    agent.new_variable::<f64>("noise")?;

    model
        .new_layer("draw")
        .add_agent_function(AGENT, |record, random| {
            let x = random.uniform::<f32>();
            record.set("x", x)?;
            record.set("spare", (x * 100.0) as i32 + 12)?;
            record.set("noise", random.normal::<f64>())?;
            Ok(())
        });
    model.new_layer("sort").add_host_function(|api| {
        api.agent(AGENT)?.sort::<f32>("x", SortOrder::Ascending)
    });
    model.add_step_function(|api| {
        let step = api.step_counter();
        let agent = api.agent(AGENT)?;
        let (min, max) = (agent.min::<f32>("x")?, agent.max::<f32>("x")?);
        debug!(step, ?min, ?max, "Step summary");
        Ok(())
    });
    Ok(model)
}

fn run(args: &Args) -> Result<Summary, SimulationError> {
    let mut config = SimulationConfig::default();
    args.run.apply(&mut config);

    let mut simulation = Simulation::with_config(demo_model()?, config)?;
    simulation.set_population_capacity(AGENT, args.agents)?;
    simulation.fill_population(AGENT)?;

    let steps = simulation.simulate()?;

    if let Some(path) = &args.checkpoint {
        let state = simulation.save_state()?;
        std::fs::write(path, state)
            .map_err(|e| SimulationError::Checkpoint(format!("Failed to write {}: {}", path, e)))?;
        info!(path = %path, "Wrote checkpoint");
    }

    let population = simulation.get_population_data(AGENT)?;
    let xs = population.column::<f32>("x")?;
    let mean_x = if xs.is_empty() {
        0.0
    } else {
        xs.iter().map(|&x| x as f64).sum::<f64>() / xs.len() as f64
    };

    Ok(Summary {
        simulation_id: simulation.id().to_string(),
        seed: simulation.config().random_seed,
        run_index: simulation.config().run_index,
        steps,
        agents: population.len(),
        sorted: xs.windows(2).all(|w| w[0] <= w[1]),
        mean_x,
        min_x: xs.first().copied(),
        max_x: xs.last().copied(),
        host_draws: simulation.random().draws(),
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.run.verbose {
        Level::DEBUG
    } else if args.run.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    match run(&args) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                info!("Seed {} / run {}", summary.seed, summary.run_index);
                info!("{} agents, {} steps", summary.agents, summary.steps);
                info!(
                    "x in [{:?}, {:?}], mean {:.4}, sorted: {}",
                    summary.min_x, summary.max_x, summary.mean_x, summary.sorted
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
