//! Run configuration
//!
//! [`SimulationConfig`] holds the settings of one run. [`RunArgs`] parses the
//! command-line form of the same settings and layers them over a config.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Amount of progress output produced while running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    Quiet,
    #[default]
    Default,
    Verbose,
}

/// Settings of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed of the host stream and every agent slot stream
    pub random_seed: u64,

    /// Selects an independent sequence for the same seed
    pub run_index: u64,

    /// Steps run by `simulate`; 0 runs until an exit condition fires
    pub steps: u32,

    pub verbosity: Verbosity,

    /// Log wall-clock time of init, steps and exit
    pub timing: bool,

    /// Worker threads for agent functions; `None` uses the global rayon pool
    pub threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            random_seed: time_seed(),
            run_index: 0,
            steps: 1,
            verbosity: Verbosity::Default,
            timing: false,
            threads: None,
        }
    }
}

impl SimulationConfig {
    /// Default settings with a fixed seed
    pub fn with_seed(random_seed: u64) -> Self {
        Self {
            random_seed,
            ..Self::default()
        }
    }
}

/// Seed used when none is given
pub(crate) fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Command-line run settings
///
/// Only flags that are present override the config they are applied to.
///
/// # Example
/// ```
/// use agent_sim_core_rs::simulation::{RunArgs, SimulationConfig};
/// use clap::Parser;
///
/// let args = RunArgs::try_parse_from(["prog", "-r", "0", "-s", "1"]).unwrap();
/// let mut config = SimulationConfig::with_seed(99);
/// args.apply(&mut config);
///
/// assert_eq!(config.random_seed, 1);
/// assert_eq!(config.run_index, 0);
/// ```
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "agent-sim", about = "Run an agent simulation")]
pub struct RunArgs {
    /// Random seed
    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,

    /// Run index; same seed with another run index gives an independent run
    #[arg(short = 'r', long = "run-index")]
    pub run_index: Option<u64>,

    /// Number of steps (0 = until an exit condition fires)
    #[arg(long)]
    pub steps: Option<u32>,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Report timings
    #[arg(short, long)]
    pub timing: bool,

    /// Worker threads for agent functions
    #[arg(long)]
    pub threads: Option<usize>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(run_index) = self.run_index {
            config.run_index = run_index;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if self.verbose {
            config.verbosity = Verbosity::Verbose;
        } else if self.quiet {
            config.verbosity = Verbosity::Quiet;
        }
        if self.timing {
            config.timing = true;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = SimulationConfig::with_seed(7);
        config.steps = 12;
        RunArgs::try_parse_from(["prog"]).unwrap().apply(&mut config);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.steps, 12);
        assert_eq!(config.verbosity, Verbosity::Default);
    }

    #[test]
    fn test_long_flags() {
        let args = RunArgs::try_parse_from([
            "prog", "--seed", "5", "--run-index", "3", "--steps", "0", "--timing", "--threads", "2",
        ])
        .unwrap();
        let mut config = SimulationConfig::with_seed(0);
        args.apply(&mut config);
        assert_eq!(
            (config.random_seed, config.run_index, config.steps),
            (5, 3, 0)
        );
        assert!(config.timing);
        assert_eq!(config.threads, Some(2));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(RunArgs::try_parse_from(["prog", "-v", "-q"]).is_err());
        assert!(RunArgs::try_parse_from(["prog", "-s", "not-a-number"]).is_err());
    }
}
