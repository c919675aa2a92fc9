//! Python bindings (PyO3)

pub mod population;
pub mod random;
mod types;
