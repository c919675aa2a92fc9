//! Deterministic random number generation
//!
//! Uses ChaCha20 keyed by `(seed, run_index)` with one ChaCha stream per
//! consumer: the host stream, and one stream per agent slot.
//! CRITICAL: All randomness in the simulation MUST go through this module.

mod pool;
mod seed;
mod stream;

pub use pool::AgentRandomPool;
pub use seed::{derive_key, splitmix64};
pub use stream::{NormalScalar, RandomError, RandomStream, StreamState, UniformScalar, HOST_STREAM};
