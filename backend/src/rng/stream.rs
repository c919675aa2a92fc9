//! Seeded random streams
//!
//! A [`RandomStream`] is a ChaCha20 generator keyed by `(seed, run_index)` and
//! positioned on one of 2^64 ChaCha streams. The host stream uses
//! [`HOST_STREAM`]; agent slot `n` uses stream `n` (see
//! [`AgentRandomPool`](super::AgentRandomPool)). Streams of the same key never
//! overlap, so every slot and the host draw from disjoint sequences.
//!
//! # Determinism
//!
//! Same `(seed, run_index, stream)` and the same call sequence produce
//! bit-identical values on every platform. The generator position can be
//! captured with [`RandomStream::state`] and restored with
//! [`RandomStream::from_state`].
//!
//! # Ranges
//!
//! - Floating `uniform()` draws lie in `[0, 1)`; `uniform_range(low, high)`
//!   draws lie in `[low, high)` (or equal `low` when `low == high`).
//! - Integer `uniform()` draws cover the whole type; `uniform_range(low, high)`
//!   is inclusive of both bounds for every integer width.

use crate::models::variable::{AgentVariable, Value, VariableType};
use crate::rng::seed::derive_key;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, LogNormal, StandardNormal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stream id reserved for host-side draws
pub const HOST_STREAM: u64 = u64::MAX;

/// Contract violations on random draws
///
/// Returned before the generator advances; the stream stays usable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RandomError {
    #[error("Invalid bounds: low ({low}) is greater than high ({high})")]
    InvertedBounds { low: String, high: String },

    #[error("Bounds must be finite, got [{low}, {high}]")]
    NonFiniteBounds { low: String, high: String },

    #[error("Invalid distribution parameters: {0}")]
    InvalidDistribution(String),
}

/// Serializable generator position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub seed: u64,
    pub run_index: u64,
    pub stream: u64,
    /// ChaCha word position within the stream
    pub word_pos: u128,
    pub draws: u64,
}

/// Deterministic random stream for one `(seed, run_index, stream)`
///
/// # Example
/// ```
/// use agent_sim_core_rs::RandomStream;
///
/// let mut a = RandomStream::new(1, 1);
/// let mut b = RandomStream::new(1, 1);
///
/// let x: f32 = a.uniform();
/// assert!((0.0..1.0).contains(&x));
/// assert_eq!(x, b.uniform::<f32>());
///
/// let n = a.uniform_range::<i32>(0, i32::MAX).unwrap();
/// assert!(n >= 0);
/// assert!(a.uniform_range::<i32>(5, 1).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    run_index: u64,
    stream: u64,
    rng: ChaCha20Rng,
    draws: u64,
}

impl RandomStream {
    /// Host stream for a run
    pub fn new(seed: u64, run_index: u64) -> Self {
        Self::substream(seed, run_index, HOST_STREAM)
    }

    /// Any stream of a run's key
    pub fn substream(seed: u64, run_index: u64, stream: u64) -> Self {
        let mut rng = ChaCha20Rng::from_seed(derive_key(seed, run_index));
        rng.set_stream(stream);
        Self {
            seed,
            run_index,
            stream,
            rng,
            draws: 0,
        }
    }

    /// Rebuild a stream at a captured position
    pub fn from_state(state: StreamState) -> Self {
        let mut stream = Self::substream(state.seed, state.run_index, state.stream);
        stream.rng.set_word_pos(state.word_pos);
        stream.draws = state.draws;
        stream
    }

    pub fn state(&self) -> StreamState {
        StreamState {
            seed: self.seed,
            run_index: self.run_index,
            stream: self.stream,
            word_pos: self.rng.get_word_pos(),
            draws: self.draws,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run_index(&self) -> u64 {
        self.run_index
    }

    pub fn stream(&self) -> u64 {
        self.stream
    }

    /// Number of successful draws since seeding
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Return to the just-seeded state
    pub fn reset(&mut self) {
        *self = Self::substream(self.seed, self.run_index, self.stream);
    }

    /// Start a new run on the same stream id
    pub fn reseed(&mut self, seed: u64, run_index: u64) {
        *self = Self::substream(seed, run_index, self.stream);
    }

    /// Raw 64-bit output
    pub fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.rng.next_u64()
    }

    /// Draw over the natural range of `T`
    pub fn uniform<T: UniformScalar>(&mut self) -> T {
        self.draws += 1;
        T::sample_standard(&mut self.rng)
    }

    /// Draw within `[low, high]` (integers) or `[low, high)` (floats)
    pub fn uniform_range<T: UniformScalar>(&mut self, low: T, high: T) -> Result<T, RandomError> {
        T::check_bounds(low, high)?;
        self.draws += 1;
        Ok(T::sample_range(&mut self.rng, low, high))
    }

    /// Standard normal draw
    pub fn normal<T: NormalScalar>(&mut self) -> T {
        self.draws += 1;
        T::sample_normal(&mut self.rng)
    }

    /// `exp(N(mean, stddev))`
    pub fn log_normal<T: NormalScalar>(&mut self, mean: T, stddev: T) -> Result<T, RandomError> {
        let value = T::sample_log_normal(&mut self.rng, mean, stddev)?;
        self.draws += 1;
        Ok(value)
    }

    /// Uniform draw for a kind only known at runtime
    pub fn uniform_value(&mut self, kind: VariableType) -> Value {
        match kind {
            VariableType::Float => Value::Float(self.uniform()),
            VariableType::Double => Value::Double(self.uniform()),
            VariableType::Int16 => Value::Int16(self.uniform()),
            VariableType::Int32 => Value::Int32(self.uniform()),
            VariableType::Int64 => Value::Int64(self.uniform()),
            VariableType::UInt16 => Value::UInt16(self.uniform()),
            VariableType::UInt32 => Value::UInt32(self.uniform()),
            VariableType::UInt64 => Value::UInt64(self.uniform()),
        }
    }
}

/// Types that support uniform draws
pub trait UniformScalar: AgentVariable {
    /// `[0, 1)` for floats, the full domain for integers
    fn sample_standard<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Reject bounds that `sample_range` cannot honour
    fn check_bounds(low: Self, high: Self) -> Result<(), RandomError>;

    /// Bounds must already have passed `check_bounds`
    fn sample_range<R: Rng + ?Sized>(rng: &mut R, low: Self, high: Self) -> Self;
}

macro_rules! impl_uniform_int {
    ($($ty:ty),*) => {$(
        impl UniformScalar for $ty {
            fn sample_standard<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.gen()
            }

            fn check_bounds(low: Self, high: Self) -> Result<(), RandomError> {
                if low > high {
                    return Err(RandomError::InvertedBounds {
                        low: low.to_string(),
                        high: high.to_string(),
                    });
                }
                Ok(())
            }

            fn sample_range<R: Rng + ?Sized>(rng: &mut R, low: Self, high: Self) -> Self {
                rng.gen_range(low..=high)
            }
        }
    )*};
}

macro_rules! impl_uniform_float {
    ($($ty:ty),*) => {$(
        impl UniformScalar for $ty {
            fn sample_standard<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.gen()
            }

            fn check_bounds(low: Self, high: Self) -> Result<(), RandomError> {
                if !low.is_finite() || !high.is_finite() {
                    return Err(RandomError::NonFiniteBounds {
                        low: low.to_string(),
                        high: high.to_string(),
                    });
                }
                if low > high {
                    return Err(RandomError::InvertedBounds {
                        low: low.to_string(),
                        high: high.to_string(),
                    });
                }
                Ok(())
            }

            fn sample_range<R: Rng + ?Sized>(rng: &mut R, low: Self, high: Self) -> Self {
                let u: $ty = rng.gen();
                if low == high {
                    return low;
                }
                let span = high - low;
                let value = if span.is_finite() {
                    low + span * u
                } else {
                    // Span overflows for bounds near ±MAX
                    low * (1.0 - u) + high * u
                };
                // Rounding may land on the excluded upper bound
                if value < high {
                    value
                } else {
                    low
                }
            }
        }
    )*};
}

impl_uniform_int!(i16, i32, i64, u16, u32, u64);
impl_uniform_float!(f32, f64);

/// Floating types that support normal and log-normal draws
pub trait NormalScalar: UniformScalar {
    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Log-normal draw; `mean` and `stddev` describe the underlying normal.
    /// Parameters are validated before the generator is touched.
    fn sample_log_normal<R: Rng + ?Sized>(
        rng: &mut R,
        mean: Self,
        stddev: Self,
    ) -> Result<Self, RandomError>;
}

macro_rules! impl_normal {
    ($($ty:ty),*) => {$(
        impl NormalScalar for $ty {
            fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
                StandardNormal.sample(rng)
            }

            fn sample_log_normal<R: Rng + ?Sized>(
                rng: &mut R,
                mean: Self,
                stddev: Self,
            ) -> Result<Self, RandomError> {
                if !mean.is_finite() || !stddev.is_finite() || stddev < 0.0 {
                    return Err(RandomError::InvalidDistribution(format!(
                        "log-normal requires finite mean and non-negative finite stddev, got mean={}, stddev={}",
                        mean, stddev
                    )));
                }
                let distribution = LogNormal::new(mean, stddev)
                    .map_err(|e| RandomError::InvalidDistribution(e.to_string()))?;
                Ok(distribution.sample(rng))
            }
        }
    )*};
}

impl_normal!(f32, f64);
