//! PyO3 wrapper for RandomStream

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use super::types::random_err;
use crate::rng::{RandomStream as RustRandomStream, UniformScalar};

/// Python wrapper for the seeded random stream
///
/// # Example (from Python)
///
/// ```python
/// from agent_sim_core_rs import RandomStream
///
/// rng = RandomStream(1, run_index=0)
/// x = rng.uniform_float()
/// n = rng.uniform_int32(0, 10)
/// ```
#[pyclass(name = "RandomStream")]
pub struct PyRandomStream {
    inner: RustRandomStream,
}

impl PyRandomStream {
    fn draw<T: UniformScalar>(&mut self, low: Option<T>, high: Option<T>) -> PyResult<T> {
        match (low, high) {
            (None, None) => Ok(self.inner.uniform::<T>()),
            (Some(low), Some(high)) => self.inner.uniform_range(low, high).map_err(random_err),
            _ => Err(PyValueError::new_err("low and high must be given together")),
        }
    }
}

#[pymethods]
impl PyRandomStream {
    #[new]
    #[pyo3(signature = (seed, run_index = 0))]
    fn new(seed: u64, run_index: u64) -> Self {
        Self {
            inner: RustRandomStream::new(seed, run_index),
        }
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.inner.seed()
    }

    #[getter]
    fn run_index(&self) -> u64 {
        self.inner.run_index()
    }

    /// Number of values drawn since seeding
    #[getter]
    fn draws(&self) -> u64 {
        self.inner.draws()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn reseed(&mut self, seed: u64, run_index: u64) {
        self.inner.reseed(seed, run_index);
    }

    /// Uniform in [0, 1), or [low, high) when bounds are given
    #[pyo3(signature = (low = None, high = None))]
    fn uniform_float(&mut self, low: Option<f32>, high: Option<f32>) -> PyResult<f32> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_double(&mut self, low: Option<f64>, high: Option<f64>) -> PyResult<f64> {
        self.draw(low, high)
    }

    /// Uniform over the whole type, or [low, high] inclusive when bounds are given
    #[pyo3(signature = (low = None, high = None))]
    fn uniform_int16(&mut self, low: Option<i16>, high: Option<i16>) -> PyResult<i16> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_int32(&mut self, low: Option<i32>, high: Option<i32>) -> PyResult<i32> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_int64(&mut self, low: Option<i64>, high: Option<i64>) -> PyResult<i64> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_uint16(&mut self, low: Option<u16>, high: Option<u16>) -> PyResult<u16> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_uint32(&mut self, low: Option<u32>, high: Option<u32>) -> PyResult<u32> {
        self.draw(low, high)
    }

    #[pyo3(signature = (low = None, high = None))]
    fn uniform_uint64(&mut self, low: Option<u64>, high: Option<u64>) -> PyResult<u64> {
        self.draw(low, high)
    }

    fn normal_float(&mut self) -> f32 {
        self.inner.normal::<f32>()
    }

    fn normal_double(&mut self) -> f64 {
        self.inner.normal::<f64>()
    }

    fn log_normal_float(&mut self, mean: f32, stddev: f32) -> PyResult<f32> {
        self.inner.log_normal(mean, stddev).map_err(random_err)
    }

    fn log_normal_double(&mut self, mean: f64, stddev: f64) -> PyResult<f64> {
        self.inner.log_normal(mean, stddev).map_err(random_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "RandomStream(seed={}, run_index={}, draws={})",
            self.inner.seed(),
            self.inner.run_index(),
            self.inner.draws()
        )
    }
}
