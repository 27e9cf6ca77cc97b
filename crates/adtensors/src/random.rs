//! Random tensor construction.
//!
//! This module provides functions for creating tensors with random values,
//! typically used for initial parameter values before training.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::shape::Shape;
use crate::tensor::Tensor;

impl Tensor {
    /// Create a tensor with uniform random values in [0, 1).
    ///
    /// # Example
    ///
    /// ```
    /// use adtensors::Tensor;
    ///
    /// let t = Tensor::random([2, 3]);
    /// assert_eq!(t.shape().dims(), &[2, 3]);
    /// assert!(t.iter().all(|v| (0.0..1.0).contains(&v)));
    /// ```
    pub fn random(shape: impl Into<Shape>) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// This is useful for reproducible results with a seeded RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use adtensors::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let a = Tensor::random_with_rng([4], &mut StdRng::seed_from_u64(7));
    /// let b = Tensor::random_with_rng([4], &mut StdRng::seed_from_u64(7));
    /// assert_eq!(a, b);
    /// ```
    pub fn random_with_rng<R: Rng>(shape: impl Into<Shape>, rng: &mut R) -> Self {
        let shape = shape.into();
        Self::from_fn(shape, |_| rng.sample(StandardUniform))
    }

    /// Create a tensor with uniform random values in [low, high).
    pub fn random_uniform_with_rng<R: Rng>(
        shape: impl Into<Shape>,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Self {
        Self::from_fn(shape, |_| {
            let u: f64 = rng.sample(StandardUniform);
            low + (high - low) * u
        })
    }

    /// Create a tensor with standard normal random values.
    pub fn random_normal(shape: impl Into<Shape>) -> Self {
        Self::random_normal_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn random_normal_with_rng<R: Rng>(shape: impl Into<Shape>, rng: &mut R) -> Self {
        Self::from_fn(shape, |_| rng.sample(StandardNormal))
    }
}
