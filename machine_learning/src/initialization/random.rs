use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::Result;

/// A parameter generator that follows a certain probabilistic distribution.
#[derive(Clone, Debug)]
pub struct RandParamGen<D: Distribution<f32>> {
    distribution: D,
}

impl<D: Distribution<f32>> RandParamGen<D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the random numbers from.
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }

    /// Overwrites every value of `params` with a fresh sample.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `params` - The parameters to initialize.
    pub fn fill<R: Rng>(&self, rng: &mut R, params: &mut [f32]) {
        params
            .iter_mut()
            .for_each(|p| *p = self.distribution.sample(&mut *rng));
    }
}

impl RandParamGen<Uniform<f32>> {
    /// Creates a new `RandParamGen` with a uniform distribution.
    ///
    /// # Arguments
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(Uniform::new(low, high)?))
    }

    /// Creates a new `RandParamGen` sampling from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, the usual
    /// initialization for fully connected layers.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn fan_in_uniform(fan_in: usize) -> Result<Self> {
        let range = 1. / (fan_in.max(1) as f32).sqrt();
        Self::uniform(-range, range)
    }
}

impl RandParamGen<Normal<f32>> {
    /// Creates a new `RandParamGen` with a normal distribution.
    ///
    /// # Arguments
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(Normal::new(mean, std_dev)?))
    }
}
