use super::Optimizer;

/// Multiplies the learning rate by `gamma` every time it is stepped.
#[derive(Debug, Clone)]
pub struct ExponentialDecay {
    base: f32,
    gamma: f32,
    steps: i32,
}

impl ExponentialDecay {
    /// Creates a new `ExponentialDecay` schedule.
    ///
    /// # Arguments
    /// * `base` - The learning rate before any step.
    /// * `gamma` - The decay factor.
    pub fn new(base: f32, gamma: f32) -> Self {
        Self {
            base,
            gamma,
            steps: 0,
        }
    }

    /// Advances the schedule and writes the new learning rate to `optimizer`.
    ///
    /// # Returns
    /// The new learning rate.
    pub fn step<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> f32 {
        self.steps += 1;
        let lr = self.base * self.gamma.powi(self.steps);
        optimizer.set_learning_rate(lr);
        lr
    }
}
