use super::Optimizer;
use crate::{MlErr, Result};

/// Stochastic gradient descent with optional momentum, dampening, Nesterov momentum and L2
/// weight decay.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    dampening: f32,
    nesterov: bool,
    weight_decay: f32,
    velocity: Box<[f32]>,
    started: bool,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer, without momentum.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(len: usize, learning_rate: f32) -> Self {
        Self {
            learning_rate,
            momentum: 0.,
            dampening: 0.,
            nesterov: false,
            weight_decay: 0.,
            velocity: vec![0.; len].into_boxed_slice(),
            started: false,
        }
    }

    pub fn with_momentum(mut self, momentum: f32, dampening: f32, nesterov: bool) -> Self {
        self.momentum = momentum;
        self.dampening = dampening;
        self.nesterov = nesterov;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || params.len() != self.velocity.len() {
            return Err(MlErr::SizeMismatch {
                a: "gradient",
                b: "sgd state",
                got: grad.len(),
                expected: self.velocity.len(),
            });
        }

        let lr = self.learning_rate;
        let mu = self.momentum;
        let damp = self.dampening;
        let wd = self.weight_decay;
        let first = !self.started;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, &g), v)| {
                let mut g = g + wd * *p;

                if mu != 0. {
                    *v = if first { g } else { mu * *v + (1. - damp) * g };
                    g = if self.nesterov { g + mu * *v } else { *v };
                }

                *p -= lr * g;
            });

        self.started = true;
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
