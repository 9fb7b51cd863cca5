use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error loss function.
#[derive(Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (&y_pred - &y).mapv(|x| x.powi(2))
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (&y_pred - &y) * (2.0 / y_pred.len().max(1) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn elementwise_and_mean_gradient() {
        let y_pred = array![[1., 2.], [3., 4.]];
        let y = array![[1., 0.], [4., 4.]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()), array![[0., 4.], [1., 0.]]);
        assert_eq!(
            Mse.loss_prime(y_pred.view(), y.view()),
            array![[0., 1.], [-0.5, 0.]]
        );
    }
}
