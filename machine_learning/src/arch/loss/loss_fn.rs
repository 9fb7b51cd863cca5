use ndarray::{Array2, ArrayView2};

/// A loss function over dense targets.
pub trait LossFn {
    /// Computes the unreduced loss, one value per element of `y_pred`.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;

    /// Computes the gradient of the *mean* of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
