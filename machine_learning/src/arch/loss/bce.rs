use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Binary cross entropy over probabilities.
///
/// Predictions are clamped to `[eps, 1 - eps]` before taking logarithms.
#[derive(Clone, Copy)]
pub struct Bce {
    eps: f32,
}

impl Bce {
    /// Returns a new `Bce` with the default clamping epsilon.
    pub fn new() -> Self {
        Self { eps: 1e-7 }
    }

    fn clamp(&self, p: f32) -> f32 {
        p.clamp(self.eps, 1. - self.eps)
    }
}

impl Default for Bce {
    fn default() -> Self {
        Self::new()
    }
}

impl LossFn for Bce {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            let p = self.clamp(p);
            -(t * p.ln() + (1. - t) * (1. - p).ln())
        })
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;

        Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            let p = self.clamp(p);
            (p - t) / (p * (1. - p)) / n
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn confident_and_wrong_predictions() {
        let bce = Bce::new();
        let y = array![[1., 0.]];

        let good = bce.loss(array![[0.999, 0.001]].view(), y.view());
        let bad = bce.loss(array![[0.001, 0.999]].view(), y.view());

        assert!(good.iter().all(|&l| l < 0.01));
        assert!(bad.iter().all(|&l| l > 6.));
    }

    #[test]
    fn saturated_predictions_stay_finite() {
        let bce = Bce::new();
        let y = array![[1., 0.]];
        let y_pred = array![[0., 1.]];

        assert!(bce.loss(y_pred.view(), y.view()).iter().all(|l| l.is_finite()));
        assert!(
            bce.loss_prime(y_pred.view(), y.view())
                .iter()
                .all(|l| l.is_finite())
        );
    }
}
