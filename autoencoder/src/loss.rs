//! Reconstruction losses per feature type.
//!
//! The scalar that is backpropagated is `mse + bce + sum(cce)`: numeric and binary losses are
//! averaged over every cell of their head while each categorical column adds its own mean. The
//! reported net loss instead averages one loss per column, so every column weighs the same.

use machine_learning::arch::{
    ModelOutput,
    loss::{Bce, CrossEntropy, LossFn, Mse},
};
use ndarray::{Array1, Array2, Axis, concatenate};
use tabular::ScaledFrame;

use crate::{AutoEncoderErr, Result};

/// The mean loss of every column of a batch, grouped by feature type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossBreakdown {
    pub numeric: Vec<f32>,
    pub binary: Vec<f32>,
    pub categorical: Vec<f32>,
}

impl LossBreakdown {
    /// Every column's loss in registry order.
    pub fn units(&self) -> Vec<f32> {
        self.numeric
            .iter()
            .chain(&self.binary)
            .chain(&self.categorical)
            .copied()
            .collect()
    }

    /// The unweighted mean over the columns, what is logged and reported.
    pub fn net_loss(&self) -> f32 {
        mean(&self.units())
    }

    /// The scalar that is optimized, a feature type without columns adds zero.
    pub fn objective(&self) -> f32 {
        mean(&self.numeric) + mean(&self.binary) + self.categorical.iter().sum::<f32>()
    }
}

fn mean(xs: &[f32]) -> f32 {
    if xs.is_empty() {
        return 0.;
    }

    xs.iter().sum::<f32>() / xs.len() as f32
}

/// The loss of every cell, one column per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLosses {
    pub numeric: Array2<f32>,
    pub binary: Array2<f32>,
    /// One column per categorical feature, the per row cross entropy.
    pub categorical: Array2<f32>,
}

impl FeatureLosses {
    pub fn rows(&self) -> usize {
        self.numeric.nrows()
    }

    /// Averages every column over the rows.
    pub fn breakdown(&self) -> LossBreakdown {
        let column_means = |losses: &Array2<f32>| -> Vec<f32> {
            losses
                .mean_axis(Axis(0))
                .map(|m| m.to_vec())
                .unwrap_or_else(|| vec![0.; losses.ncols()])
        };

        LossBreakdown {
            numeric: column_means(&self.numeric),
            binary: column_means(&self.binary),
            categorical: column_means(&self.categorical),
        }
    }

    /// All the losses of the row side by side, numeric then binary then categorical.
    pub fn combined(&self) -> Array2<f32> {
        let views = [self.numeric.view(), self.binary.view(), self.categorical.view()];
        concatenate(Axis(1), &views).unwrap_or_else(|_| Array2::zeros((self.rows(), 0)))
    }

    /// The mean loss of every row, the raw anomaly score.
    pub fn row_means(&self) -> Array1<f32> {
        let combined = self.combined();
        combined
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(combined.nrows()))
    }

    /// Stacks the losses of consecutive batches.
    pub fn stack(parts: &[FeatureLosses]) -> Result<FeatureLosses> {
        let stack = |f: fn(&FeatureLosses) -> &Array2<f32>| -> Result<Array2<f32>> {
            let views: Vec<_> = parts.iter().map(|p| f(p).view()).collect();
            concatenate(Axis(0), &views)
                .map_err(|e| AutoEncoderErr::InvalidArgument(format!("cannot stack losses: {e}")))
        };

        Ok(FeatureLosses {
            numeric: stack(|p| &p.numeric)?,
            binary: stack(|p| &p.binary)?,
            categorical: stack(|p| &p.categorical)?,
        })
    }
}

fn check_heads(output: &ModelOutput, target: &ScaledFrame) -> Result<()> {
    if output.numeric.dim() != target.numeric.dim()
        || output.binary.dim() != target.binary.dim()
        || output.categorical.len() != target.categorical.len()
    {
        return Err(AutoEncoderErr::InvalidArgument(
            "model output does not match the target's feature layout".to_string(),
        ));
    }

    Ok(())
}

/// Computes the loss of every cell of a batch.
///
/// # Returns
/// An `InvalidArgument` error if the output and target disagree on their shapes.
pub fn feature_losses(output: &ModelOutput, target: &ScaledFrame) -> Result<FeatureLosses> {
    check_heads(output, target)?;

    let rows = target.nrows();
    let mut categorical = Array2::zeros((rows, target.categorical.len()));
    for (i, (logits, codes)) in output.categorical.iter().zip(&target.categorical).enumerate() {
        let losses = CrossEntropy.loss(logits.view(), codes);
        categorical.column_mut(i).assign(&losses);
    }

    Ok(FeatureLosses {
        numeric: Mse.loss(output.numeric.view(), target.numeric.view()),
        binary: Bce::new().loss(output.binary.view(), target.binary.view()),
        categorical,
    })
}

/// The gradient of the optimized scalar with respect to every head of the model.
pub fn gradient(output: &ModelOutput, target: &ScaledFrame) -> Result<ModelOutput> {
    check_heads(output, target)?;

    let categorical = output
        .categorical
        .iter()
        .zip(&target.categorical)
        .map(|(logits, codes)| CrossEntropy.loss_prime(logits.view(), codes))
        .collect();

    Ok(ModelOutput {
        numeric: Mse.loss_prime(output.numeric.view(), target.numeric.view()),
        binary: Bce::new().loss_prime(output.binary.view(), target.binary.view()),
        categorical,
    })
}

/// A stand-in prediction that echoes the corrupted input, the reference a trained model has to
/// beat.
///
/// Binary cells are nudged 0.05 away from 0 and 1 and categorical codes become one-hot logits
/// scaled by 5.
pub fn baseline_output(swapped: &ScaledFrame, cardinalities: &[usize]) -> ModelOutput {
    let binary = swapped.binary.mapv(|b| {
        if b == 0. {
            0.05
        } else if b == 1. {
            0.95
        } else {
            b
        }
    });

    let categorical = swapped
        .categorical
        .iter()
        .zip(cardinalities)
        .map(|(codes, &cardinality)| {
            let mut logits = Array2::zeros((codes.len(), cardinality));
            for (row, &code) in codes.iter().enumerate() {
                if code < cardinality {
                    logits[[row, code]] = 5.;
                }
            }
            logits
        })
        .collect();

    ModelOutput {
        numeric: swapped.numeric.clone(),
        binary,
        categorical,
    }
}
