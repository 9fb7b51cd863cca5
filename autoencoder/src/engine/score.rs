use log::debug;
use machine_learning::arch::{Model, ModelOutput};
use ndarray::{Array2, Axis};
use tabular::{Column, Frame, ScaledFrame, Value};

use super::AutoEncoder;
use crate::{
    AutoEncoderErr, Result,
    data::{BatchSource, FrameDataset},
    encoding,
    loss::{self, FeatureLosses},
    preprocessing,
};

/// Splits `frame` into contiguous batches of at most `batch_size` rows.
fn frame_batches(frame: &Frame, batch_size: usize) -> Vec<Frame> {
    let rows = frame.nrows();
    let batch_size = batch_size.max(1);

    (0..rows)
        .step_by(batch_size)
        .map(|start| frame.slice(start..(start + batch_size).min(rows)))
        .collect()
}

/// The losses of a scoring pass, with the decoded predictions when they were asked for.
struct Inference {
    losses: FeatureLosses,
    /// One vector of cells per feature, in registry order.
    predictions: Vec<Vec<Value>>,
}

impl<M: Model> AutoEncoder<M> {
    /// Reconstructs an uncorrupted scaled frame.
    ///
    /// # Returns
    /// The losses of every cell and the raw model output.
    pub(super) fn reconstruct(&mut self, target: &ScaledFrame) -> Result<(FeatureLosses, ModelOutput)> {
        let input = encoding::encode(&self.model, target)?;
        let output = self.model.forward(input.tensor.view())?;
        let losses = loss::feature_losses(&output, target)?;

        Ok((losses, output))
    }

    fn infer<I>(&mut self, batches: I, decode: bool) -> Result<Inference>
    where
        I: IntoIterator<Item = Frame>,
    {
        let registry = self.fitted_registry()?;
        let features = registry.features().len();
        let empty = FeatureLosses {
            numeric: Array2::zeros((0, registry.numeric_count())),
            binary: Array2::zeros((0, registry.binary_count())),
            categorical: Array2::zeros((0, registry.cardinalities().len())),
        };

        let mut parts = vec![empty];
        let mut predictions = vec![Vec::new(); features];

        for frame in batches {
            let registry = self.fitted_registry()?;
            let target = preprocessing::prepare(registry, &frame)?;
            let (losses, output) = self.reconstruct(&target)?;

            if decode {
                let registry = self.fitted_registry()?;
                let decoded = encoding::decode_values(registry, &output)?;
                for (column, values) in predictions.iter_mut().zip(decoded) {
                    column.extend(values);
                }
            }

            parts.push(losses);
        }

        Ok(Inference {
            losses: FeatureLosses::stack(&parts)?,
            predictions,
        })
    }

    /// Computes the reconstruction loss of every cell of `frame`, batched by `eval_batch_size`.
    ///
    /// The input is not corrupted.
    ///
    /// # Returns
    /// A `NotFitted` error before the first `fit`, or a tabular error if a registered column is
    /// missing from `frame`.
    pub fn score(&mut self, frame: &Frame) -> Result<FeatureLosses> {
        let batches = frame_batches(frame, self.config.eval_batch_size);
        Ok(self.infer(batches, false)?.losses)
    }

    /// Turns raw losses into z-scores with the collected loss statistics.
    ///
    /// # Returns
    /// A `NotFitted` error if the statistics were never collected.
    pub fn scale_losses(&self, losses: &FeatureLosses) -> Result<FeatureLosses> {
        let stats = self.loss_stats.as_ref().ok_or(AutoEncoderErr::NotFitted)?;
        stats.scale(self.fitted_registry()?, losses)
    }

    /// The mean raw loss of every row of `frame`, higher is more anomalous.
    pub fn anomaly_score(&mut self, frame: &Frame) -> Result<Vec<f32>> {
        Ok(self.score(frame)?.row_means().to_vec())
    }

    /// Scores `frame` into a results table.
    ///
    /// For every feature, in registry order, the table holds the original column `{feature}`,
    /// the reconstruction `{feature}_pred`, the raw loss `{feature}_loss` and the scaled loss
    /// `{feature}_z_loss`. It ends with `max_abs_z` and `mean_abs_z`, the row maximum and mean
    /// of the scaled losses, and `z_loss_scaler_type`, the tag of the loss scaler.
    ///
    /// # Arguments
    /// * `frame` - The rows to score.
    /// * `return_abs` - Whether every `{feature}_z_loss` column, and with them the row aggregates,
    ///   hold the absolute value of the scaled losses.
    ///
    /// # Returns
    /// A `NotFitted` error if the loss statistics were never collected.
    pub fn results(&mut self, frame: &Frame, return_abs: bool) -> Result<Frame> {
        let batches = frame_batches(frame, self.config.eval_batch_size);
        let inference = self.scored(batches)?;
        self.results_table(frame, inference, return_abs)
    }

    /// Like `results`, scoring the batches of `dataset` and copying the original columns from
    /// `preloaded`, which must hold the same rows in the same order.
    pub fn results_from_dataset(
        &mut self,
        dataset: &FrameDataset,
        preloaded: &Frame,
        return_abs: bool,
    ) -> Result<Frame> {
        if dataset.rows() != preloaded.nrows() {
            return Err(AutoEncoderErr::InvalidArgument(format!(
                "the dataset has {} rows but the preloaded frame has {}",
                dataset.rows(),
                preloaded.nrows()
            )));
        }

        let batches = (0..dataset.len()).map_while(|i| dataset.batch(i));
        let inference = self.scored(batches)?;
        self.results_table(preloaded, inference, return_abs)
    }

    fn scored<I>(&mut self, batches: I) -> Result<Inference>
    where
        I: IntoIterator<Item = Frame>,
    {
        if self.loss_stats.is_none() {
            return Err(AutoEncoderErr::NotFitted);
        }

        self.infer(batches, true)
    }

    fn results_table(&self, original: &Frame, inference: Inference, return_abs: bool) -> Result<Frame> {
        let registry = self.fitted_registry()?;
        let Inference { losses, predictions } = inference;

        let raw = losses.combined();
        let mut z = self.scale_losses(&losses)?.combined();
        if return_abs {
            z.mapv_inplace(f32::abs);
        }

        let mut results = Frame::new();
        for (j, (feature, predicted)) in registry.features().iter().zip(predictions).enumerate() {
            let name = &feature.name;
            let to_column = |values: ndarray::ArrayView1<f32>| {
                Column::Float(values.iter().map(|&l| Some(l as f64)).collect())
            };

            results.push(name.clone(), original.require(name)?.clone())?;
            results.push(format!("{name}_pred"), Column::from_values(&predicted))?;
            results.push(format!("{name}_loss"), to_column(raw.column(j)))?;
            results.push(format!("{name}_z_loss"), to_column(z.column(j)))?;
        }

        let rows = z.nrows();
        let max_z: Vec<Option<f64>> = z
            .axis_iter(Axis(0))
            .map(|row| row.iter().copied().reduce(f32::max).map(f64::from))
            .collect();
        let mean_z: Vec<Option<f64>> = z
            .mean_axis(Axis(1))
            .map(|m| m.iter().map(|&x| Some(x as f64)).collect::<Vec<_>>())
            .unwrap_or_else(|| vec![None; rows]);

        let tag = self
            .loss_stats
            .as_ref()
            .map(|stats| stats.kind().tag())
            .ok_or(AutoEncoderErr::NotFitted)?;

        results.push("max_abs_z", Column::Float(max_z))?;
        results.push("mean_abs_z", Column::Float(mean_z))?;
        results.push("z_loss_scaler_type", Column::Str(vec![Some(tag); rows]))?;

        debug!(rows = rows, columns = results.ncols(); "results computed");
        Ok(results)
    }
}
