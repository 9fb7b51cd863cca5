use log::{debug, info, warn};
use machine_learning::arch::{FeatureLayout, Model};
use tabular::Frame;

use super::{AutoEncoder, FitOptions, LossStats, Phase};
use crate::{
    AutoEncoderErr, Result,
    data::{BatchSource, Batches, TrainData},
    distributed::{EarlyStopping, GradientSync, synchronize_stop},
    logging::{LossLogger, StepKind},
    loss::{self, FeatureLosses},
    preprocessing::{self, BatchMode},
};

impl<M: Model> AutoEncoder<M> {
    /// Trains the model and collects the loss statistics.
    ///
    /// On the first call the features are fitted on the training data, unless fully preset, and
    /// the model is built for them. Every epoch trains on all of the batches of `train`, then
    /// optionally validates and decides on early stopping. Finally rank 0 makes one pass over
    /// the calibration data to fit the loss statistics.
    ///
    /// # Arguments
    /// * `train` - The training data.
    /// * `options` - Epochs, validation data and the distributed rank.
    ///
    /// # Returns
    /// An `InvalidArgument` error if the rank and world size contradict the mode or validation is
    /// requested without validation data. Errors of any step are fatal and returned as is.
    pub fn fit(&mut self, train: TrainData, options: FitOptions) -> Result<()> {
        let (rank, world_size) = self.check_fit_arguments(&options)?;

        if self.phase == Phase::Unbuilt {
            self.build(train.frame(), rank)?;
        }

        let FitOptions {
            epochs,
            val_data,
            run_validation,
            use_val_for_loss_stats,
            ..
        } = options;

        let train = train.into_batches(self.config.batch_size, BatchMode::Training);
        let val = val_data.map(|v| v.into_batches(self.config.eval_batch_size, BatchMode::Validation));

        debug!(rank = rank, world_size = world_size, epochs = epochs; "fitting");
        self.fit_data(train, val, epochs, run_validation, use_val_for_loss_stats, rank)
    }

    fn check_fit_arguments(&self, options: &FitOptions) -> Result<(usize, usize)> {
        let invalid = |msg: &str| Err(AutoEncoderErr::InvalidArgument(msg.to_string()));

        let (rank, world_size) = match (self.config.distributed_training, options.rank, options.world_size) {
            (true, Some(rank), Some(world_size)) => (rank, world_size),
            (true, _, _) => {
                return invalid("rank and world_size must be provided for distributed training");
            }
            (false, None, None) => (0, 1),
            (false, _, _) => return invalid("rank and world_size must be None for centralized training"),
        };

        if let Some(collective) = &self.collective
            && (collective.rank() != rank || collective.world_size() != world_size)
        {
            return Err(AutoEncoderErr::InvalidArgument(format!(
                "rank {rank} of {world_size} does not match the collective's rank {} of {}",
                collective.rank(),
                collective.world_size()
            )));
        }

        if options.run_validation && options.val_data.is_none() {
            return invalid("run_validation is set but no val_data was provided");
        }
        if options.use_val_for_loss_stats && options.val_data.is_none() {
            return invalid("use_val_for_loss_stats is set but no val_data was provided");
        }

        Ok((rank, world_size))
    }

    fn build(&mut self, frame: &Frame, rank: usize) -> Result<()> {
        let registry = self.config.registry_builder().build(Some(frame))?;
        let layout = FeatureLayout::new(
            registry.numeric_count(),
            registry.binary_count(),
            registry.cardinalities(),
        );

        self.model.build(&layout)?;
        self.optimizer = Some(self.config.optimizer.build(self.model.size(), self.config.lr));
        self.schedule = self.config.lr_schedule();

        if self.config.distributed_training {
            let sync = GradientSync::new(&self.model.param_groups(), &layout);
            if let Some(collective) = &self.collective {
                let (params, _) = self.model.parameters();
                sync.broadcast_params(collective.as_ref(), params)?;
            }
            self.sync = Some(sync);
        }

        info!(
            rank = rank,
            features = registry.features().len(),
            params = self.model.size();
            "autoencoder built"
        );

        self.registry = Some(registry);
        self.phase = Phase::Built;
        Ok(())
    }

    fn fit_data(
        &mut self,
        mut train: Batches,
        val: Option<Batches>,
        epochs: usize,
        run_validation: bool,
        use_val_for_loss_stats: bool,
        rank: usize,
    ) -> Result<()> {
        let prefix = if self.config.distributed_training {
            format!("[rank {rank}] ")
        } else {
            String::new()
        };

        let is_main = rank == 0;
        let validation = val.as_ref().filter(|_| run_validation);

        if self.config.patience > 0 && validation.is_none() {
            warn!(
                "{prefix}not going to early stop: patience is {} but validation is disabled",
                self.config.patience
            );
        }

        if is_main && let Some(val) = validation {
            let baseline = self.baseline_loss(val)?;
            self.logger.set_baseline(baseline);
            debug!("{prefix}baseline loss: {baseline:.4}");
        }

        let mut early_stopping = EarlyStopping::new(self.config.patience);
        let mut stopped = false;

        for epoch in 0..epochs {
            self.phase = Phase::Training { epoch };
            debug!("{prefix}training epoch {}", epoch + 1);

            train.set_epoch(epoch);
            let mode = train.mode();

            let (mut loss_sum, mut steps) = (0., 0);
            for i in 0..train.len() {
                let Some(frame) = train.batch(i) else {
                    break;
                };

                loss_sum += self.fit_batch(&frame, mode, epoch)?;
                steps += 1;
            }
            debug!(
                epoch = epoch + 1,
                loss = loss_sum / steps.max(1) as f32;
                "{prefix}epoch trained"
            );

            if let (Some(schedule), Some(optimizer)) = (&mut self.schedule, &mut self.optimizer) {
                let lr = schedule.step(optimizer.as_mut());
                debug!(lr = lr; "{prefix}learning rate decayed");
            }

            let mut should_stop = false;
            if is_main && let Some(val) = validation {
                let loss = self.validate(val)?;
                should_stop = early_stopping.observe(loss);
                debug!(
                    loss = loss,
                    count = early_stopping.count();
                    "{prefix}validated"
                );
            }

            self.logger.end_epoch()?;

            if self.config.distributed_training
                && let Some(collective) = &self.collective
            {
                should_stop = synchronize_stop(collective.as_ref(), should_stop)?;
                debug!("{prefix}synced early stopping state: {should_stop}");
            }

            if should_stop {
                info!("{prefix}early stopped after epoch {}", epoch + 1);
                self.phase = Phase::EarlyStopped { epoch };
                stopped = true;
                break;
            }
        }

        if !stopped {
            self.phase = Phase::Completed;
        }

        if is_main {
            let calibration = match val {
                Some(val) if use_val_for_loss_stats => val,
                _ => Batches::Dataset(train.into_validation()),
            };

            self.populate_loss_stats(&calibration)?;
            self.phase = Phase::StatsCollected;
        }

        Ok(())
    }

    /// One optimizer step on a batch.
    ///
    /// # Returns
    /// The batch's net loss.
    fn fit_batch(&mut self, frame: &Frame, mode: BatchMode, epoch: usize) -> Result<f32> {
        let registry = self.registry.as_ref().ok_or(AutoEncoderErr::NotFitted)?;
        let batch =
            preprocessing::build_batch(registry, &self.model, &self.noise, frame, mode, &mut self.rng)?;

        let output = self.model.forward(batch.input_swapped.tensor.view())?;
        let breakdown = loss::feature_losses(&output, &batch.target)?.breakdown();

        let objective = breakdown.objective();
        if !objective.is_finite() {
            return Err(AutoEncoderErr::NonFiniteLoss {
                epoch,
                loss: objective,
            });
        }
        self.logger.record_step(StepKind::Training, &breakdown.units());

        let grad = loss::gradient(&output, &batch.target)?;
        self.model.backward(grad, &batch.input_swapped.codes)?;

        let (params, grads) = self.model.parameters();
        if let (Some(sync), Some(collective)) = (&self.sync, &self.collective) {
            sync.apply(collective.as_ref(), grads)?;
        }

        let optimizer = self.optimizer.as_mut().ok_or(AutoEncoderErr::NotFitted)?;
        optimizer.update_params(grads, params)?;
        self.model.zero_grad();

        Ok(breakdown.net_loss())
    }

    /// The loss of echoing the corrupted validation input.
    ///
    /// Every batch contributes its net loss once, the sum is then divided by the validation rows.
    fn baseline_loss(&mut self, val: &Batches) -> Result<f32> {
        let (mut loss_sum, mut rows) = (0., 0);

        for i in 0..val.len() {
            let Some(frame) = val.batch(i) else {
                break;
            };

            let registry = self.registry.as_ref().ok_or(AutoEncoderErr::NotFitted)?;
            let batch = preprocessing::build_batch(
                registry,
                &self.model,
                &self.noise,
                &frame,
                BatchMode::Validation,
                &mut self.rng,
            )?;

            let swapped = batch.swapped.as_ref().ok_or_else(|| {
                AutoEncoderErr::InvalidArgument("validation batch without swapped input".to_string())
            })?;
            let output = loss::baseline_output(swapped, &registry.cardinalities());
            let net = loss::feature_losses(&output, &batch.target)?.breakdown().net_loss();

            loss_sum += net;
            rows += batch.size;
        }

        Ok(loss_sum / rows.max(1) as f32)
    }

    /// Runs a validation pass, logging the losses of both the uncorrupted and the corrupted
    /// input.
    ///
    /// # Returns
    /// The mean loss over the uncorrupted input.
    fn validate(&mut self, val: &Batches) -> Result<f32> {
        let (mut id_losses, mut swapped_losses) = (Vec::new(), Vec::new());

        for i in 0..val.len() {
            let Some(frame) = val.batch(i) else {
                break;
            };

            let registry = self.registry.as_ref().ok_or(AutoEncoderErr::NotFitted)?;
            let batch = preprocessing::build_batch(
                registry,
                &self.model,
                &self.noise,
                &frame,
                BatchMode::Validation,
                &mut self.rng,
            )?;

            if let Some(original) = &batch.input_original {
                let output = self.model.forward(original.tensor.view())?;
                let breakdown = loss::feature_losses(&output, &batch.target)?.breakdown();
                self.logger.record_step(StepKind::IdentityValidation, &breakdown.units());
                id_losses.push(breakdown.net_loss());
            }

            let output = self.model.forward(batch.input_swapped.tensor.view())?;
            let breakdown = loss::feature_losses(&output, &batch.target)?.breakdown();
            self.logger.record_step(StepKind::Validation, &breakdown.units());
            swapped_losses.push(breakdown.net_loss());
        }

        let mean = |xs: &[f32]| xs.iter().sum::<f32>() / xs.len().max(1) as f32;
        let (id_loss, swapped_loss) = (mean(&id_losses), mean(&swapped_losses));
        debug!(swapped = swapped_loss, original = id_loss; "validation losses");

        Ok(id_loss)
    }

    /// Fits the loss statistics on every row of `source`, reconstructed without corruption.
    fn populate_loss_stats(&mut self, source: &Batches) -> Result<()> {
        let mut parts = Vec::new();

        for i in 0..source.len() {
            let Some(frame) = source.batch(i) else {
                break;
            };

            let registry = self.registry.as_ref().ok_or(AutoEncoderErr::NotFitted)?;
            let target = preprocessing::prepare(registry, &frame)?;
            let (losses, _) = self.reconstruct(&target)?;
            parts.push(losses);
        }

        if parts.is_empty() {
            return Err(AutoEncoderErr::InvalidArgument(
                "no rows to collect the loss statistics on".to_string(),
            ));
        }

        let losses = FeatureLosses::stack(&parts)?;
        let registry = self.fitted_registry()?;
        let stats = LossStats::fit(self.config.loss_scaler, registry, &losses)?;

        info!(rows = losses.rows(), scaler = stats.kind().name(); "loss statistics collected");
        self.loss_stats = Some(stats);
        Ok(())
    }
}
