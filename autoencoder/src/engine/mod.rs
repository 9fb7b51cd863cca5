//! The training orchestrator and anomaly scorer.

mod score;
mod stats;
mod train;

use std::sync::Arc;

use machine_learning::{
    arch::{FeedForwardAutoEncoder, Model},
    optimization::{ExponentialDecay, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};
use tabular::{FeatureRegistry, SwapNoise};

pub use stats::LossStats;

use crate::{
    AutoEncoderErr, Result,
    config::AutoEncoderConfig,
    data::TrainData,
    distributed::{Collective, GradientSync},
    logging::Logger,
};

/// Where an `AutoEncoder` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unbuilt,
    /// The features are fitted and the model is built.
    Built,
    Training {
        epoch: usize,
    },
    EarlyStopped {
        epoch: usize,
    },
    Completed,
    /// The loss statistics are collected, scoring is available.
    StatsCollected,
}

/// The arguments of `AutoEncoder::fit`.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub val_data: Option<TrainData>,
    /// Compute the validation loss after every epoch, which enables early stopping.
    pub run_validation: bool,
    /// Calibrate the loss statistics on the validation data instead of the training data.
    pub use_val_for_loss_stats: bool,
    /// Required in distributed mode, forbidden otherwise.
    pub rank: Option<usize>,
    /// Required in distributed mode, forbidden otherwise.
    pub world_size: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            val_data: None,
            run_validation: false,
            use_val_for_loss_stats: false,
            rank: None,
            world_size: None,
        }
    }
}

/// A denoising autoencoder over tabular data that scores how anomalous rows are.
///
/// `fit` learns the features of the training data, trains the model to undo swap noise and
/// calibrates one loss scaler per feature. The scoring methods then reconstruct uncorrupted rows
/// and report per feature losses and their z-scores.
pub struct AutoEncoder<M: Model = FeedForwardAutoEncoder> {
    config: AutoEncoderConfig,
    model: M,
    registry: Option<FeatureRegistry>,
    optimizer: Option<Box<dyn Optimizer + Send>>,
    schedule: Option<ExponentialDecay>,
    logger: Logger,
    collective: Option<Arc<dyn Collective>>,
    sync: Option<GradientSync>,
    noise: SwapNoise,
    rng: StdRng,
    loss_stats: Option<LossStats>,
    phase: Phase,
}

impl AutoEncoder<FeedForwardAutoEncoder> {
    /// Creates a new centralized `AutoEncoder` with a `FeedForwardAutoEncoder` shaped by the
    /// configuration.
    pub fn from_config(config: AutoEncoderConfig) -> Result<Self> {
        let model = FeedForwardAutoEncoder::new(config.model.shape(config.seed));
        Self::new(config, model, None)
    }
}

impl<M: Model> AutoEncoder<M> {
    /// Creates a new unbuilt `AutoEncoder`.
    ///
    /// # Arguments
    /// * `config` - The engine's options.
    /// * `model` - An unbuilt model, built on the first `fit`.
    /// * `collective` - The process group, required exactly when `config.distributed_training`.
    ///
    /// # Returns
    /// A `Configuration` error if the options are out of range or the collective doesn't match
    /// the mode.
    pub fn new(
        config: AutoEncoderConfig,
        model: M,
        collective: Option<Arc<dyn Collective>>,
    ) -> Result<Self> {
        config.validate()?;

        match (config.distributed_training, &collective) {
            (true, None) => {
                return Err(AutoEncoderErr::Configuration(
                    "distributed training needs a collective".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(AutoEncoderErr::Configuration(
                    "a collective was given but distributed training is disabled".to_string(),
                ));
            }
            _ => {}
        }

        let logger = Logger::from_spec(&config.logger)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            noise: SwapNoise::new(config.swap_p),
            config,
            model,
            registry: None,
            optimizer: None,
            schedule: None,
            logger,
            collective,
            sync: None,
            rng,
            loss_stats: None,
            phase: Phase::Unbuilt,
        })
    }

    pub fn config(&self) -> &AutoEncoderConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The fitted features, `None` before the first `fit`.
    pub fn registry(&self) -> Option<&FeatureRegistry> {
        self.registry.as_ref()
    }

    pub fn loss_stats(&self) -> Option<&LossStats> {
        self.loss_stats.as_ref()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The current learning rate, `None` before the model is built.
    pub fn learning_rate(&self) -> Option<f32> {
        self.optimizer.as_ref().map(|o| o.learning_rate())
    }

    fn fitted_registry(&self) -> Result<&FeatureRegistry> {
        self.registry.as_ref().ok_or(AutoEncoderErr::NotFitted)
    }
}
