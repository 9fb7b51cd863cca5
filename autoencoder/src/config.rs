use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path, path::PathBuf};

use machine_learning::{
    arch::{AutoEncoderShape, activations::ActFn},
    optimization::{Adam, ExponentialDecay, Optimizer, Sgd},
};
use serde::{Deserialize, Serialize};
use tabular::{NumericPreset, NumericScaling, RegistryBuilder, ScalerKind};

use crate::{AutoEncoderErr, Result};

const ADAM_EPSILON: f32 = 1e-8;

fn default_betas() -> (f32, f32) {
    (0.9, 0.999)
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        #[serde(default = "default_betas")]
        betas: (f32, f32),
        #[serde(default)]
        amsgrad: bool,
        #[serde(default)]
        weight_decay: f32,
    },
    Sgd {
        #[serde(default)]
        momentum: f32,
        #[serde(default)]
        dampening: f32,
        #[serde(default)]
        nesterov: bool,
        #[serde(default)]
        weight_decay: f32,
    },
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec::Adam {
            betas: default_betas(),
            amsgrad: false,
            weight_decay: 0.,
        }
    }
}

impl OptimizerSpec {
    /// Builds the optimizer for a model of `len` parameters.
    pub fn build(&self, len: usize, learning_rate: f32) -> Box<dyn Optimizer + Send> {
        match *self {
            OptimizerSpec::Adam {
                betas: (b1, b2),
                amsgrad,
                weight_decay,
            } => Box::new(
                Adam::new(len, learning_rate, b1, b2, ADAM_EPSILON)
                    .with_amsgrad(amsgrad)
                    .with_weight_decay(weight_decay),
            ),
            OptimizerSpec::Sgd {
                momentum,
                dampening,
                nesterov,
                weight_decay,
            } => Box::new(
                Sgd::new(len, learning_rate)
                    .with_momentum(momentum, dampening, nesterov)
                    .with_weight_decay(weight_decay),
            ),
        }
    }
}

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
}

impl From<ActFnSpec> for ActFn {
    fn from(value: ActFnSpec) -> Self {
        match value {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Tanh => ActFn::tanh(),
            ActFnSpec::Sigmoid => ActFn::sigmoid(1.),
        }
    }
}

/// The specification for the `FeedForwardAutoEncoder`'s shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ModelSpec {
    /// `None` means three layers four times as wide as the encoded input.
    pub encoder_layers: Option<Vec<usize>>,
    pub decoder_layers: Vec<usize>,
    pub activation: ActFnSpec,
}

impl ModelSpec {
    pub fn shape(&self, seed: Option<u64>) -> AutoEncoderShape {
        AutoEncoderShape {
            encoder_layers: self.encoder_layers.clone(),
            decoder_layers: self.decoder_layers.clone(),
            activation: self.activation.into(),
            seed,
        }
    }
}

/// The specification for the `Logger` enum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggerSpec {
    /// Keeps the loss history in memory.
    #[default]
    Basic,
    /// Reports every epoch through the `log` facade.
    Console,
    /// Appends one JSON object per epoch to a file.
    Metrics { path: PathBuf },
}

/// Everything needed to construct an `AutoEncoder`.
///
/// Every field has a default, so a configuration file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AutoEncoderConfig {
    pub optimizer: OptimizerSpec,
    pub lr: f32,
    /// The per epoch decay factor of the learning rate, `None` keeps it constant.
    pub lr_decay: Option<f32>,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    /// The probability of swapping every cell while training.
    pub swap_p: f64,
    pub min_cats: usize,
    /// Epochs without improvement tolerated before stopping, `0` disables early stopping.
    pub patience: usize,
    pub distributed_training: bool,
    pub logger: LoggerSpec,
    pub scaler: NumericScaling,
    pub loss_scaler: ScalerKind,
    pub binary_feature_list: Option<Vec<String>>,
    pub preset_cats: Option<BTreeMap<String, Vec<String>>>,
    pub preset_numerical_scaler_params: Option<BTreeMap<String, NumericPreset>>,
    pub seed: Option<u64>,
    pub model: ModelSpec,
}

impl Default for AutoEncoderConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerSpec::default(),
            lr: 0.01,
            lr_decay: None,
            batch_size: 256,
            eval_batch_size: 1024,
            swap_p: 0.15,
            min_cats: tabular::registry::DEFAULT_MIN_CATS,
            patience: 5,
            distributed_training: false,
            logger: LoggerSpec::default(),
            scaler: NumericScaling::default(),
            loss_scaler: ScalerKind::Standard,
            binary_feature_list: None,
            preset_cats: None,
            preset_numerical_scaler_params: None,
            seed: None,
            model: ModelSpec::default(),
        }
    }
}

impl AutoEncoderConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Checks the ranges of the numeric options.
    ///
    /// # Returns
    /// A `Configuration` error naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        let err = |msg: &str| Err(AutoEncoderErr::Configuration(msg.to_string()));

        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return err("batch sizes must be positive");
        }
        if !(0. ..=1.).contains(&self.swap_p) {
            return err("swap_p must be in [0, 1]");
        }
        if !self.lr.is_finite() || self.lr <= 0. {
            return err("lr must be positive");
        }
        if self.lr_decay.is_some_and(|g| !g.is_finite() || g <= 0.) {
            return err("lr_decay must be positive");
        }

        Ok(())
    }

    /// The registry builder carrying this configuration's scaling options and presets.
    pub fn registry_builder(&self) -> RegistryBuilder {
        let mut builder = RegistryBuilder::new()
            .min_cats(self.min_cats)
            .scaling(self.scaler.clone());

        if let Some(names) = &self.binary_feature_list {
            builder = builder.binary_features(names.clone());
        }
        if let Some(cats) = &self.preset_cats {
            builder = builder.preset_categories(cats.clone());
        }
        if let Some(numeric) = &self.preset_numerical_scaler_params {
            builder = builder.preset_numeric(numeric.clone());
        }

        builder
    }

    pub fn lr_schedule(&self) -> Option<ExponentialDecay> {
        self.lr_decay.map(|gamma| ExponentialDecay::new(self.lr, gamma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: AutoEncoderConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, AutoEncoderConfig::default());
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.swap_p, 0.15);
        assert_eq!(config.scaler, NumericScaling::Uniform(ScalerKind::Standard));
    }

    #[test]
    fn parses_nested_specs() {
        let json = r#"{
            "optimizer": { "sgd": { "momentum": 0.9, "nesterov": true } },
            "scaler": { "amount": "modified" },
            "loss_scaler": "gauss_rank",
            "logger": { "metrics": { "path": "losses.jsonl" } },
            "model": { "encoder_layers": [8, 4], "activation": "tanh" }
        }"#;
        let config: AutoEncoderConfig = serde_json::from_str(json).unwrap();

        assert!(matches!(
            config.optimizer,
            OptimizerSpec::Sgd { nesterov: true, .. }
        ));
        assert_eq!(
            config.scaler,
            NumericScaling::PerColumn([("amount".to_string(), ScalerKind::Modified)].into())
        );
        assert_eq!(config.loss_scaler, ScalerKind::GaussRank);
        assert_eq!(
            config.logger,
            LoggerSpec::Metrics {
                path: "losses.jsonl".into()
            }
        );
        assert_eq!(config.model.encoder_layers, Some(vec![8, 4]));
        assert_eq!(config.lr, 0.01);
    }

    #[test]
    fn validate_rejects_out_of_range_options() {
        let mut config = AutoEncoderConfig {
            swap_p: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AutoEncoderErr::Configuration(_))
        ));

        config.swap_p = 0.;
        config.eval_batch_size = 0;
        assert!(config.validate().is_err());

        config.eval_batch_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn optimizers_take_the_learning_rate() {
        let adam = OptimizerSpec::default().build(4, 0.1);
        assert_eq!(adam.learning_rate(), 0.1);

        let sgd = OptimizerSpec::Sgd {
            momentum: 0.,
            dampening: 0.,
            nesterov: false,
            weight_decay: 0.,
        }
        .build(4, 0.5);
        assert_eq!(sgd.learning_rate(), 0.5);
    }
}
