#![allow(dead_code)]

use machine_learning::{
    Result,
    arch::{FeatureLayout, Model, ModelOutput, ParamGroup},
};
use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tabular::{Column, Frame};

use autoencoder::AutoEncoderConfig;

pub const COLORS: [&str; 4] = ["red", "green", "blue", "yellow"];

/// A frame with one numeric, one binary and one categorical column.
pub fn sample_frame(rows: usize, seed: u64) -> Frame {
    let mut rng = StdRng::seed_from_u64(seed);

    let amount: Vec<f64> = (0..rows).map(|_| rng.random_range(10.0..100.0)).collect();
    let flag: Vec<bool> = (0..rows).map(|i| i % 3 == 0).collect();
    let color: Vec<&str> = (0..rows).map(|i| COLORS[i % COLORS.len()]).collect();

    Frame::from_columns([
        ("amount", Column::from(amount)),
        ("flag", Column::from(flag)),
        ("color", Column::from(color)),
    ])
    .unwrap()
}

pub fn small_config() -> AutoEncoderConfig {
    let mut config = AutoEncoderConfig {
        batch_size: 32,
        eval_batch_size: 64,
        patience: 0,
        seed: Some(7),
        ..AutoEncoderConfig::default()
    };
    config.model.encoder_layers = Some(vec![16, 8]);
    config.model.decoder_layers = vec![16];
    config
}

/// A parameterless model that echoes its input back, each categorical column as confident
/// logits of its own class.
///
/// Every `backward` call shifts the numeric head by `drift`, so a positive drift makes the
/// reconstruction worse after every step.
#[derive(Debug, Default)]
pub struct EchoModel {
    layout: Option<FeatureLayout>,
    drift: f32,
    offset: f32,
    params: Vec<f32>,
    grads: Vec<f32>,
}

impl EchoModel {
    pub fn drifting(drift: f32) -> Self {
        Self {
            drift,
            ..Self::default()
        }
    }
}

impl Model for EchoModel {
    fn build(&mut self, layout: &FeatureLayout) -> Result<()> {
        self.layout = Some(layout.clone());
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.layout.is_some()
    }

    fn embed(&self, column: usize, codes: &[usize]) -> Result<Array2<f32>> {
        let cardinality = self.layout.as_ref().unwrap().categorical[column];

        let mut one_hot = Array2::zeros((codes.len(), cardinality));
        for (i, &code) in codes.iter().enumerate() {
            one_hot[[i, code]] = 1.;
        }
        Ok(one_hot)
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<ModelOutput> {
        let layout = self.layout.as_ref().unwrap();
        let (n, b) = (layout.numeric, layout.binary);

        let numeric = x.slice(s![.., ..n]).mapv(|v| v + self.offset);
        let binary = x.slice(s![.., n..n + b]).to_owned();

        let mut start = n + b;
        let mut categorical = Vec::new();
        for &cardinality in &layout.categorical {
            categorical.push(x.slice(s![.., start..start + cardinality]).mapv(|v| v * 5.));
            start += cardinality;
        }
        assert_eq!(start, x.len_of(Axis(1)));

        Ok(ModelOutput {
            numeric,
            binary,
            categorical,
        })
    }

    fn backward(&mut self, _grad: ModelOutput, _codes: &[Vec<usize>]) -> Result<()> {
        self.offset += self.drift;
        Ok(())
    }

    fn parameters(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.params, &mut self.grads)
    }

    fn zero_grad(&mut self) {}

    fn param_groups(&self) -> Vec<ParamGroup> {
        Vec::new()
    }

    fn size(&self) -> usize {
        0
    }
}
