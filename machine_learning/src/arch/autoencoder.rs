use std::ops::Range;

use log::debug;
use ndarray::{Array2, ArrayView2, s};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    FeatureLayout, Model, ModelOutput, ParamGroup,
    activations::ActFn,
    layers::{Dense, Embedding},
};
use crate::{MlErr, Result, initialization::RandParamGen};

const MAX_EMBEDDING_DIM: usize = 600;

/// Returns the embedding width used for a categorical column with `cardinality` classes,
/// `round(1.6 * cardinality^0.56)` capped at 600.
pub fn embedding_dim(cardinality: usize) -> usize {
    let dim = (1.6 * (cardinality as f64).powf(0.56)).round() as usize;
    dim.clamp(1, MAX_EMBEDDING_DIM)
}

/// The hyperparameters of a `FeedForwardAutoEncoder`.
#[derive(Clone, Debug)]
pub struct AutoEncoderShape {
    /// Widths of the encoder layers, `None` means three layers of `4 * input_dim` units.
    pub encoder_layers: Option<Vec<usize>>,
    /// Widths of the decoder layers.
    pub decoder_layers: Vec<usize>,
    /// Activation of every encoder and decoder layer.
    pub activation: ActFn,
    /// Seed for the parameter initialization, `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for AutoEncoderShape {
    fn default() -> Self {
        Self {
            encoder_layers: None,
            decoder_layers: Vec::new(),
            activation: ActFn::relu(),
            seed: None,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot<L> {
    layer: L,
    range: Range<usize>,
}

/// Hands out consecutive ranges of the parameter buffer and records their names.
#[derive(Default)]
struct Allocator {
    offset: usize,
    groups: Vec<ParamGroup>,
}

impl Allocator {
    fn take(&mut self, name: String, size: usize) -> Range<usize> {
        let range = self.offset..self.offset + size;
        self.offset += size;
        self.groups.push(ParamGroup {
            name,
            range: range.clone(),
        });
        range
    }
}

/// A feed forward denoising autoencoder over tabular rows.
///
/// The encoded input (numeric, binary and embedded categorical columns, in that order) goes
/// through the encoder and decoder layers and then into one head per feature type: a linear
/// `numeric_output`, a sigmoid `binary_output` and a linear `categorical_output.{i}` per
/// categorical column producing logits. Heads of feature types without columns are not created.
#[derive(Clone, Debug)]
pub struct FeedForwardAutoEncoder {
    shape: AutoEncoderShape,
    layout: Option<FeatureLayout>,
    input_dim: usize,

    embeddings: Vec<Slot<Embedding>>,
    hidden: Vec<Slot<Dense>>,
    numeric_head: Option<Slot<Dense>>,
    binary_head: Option<Slot<Dense>>,
    categorical_heads: Vec<Slot<Dense>>,

    params: Vec<f32>,
    grad: Vec<f32>,
    groups: Vec<ParamGroup>,
}

impl FeedForwardAutoEncoder {
    /// Creates a new unbuilt `FeedForwardAutoEncoder`.
    ///
    /// # Arguments
    /// * `shape` - The hyperparameters of the network.
    ///
    /// # Returns
    /// A new `FeedForwardAutoEncoder` instance, `Model::build` must be called before using it.
    pub fn new(shape: AutoEncoderShape) -> Self {
        Self {
            shape,
            layout: None,
            input_dim: 0,
            embeddings: Vec::new(),
            hidden: Vec::new(),
            numeric_head: None,
            binary_head: None,
            categorical_heads: Vec::new(),
            params: Vec::new(),
            grad: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// The width of the encoded input, only meaningful once built.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn check_built(&self) -> Result<()> {
        match self.layout {
            Some(_) => Ok(()),
            None => Err(MlErr::NotBuilt),
        }
    }

    fn head_forward(
        slot: Option<&mut Slot<Dense>>,
        params: &[f32],
        h: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        match slot {
            Some(slot) => Ok(slot
                .layer
                .forward(&params[slot.range.clone()], h)?
                .to_owned()),
            None => Ok(Array2::zeros((h.nrows(), 0))),
        }
    }
}

impl Default for FeedForwardAutoEncoder {
    fn default() -> Self {
        Self::new(AutoEncoderShape::default())
    }
}

impl Model for FeedForwardAutoEncoder {
    fn build(&mut self, layout: &FeatureLayout) -> Result<()> {
        if self.layout.is_some() {
            return Err(MlErr::AlreadyBuilt);
        }

        let mut alloc = Allocator::default();

        self.embeddings = layout
            .categorical
            .iter()
            .enumerate()
            .map(|(i, &cardinality)| {
                let layer = Embedding::new(i, cardinality, embedding_dim(cardinality));
                let range = alloc.take(format!("embedding.{i}"), layer.size());
                Slot { layer, range }
            })
            .collect();

        let embedded: usize = self.embeddings.iter().map(|slot| slot.layer.dim()).sum();
        let input_dim = layout.numeric + layout.binary + embedded;
        if input_dim == 0 {
            return Err(MlErr::EmptyLayout);
        }

        let encoder = self
            .shape
            .encoder_layers
            .clone()
            .unwrap_or_else(|| vec![4 * input_dim; 3]);

        let widths = encoder
            .iter()
            .enumerate()
            .map(|(i, &w)| (format!("encoder.{i}"), w))
            .chain(
                self.shape
                    .decoder_layers
                    .iter()
                    .enumerate()
                    .map(|(i, &w)| (format!("decoder.{i}"), w)),
            );

        let mut prev = input_dim;
        self.hidden.clear();
        for (name, width) in widths {
            let layer = Dense::new((prev, width), Some(self.shape.activation.clone()));
            let range = alloc.take(name, layer.size());
            self.hidden.push(Slot { layer, range });
            prev = width;
        }

        let mut head = |name: String, outputs: usize, act_fn: Option<ActFn>| {
            let layer = Dense::new((prev, outputs), act_fn);
            let range = alloc.take(name, layer.size());
            Slot { layer, range }
        };

        self.numeric_head =
            (layout.numeric > 0).then(|| head("numeric_output".into(), layout.numeric, None));
        self.binary_head = (layout.binary > 0).then(|| {
            head(
                "binary_output".into(),
                layout.binary,
                Some(ActFn::sigmoid(1.)),
            )
        });
        self.categorical_heads = layout
            .categorical
            .iter()
            .enumerate()
            .map(|(i, &cardinality)| head(format!("categorical_output.{i}"), cardinality, None))
            .collect();

        let Allocator { offset, groups } = alloc;
        self.params = vec![0.; offset];
        self.grad = vec![0.; offset];

        let mut rng = match self.shape.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let normal = RandParamGen::normal(0., 1.)?;
        for slot in &self.embeddings {
            normal.fill(&mut rng, &mut self.params[slot.range.clone()]);
        }

        let dense = self
            .hidden
            .iter()
            .chain(self.numeric_head.iter())
            .chain(self.binary_head.iter())
            .chain(self.categorical_heads.iter());

        for slot in dense {
            RandParamGen::fan_in_uniform(slot.layer.fan_in())?
                .fill(&mut rng, &mut self.params[slot.range.clone()]);
        }

        debug!(
            input_dim = input_dim,
            params = offset,
            hidden = self.hidden.len();
            "built feed forward autoencoder"
        );

        self.input_dim = input_dim;
        self.groups = groups;
        self.layout = Some(layout.clone());
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.layout.is_some()
    }

    fn embed(&self, column: usize, codes: &[usize]) -> Result<Array2<f32>> {
        self.check_built()?;

        let slot = self
            .embeddings
            .get(column)
            .ok_or(MlErr::ColumnOutOfRange {
                column,
                columns: self.embeddings.len(),
            })?;

        slot.layer.forward(&self.params[slot.range.clone()], codes)
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<ModelOutput> {
        self.check_built()?;

        let mut h = x.to_owned();
        for slot in self.hidden.iter_mut() {
            h = slot
                .layer
                .forward(&self.params[slot.range.clone()], h.view())?
                .to_owned();
        }

        let numeric = Self::head_forward(self.numeric_head.as_mut(), &self.params, h.view())?;
        let binary = Self::head_forward(self.binary_head.as_mut(), &self.params, h.view())?;
        let categorical = self
            .categorical_heads
            .iter_mut()
            .map(|slot| Self::head_forward(Some(slot), &self.params, h.view()))
            .collect::<Result<Vec<_>>>()?;

        Ok(ModelOutput {
            numeric,
            binary,
            categorical,
        })
    }

    fn backward(&mut self, grad: ModelOutput, codes: &[Vec<usize>]) -> Result<()> {
        self.check_built()?;

        if codes.len() != self.embeddings.len() {
            return Err(MlErr::SizeMismatch {
                a: "categorical codes",
                b: "embeddings",
                got: codes.len(),
                expected: self.embeddings.len(),
            });
        }

        if grad.categorical.len() != self.categorical_heads.len() {
            return Err(MlErr::SizeMismatch {
                a: "categorical gradients",
                b: "categorical heads",
                got: grad.categorical.len(),
                expected: self.categorical_heads.len(),
            });
        }

        let last_dim = self
            .hidden
            .last()
            .map_or(self.input_dim, |slot| slot.layer.fan_out());
        let mut d = Array2::<f32>::zeros((grad.rows(), last_dim));

        let ModelOutput {
            numeric,
            binary,
            categorical,
        } = grad;

        let heads = self
            .numeric_head
            .iter_mut()
            .zip([numeric])
            .chain(self.binary_head.iter_mut().zip([binary]))
            .chain(self.categorical_heads.iter_mut().zip(categorical));

        for (slot, g) in heads {
            let range = slot.range.clone();
            d += &slot
                .layer
                .backward(&self.params[range.clone()], &mut self.grad[range], g)?;
        }

        for slot in self.hidden.iter_mut().rev() {
            let range = slot.range.clone();
            d = slot
                .layer
                .backward(&self.params[range.clone()], &mut self.grad[range], d)?;
        }

        let layout = self.layout.as_ref().ok_or(MlErr::NotBuilt)?;
        let mut offset = layout.numeric + layout.binary;
        for (slot, codes) in self.embeddings.iter().zip(codes) {
            let dim = slot.layer.dim();
            slot.layer.backward(
                &mut self.grad[slot.range.clone()],
                codes,
                d.slice(s![.., offset..offset + dim]),
            )?;
            offset += dim;
        }

        Ok(())
    }

    fn parameters(&mut self) -> (&mut [f32], &mut [f32]) {
        (self.params.as_mut_slice(), self.grad.as_mut_slice())
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn param_groups(&self) -> Vec<ParamGroup> {
        self.groups.clone()
    }

    fn size(&self) -> usize {
        self.params.len()
    }
}
