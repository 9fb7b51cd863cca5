//! Conversion between scaled frames and the model's tensors.

use machine_learning::arch::{Model, ModelOutput};
use ndarray::{Array2, ArrayView1, Axis, concatenate};
use tabular::{Column, FeatureRegistry, FeatureSpec, Frame, ScaledFrame, Value};

use crate::{AutoEncoderErr, Result};

/// A model input together with the categorical codes embedded into it.
///
/// The codes travel with the tensor so the model can route the gradient of the embedded columns
/// back into its embedding tables.
#[derive(Clone, Debug)]
pub struct EncodedInput {
    pub tensor: Array2<f32>,
    pub codes: Vec<Vec<usize>>,
}

/// Builds the model input of a scaled frame.
///
/// The numeric columns, the binary columns and the embedding of every categorical column are
/// concatenated along the feature axis, in registry order.
pub fn encode<M: Model + ?Sized>(model: &M, frame: &ScaledFrame) -> Result<EncodedInput> {
    let embeddings = frame
        .categorical
        .iter()
        .enumerate()
        .map(|(i, codes)| model.embed(i, codes))
        .collect::<machine_learning::Result<Vec<_>>>()?;

    let mut views = vec![frame.numeric.view(), frame.binary.view()];
    views.extend(embeddings.iter().map(|e| e.view()));

    let tensor = concatenate(Axis(1), &views).map_err(machine_learning::MlErr::from)?;

    Ok(EncodedInput {
        tensor,
        codes: frame.categorical.clone(),
    })
}

/// Decodes a model output into one vector of cells per registered feature, in registry order.
///
/// Numeric predictions go through the inverse of their scaler, binary ones are rounded and
/// mapped to their labels, categorical ones take the arg-max class. The `_other` class is only
/// predicted for columns without any retained category.
pub fn decode_values(registry: &FeatureRegistry, output: &ModelOutput) -> Result<Vec<Vec<Value>>> {
    check_widths(registry, output)?;

    let numeric = registry.numeric().enumerate().map(|(j, feature)| -> Result<Vec<Value>> {
        let values = output
            .numeric
            .column(j)
            .iter()
            .map(|&z| feature.spec.unscale(z as f64).map(Value::Float))
            .collect::<tabular::Result<Vec<_>>>()?;

        Ok(values)
    });

    let binary = registry.binary().enumerate().map(|(j, feature)| -> Result<Vec<Value>> {
        Ok(output
            .binary
            .column(j)
            .iter()
            .map(|&p| feature.spec.binary_label(p.round() >= 1.))
            .collect())
    });

    let categorical = registry.categorical().enumerate().map(|(i, feature)| -> Result<Vec<Value>> {
        let logits = output.categorical.get(i).ok_or_else(|| {
            AutoEncoderErr::InvalidArgument(format!("no output for categorical column {i}"))
        })?;

        Ok(logits
            .axis_iter(Axis(0))
            .map(|row| feature.spec.category_label(predicted_class(&feature.spec, row)))
            .collect())
    });

    numeric.chain(binary).chain(categorical).collect()
}

/// Decodes a model output into a frame with one column per registered feature.
pub fn decode(registry: &FeatureRegistry, output: &ModelOutput) -> Result<Frame> {
    let values = decode_values(registry, output)?;

    let frame = Frame::from_columns(
        registry
            .features()
            .iter()
            .zip(values)
            .map(|(feature, values)| (feature.name.clone(), Column::from_values(&values))),
    )?;

    Ok(frame)
}

fn predicted_class(spec: &FeatureSpec, logits: ArrayView1<f32>) -> usize {
    let candidates = match spec.cardinality() {
        0 | 1 => logits.len(),
        n => n - 1,
    };

    logits
        .iter()
        .take(candidates)
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

fn check_widths(registry: &FeatureRegistry, output: &ModelOutput) -> Result<()> {
    let numeric = registry.numeric_count();
    let binary = registry.binary_count();
    let categorical = registry.cardinalities().len();

    if output.numeric.ncols() != numeric
        || output.binary.ncols() != binary
        || output.categorical.len() != categorical
    {
        return Err(AutoEncoderErr::InvalidArgument(format!(
            "output of widths ({}, {}, {}) does not match the registry ({numeric}, {binary}, \
             {categorical})",
            output.numeric.ncols(),
            output.binary.ncols(),
            output.categorical.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::{FeatureLayout, FeedForwardAutoEncoder, embedding_dim};
    use ndarray::array;
    use tabular::{OTHER, RegistryBuilder};

    use super::*;

    fn registry() -> FeatureRegistry {
        let cats: Vec<&str> = ["a", "b"].repeat(10);
        let frame = Frame::from_columns([
            ("x", Column::from((0..20).map(f64::from).collect::<Vec<_>>())),
            ("flag", Column::from(vec![true; 20])),
            ("cat", Column::from(cats)),
            ("rare", Column::from((0..20).map(|i| format!("z{i}")).collect::<Vec<_>>())),
        ])
        .unwrap();

        RegistryBuilder::new().build(Some(&frame)).unwrap()
    }

    #[test]
    fn argmax_skips_other_when_categories_exist() {
        let registry = registry();
        // "rare" has no retained category, only `_other`
        assert_eq!(registry.cardinalities(), [3, 1]);

        let output = ModelOutput {
            numeric: array![[0.]],
            binary: array![[0.7]],
            categorical: vec![array![[0.1, 0.2, 9.]], array![[3.]]],
        };
        let decoded = decode(&registry, &output).unwrap();

        assert_eq!(decoded.require("flag").unwrap().get(0), Value::Bool(true));
        assert_eq!(decoded.require("cat").unwrap().get(0), Value::from("b"));
        assert_eq!(decoded.require("rare").unwrap().get(0), Value::from(OTHER));

        // A zero prediction decodes to the column mean under the standard scaler.
        let x = decoded.require("x").unwrap().get(0).as_f64().unwrap();
        assert!((x - 9.5).abs() < 1e-4);
    }

    #[test]
    fn encodes_numeric_binary_then_embeddings() {
        let mut model = FeedForwardAutoEncoder::default();
        model.build(&FeatureLayout::new(1, 1, vec![3, 1])).unwrap();

        let frame = ScaledFrame {
            numeric: array![[0.5], [-1.]],
            binary: array![[1.], [0.]],
            categorical: vec![vec![0, 2], vec![0, 0]],
        };
        let input = encode(&model, &frame).unwrap();

        let width = 2 + embedding_dim(3) + embedding_dim(1);
        assert_eq!(input.tensor.dim(), (2, width));
        assert_eq!(input.tensor.column(0).to_vec(), [0.5, -1.]);
        assert_eq!(input.tensor.column(1).to_vec(), [1., 0.]);
        assert_eq!(input.codes, frame.categorical);
    }

    #[test]
    fn mismatched_output_is_rejected() {
        let output = ModelOutput {
            numeric: array![[0., 0.]],
            binary: array![[0.]],
            categorical: vec![],
        };

        assert!(matches!(
            decode(&registry(), &output),
            Err(AutoEncoderErr::InvalidArgument(_))
        ));
    }
}
