//! Per-column metadata: which columns are numeric, binary or categorical, and how each one is
//! scaled or coded.

mod builder;
mod spec;

use std::collections::HashMap;

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use builder::{DEFAULT_MIN_CATS, NumericPreset, NumericScaling, RegistryBuilder};
pub use spec::{FeatureSpec, OTHER};

use crate::{Frame, Result, ScaledFrame, TabularErr, Value};

/// A named `FeatureSpec`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub spec: FeatureSpec,
}

/// The frozen set of features a model is built for.
///
/// Features are kept grouped by kind, numeric first, then binary, then categorical. This is the
/// column order of every tensor derived from the registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Feature>", into = "Vec<Feature>")]
pub struct FeatureRegistry {
    features: Vec<Feature>,
}

impl From<Vec<Feature>> for FeatureRegistry {
    fn from(mut features: Vec<Feature>) -> Self {
        features.sort_by_key(|f| match f.spec {
            FeatureSpec::Numeric { .. } => 0,
            FeatureSpec::Binary { .. } => 1,
            FeatureSpec::Categorical { .. } => 2,
        });

        Self { features }
    }
}

impl From<FeatureRegistry> for Vec<Feature> {
    fn from(value: FeatureRegistry) -> Self {
        value.features
    }
}

impl FeatureRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.spec)
    }

    pub fn numeric(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.spec.is_numeric())
    }

    pub fn binary(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.spec.is_binary())
    }

    pub fn categorical(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.spec.is_categorical())
    }

    pub fn numeric_count(&self) -> usize {
        self.numeric().count()
    }

    pub fn binary_count(&self) -> usize {
        self.binary().count()
    }

    /// The amount of classes of every categorical column, `_other` included.
    pub fn cardinalities(&self) -> Vec<usize> {
        self.categorical().map(|f| f.spec.cardinality()).collect()
    }

    /// Scales and codes a raw frame.
    ///
    /// Missing numeric cells are filled with the column mean before scaling, binary cells are
    /// `1` only when equal to the true label and categorical cells outside the retained
    /// categories (nulls included) become `_other`.
    ///
    /// # Returns
    /// An error if a registered column is missing from `frame`.
    pub fn transform(&self, frame: &Frame) -> Result<ScaledFrame> {
        let rows = frame.nrows();

        let numeric: Vec<_> = self.numeric().collect();
        let mut num = Array2::zeros((rows, numeric.len()));
        for (j, feature) in numeric.iter().enumerate() {
            let column = frame.require(&feature.name)?;
            if !column.is_numeric() {
                return Err(TabularErr::TypeMismatch {
                    column: feature.name.clone(),
                    expected: "numeric",
                    got: column.dtype(),
                });
            }

            for (i, x) in column.to_f64().into_iter().enumerate() {
                num[[i, j]] = feature.spec.scale(x)? as f32;
            }
        }

        let binary: Vec<_> = self.binary().collect();
        let mut bin = Array2::zeros((rows, binary.len()));
        for (j, feature) in binary.iter().enumerate() {
            let column = frame.require(&feature.name)?;
            for i in 0..rows {
                bin[[i, j]] = if feature.spec.is_true(&column.get(i)) { 1. } else { 0. };
            }
        }

        let categorical = self
            .categorical()
            .map(|feature| -> Result<Vec<usize>> {
                let column = frame.require(&feature.name)?;
                let FeatureSpec::Categorical { categories, .. } = &feature.spec else {
                    return Err(TabularErr::Configuration(format!(
                        "{} is not categorical",
                        feature.name
                    )));
                };

                let lookup: HashMap<&str, usize> = categories
                    .iter()
                    .enumerate()
                    .map(|(code, c)| (c.as_str(), code))
                    .collect();
                let other = categories.len();

                Ok((0..rows)
                    .map(|i| match column.get(i) {
                        Value::Null => other,
                        value => lookup
                            .get(value.to_string().as_str())
                            .copied()
                            .unwrap_or(other),
                    })
                    .collect())
            })
            .collect::<Result<Vec<Vec<usize>>>>()?;

        debug!(rows = rows; "transformed frame");

        Ok(ScaledFrame {
            numeric: num,
            binary: bin,
            categorical,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Column, DType, ScalerKind};

    fn frame() -> Frame {
        let mut cats = vec!["a"; 10];
        cats.extend(vec!["b"; 10]);
        cats.extend(["rare", "rare"]);

        let n = cats.len();
        let nums: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let flags: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();

        Frame::from_columns([
            ("num", Column::from(nums)),
            ("flag", Column::from(flags)),
            ("cat", Column::from(cats)),
        ])
        .unwrap()
    }

    #[test]
    fn transform_scales_and_codes() {
        let frame = frame();
        let registry = RegistryBuilder::new()
            .scaling(NumericScaling::Uniform(ScalerKind::Standard))
            .build(Some(&frame))
            .unwrap();

        let scaled = registry.transform(&frame).unwrap();
        assert_eq!(scaled.numeric.dim(), (22, 1));
        assert!(scaled.numeric.mean().unwrap().abs() < 1e-5);
        assert_eq!(scaled.binary.column(0).to_vec()[..4], [1., 0., 1., 0.]);

        // a, b retained; "rare" only appears twice
        assert_eq!(registry.cardinalities(), [3]);
        assert_eq!(scaled.categorical[0][0], 0);
        assert_eq!(scaled.categorical[0][10], 1);
        assert_eq!(scaled.categorical[0][21], 2);
    }

    #[test]
    fn unseen_and_missing_values() {
        let frame = frame();
        let registry = RegistryBuilder::new().build(Some(&frame)).unwrap();

        let batch = Frame::from_columns([
            ("num", Column::Float(vec![None])),
            ("flag", Column::Bool(vec![None])),
            ("cat", Column::from(vec!["never seen"])),
        ])
        .unwrap();
        let scaled = registry.transform(&batch).unwrap();

        // Missing numeric cells become the mean, which scales to 0.
        assert!(scaled.numeric[[0, 0]].abs() < 1e-6);
        assert_eq!(scaled.binary[[0, 0]], 0.);
        assert_eq!(scaled.categorical[0], [2]);
        assert_eq!(
            registry.get("cat").unwrap().category_label(2),
            Value::from(OTHER)
        );
    }

    #[test]
    fn numeric_feature_read_from_text_is_an_error() {
        let frame = frame();
        let registry = RegistryBuilder::new().build(Some(&frame)).unwrap();

        let batch = Frame::from_columns([
            ("num", Column::from(vec!["12.5"])),
            ("flag", Column::from(vec![true])),
            ("cat", Column::from(vec!["a"])),
        ])
        .unwrap();

        assert_eq!(
            registry.transform(&batch),
            Err(TabularErr::TypeMismatch {
                column: "num".to_string(),
                expected: "numeric",
                got: DType::Str,
            })
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let frame = frame();
        let registry = RegistryBuilder::new().build(Some(&frame)).unwrap();
        let batch = Frame::from_columns([("num", Column::from(vec![1.]))]).unwrap();

        assert!(matches!(
            registry.transform(&batch),
            Err(TabularErr::ColumnMissing(_))
        ));
    }

    #[test]
    fn serde_keeps_kind_order() {
        let frame = frame();
        let registry = RegistryBuilder::new().build(Some(&frame)).unwrap();

        let json = serde_json::to_string(&registry).unwrap();
        let back: FeatureRegistry = serde_json::from_str(&json).unwrap();

        let names: Vec<_> = back.features().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["num", "flag", "cat"]);
        assert_eq!(back.cardinalities(), registry.cardinalities());
    }
}
