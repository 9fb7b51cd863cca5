use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Feature, FeatureRegistry, FeatureSpec, OTHER};
use crate::{Column, Frame, Result, Scaler, ScalerKind, TabularErr, Value, scaling::stats};

/// Default minimum amount of occurrences for a category to be retained.
pub const DEFAULT_MIN_CATS: usize = 10;

/// How numeric columns are scaled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericScaling {
    /// The same scaler family for every column.
    Uniform(ScalerKind),
    /// One family per column, columns not listed use `gauss_rank`.
    PerColumn(BTreeMap<String, ScalerKind>),
}

impl NumericScaling {
    fn kind_for(&self, column: &str) -> ScalerKind {
        match self {
            NumericScaling::Uniform(kind) => *kind,
            NumericScaling::PerColumn(kinds) => {
                kinds.get(column).copied().unwrap_or(ScalerKind::GaussRank)
            }
        }
    }
}

impl Default for NumericScaling {
    fn default() -> Self {
        NumericScaling::Uniform(ScalerKind::Standard)
    }
}

/// A numeric feature given up front instead of being fit, `scaler` must already be fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericPreset {
    pub mean: f64,
    pub std: f64,
    pub scaler: Scaler,
}

/// Collects the options and presets of a `FeatureRegistry` and then fits whatever was not
/// preset.
///
/// Each preset replaces fitting for its feature kind. With all three of categorical presets,
/// numeric presets and a binary column list, no frame is needed.
#[derive(Clone, Debug)]
pub struct RegistryBuilder {
    min_cats: usize,
    scaling: NumericScaling,
    binary_features: Option<Vec<String>>,
    preset_cats: Option<BTreeMap<String, Vec<String>>>,
    preset_numeric: Option<BTreeMap<String, NumericPreset>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            min_cats: DEFAULT_MIN_CATS,
            scaling: NumericScaling::default(),
            binary_features: None,
            preset_cats: None,
            preset_numeric: None,
        }
    }

    /// Sets the minimum amount of occurrences for a category to be retained.
    pub fn min_cats(mut self, min_cats: usize) -> Self {
        self.min_cats = min_cats;
        self
    }

    pub fn scaling(mut self, scaling: NumericScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Declares exactly which columns are binary, an empty list means there are none.
    pub fn binary_features(mut self, names: Vec<String>) -> Self {
        self.binary_features = Some(names);
        self
    }

    /// Presets the retained categories of every categorical column.
    pub fn preset_categories(mut self, cats: BTreeMap<String, Vec<String>>) -> Self {
        self.preset_cats = Some(cats);
        self
    }

    /// Presets every numeric column with an already fit scaler.
    pub fn preset_numeric(mut self, numeric: BTreeMap<String, NumericPreset>) -> Self {
        self.preset_numeric = Some(numeric);
        self
    }

    /// Whether every feature kind is preset, so `build` doesn't need a frame.
    pub fn is_complete(&self) -> bool {
        self.preset_cats.is_some() && self.preset_numeric.is_some() && self.binary_features.is_some()
    }

    /// Fits the features that were not preset and freezes the registry.
    ///
    /// # Arguments
    /// * `frame` - The data to fit on, may be `None` only if the builder is complete.
    ///
    /// # Returns
    /// A `Configuration` error when there is neither a frame nor a complete set of presets, a
    /// preset scaler is not fit, or a binary column has more than two distinct values.
    pub fn build(self, frame: Option<&Frame>) -> Result<FeatureRegistry> {
        if frame.is_none() && !self.is_complete() {
            return Err(TabularErr::Configuration(
                "without a frame all of the categorical presets, numeric presets and binary \
                 feature list must be provided"
                    .to_string(),
            ));
        }

        let binary = self.binary(frame)?;
        let is_binary = |name: &str| binary.iter().any(|f| f.name == name);

        let numeric = match &self.preset_numeric {
            Some(presets) => {
                debug!("using preset numeric scalers");
                presets
                    .iter()
                    .map(|(name, preset)| preset_numeric(name, preset))
                    .collect::<Result<Vec<_>>>()?
            }
            None => self.fit_numeric(frame, &is_binary)?,
        };

        let categorical = match &self.preset_cats {
            Some(presets) => {
                debug!("using preset categories");
                presets
                    .iter()
                    .map(|(name, cats)| Feature {
                        name: name.clone(),
                        spec: FeatureSpec::Categorical {
                            categories: cats.iter().filter(|c| *c != OTHER).cloned().collect(),
                            min_count: self.min_cats,
                        },
                    })
                    .collect()
            }
            None => self.fit_categorical(frame, &is_binary),
        };

        info!(
            numeric = numeric.len(),
            binary = binary.len(),
            categorical = categorical.len();
            "feature registry built"
        );

        let features = numeric.into_iter().chain(binary).chain(categorical).collect::<Vec<_>>();
        Ok(FeatureRegistry::from(features))
    }

    fn binary(&self, frame: Option<&Frame>) -> Result<Vec<Feature>> {
        let Some(names) = &self.binary_features else {
            let frame = frame.ok_or_else(|| {
                TabularErr::Configuration("binary columns need a frame or a list".to_string())
            })?;

            return Ok(frame
                .iter()
                .filter(|(_, c)| matches!(c, Column::Bool(_)))
                .map(|(name, _)| Feature {
                    name: name.to_string(),
                    spec: FeatureSpec::Binary {
                        categories: [Value::Bool(false), Value::Bool(true)],
                    },
                })
                .collect());
        };

        if let Some(frame) = frame {
            for (name, column) in frame.iter() {
                if matches!(column, Column::Bool(_)) && !names.iter().any(|n| n == name) {
                    warn!("boolean column {name} is not in the binary feature list, ignoring it");
                }
            }
        }

        names
            .iter()
            .map(|name| {
                let categories = match frame.and_then(|f| f.column(name)) {
                    Some(column) => binary_labels(name, column)?,
                    None => [Value::Bool(false), Value::Bool(true)],
                };

                Ok(Feature {
                    name: name.clone(),
                    spec: FeatureSpec::Binary { categories },
                })
            })
            .collect()
    }

    fn fit_numeric(
        &self,
        frame: Option<&Frame>,
        is_binary: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<Vec<Feature>> {
        let Some(frame) = frame else {
            return Ok(Vec::new());
        };

        let columns: Vec<(&str, &Column)> = frame
            .iter()
            .filter(|(name, c)| c.is_numeric() && !is_binary(*name))
            .collect();

        columns
            .par_iter()
            .map(|(name, column)| {
                let sample: Vec<f64> = column.to_f64().into_iter().flatten().collect();
                let kind = self.scaling.kind_for(*name);

                let mut scaler = Scaler::new(kind);
                scaler.fit(&sample)?;

                debug!(column = *name, scaler = kind.name(); "fit numeric scaler");
                Ok(Feature {
                    name: name.to_string(),
                    spec: FeatureSpec::Numeric {
                        mean: stats::mean(&sample),
                        std: stats::std(&sample),
                        scaler,
                    },
                })
            })
            .collect()
    }

    fn fit_categorical(
        &self,
        frame: Option<&Frame>,
        is_binary: &(dyn Fn(&str) -> bool + Sync),
    ) -> Vec<Feature> {
        let Some(frame) = frame else {
            return Vec::new();
        };

        let columns: Vec<(&str, &Column)> = frame
            .iter()
            .filter(|(name, c)| matches!(c, Column::Str(_)) && !is_binary(*name))
            .collect();

        columns
            .par_iter()
            .map(|(name, column)| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for i in 0..column.len() {
                    if let Value::Str(s) = column.get(i) {
                        *counts.entry(s).or_default() += 1;
                    }
                }

                let mut kept: Vec<(String, usize)> = counts
                    .into_iter()
                    .filter(|(c, n)| *n >= self.min_cats && c != OTHER)
                    .collect();
                kept.sort_by(|(a, na), (b, nb)| nb.cmp(na).then_with(|| a.cmp(b)));

                Feature {
                    name: name.to_string(),
                    spec: FeatureSpec::Categorical {
                        categories: kept.into_iter().map(|(c, _)| c).collect(),
                        min_count: self.min_cats,
                    },
                }
            })
            .collect()
    }
}

fn preset_numeric(name: &str, preset: &NumericPreset) -> Result<Feature> {
    if !preset.scaler.is_fitted() {
        return Err(TabularErr::Configuration(format!(
            "the preset scaler of {name} is not fit"
        )));
    }

    Ok(Feature {
        name: name.to_string(),
        spec: FeatureSpec::Numeric {
            mean: preset.mean,
            std: preset.std,
            scaler: preset.scaler.clone(),
        },
    })
}

/// The labels of an allow-listed binary column: `[false, true]` for booleans, otherwise its
/// distinct values in sorted order. A column with a single value is a presence flag,
/// `[null, value]`.
fn binary_labels(name: &str, column: &Column) -> Result<[Value; 2]> {
    if let Column::Bool(_) = column {
        return Ok([Value::Bool(false), Value::Bool(true)]);
    }

    let mut distinct: Vec<Value> = Vec::new();
    for i in 0..column.len() {
        let value = column.get(i);
        if !value.is_null() && !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    distinct.sort_by(|a, b| match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.to_string().cmp(&b.to_string()),
    });

    match distinct.as_slice() {
        [] => Ok([Value::Bool(false), Value::Bool(true)]),
        [only] => Ok([Value::Null, only.clone()]),
        [lo, hi] => Ok([lo.clone(), hi.clone()]),
        more => Err(TabularErr::InvalidBinary {
            column: name.to_string(),
            distinct: more.len(),
        }),
    }
}
